use thiserror::Error;

/// Raised by tree mutation. Never produced while ticking.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum StructuralError {
    #[error("A node cannot be its own child")]
    SelfReference,
    #[error("Attempted to add too many nodes (max {max})")]
    TooManyNodes { max: usize },
    #[error("Adding the child would create a cycle")]
    WouldCreateCycle,
}

pub type AddChildResult = Result<(), StructuralError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum MigrationError {
    #[error("The document is not an object")]
    NotAnObject,
    #[error("Malformed version string {0:?}")]
    MalformedVersion(String),
    #[error("Document version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: String, supported: String },
}

/// Fatal document errors. Whenever one of these is returned the
/// in-memory tree is left untouched.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("Invalid document: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ParameterError {
    #[error("Unknown parameter {0:?}")]
    Unknown(String),
    #[error("Parameter {name:?} expects a value of type {expected}")]
    TypeMismatch { name: String, expected: String },
    #[error("Parameter {name:?} violates rule {rule:?}")]
    RuleViolated { name: String, rule: String },
    #[error("Could not parse rule {0:?}")]
    InvalidRule(String),
}
