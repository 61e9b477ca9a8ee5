//! Document versioning.
//!
//! Documents carry a `major.minor.patch` version string. Older documents are
//! upgraded in place before they are loaded, newer ones are refused.

use serde_json::{Map, Value};

use crate::{error::MigrationError, NodeCategory, PortSpec};

pub const CURRENT_VERSION: &str = "1.1.0";

/// Version assumed for documents written before versioning existed.
pub const LEGACY_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Checks and upgrades raw documents before they are turned into trees.
pub trait DocumentMigrator {
    fn current_version(&self) -> &str {
        CURRENT_VERSION
    }

    fn validate(&self, document: &Value) -> ValidationReport;

    fn migrate(&self, document: Value) -> Result<Value, MigrationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn parse(s: &str) -> Result<Self, MigrationError> {
        let malformed = || MigrationError::MalformedVersion(s.to_owned());
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u32, MigrationError> {
            parts
                .next()
                .and_then(|part| part.parse().ok())
                .ok_or_else(malformed)
        };
        let ret = Self {
            major: next()?,
            minor: next()?,
            patch: next()?,
        };
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(ret)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn document_version(document: &Map<String, Value>) -> Result<Version, MigrationError> {
    match document.get("version") {
        None | Some(Value::Null) => Version::parse(LEGACY_VERSION),
        Some(Value::String(s)) => Version::parse(s),
        Some(other) => Err(MigrationError::MalformedVersion(other.to_string())),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct VersionMigrator;

impl VersionMigrator {
    /// 1.0.x documents predate port kinds and the modified flag.
    fn upgrade_1_0(document: &mut Map<String, Value>) {
        let nodes = document
            .get_mut("tree")
            .and_then(|tree| tree.get_mut("nodes"))
            .and_then(Value::as_array_mut);
        for record in nodes.into_iter().flatten() {
            let Some(record) = record.as_object_mut() else {
                continue;
            };
            let category: NodeCategory = record
                .get("category")
                .cloned()
                .and_then(|c| serde_json::from_value(c).ok())
                .unwrap_or_default();
            let type_name = record
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let ports = PortSpec::for_category(category, type_name);
            if !record.contains_key("inputPortType") {
                if let Ok(v) = serde_json::to_value(ports.input) {
                    record.insert("inputPortType".to_owned(), v);
                }
            }
            if !record.contains_key("outputPortType") {
                if let Ok(v) = serde_json::to_value(ports.output) {
                    record.insert("outputPortType".to_owned(), v);
                }
            }
            record
                .entry("isModified")
                .or_insert(Value::Bool(false));
        }
    }
}

impl DocumentMigrator for VersionMigrator {
    fn validate(&self, document: &Value) -> ValidationReport {
        let Some(document) = document.as_object() else {
            return ValidationReport::from_errors(vec![MigrationError::NotAnObject.to_string()]);
        };
        let mut errors = vec![];
        match (document_version(document), Version::parse(CURRENT_VERSION)) {
            (Ok(found), Ok(current)) => {
                if found.major > current.major {
                    errors.push(
                        MigrationError::UnsupportedVersion {
                            found: found.to_string(),
                            supported: current.to_string(),
                        }
                        .to_string(),
                    );
                }
            }
            (Err(e), _) | (_, Err(e)) => errors.push(e.to_string()),
        }
        match document.get("tree") {
            None | Some(Value::Object(_)) => (),
            Some(_) => errors.push("`tree` must be an object".to_owned()),
        }
        match document.get("tree").and_then(|tree| tree.get("nodes")) {
            None | Some(Value::Array(_)) => (),
            Some(_) => errors.push("`tree.nodes` must be an array".to_owned()),
        }
        ValidationReport::from_errors(errors)
    }

    fn migrate(&self, document: Value) -> Result<Value, MigrationError> {
        let Value::Object(mut document) = document else {
            return Err(MigrationError::NotAnObject);
        };
        let found = document_version(&document)?;
        let current = Version::parse(CURRENT_VERSION)?;
        if found > current {
            return Err(MigrationError::UnsupportedVersion {
                found: found.to_string(),
                supported: current.to_string(),
            });
        }
        if found.major == 1 && found.minor == 0 {
            Self::upgrade_1_0(&mut document);
        }
        if found != current {
            tracing::info!(from = %found, to = %current, "Migrated document");
        }
        document.insert("version".to_owned(), Value::from(CURRENT_VERSION));
        Ok(Value::Object(document))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_version() {
        assert_eq!(
            Version::parse("1.2.3"),
            Ok(Version {
                major: 1,
                minor: 2,
                patch: 3
            })
        );
        assert!(Version::parse("1.2").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
        assert!(Version::parse("one.two.three").is_err());
    }

    #[test]
    fn test_validate() {
        let migrator = VersionMigrator;
        assert!(migrator.validate(&json!({"version": "1.1.0"})).valid);
        assert!(migrator.validate(&json!({})).valid);
        assert!(!migrator.validate(&json!([])).valid);
        assert!(!migrator.validate(&json!({"version": "2.0.0"})).valid);
        assert!(!migrator.validate(&json!({"version": "abc"})).valid);

        let report = migrator.validate(&json!({"tree": {"nodes": 3}}));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_migrate_legacy() {
        let doc = json!({
            "tree": {
                "nodes": [
                    {"id": "s", "type": "Start", "category": "decorator"},
                    {"id": "a", "type": "Sequence", "category": "composite", "isModified": true},
                ]
            }
        });
        let doc = VersionMigrator.migrate(doc).unwrap();
        assert_eq!(doc["version"], json!(CURRENT_VERSION));
        let nodes = &doc["tree"]["nodes"];
        assert_eq!(nodes[0]["inputPortType"], json!("none"));
        assert_eq!(nodes[0]["outputPortType"], json!("single"));
        assert_eq!(nodes[0]["isModified"], json!(false));
        assert_eq!(nodes[1]["outputPortType"], json!("multiple"));
        assert_eq!(nodes[1]["isModified"], json!(true));
    }

    #[test]
    fn test_migrate_rejects_newer() {
        assert_eq!(
            VersionMigrator.migrate(json!({"version": "1.2.0"})),
            Err(MigrationError::UnsupportedVersion {
                found: "1.2.0".to_owned(),
                supported: CURRENT_VERSION.to_owned(),
            })
        );
        assert_eq!(
            VersionMigrator.migrate(json!("1.0.0")),
            Err(MigrationError::NotAnObject)
        );
    }
}
