//! The boundary between leaf nodes and whatever evaluates their code.
//!
//! The interpreter does not know how leaf code is run. A host supplies a
//! [`ScriptExecutor`], which may forward the request to a sandbox, an embedded
//! scripting language or plain Rust closures. Errors stay on the executor's side
//! of the boundary: the leaf glue turns any [`ScriptError`] into
//! [`Status::Failure`].

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{Blackboard, NodeId, Status};

/// Everything a leaf hands over to the executor on a single tick.
pub struct ScriptRequest<'a> {
    pub code: &'a str,
    pub blackboard: &'a mut Blackboard,
    pub node_id: &'a NodeId,
    /// Number of consecutive ticks that returned [`Status::Running`] so far.
    /// Zero on the first tick of a fresh run.
    pub ticks_since_start: u32,
    pub params: &'a Map<String, Value>,
}

#[derive(Debug, Error)]
#[error("script execution failed: {message}")]
pub struct ScriptError {
    message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub trait ScriptExecutor {
    fn execute(&mut self, request: ScriptRequest) -> Result<Status, ScriptError>;
}

impl<F> ScriptExecutor for F
where
    F: FnMut(ScriptRequest) -> Result<Status, ScriptError>,
{
    fn execute(&mut self, request: ScriptRequest) -> Result<Status, ScriptError> {
        self(request)
    }
}

/// Executor that refuses to run anything. Leaves with code fail, leaves
/// without code still succeed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExecutor;

impl ScriptExecutor for NullExecutor {
    fn execute(&mut self, request: ScriptRequest) -> Result<Status, ScriptError> {
        Err(ScriptError::new(format!(
            "no executor configured for node {}",
            request.node_id
        )))
    }
}
