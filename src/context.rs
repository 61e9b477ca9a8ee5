use serde_json::{Map, Value};

use crate::{
    executor::{ScriptExecutor, ScriptRequest},
    Blackboard, NodeId, NodeRef, ParameterSet, Status,
};

/// State shared by every node during one tick.
pub struct Context<'a> {
    pub blackboard: &'a mut Blackboard,
    pub(crate) executor: &'a mut dyn ScriptExecutor,
}

impl<'a> Context<'a> {
    pub fn new(blackboard: &'a mut Blackboard, executor: &'a mut dyn ScriptExecutor) -> Self {
        Self {
            blackboard,
            executor,
        }
    }
}

/// What a [`crate::BehaviorNode`] sees of its owning [`crate::Node`] while it
/// is being ticked.
pub struct NodeContext<'n, 'a> {
    pub(crate) node_id: &'n NodeId,
    pub(crate) code: Option<&'n str>,
    pub(crate) config: &'n Map<String, Value>,
    pub(crate) parameters: &'n ParameterSet,
    pub(crate) children: &'n [NodeRef],
    pub(crate) current_child_index: &'n mut usize,
    pub(crate) ctx: &'n mut Context<'a>,
}

impl<'n, 'a> NodeContext<'n, 'a> {
    pub fn node_id(&self) -> &NodeId {
        self.node_id
    }

    pub fn code(&self) -> Option<&str> {
        self.code
    }

    pub fn config(&self) -> &Map<String, Value> {
        self.config
    }

    /// Reads an integral config value. Whole floats are accepted since
    /// documents written by hand often use `3.0`.
    pub fn config_i64(&self, key: &str) -> Option<i64> {
        let value = self.config.get(key)?;
        value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.)
                .map(|f| f as i64)
        })
    }

    pub fn config_bool(&self, key: &str) -> Option<bool> {
        self.config.get(key)?.as_bool()
    }

    pub fn blackboard(&mut self) -> &mut Blackboard {
        &mut *self.ctx.blackboard
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub fn tick_child(&mut self, index: usize) -> Status {
        self.children[index].tick(&mut *self.ctx)
    }

    pub fn reset_child(&mut self, index: usize) {
        self.children[index].reset();
    }

    /// The resumption cursor, clamped into the current child range in case
    /// children were removed while the node was running.
    pub fn current_child_index(&self) -> usize {
        if *self.current_child_index < self.children.len() {
            *self.current_child_index
        } else {
            0
        }
    }

    pub fn set_current_child_index(&mut self, index: usize) {
        *self.current_child_index = index;
    }

    /// Hands the node's code to the executor. Executor errors end here and
    /// come out as [`Status::Failure`].
    pub fn execute(&mut self, ticks_since_start: u32) -> Status {
        let code = match self.code {
            Some(code) => code,
            None => return Status::Success,
        };
        let ctx = &mut *self.ctx;
        let params = self.parameters.resolve(&mut *ctx.blackboard, self.node_id);
        let res = ctx.executor.execute(ScriptRequest {
            code,
            blackboard: &mut *ctx.blackboard,
            node_id: self.node_id,
            ticks_since_start,
            params: &params,
        });
        match res {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(node = %self.node_id, error = %e, "Leaf execution failed");
                Status::Failure
            }
        }
    }
}
