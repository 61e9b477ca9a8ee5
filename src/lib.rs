//! # behavior-tree-engine
//!
//! A resumable behavior tree interpreter for an interactive authoring tool.
//!
//!
//! ## Overview
//!
//! A behavior tree is evaluated once per external "tick". Each node returns a
//! [`Status`], and composite and decorator nodes combine the statuses of their
//! children. Nodes that returned [`Status::Running`] remember where they were,
//! so the next tick continues from the same child instead of starting over.
//!
//! The crate is built from a few pieces:
//!
//! * [`NodeRef`] is a shared handle to a [`Node`], which owns its children and
//!   keeps a weak reference to its parent. The behavior of a node is a boxed
//!   [`BehaviorNode`].
//! * [`Blackboard`] is the key/value store every node can read and write.
//! * [`ScriptExecutor`] runs the code attached to leaf nodes. The interpreter
//!   never sees its errors, only a [`Status::Failure`].
//! * [`BehaviorTree`] owns the root, discovers `Start` nodes, runs the
//!   idle/running/paused state machine and (de)serializes whole trees.
//!
//!
//! ## How it looks like
//!
//! Nodes are created from a [`Registry`] and wired together with
//! [`NodeRef::add_child`].
//!
//! ```rust
//! # use behavior_tree_engine::*;
//! let registry = Registry::default();
//! let root = registry.build("Sequence").unwrap();
//! let action = registry.build("Action").unwrap();
//! action.borrow_mut().code = Some("attack".to_owned());
//! root.add_child(&action).unwrap();
//! ```
//!
//! Leaf code is evaluated by an executor. Any closure with the right signature
//! will do.
//!
//! ```rust
//! # use behavior_tree_engine::*;
//! # let registry = Registry::default();
//! # let root = registry.build("Sequence").unwrap();
//! let executor = |req: ScriptRequest| -> Result<Status, ScriptError> {
//!     req.blackboard.set_by("last", req.code, req.node_id);
//!     Ok(Status::Success)
//! };
//! let mut tree = BehaviorTree::new(Box::new(executor), Box::new(ManualScheduler::new()));
//! tree.set_root(Some(root));
//! assert_eq!(tree.tick(), Status::Success);
//! ```
//!
//!
//! ## Start nodes
//!
//! When the node list given to [`BehaviorTree::set_nodes`] contains `Start`
//! nodes, every one of them is ticked, left to right by their position in the
//! editor. Each Start-anchored subtree restarts on its own as soon as it
//! reaches a terminal status, so subtrees of different pace can run side by side.
//!
//!
//! ## Continuous execution
//!
//! [`BehaviorTree::start`] arms a periodic timer on the injected [`Scheduler`].
//! The host calls [`BehaviorTree::pump`] from its event loop, which ticks once
//! for every timer firing that is due. Tests use [`ManualScheduler`] to fire the
//! timer deterministically.

mod blackboard;
mod config;
mod container;
mod context;
mod document;
pub mod error;
pub mod executor;
mod nodes;
mod parameter;
pub mod parser;
mod port;
mod registry;
pub mod scheduler;
mod tree;
pub mod version;

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

pub use crate::blackboard::Blackboard;
pub use crate::config::TreeConfig;
pub use crate::container::{Node, NodeMeta, NodeRef, Position};
pub use crate::context::{Context, NodeContext};
pub use crate::document::{BlackboardData, Metadata, NodeRecord, TreeData, TreeDocument};
pub use crate::executor::{NullExecutor, ScriptError, ScriptExecutor, ScriptRequest};
pub use crate::nodes::{
    InverterNode, ParallelNode, RepeaterNode, ScriptLeafNode, SelectorNode, SequenceNode,
    StartNode, UntilFailNode, UntilSuccessNode,
};
pub use crate::parameter::{ParamKind, Parameter, ParameterSet};
pub use crate::port::{PortKind, PortSpec};
pub use crate::registry::{boxify, CustomNodeDef, NodeFactory, Registry};
pub use crate::scheduler::{IntervalScheduler, ManualScheduler, Scheduler, TimerId};
pub use crate::tree::{BehaviorTree, ExecutionState};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Failure,
    /// The node should keep running in the next tick
    Running,
    #[default]
    Idle,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    Composite,
    Decorator,
    #[default]
    Leaf,
}

/// Opaque node identity. Fresh nodes get a random UUID, loaded nodes keep the
/// id stored in the document.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for NodeId {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NumChildren {
    Finite(usize),
    Infinite,
}

impl PartialOrd for NumChildren {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(match (self, other) {
            (NumChildren::Finite(_), NumChildren::Infinite) => std::cmp::Ordering::Less,
            (NumChildren::Infinite, NumChildren::Finite(_)) => std::cmp::Ordering::Greater,
            (NumChildren::Finite(lhs), NumChildren::Finite(rhs)) => lhs.cmp(rhs),
            (NumChildren::Infinite, NumChildren::Infinite) => return None,
        })
    }
}

/// The evaluation half of a node. Structure (children, parent, cursor, config)
/// lives in [`Node`]; implementors only hold their own resumption state.
pub trait BehaviorNode {
    fn category(&self) -> NodeCategory;

    fn tick(&mut self, ctx: &mut NodeContext) -> Status;

    /// Clears resumption state. Called whenever the owning node is reset.
    fn reset(&mut self) {}

    fn max_children(&self) -> NumChildren {
        match self.category() {
            NodeCategory::Composite => NumChildren::Infinite,
            NodeCategory::Decorator => NumChildren::Finite(1),
            NodeCategory::Leaf => NumChildren::Finite(0),
        }
    }
}

/// Builds a JSON object map, mostly for node configs.
#[macro_export]
macro_rules! config_map {
    () => {
        serde_json::Map::new()
    };
    ($($name: literal => $val: expr),+ $(,)?) => {{
        let mut ret = serde_json::Map::new();
        $(ret.insert($name.to_owned(), serde_json::Value::from($val));)+
        ret
    }};
}
