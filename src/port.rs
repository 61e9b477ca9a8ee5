use serde::{Deserialize, Serialize};

use crate::NodeCategory;

/// How many connections an editor port accepts.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    #[default]
    None,
    Single,
    Multiple,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PortSpec {
    pub input: PortKind,
    pub output: PortKind,
}

impl PortSpec {
    pub fn new(input: PortKind, output: PortKind) -> Self {
        Self { input, output }
    }

    /// Ports a node of `category` exposes. Start nodes are entry points, so
    /// they have no input.
    pub fn for_category(category: NodeCategory, type_name: &str) -> Self {
        if type_name == crate::nodes::START {
            return Self::new(PortKind::None, PortKind::Single);
        }
        match category {
            NodeCategory::Composite => Self::new(PortKind::Single, PortKind::Multiple),
            NodeCategory::Decorator => Self::new(PortKind::Single, PortKind::Single),
            NodeCategory::Leaf => Self::new(PortKind::Single, PortKind::None),
        }
    }
}
