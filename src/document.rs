use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    version::CURRENT_VERSION, Blackboard, NodeCategory, NodeId, NodeRef, ParameterSet, PortKind,
    Position,
};

/// The on-disk shape of a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDocument {
    pub version: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub tree: TreeData,
    #[serde(default)]
    pub blackboard: BlackboardData,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub node_count: usize,
    #[serde(default)]
    pub editor_version: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeData {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub root: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackboardData {
    #[serde(default)]
    pub initial_values: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub category: NodeCategory,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ParameterSet>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_type: Option<String>,
    #[serde(default)]
    pub is_modified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_port_type: Option<PortKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_port_type: Option<PortKind>,
}

impl NodeRecord {
    pub fn from_node(node: &NodeRef) -> Self {
        let node = node.borrow();
        Self {
            id: node.id().clone(),
            type_name: node.type_name().to_owned(),
            label: Some(node.meta.label.clone()),
            category: node.category(),
            position: node.meta.position,
            icon: Some(node.meta.icon.clone()),
            color: Some(node.meta.color.clone()),
            code: node.code.clone(),
            config: Some(node.config.clone()),
            parameters: Some(node.parameters.clone()),
            children: node.children().iter().map(NodeRef::id).collect(),
            library_type: node.meta.library_type.clone(),
            is_modified: node.meta.is_modified,
            library_version: node.meta.library_version.clone(),
            input_port_type: Some(node.meta.ports.input),
            output_port_type: Some(node.meta.ports.output),
        }
    }

    /// Copies the record onto a node fresh from the factory. Fields the record
    /// leaves out keep the factory's defaults. Children are wired separately
    /// once every node exists.
    pub fn apply_to(&self, node: &NodeRef) {
        let mut node = node.borrow_mut();
        node.set_id(self.id.clone());
        node.meta.position = self.position;
        node.meta.is_modified = self.is_modified;
        node.code = self.code.clone();
        if let Some(label) = &self.label {
            node.meta.label = label.clone();
        }
        if let Some(icon) = &self.icon {
            node.meta.icon = icon.clone();
        }
        if let Some(color) = &self.color {
            node.meta.color = color.clone();
        }
        if let Some(library_type) = &self.library_type {
            node.meta.library_type = Some(library_type.clone());
        }
        if let Some(library_version) = &self.library_version {
            node.meta.library_version = Some(library_version.clone());
        }
        if let Some(input) = self.input_port_type {
            node.meta.ports.input = input;
        }
        if let Some(output) = self.output_port_type {
            node.meta.ports.output = output;
        }
        if let Some(config) = &self.config {
            node.config = config.clone();
        }
        if let Some(parameters) = &self.parameters {
            node.parameters = parameters.clone();
        }
    }
}

impl TreeDocument {
    /// Snapshots `root` and everything reachable from it. Nodes that are not
    /// connected to `root` are left out.
    pub fn capture(
        root: Option<&NodeRef>,
        blackboard: &Blackboard,
        created: Option<DateTime<Utc>>,
    ) -> Self {
        let nodes: Vec<NodeRecord> = root
            .into_iter()
            .flat_map(|root| std::iter::once(root.clone()).chain(root.descendants()))
            .map(|node| NodeRecord::from_node(&node))
            .collect();
        let now = Utc::now();
        Self {
            version: CURRENT_VERSION.to_owned(),
            metadata: Metadata {
                created: Some(created.unwrap_or(now)),
                modified: Some(now),
                node_count: nodes.len(),
                editor_version: env!("CARGO_PKG_VERSION").to_owned(),
            },
            tree: TreeData {
                nodes,
                root: root.map(NodeRef::id),
            },
            blackboard: BlackboardData {
                initial_values: blackboard.to_json(),
            },
        }
    }

    pub fn to_json_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Parses a document as is. Use [`crate::parser::load`] for documents that
    /// may need migration.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}
