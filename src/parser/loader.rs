use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::{
    error::LoadError,
    version::DocumentMigrator,
    Metadata, NodeFactory, NodeId, NodeRecord, NodeRef,
};

/// A document turned back into nodes.
#[derive(Debug, Default)]
pub struct LoadedTree {
    pub root: Option<NodeRef>,
    /// Every node that could be created, in document order, including the ones
    /// that are not reachable from `root`.
    pub nodes: Vec<NodeRef>,
    pub blackboard: Map<String, Value>,
    pub metadata: Metadata,
}

/// Rebuilds a tree from a raw JSON document.
///
/// The document is validated and migrated first; failures there are the only
/// errors. Past that point, problems with individual records are logged and
/// the record (or edge) is skipped, so a partially damaged document still
/// loads as much as it can.
pub fn load(
    document: Value,
    factory: &dyn NodeFactory,
    migrator: &dyn DocumentMigrator,
) -> Result<LoadedTree, LoadError> {
    let report = migrator.validate(&document);
    if !report.valid {
        return Err(LoadError::Invalid(report.errors));
    }
    let mut document = migrator.migrate(document)?;

    let metadata = document
        .get_mut("metadata")
        .map(Value::take)
        .and_then(|metadata| serde_json::from_value(metadata).ok())
        .unwrap_or_default();
    let blackboard = match document
        .get_mut("blackboard")
        .and_then(|bb| bb.get_mut("initialValues"))
        .map(Value::take)
    {
        Some(Value::Object(values)) => values,
        _ => Map::new(),
    };

    let Some(tree) = document.get_mut("tree") else {
        tracing::warn!("Document has no tree, loading it as empty");
        return Ok(LoadedTree {
            blackboard,
            metadata,
            ..LoadedTree::default()
        });
    };
    let records = match tree.get_mut("nodes").map(Value::take) {
        Some(Value::Array(records)) => records,
        _ => {
            tracing::warn!("Document tree has no nodes, loading it as empty");
            vec![]
        }
    };
    let root_id: Option<NodeId> = tree
        .get_mut("root")
        .map(Value::take)
        .and_then(|root| serde_json::from_value(root).ok());

    // Pass 1: create every node
    let mut created: Vec<(NodeRecord, NodeRef)> = vec![];
    let mut by_id: HashMap<NodeId, NodeRef> = HashMap::new();
    for (i, record) in records.into_iter().enumerate() {
        let record: NodeRecord = match serde_json::from_value(record) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(index = i, error = %e, "Skipping malformed node record");
                continue;
            }
        };
        if by_id.contains_key(&record.id) {
            tracing::warn!(id = %record.id, "Skipping node record with a duplicate id");
            continue;
        }
        let Some(node) = factory.create(&record.type_name) else {
            tracing::warn!(id = %record.id, ty = %record.type_name, "Unknown node type, skipping");
            continue;
        };
        record.apply_to(&node);
        by_id.insert(record.id.clone(), node.clone());
        created.push((record, node));
    }

    // Pass 2: wire the edges
    for (record, node) in &created {
        for child_id in &record.children {
            let Some(child) = by_id.get(child_id) else {
                tracing::warn!(parent = %record.id, child = %child_id, "Dangling child reference");
                continue;
            };
            if let Err(e) = node.add_child(child) {
                tracing::warn!(parent = %record.id, child = %child_id, error = %e, "Could not attach child");
            }
        }
    }

    let root = root_id.and_then(|id| {
        let found = by_id.get(&id).cloned();
        if found.is_none() {
            tracing::warn!(root = %id, "Root node not found in document");
        }
        found
    });

    Ok(LoadedTree {
        root,
        nodes: created.into_iter().map(|(_, node)| node).collect(),
        blackboard,
        metadata,
    })
}

/// Same as [`load`] for a JSON string.
pub fn load_str(
    json: &str,
    factory: &dyn NodeFactory,
    migrator: &dyn DocumentMigrator,
) -> Result<LoadedTree, LoadError> {
    load(serde_json::from_str(json)?, factory, migrator)
}
