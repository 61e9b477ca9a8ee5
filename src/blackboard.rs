use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

use crate::NodeId;

/// Shared key/value store visible to every node during a tick.
///
/// Values are JSON-compatible. Reads and writes made through [`Blackboard::get_by`]
/// and [`Blackboard::set_by`] record the accessing node, so an editor can show
/// which nodes depend on a key.
///
/// There is no isolation between branches: within one tick, writes land in
/// traversal order and the last write to a key wins.
#[derive(Debug, Default)]
pub struct Blackboard {
    data: Map<String, Value>,
    dependencies: HashMap<String, BTreeSet<NodeId>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Same as [`Blackboard::get`], but remembers `node` as a reader of `key`.
    pub fn get_by(&mut self, key: &str, node: &NodeId) -> Option<&Value> {
        self.track(key, node);
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn set_by(&mut self, key: impl Into<String>, value: impl Into<Value>, node: &NodeId) {
        let key = key.into();
        self.track(&key, node);
        self.data.insert(key, value.into());
    }

    fn track(&mut self, key: &str, node: &NodeId) {
        self.dependencies
            .entry(key.to_owned())
            .or_default()
            .insert(node.clone());
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Removes `key` along with its attribution.
    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.dependencies.remove(key);
        self.data.remove(key)
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.dependencies.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Every node that has read or written `key`.
    pub fn get_dependencies(&self, key: &str) -> Option<&BTreeSet<NodeId>> {
        self.dependencies.get(key)
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.data.clone()
    }

    /// Replaces the whole contents, attribution included, with `values`.
    pub fn from_json(&mut self, values: &Map<String, Value>) {
        self.clear();
        for (key, value) in values {
            self.data.insert(key.clone(), value.clone());
        }
    }
}

/// Produces an independent store by a serialize/deserialize round trip.
///
/// Attribution is not carried over, only values. Since values are owned JSON
/// trees, nested arrays and objects are copied too and never alias the source.
impl Clone for Blackboard {
    fn clone(&self) -> Self {
        let mut ret = Self::new();
        ret.from_json(&self.to_json());
        ret
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dependencies() {
        let mut bb = Blackboard::new();
        let reader = NodeId::from("reader");
        let writer = NodeId::from("writer");
        bb.set_by("hp", 10, &writer);
        assert_eq!(bb.get_by("hp", &reader), Some(&json!(10)));
        bb.set("untracked", true);

        let deps = bb.get_dependencies("hp").unwrap();
        assert!(deps.contains(&reader));
        assert!(deps.contains(&writer));
        assert!(bb.get_dependencies("untracked").is_none());
    }

    #[test]
    fn test_from_json_is_destructive() {
        let mut bb = Blackboard::new();
        bb.set_by("stale", 1, &NodeId::from("a"));
        let mut incoming = Map::new();
        incoming.insert("fresh".to_owned(), json!("yes"));
        bb.from_json(&incoming);

        assert!(!bb.has("stale"));
        assert!(bb.get_dependencies("stale").is_none());
        assert_eq!(bb.keys().collect::<Vec<_>>(), vec!["fresh"]);
        assert_eq!(bb.size(), 1);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut bb = Blackboard::new();
        bb.set("count", 1);
        bb.set("list", json!([1, 2]));
        let copy = bb.clone();

        bb.set("count", 2);
        if let Some(Value::Array(list)) = bb.data.get_mut("list") {
            list.push(json!(3));
        }

        assert_eq!(copy.get("count"), Some(&json!(1)));
        assert_eq!(copy.get("list"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_delete_and_clear() {
        let mut bb = Blackboard::new();
        bb.set_by("a", 1, &NodeId::from("writer"));
        bb.set("b", 2);
        assert_eq!(bb.delete("a"), Some(json!(1)));
        assert!(bb.get_dependencies("a").is_none());
        assert_eq!(bb.delete("a"), None);
        assert_eq!(bb.entries().count(), 1);
        bb.clear();
        assert!(bb.is_empty());
    }
}
