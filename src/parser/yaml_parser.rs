use serde_json::Value;

use super::loader::{load, LoadedTree};
use crate::{error::LoadError, version::DocumentMigrator, NodeFactory};

/// Loads a tree document written in YAML. The document has the same shape as
/// the JSON one, so it is converted to a JSON value and handed to [`load`].
pub fn load_yaml(
    yaml: &str,
    factory: &dyn NodeFactory,
    migrator: &dyn DocumentMigrator,
) -> Result<LoadedTree, LoadError> {
    let document: Value = serde_yaml::from_str(yaml)?;
    load(document, factory, migrator)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{version::VersionMigrator, NodeId, Registry};

    #[test]
    fn test_load_yaml() {
        let yaml = r#"
version: 1.1.0
tree:
  root: seq
  nodes:
    - id: seq
      type: Sequence
      category: composite
      children: [hit, rest]
    - id: hit
      type: Action
      code: attack
    - id: rest
      type: Wait
      config:
        note: "short"
blackboard:
  initialValues:
    enemies: 3
"#;
        let loaded = load_yaml(yaml, &Registry::default(), &VersionMigrator).unwrap();
        let root = loaded.root.unwrap();
        assert_eq!(root.id(), NodeId::from("seq"));
        assert_eq!(root.children().len(), 2);
        assert_eq!(
            root.children()[0].borrow().code.as_deref(),
            Some("attack")
        );
        assert_eq!(loaded.blackboard.get("enemies"), Some(&Value::from(3)));
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            load_yaml("tree: [", &Registry::default(), &VersionMigrator),
            Err(LoadError::Yaml(_))
        ));
    }
}
