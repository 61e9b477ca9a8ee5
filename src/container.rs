use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::{Rc, Weak},
};

use crate::{
    error::{AddChildResult, StructuralError},
    BehaviorNode, Context, NodeCategory, NodeContext, NodeId, NumChildren, ParameterSet,
    PortSpec, Status,
};

#[derive(Debug, PartialEq, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Editor-facing data. The interpreter reads only `position`, to order
/// Start nodes.
#[derive(Debug, PartialEq, Clone)]
pub struct NodeMeta {
    pub label: String,
    pub position: Position,
    pub icon: String,
    pub color: String,
    pub library_type: Option<String>,
    pub library_version: Option<String>,
    pub is_modified: bool,
    pub ports: PortSpec,
}

pub struct Node {
    pub(crate) id: NodeId,
    /// Name of the type of the node
    pub(crate) type_name: String,
    pub(crate) behavior: Box<dyn BehaviorNode>,
    pub(crate) child_nodes: Vec<NodeRef>,
    pub(crate) parent: Weak<RefCell<Node>>,
    pub(crate) status: Status,
    pub(crate) current_child_index: usize,
    pub config: Map<String, Value>,
    pub code: Option<String>,
    pub parameters: ParameterSet,
    pub meta: NodeMeta,
}

impl Node {
    pub fn new(type_name: impl Into<String>, behavior: Box<dyn BehaviorNode>) -> Self {
        let type_name = type_name.into();
        let ports = PortSpec::for_category(behavior.category(), &type_name);
        Self {
            id: NodeId::new(),
            meta: NodeMeta {
                label: type_name.clone(),
                position: Position::default(),
                icon: String::new(),
                color: String::new(),
                library_type: None,
                library_version: None,
                is_modified: false,
                ports,
            },
            type_name,
            behavior,
            child_nodes: vec![],
            parent: Weak::new(),
            status: Status::Idle,
            current_child_index: 0,
            config: Map::new(),
            code: None,
            parameters: ParameterSet::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Documents carry their own ids, so loaders overwrite the generated one.
    pub fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn category(&self) -> NodeCategory {
        self.behavior.category()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn current_child_index(&self) -> usize {
        self.current_child_index
    }

    pub fn children(&self) -> &[NodeRef] {
        &self.child_nodes
    }

    /// Composites may be limited through the `maxChildren` config entry.
    pub fn max_children(&self) -> NumChildren {
        if self.category() == NodeCategory::Composite {
            if let Some(max) = self.config.get("maxChildren").and_then(Value::as_u64) {
                return NumChildren::Finite(max as usize);
            }
        }
        self.behavior.max_children()
    }

    pub fn tick(&mut self, ctx: &mut Context) -> Status {
        let Node {
            id,
            behavior,
            child_nodes,
            current_child_index,
            config,
            code,
            parameters,
            ..
        } = self;
        let mut node_ctx = NodeContext {
            node_id: id,
            code: code.as_deref().filter(|code| !code.trim().is_empty()),
            config,
            parameters,
            children: child_nodes,
            current_child_index,
            ctx,
        };
        let res = behavior.tick(&mut node_ctx);
        self.status = res;
        res
    }

    pub fn reset(&mut self) {
        self.status = Status::Idle;
        self.current_child_index = 0;
        self.behavior.reset();
        for child in &self.child_nodes {
            child.reset();
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("status", &self.status)
            .field("children", &self.child_nodes)
            .finish()
    }
}

/// Shared handle to a [`Node`].
///
/// A node is owned by its parent's child list and possibly by the flat node
/// list of a [`crate::BehaviorTree`] at the same time, hence the reference
/// counting. Parents are weak references, so dropping a subtree frees it.
#[derive(Clone)]
pub struct NodeRef(Rc<RefCell<Node>>);

impl NodeRef {
    pub fn new(node: Node) -> Self {
        Self(Rc::new(RefCell::new(node)))
    }

    pub fn borrow(&self) -> Ref<Node> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<Node> {
        self.0.borrow_mut()
    }

    pub fn id(&self) -> NodeId {
        self.0.borrow().id.clone()
    }

    pub fn type_name(&self) -> String {
        self.0.borrow().type_name.clone()
    }

    pub fn status(&self) -> Status {
        self.0.borrow().status
    }

    pub fn ptr_eq(&self, other: &NodeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn tick(&self, ctx: &mut Context) -> Status {
        self.0.borrow_mut().tick(ctx)
    }

    pub fn reset(&self) {
        self.0.borrow_mut().reset();
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.0.borrow().parent.upgrade().map(NodeRef)
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.0.borrow().child_nodes.clone()
    }

    pub fn add_child(&self, child: &NodeRef) -> AddChildResult {
        if self.ptr_eq(child) {
            return Err(StructuralError::SelfReference);
        }
        {
            let node = self.0.borrow();
            if node.child_nodes.iter().any(|c| c.ptr_eq(child)) {
                tracing::warn!(parent = %node.id, child = %child.id(), "Node is already a child");
                return Ok(());
            }
            if let NumChildren::Finite(max) = node.max_children() {
                if node.child_nodes.len() >= max {
                    return Err(StructuralError::TooManyNodes { max });
                }
            }
        }
        if child.is_ancestor_of(self) {
            return Err(StructuralError::WouldCreateCycle);
        }

        if let Some(old_parent) = child.parent() {
            old_parent.remove_child(child);
        }
        self.0.borrow_mut().child_nodes.push(child.clone());
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        Ok(())
    }

    /// Returns whether `child` was found and detached.
    pub fn remove_child(&self, child: &NodeRef) -> bool {
        let removed = {
            let mut node = self.0.borrow_mut();
            let before = node.child_nodes.len();
            node.child_nodes.retain(|c| !c.ptr_eq(child));
            before != node.child_nodes.len()
        };
        if removed {
            child.0.borrow_mut().parent = Weak::new();
        }
        removed
    }

    pub fn clear_children(&self) {
        let children = std::mem::take(&mut self.0.borrow_mut().child_nodes);
        for child in children {
            child.0.borrow_mut().parent = Weak::new();
        }
    }

    /// Pre-order traversal of everything below this node, excluding itself.
    pub fn descendants(&self) -> Vec<NodeRef> {
        let mut ret = vec![];
        fn recurse(node: &NodeRef, ret: &mut Vec<NodeRef>) {
            for child in node.0.borrow().child_nodes.iter() {
                ret.push(child.clone());
                recurse(child, ret);
            }
        }
        recurse(self, &mut ret);
        ret
    }

    /// Walks the parent chain of `node` looking for `self`.
    pub fn is_ancestor_of(&self, node: &NodeRef) -> bool {
        let mut cursor = node.parent();
        while let Some(parent) = cursor {
            if parent.ptr_eq(self) {
                return true;
            }
            cursor = parent.parent();
        }
        false
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(node) => write!(f, "NodeRef({} {})", node.type_name, node.id),
            Err(_) => write!(f, "NodeRef(<ticking>)"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Registry;

    fn build(registry: &Registry, ty: &str) -> NodeRef {
        registry.build(ty).unwrap()
    }

    #[test]
    fn test_add_child_sets_parent() {
        let registry = Registry::default();
        let seq = build(&registry, "Sequence");
        let leaf = build(&registry, "Action");
        seq.add_child(&leaf).unwrap();
        assert!(leaf.parent().unwrap().ptr_eq(&seq));
        assert!(seq.is_ancestor_of(&leaf));
        assert!(!leaf.is_ancestor_of(&seq));
    }

    #[test]
    fn test_structural_errors() {
        let registry = Registry::default();
        let seq = build(&registry, "Sequence");
        assert_eq!(seq.add_child(&seq), Err(StructuralError::SelfReference));

        let inverter = build(&registry, "Inverter");
        inverter.add_child(&build(&registry, "Action")).unwrap();
        assert_eq!(
            inverter.add_child(&build(&registry, "Action")),
            Err(StructuralError::TooManyNodes { max: 1 })
        );

        let inner = build(&registry, "Selector");
        seq.add_child(&inner).unwrap();
        assert_eq!(inner.add_child(&seq), Err(StructuralError::WouldCreateCycle));

        let leaf = build(&registry, "Action");
        assert_eq!(
            leaf.add_child(&build(&registry, "Action")),
            Err(StructuralError::TooManyNodes { max: 0 })
        );
    }

    #[test]
    fn test_duplicate_child_is_noop() {
        let registry = Registry::default();
        let seq = build(&registry, "Sequence");
        let leaf = build(&registry, "Action");
        seq.add_child(&leaf).unwrap();
        seq.add_child(&leaf).unwrap();
        assert_eq!(seq.children().len(), 1);
    }

    #[test]
    fn test_reparenting_detaches() {
        let registry = Registry::default();
        let a = build(&registry, "Sequence");
        let b = build(&registry, "Selector");
        let leaf = build(&registry, "Action");
        a.add_child(&leaf).unwrap();
        b.add_child(&leaf).unwrap();
        assert!(a.children().is_empty());
        assert!(leaf.parent().unwrap().ptr_eq(&b));
    }

    #[test]
    fn test_max_children_config() {
        let registry = Registry::default();
        let seq = build(&registry, "Sequence");
        seq.borrow_mut()
            .config
            .insert("maxChildren".to_owned(), 1.into());
        seq.add_child(&build(&registry, "Action")).unwrap();
        assert_eq!(
            seq.add_child(&build(&registry, "Action")),
            Err(StructuralError::TooManyNodes { max: 1 })
        );
    }

    #[test]
    fn test_remove_and_clear() {
        let registry = Registry::default();
        let seq = build(&registry, "Sequence");
        let a = build(&registry, "Action");
        let b = build(&registry, "Wait");
        seq.add_child(&a).unwrap();
        seq.add_child(&b).unwrap();

        assert!(seq.remove_child(&a));
        assert!(!seq.remove_child(&a));
        assert!(a.parent().is_none());

        seq.clear_children();
        assert!(seq.children().is_empty());
        assert!(b.parent().is_none());
    }

    #[test]
    fn test_descendants_pre_order() {
        let registry = Registry::default();
        let root = build(&registry, "Sequence");
        let sel = build(&registry, "Selector");
        let a = build(&registry, "Action");
        let b = build(&registry, "Action");
        let c = build(&registry, "Action");
        root.add_child(&sel).unwrap();
        sel.add_child(&a).unwrap();
        sel.add_child(&b).unwrap();
        root.add_child(&c).unwrap();

        let ids: Vec<_> = root.descendants().iter().map(NodeRef::id).collect();
        assert_eq!(ids, vec![sel.id(), a.id(), b.id(), c.id()]);
    }
}
