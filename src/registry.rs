use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::{
    config_map,
    nodes::{
        InverterNode, ParallelNode, RepeaterNode, ScriptLeafNode, SelectorNode, SequenceNode,
        StartNode, UntilFailNode, UntilSuccessNode, ACTION, CUSTOM_ACTION, GO_TO, INVERTER,
        PARALLEL, REPEATER, SELECTOR, SEQUENCE, START, UNTIL_FAIL, UNTIL_SUCCESS, WAIT,
    },
    BehaviorNode, Node, NodeRef, ParamKind, Parameter, ParameterSet,
};

/// Creates nodes by their type tag. Loaders use it to rebuild documents.
pub trait NodeFactory {
    fn create(&self, type_name: &str) -> Option<NodeRef>;
}

pub type Constructor = Box<dyn Fn() -> Box<dyn BehaviorNode>>;

pub fn boxify<T>(cons: impl (Fn() -> T) + 'static) -> Constructor
where
    T: BehaviorNode + 'static,
{
    Box::new(move || Box::new(cons()))
}

struct NodeStyle {
    icon: &'static str,
    color: &'static str,
}

static BUILTIN_STYLES: Lazy<HashMap<&'static str, NodeStyle>> = Lazy::new(|| {
    [
        (SEQUENCE, "→", "#4a90d9"),
        (SELECTOR, "?", "#d9a441"),
        (PARALLEL, "⇉", "#8e6bd9"),
        (INVERTER, "!", "#d95f5f"),
        (REPEATER, "↻", "#5fb3d9"),
        (UNTIL_SUCCESS, "✓", "#5fd97a"),
        (UNTIL_FAIL, "✗", "#d97a5f"),
        (START, "▶", "#3cb371"),
        (ACTION, "⚡", "#9aa0a6"),
        (WAIT, "⏱", "#9aa0a6"),
        (GO_TO, "➜", "#9aa0a6"),
        (CUSTOM_ACTION, "★", "#c27ba0"),
    ]
    .into_iter()
    .map(|(name, icon, color)| (name, NodeStyle { icon, color }))
    .collect()
});

/// Everything needed to stamp out one kind of node.
struct NodeTemplate {
    /// Type tag of the produced node. Differs from the registration name for
    /// custom nodes, which all produce `CustomAction` leaves.
    type_name: String,
    constructor: Constructor,
    label: String,
    icon: String,
    color: String,
    code: Option<String>,
    config: Map<String, Value>,
    parameters: ParameterSet,
    library_type: Option<String>,
    library_version: Option<String>,
}

impl NodeTemplate {
    fn new(type_name: &str, constructor: Constructor) -> Self {
        let (icon, color) = BUILTIN_STYLES
            .get(type_name)
            .map(|style| (style.icon, style.color))
            .unwrap_or(("", ""));
        Self {
            type_name: type_name.to_owned(),
            constructor,
            label: type_name.to_owned(),
            icon: icon.to_owned(),
            color: color.to_owned(),
            code: None,
            config: Map::new(),
            parameters: ParameterSet::new(),
            library_type: None,
            library_version: None,
        }
    }

    fn instantiate(&self) -> NodeRef {
        let mut node = Node::new(self.type_name.clone(), (self.constructor)());
        node.meta.label = self.label.clone();
        node.meta.icon = self.icon.clone();
        node.meta.color = self.color.clone();
        node.meta.library_type = self.library_type.clone();
        node.meta.library_version = self.library_version.clone();
        node.code = self.code.clone();
        node.config = self.config.clone();
        node.parameters = self.parameters.clone();
        NodeRef::new(node)
    }
}

/// A user-authored leaf template from the custom-node catalog.
#[derive(Debug, Clone, Default)]
pub struct CustomNodeDef {
    pub name: String,
    pub label: Option<String>,
    pub code: String,
    pub parameters: ParameterSet,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub version: Option<String>,
}

pub struct Registry {
    node_types: HashMap<String, NodeTemplate>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut ret = Self {
            node_types: HashMap::new(),
        };
        ret.register(SEQUENCE, boxify(SequenceNode::default));
        ret.register(SELECTOR, boxify(SelectorNode::default));
        ret.register(PARALLEL, boxify(ParallelNode::default));
        ret.register(INVERTER, boxify(InverterNode::default));
        ret.register(REPEATER, boxify(RepeaterNode::default));
        ret.register(UNTIL_SUCCESS, boxify(UntilSuccessNode::default));
        ret.register(UNTIL_FAIL, boxify(UntilFailNode::default));
        ret.register(START, boxify(StartNode::default));
        for leaf in [ACTION, WAIT, GO_TO, CUSTOM_ACTION] {
            ret.register(leaf, boxify(ScriptLeafNode::default));
        }

        ret.set_default_config(
            PARALLEL,
            config_map!("minSuccess" => -1, "minFailure" => 1),
        );
        ret.set_default_config(
            REPEATER,
            config_map!("count" => 3, "repeatForever" => false),
        );

        let mut wait = ParameterSet::new();
        wait.define(
            "duration",
            Parameter::new(ParamKind::Number)
                .with_default(1)
                .with_rule("min(0)"),
        );
        ret.set_default_parameters(WAIT, wait);

        let mut go_to = ParameterSet::new();
        go_to.define(
            "target",
            Parameter::new(ParamKind::BlackboardKey)
                .with_default("target")
                .with_rule("required"),
        );
        ret.set_default_parameters(GO_TO, go_to);
        ret
    }
}

impl Registry {
    pub fn register(&mut self, type_name: impl ToString, constructor: Constructor) {
        let type_name = type_name.to_string();
        let template = NodeTemplate::new(&type_name, constructor);
        if self.node_types.insert(type_name.clone(), template).is_some() {
            tracing::warn!(ty = %type_name, "Replaced a registered node type");
        }
    }

    /// Adds a catalog entry. Building it yields a `CustomAction` leaf that
    /// carries the template's code and parameters and remembers where it came
    /// from through `library_type`.
    ///
    /// Built-in type names cannot be taken over; such entries are refused and
    /// `false` is returned.
    pub fn register_custom(&mut self, def: CustomNodeDef) -> bool {
        if BUILTIN_STYLES.contains_key(def.name.as_str()) {
            tracing::warn!(name = %def.name, "Custom node would shadow a built-in type, refused");
            return false;
        }
        let mut template = NodeTemplate::new(CUSTOM_ACTION, boxify(ScriptLeafNode::default));
        template.label = def.label.unwrap_or_else(|| def.name.clone());
        if let Some(icon) = def.icon {
            template.icon = icon;
        }
        if let Some(color) = def.color {
            template.color = color;
        }
        template.code = Some(def.code);
        template.parameters = def.parameters;
        template.library_type = Some(def.name.clone());
        template.library_version = def.version;
        if self.node_types.contains_key(&def.name) {
            tracing::warn!(name = %def.name, "Replaced a custom node definition");
        }
        self.node_types.insert(def.name, template);
        true
    }

    pub fn set_default_config(&mut self, type_name: &str, config: Map<String, Value>) {
        if let Some(template) = self.node_types.get_mut(type_name) {
            template.config = config;
        }
    }

    pub fn set_default_parameters(&mut self, type_name: &str, parameters: ParameterSet) {
        if let Some(template) = self.node_types.get_mut(type_name) {
            template.parameters = parameters;
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.node_types.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.node_types.keys().map(String::as_str)
    }

    pub fn build(&self, type_name: &str) -> Option<NodeRef> {
        self.node_types
            .get(type_name)
            .map(NodeTemplate::instantiate)
    }
}

impl NodeFactory for Registry {
    fn create(&self, type_name: &str) -> Option<NodeRef> {
        self.build(type_name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{NodeCategory, PortKind};

    #[test]
    fn test_builtins() {
        let registry = Registry::default();
        for (name, category) in [
            ("Sequence", NodeCategory::Composite),
            ("Parallel", NodeCategory::Composite),
            ("Repeater", NodeCategory::Decorator),
            ("Start", NodeCategory::Decorator),
            ("Wait", NodeCategory::Leaf),
        ] {
            let node = registry.build(name).unwrap();
            assert_eq!(node.borrow().category(), category);
            assert_eq!(node.type_name(), name);
        }
        assert!(registry.build("Teleport").is_none());

        let repeater = registry.build("Repeater").unwrap();
        assert_eq!(repeater.borrow().config.get("count"), Some(&Value::from(3)));
        let start = registry.build("Start").unwrap();
        assert_eq!(start.borrow().meta.ports.input, PortKind::None);
    }

    #[test]
    fn test_fresh_ids() {
        let registry = Registry::default();
        let a = registry.build("Action").unwrap();
        let b = registry.build("Action").unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_custom_node() {
        let mut registry = Registry::default();
        registry.register_custom(CustomNodeDef {
            name: "Patrol".to_owned(),
            code: "patrol()".to_owned(),
            version: Some("2".to_owned()),
            ..CustomNodeDef::default()
        });
        let node = registry.build("Patrol").unwrap();
        let node = node.borrow();
        assert_eq!(node.type_name(), "CustomAction");
        assert_eq!(node.meta.label, "Patrol");
        assert_eq!(node.meta.library_type.as_deref(), Some("Patrol"));
        assert_eq!(node.code.as_deref(), Some("patrol()"));
    }

    #[test]
    fn test_custom_node_cannot_shadow_builtin() {
        let mut registry = Registry::default();
        assert!(!registry.register_custom(CustomNodeDef {
            name: "Sequence".to_owned(),
            code: "oops()".to_owned(),
            ..CustomNodeDef::default()
        }));
        let node = registry.build("Sequence").unwrap();
        assert_eq!(node.borrow().category(), NodeCategory::Composite);
        assert_eq!(node.type_name(), "Sequence");
    }
}
