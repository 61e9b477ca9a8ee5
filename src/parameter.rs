use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{
    error::ParameterError,
    parser::{parse_rule_str, Rule},
    Blackboard, NodeId,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamKind {
    Number,
    Integer,
    String,
    Boolean,
    /// The value names a blackboard key. It resolves to whatever the
    /// blackboard holds under that key at tick time.
    BlackboardKey,
    #[default]
    Any,
}

impl ParamKind {
    fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (ParamKind::Any, _) => true,
            (ParamKind::Number, Value::Number(_)) => true,
            (ParamKind::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.)
            }
            (ParamKind::String | ParamKind::BlackboardKey, Value::String(_)) => true,
            (ParamKind::Boolean, Value::Bool(_)) => true,
            _ => false,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::String => "string",
            ParamKind::Boolean => "boolean",
            ParamKind::BlackboardKey => "blackboardKey",
            ParamKind::Any => "any",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    #[serde(rename = "type", default)]
    pub kind: ParamKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    pub fn new(kind: ParamKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rules.push(rule.into());
        self
    }

    /// The value a leaf would see, before blackboard resolution.
    pub fn effective(&self) -> Option<&Value> {
        self.value.as_ref().or(self.default.as_ref())
    }

    fn check(&self, name: &str, value: Option<&Value>) -> Result<(), ParameterError> {
        if let Some(value) = value {
            if !self.kind.accepts(value) {
                return Err(ParameterError::TypeMismatch {
                    name: name.to_owned(),
                    expected: self.kind.name().to_owned(),
                });
            }
        }
        for source in &self.rules {
            let rule =
                parse_rule_str(source).ok_or_else(|| ParameterError::InvalidRule(source.clone()))?;
            // A blackboard key is only a name; range rules apply to the
            // resolved value, which is unknown until tick time.
            if self.kind == ParamKind::BlackboardKey && !matches!(rule, Rule::Required) {
                continue;
            }
            if !rule.check(value) {
                return Err(ParameterError::RuleViolated {
                    name: name.to_owned(),
                    rule: source.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Typed, named inputs of a node, with validation rules.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, Parameter>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, parameter: Parameter) {
        self.0.insert(name.into(), parameter);
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Assigns a value after checking its type and rules. The previous value
    /// is kept if validation fails.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ParameterError> {
        let param = self
            .0
            .get_mut(name)
            .ok_or_else(|| ParameterError::Unknown(name.to_owned()))?;
        let value = value.into();
        param.check(name, Some(&value))?;
        param.value = Some(value);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        for (name, param) in &self.0 {
            param.check(name, param.effective())?;
        }
        Ok(())
    }

    /// Produces the map handed to a leaf's executor. Blackboard-key
    /// parameters are looked up and `node` is recorded as their reader.
    pub fn resolve(&self, blackboard: &mut Blackboard, node: &NodeId) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(name, param)| {
                let value = match (param.kind, param.effective()) {
                    (ParamKind::BlackboardKey, Some(Value::String(key))) => blackboard
                        .get_by(key, node)
                        .cloned()
                        .unwrap_or(Value::Null),
                    (_, value) => value.cloned().unwrap_or(Value::Null),
                };
                (name.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn speed_params() -> ParameterSet {
        let mut params = ParameterSet::new();
        params.define(
            "speed",
            Parameter::new(ParamKind::Number)
                .with_default(1)
                .with_rule("range(0, 10)"),
        );
        params.define(
            "target",
            Parameter::new(ParamKind::BlackboardKey).with_rule("required"),
        );
        params
    }

    #[test]
    fn test_set_validates() {
        let mut params = speed_params();
        assert_eq!(params.set("speed", 4), Ok(()));
        assert_eq!(
            params.set("speed", 11),
            Err(ParameterError::RuleViolated {
                name: "speed".to_owned(),
                rule: "range(0, 10)".to_owned()
            })
        );
        assert_eq!(params.get("speed").unwrap().value, Some(json!(4)));
        assert!(matches!(
            params.set("speed", "fast"),
            Err(ParameterError::TypeMismatch { .. })
        ));
        assert_eq!(
            params.set("nope", 1),
            Err(ParameterError::Unknown("nope".to_owned()))
        );
    }

    #[test]
    fn test_validate_required() {
        let mut params = speed_params();
        assert!(params.validate().is_err());
        params.set("target", "enemy").unwrap();
        assert_eq!(params.validate(), Ok(()));
    }

    #[test]
    fn test_invalid_rule() {
        let mut params = ParameterSet::new();
        params.define("x", Parameter::new(ParamKind::Any).with_rule("between(1, 2)"));
        assert_eq!(
            params.validate(),
            Err(ParameterError::InvalidRule("between(1, 2)".to_owned()))
        );
    }

    #[test]
    fn test_resolve() {
        let mut params = speed_params();
        params.set("target", "enemy").unwrap();
        let mut bb = Blackboard::new();
        bb.set("enemy", json!({"x": 3}));
        let node = NodeId::from("mover");

        let resolved = params.resolve(&mut bb, &node);
        assert_eq!(resolved.get("speed"), Some(&json!(1)));
        assert_eq!(resolved.get("target"), Some(&json!({"x": 3})));
        assert!(bb.get_dependencies("enemy").unwrap().contains(&node));
    }

    #[test]
    fn test_integer_kind() {
        assert!(ParamKind::Integer.accepts(&json!(3)));
        assert!(ParamKind::Integer.accepts(&json!(3.0)));
        assert!(!ParamKind::Integer.accepts(&json!(3.5)));
    }
}
