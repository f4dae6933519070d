//! Node types and definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node type reserved for nested sub-workflow invocation. Handled by the
/// orchestrator itself rather than the executor registry.
pub const WORKFLOW_EXECUTOR: &str = "workflow_executor";

/// A rule program attached to a `setState` entry or a dynamic edge.
///
/// Either a bare expression string or an ordered list of steps. A step list
/// runs top to bottom; `return` terminates the rule with its value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RuleSpec {
    Expr(String),
    Steps(Vec<RuleStep>),
}

impl From<&str> for RuleSpec {
    fn from(expr: &str) -> Self {
        RuleSpec::Expr(expr.to_string())
    }
}

/// One step of a rule program.
///
/// `then`/`else` bodies are expressions, optionally assignments of the form
/// `name = <expr>` binding a rule-local name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RuleStep {
    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub then: Option<String>,

    #[serde(rename = "else", skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<String>,

    #[serde(rename = "return", skip_serializing_if = "Option::is_none")]
    pub ret: Option<String>,
}

/// A `setState` entry: after the node completes, evaluate `rule` (with the
/// node output bound as `output`) and assign the result to `state[key]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateRule {
    pub key: String,
    pub rule: RuleSpec,
}

/// Per-node streaming policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StreamingPolicy {
    /// Whether chunk events should be emitted for this node.
    #[serde(default)]
    pub enabled: bool,

    /// Whether a `node_complete` event carries the full output. Suppressed
    /// only when explicitly false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_on_complete: Option<bool>,
}

/// A processing step in a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier within the workflow.
    pub id: String,

    /// Executor type identifier (e.g. "transform", "workflow_executor").
    #[serde(rename = "type")]
    pub kind: String,

    /// Configuration tree. Expanded as a template against the execution
    /// context before the executor runs.
    #[serde(default = "empty_config")]
    pub config: Value,

    /// State assignments applied after the node completes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_state: Vec<StateRule>,

    /// Streaming policy; absent means streaming disabled for this node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<StreamingPolicy>,
}

fn empty_config() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Node {
    /// Create a new node with an empty config.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            config: empty_config(),
            set_state: Vec::new(),
            streaming: None,
        }
    }

    /// Replace the config tree.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Append a `setState` rule.
    pub fn with_set_state(mut self, key: impl Into<String>, rule: impl Into<RuleSpec>) -> Self {
        self.set_state.push(StateRule {
            key: key.into(),
            rule: rule.into(),
        });
        self
    }

    /// Enable streaming for this node.
    pub fn with_streaming(mut self, send_on_complete: Option<bool>) -> Self {
        self.streaming = Some(StreamingPolicy {
            enabled: true,
            send_on_complete,
        });
        self
    }

    /// Whether this node invokes a nested sub-workflow.
    pub fn is_sub_workflow(&self) -> bool {
        self.kind == WORKFLOW_EXECUTOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_deserializes_wire_format() {
        let node: Node = serde_json::from_value(json!({
            "id": "score",
            "type": "transform",
            "config": {"value": "{{state.count}}"},
            "setState": [{"key": "count", "rule": "state.count + 1"}]
        }))
        .unwrap();

        assert_eq!(node.kind, "transform");
        assert_eq!(node.set_state.len(), 1);
        assert_eq!(
            node.set_state[0].rule,
            RuleSpec::Expr("state.count + 1".to_string())
        );
    }

    #[test]
    fn rule_spec_accepts_step_lists() {
        let rule: RuleSpec = serde_json::from_value(json!([
            {"if": "state.count < 3", "then": "out = 'counter'"},
            {"then": "out = 'end'"},
            {"return": "out"}
        ]))
        .unwrap();

        match rule {
            RuleSpec::Steps(steps) => {
                assert_eq!(steps.len(), 3);
                assert_eq!(steps[0].condition.as_deref(), Some("state.count < 3"));
                assert_eq!(steps[2].ret.as_deref(), Some("out"));
            }
            other => panic!("expected steps, got {other:?}"),
        }
    }

    #[test]
    fn missing_config_defaults_to_empty_object() {
        let node: Node =
            serde_json::from_value(json!({"id": "a", "type": "passthrough"})).unwrap();
        assert!(node.config.as_object().is_some_and(|m| m.is_empty()));
    }
}
