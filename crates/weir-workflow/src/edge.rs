//! Edge types: static routing and rule- or condition-driven dynamic routing.

use serde::{Deserialize, Serialize};

use crate::node::RuleSpec;

/// An unconditional edge `from -> to`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaticEdge {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// One branch of the `conditions` form of a dynamic edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeCondition {
    /// Expression evaluated against the execution context.
    pub condition: String,
    /// Destination node id selected when the condition is truthy.
    pub node: String,
}

/// A conditional edge. Carries either a rule program that must produce the
/// next node id, or a `conditions` list whose first truthy entry wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicEdge {
    pub id: String,
    pub from: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<EdgeCondition>>,
}

/// An edge in the workflow graph.
///
/// The wire format is distinguished by field presence: `{id, from, to}` is
/// static, `{id, from, rule}` / `{id, from, conditions}` is dynamic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Edge {
    Static(StaticEdge),
    Dynamic(DynamicEdge),
}

impl Edge {
    /// Create a static edge.
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Edge::Static(StaticEdge {
            id: id.into(),
            from: from.into(),
            to: to.into(),
        })
    }

    /// Create a dynamic edge driven by a rule program.
    pub fn dynamic(
        id: impl Into<String>,
        from: impl Into<String>,
        rule: impl Into<RuleSpec>,
    ) -> Self {
        Edge::Dynamic(DynamicEdge {
            id: id.into(),
            from: from.into(),
            rule: Some(rule.into()),
            conditions: None,
        })
    }

    /// Create a dynamic edge driven by a conditions list.
    pub fn conditional(
        id: impl Into<String>,
        from: impl Into<String>,
        conditions: Vec<EdgeCondition>,
    ) -> Self {
        Edge::Dynamic(DynamicEdge {
            id: id.into(),
            from: from.into(),
            rule: None,
            conditions: Some(conditions),
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Edge::Static(e) => &e.id,
            Edge::Dynamic(e) => &e.id,
        }
    }

    pub fn from(&self) -> &str {
        match self {
            Edge::Static(e) => &e.from,
            Edge::Dynamic(e) => &e.from,
        }
    }

    /// Destination of a static edge; dynamic edges have none until evaluated.
    pub fn to(&self) -> Option<&str> {
        match self {
            Edge::Static(e) => Some(&e.to),
            Edge::Dynamic(_) => None,
        }
    }
}
