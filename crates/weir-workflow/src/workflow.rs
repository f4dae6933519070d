//! Workflow definition and structural validation.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::edge::Edge;
use crate::error::WorkflowError;
use crate::node::Node;

/// Default bound on node visits per traversal.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

/// A workflow definition: the static program interpreted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique workflow identifier.
    pub id: String,

    /// Workflow name.
    pub name: String,

    /// Free-form JSON-Schema-shaped description of the expected parameters.
    /// Consumed by external validators; opaque to the engine.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub parameters_schema: Value,

    /// Workflow nodes. Ids must be unique.
    pub nodes: Vec<Node>,

    /// Workflow edges. At most one outgoing edge per node.
    #[serde(default)]
    pub edges: Vec<Edge>,

    /// Entry node id.
    pub start_node: String,

    /// Terminal node id. Its output becomes the execution result.
    pub end_node: String,

    /// Initial state mapping, copied per execution.
    #[serde(default)]
    pub state: Map<String, Value>,

    /// Bound on node visits per traversal.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Config applied when the execution request names none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_config_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Workflow {
    /// Create a new empty workflow with the given start and end node ids.
    pub fn new(
        name: impl Into<String>,
        start_node: impl Into<String>,
        end_node: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            parameters_schema: Value::Null,
            nodes: Vec::new(),
            edges: Vec::new(),
            start_node: start_node.into(),
            end_node: end_node.into(),
            state: Map::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            default_config_id: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Get a node by id.
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Get the outgoing edge of a node, if any.
    pub fn outgoing_edge(&self, from: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.from() == from)
    }

    /// Build an id -> node lookup map.
    pub fn node_index(&self) -> HashMap<&str, &Node> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }

    /// Build a from-id -> edge lookup map. Valid workflows have at most one
    /// outgoing edge per node, so a plain map suffices.
    pub fn edge_index(&self) -> HashMap<&str, &Edge> {
        self.edges.iter().map(|e| (e.from(), e)).collect()
    }

    /// Validate the graph structure before execution.
    ///
    /// Checks node id uniqueness, start/end existence, edge endpoint
    /// existence, and the one-outgoing-edge invariant. Reachability and
    /// cycle analysis are deliberately absent: cycles are legal.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(WorkflowError::DuplicateNodeId(node.id.clone()));
            }
        }

        if !ids.contains(self.start_node.as_str()) {
            return Err(WorkflowError::MissingStartNode(self.start_node.clone()));
        }
        if !ids.contains(self.end_node.as_str()) {
            return Err(WorkflowError::MissingEndNode(self.end_node.clone()));
        }

        let mut outgoing: HashMap<&str, usize> = HashMap::new();
        for edge in &self.edges {
            if !ids.contains(edge.from()) {
                return Err(WorkflowError::UnknownEdgeSource {
                    edge: edge.id().to_string(),
                    node: edge.from().to_string(),
                });
            }
            if let Some(to) = edge.to() {
                if !ids.contains(to) {
                    return Err(WorkflowError::UnknownEdgeTarget {
                        edge: edge.id().to_string(),
                        node: to.to_string(),
                    });
                }
            }
            *outgoing.entry(edge.from()).or_default() += 1;
        }

        for (node, count) in outgoing {
            if count > 1 {
                return Err(WorkflowError::MultipleOutgoingEdges {
                    node: node.to_string(),
                    count,
                });
            }
        }

        Ok(())
    }
}

/// Builder for assembling workflows in code.
pub struct WorkflowBuilder {
    workflow: Workflow,
    edge_seq: usize,
}

impl WorkflowBuilder {
    pub fn new(
        name: impl Into<String>,
        start_node: impl Into<String>,
        end_node: impl Into<String>,
    ) -> Self {
        Self {
            workflow: Workflow::new(name, start_node, end_node),
            edge_seq: 0,
        }
    }

    pub fn node(mut self, node: Node) -> Self {
        self.workflow.nodes.push(node);
        self
    }

    pub fn edge(mut self, from: &str, to: &str) -> Self {
        self.edge_seq += 1;
        self.workflow
            .edges
            .push(Edge::new(format!("e{}", self.edge_seq), from, to));
        self
    }

    pub fn dynamic_edge(mut self, from: &str, rule: impl Into<crate::node::RuleSpec>) -> Self {
        self.edge_seq += 1;
        self.workflow
            .edges
            .push(Edge::dynamic(format!("e{}", self.edge_seq), from, rule));
        self
    }

    pub fn conditional_edge(mut self, from: &str, conditions: Vec<crate::edge::EdgeCondition>) -> Self {
        self.edge_seq += 1;
        self.workflow
            .edges
            .push(Edge::conditional(format!("e{}", self.edge_seq), from, conditions));
        self
    }

    pub fn initial_state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.workflow.state.insert(key.into(), value);
        self
    }

    pub fn max_iterations(mut self, max: u32) -> Self {
        self.workflow.max_iterations = max;
        self
    }

    pub fn default_config(mut self, config_id: impl Into<String>) -> Self {
        self.workflow.default_config_id = Some(config_id.into());
        self
    }

    /// Validate and return the workflow.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        self.workflow.validate()?;
        Ok(self.workflow)
    }

    /// Return the workflow without validating. Used by tests exercising the
    /// validator itself.
    pub fn build_unchecked(self) -> Workflow {
        self.workflow
    }
}
