//! Error types for the workflow model.

use thiserror::Error;

/// Structural errors raised when a workflow fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Start node '{0}' does not exist in workflow")]
    MissingStartNode(String),

    #[error("End node '{0}' does not exist in workflow")]
    MissingEndNode(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Edge '{edge}' references non-existent 'from' node: {node}")]
    UnknownEdgeSource { edge: String, node: String },

    #[error("Edge '{edge}' references non-existent 'to' node: {node}")]
    UnknownEdgeTarget { edge: String, node: String },

    #[error("Node '{node}' has {count} outgoing edges. Each node can only have one outgoing edge.")]
    MultipleOutgoingEdges { node: String, count: usize },

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),
}
