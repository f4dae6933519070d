//! Error types for the execution engine.

use thiserror::Error;
use weir_workflow::WorkflowError;

/// Errors that can occur while executing a workflow.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Pre-traversal structural failure.
    #[error("{0}")]
    Validation(#[from] WorkflowError),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Config not found: {0}")]
    ConfigNotFound(String),

    /// A node id appeared during traversal that the graph does not contain.
    #[error("Node '{0}' not found during execution")]
    NodeNotFound(String),

    #[error("No outgoing edge found from '{0}'")]
    NoOutgoingEdge(String),

    #[error("Dynamic edge '{edge}' returned invalid node ID '{target}'")]
    InvalidDynamicTarget { edge: String, target: String },

    /// Rule failure, non-string result, or no condition matched.
    #[error("Dynamic edge '{edge}' failed: {message}")]
    DynamicEdge { edge: String, message: String },

    #[error("Workflow execution exceeded maximum iterations ({0})")]
    IterationLimit(u32),

    /// Template expansion failure, wrapped with the offending node id.
    #[error("Template error in node '{node}': {message}")]
    Template { node: String, message: String },

    #[error("executor not found for node type: {0}")]
    ExecutorNotFound(String),

    /// Failure raised by an executor, wrapped with the node id.
    #[error("Executor error in node '{node}': {message}")]
    Executor { node: String, message: String },

    /// Invalid node config detected at dispatch time.
    #[error("Invalid config for node '{node}': {message}")]
    InvalidNodeConfig { node: String, message: String },

    #[error("Failed to execute setState for key '{key}': {message}")]
    StateUpdate { key: String, message: String },

    /// Terminal failure of a nested execution.
    #[error("Workflow execution failed for workflow_id '{workflow_id}': {message}")]
    SubWorkflow { workflow_id: String, message: String },

    #[error("Execution was canceled")]
    Canceled,

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Whether this error is the cooperative-cancellation signal.
    pub fn is_canceled(&self) -> bool {
        matches!(self, EngineError::Canceled)
    }
}
