//! Execution records: one run of a workflow and one invocation of a node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Lifecycle status shared by executions and node executions.
///
/// `pending -> running -> {completed, failed}`; terminal states are final.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ExecutionStatus::Pending),
            "running" => Some(ExecutionStatus::Running),
            "completed" => Some(ExecutionStatus::Completed),
            "failed" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }
}

/// One run of a workflow against a parameter set and config snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,

    pub workflow_id: String,

    pub status: ExecutionStatus,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Parameters supplied with the request.
    #[serde(default)]
    pub parameters: Value,

    /// Snapshot of the resolved config variables; never re-read mid-run.
    #[serde(default)]
    pub config: Map<String, Value>,

    /// The config the snapshot came from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,

    /// Final output: the end node's output on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Execution {
    /// Create a new pending execution.
    pub fn new(
        workflow_id: impl Into<String>,
        parameters: Value,
        config: Map<String, Value>,
        config_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            parameters,
            config,
            config_id,
            result: None,
            error: None,
        }
    }

    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
    }

    pub fn complete(&mut self, result: Value) {
        self.status = ExecutionStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }
}

/// One invocation of one node within one execution. Cyclic workflows
/// revisit nodes; each revisit creates a fresh record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecution {
    pub id: String,

    pub execution_id: String,

    pub node_id: String,

    pub status: ExecutionStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl NodeExecution {
    /// Create a record for a node that is entering execution.
    pub fn new(execution_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            node_id: node_id.into(),
            status: ExecutionStatus::Running,
            output: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn complete(&mut self, output: Value) {
        self.status = ExecutionStatus::Completed;
        self.output = Some(output);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn execution_lifecycle() {
        let mut exec = Execution::new("wf-1", json!({"x": 1}), Map::new(), None);
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert!(exec.completed_at.is_none());

        exec.start();
        assert_eq!(exec.status, ExecutionStatus::Running);

        exec.complete(json!({"v": 3}));
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert!(exec.status.is_terminal());
        assert_eq!(exec.result, Some(json!({"v": 3})));
        assert!(exec.completed_at.is_some());
    }

    #[test]
    fn failed_execution_records_error() {
        let mut exec = Execution::new("wf-1", Value::Null, Map::new(), None);
        exec.start();
        exec.fail("boom");
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.error.as_deref(), Some("boom"));
    }

    #[test]
    fn status_string_round_trip() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
        ] {
            assert_eq!(ExecutionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ExecutionStatus::parse("bogus"), None);
    }
}
