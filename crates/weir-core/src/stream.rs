//! Live event stream emitted during workflow execution.
//!
//! Events flow through an mpsc channel; nested sub-workflow executions
//! share the parent's sink and tag their events with an incremented depth
//! and an extended node path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Kind of a stream event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    WorkflowStart,
    WorkflowComplete,
    NodeStart,
    NodeChunk,
    NodeComplete,
    StateUpdated,
    Error,
}

/// Envelope tagging events emitted by one (possibly nested) execution.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StreamingContext {
    pub execution_id: String,

    /// Nesting depth; 0 for the top-level execution.
    pub depth: usize,

    /// Node ids of the sub-workflow nodes leading to this execution.
    pub path: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<String>,
}

impl StreamingContext {
    pub fn root(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            depth: 0,
            path: Vec::new(),
            parent_execution_id: None,
        }
    }

    /// Context for a sub-execution entered through `node_id`.
    pub fn child(&self, node_id: &str, sub_execution_id: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(node_id.to_string());
        Self {
            execution_id: sub_execution_id.into(),
            depth: self.depth + 1,
            path,
            parent_execution_id: Some(self.execution_id.clone()),
        }
    }
}

/// One event on the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,

    pub timestamp: DateTime<Utc>,

    pub workflow_id: String,

    pub execution_id: String,

    pub depth: usize,

    pub path: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<String>,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Sending half of an event stream.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    /// Create a sink and its receiving half.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Deliver an event. A dropped receiver silently discards events; the
    /// execution itself never fails because nobody is listening.
    pub async fn send(&self, event: StreamEvent) {
        let _ = self.tx.send(event).await;
    }
}

/// A sink bound to one execution's envelope.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    sink: EventSink,
    workflow_id: String,
    context: StreamingContext,
}

impl StreamHandle {
    pub fn root(sink: EventSink, workflow_id: impl Into<String>, execution_id: &str) -> Self {
        Self {
            sink,
            workflow_id: workflow_id.into(),
            context: StreamingContext::root(execution_id),
        }
    }

    /// Handle for a sub-execution entered through `node_id`. Shares the
    /// parent's sink; depth + 1, path extended by the invoking node.
    pub fn child(&self, node_id: &str, sub_workflow_id: &str, sub_execution_id: &str) -> Self {
        Self {
            sink: self.sink.clone(),
            workflow_id: sub_workflow_id.to_string(),
            context: self.context.child(node_id, sub_execution_id),
        }
    }

    pub fn context(&self) -> &StreamingContext {
        &self.context
    }

    pub async fn emit(&self, kind: EventKind, data: Value, metadata: Option<Value>) {
        self.sink
            .send(StreamEvent {
                kind,
                timestamp: Utc::now(),
                workflow_id: self.workflow_id.clone(),
                execution_id: self.context.execution_id.clone(),
                depth: self.context.depth,
                path: self.context.path.clone(),
                parent_execution_id: self.context.parent_execution_id.clone(),
                data,
                metadata,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn events_carry_the_envelope() {
        let (sink, mut rx) = EventSink::channel(8);
        let handle = StreamHandle::root(sink, "wf-1", "exec-1");
        handle
            .emit(EventKind::NodeStart, json!({"nodeId": "a"}), None)
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::NodeStart);
        assert_eq!(event.workflow_id, "wf-1");
        assert_eq!(event.execution_id, "exec-1");
        assert_eq!(event.depth, 0);
        assert!(event.path.is_empty());
    }

    #[tokio::test]
    async fn child_handles_nest_depth_and_path() {
        let (sink, mut rx) = EventSink::channel(8);
        let root = StreamHandle::root(sink, "wf-1", "exec-1");
        let child = root.child("invoke", "wf-2", "exec-2");
        let grandchild = child.child("inner", "wf-3", "exec-3");

        grandchild.emit(EventKind::WorkflowStart, Value::Null, None).await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.depth, 2);
        assert_eq!(event.path, vec!["invoke".to_string(), "inner".to_string()]);
        assert_eq!(event.parent_execution_id.as_deref(), Some("exec-2"));
    }

    #[test]
    fn event_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(EventKind::NodeChunk).unwrap(),
            json!("node_chunk")
        );
        assert_eq!(
            serde_json::to_value(EventKind::WorkflowComplete).unwrap(),
            json!("workflow_complete")
        );
    }
}
