//! Integration tests for the workflow execution engine.
//!
//! These cover end-to-end traversal: linear chains, cyclic counters,
//! iteration bounds, conditional routing, parent-output propagation,
//! sub-workflows, streaming, and the journal contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use weir_core::{
    ChunkSink, CustomExecutorDef, Engine, EngineError, EventKind, EventSink, ExecuteOptions,
    ExecutorInput, ExecutorRegistry, MemoryConfigStore, MemoryJournal, MemoryWorkflowStore,
    NodeExecutor, RunContext, StreamEvent,
};
use weir_workflow::{
    EdgeCondition, ExecutionStatus, Node, RuleSpec, Workflow, WorkflowBuilder,
};

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    engine: Engine,
    workflows: Arc<MemoryWorkflowStore>,
    configs: Arc<MemoryConfigStore>,
    journal: Arc<MemoryJournal>,
}

fn harness() -> Harness {
    harness_with_registry(ExecutorRegistry::new())
}

fn harness_with_registry(registry: ExecutorRegistry) -> Harness {
    let workflows = Arc::new(MemoryWorkflowStore::new());
    let configs = Arc::new(MemoryConfigStore::new());
    let journal = Arc::new(MemoryJournal::new());
    let engine = Engine::new(workflows.clone(), configs.clone(), journal.clone())
        .with_registry(registry);
    Harness {
        engine,
        workflows,
        configs,
        journal,
    }
}

fn transform(id: &str, config: Value) -> Node {
    Node::new(id, "transform").with_config(config)
}

async fn save(harness: &Harness, workflow: &Workflow) {
    use weir_core::WorkflowStore;
    harness.workflows.save_workflow(workflow).await.unwrap();
}

async fn node_ids(harness: &Harness, execution_id: &str) -> Vec<String> {
    use weir_core::ExecutionJournal;
    harness
        .journal
        .list_node_executions(execution_id)
        .await
        .unwrap()
        .iter()
        .map(|r| r.node_id.clone())
        .collect()
}

fn drain(mut rx: tokio::sync::mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn linear_static_workflow() {
    use weir_core::ExecutionJournal;

    let h = harness();
    let wf = WorkflowBuilder::new("linear", "A", "C")
        .node(transform("A", json!({"v": 1})))
        .node(transform("B", json!({"v": 2})))
        .node(transform("C", json!({"v": 3})))
        .edge("A", "B")
        .edge("B", "C")
        .build()
        .unwrap();
    save(&h, &wf).await;

    let execution = h.engine.execute(&wf.id, ExecuteOptions::default()).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.result, Some(json!({"v": 3})));

    let records = h.journal.list_node_executions(&execution.id).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == ExecutionStatus::Completed));
    assert_eq!(node_ids(&h, &execution.id).await, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn counter_loop_revisits_nodes() {
    let h = harness();
    let check_rule: RuleSpec = serde_json::from_value(json!([
        {"if": "state.count < 3", "then": "next = 'counter'"},
        {"if": "state.count >= 3", "then": "next = 'end'"},
        {"return": "next"}
    ]))
    .unwrap();

    let wf = WorkflowBuilder::new("counter-loop", "counter", "end")
        .node(
            transform("counter", json!({"count": "{{state.count}}"}))
                .with_set_state("count", "state.count + 1"),
        )
        .node(Node::new("check", "passthrough"))
        .node(transform("end", json!({"done": true})))
        .edge("counter", "check")
        .dynamic_edge("check", check_rule)
        .initial_state("count", json!(0))
        .build()
        .unwrap();
    save(&h, &wf).await;

    let execution = h.engine.execute(&wf.id, ExecuteOptions::default()).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.result, Some(json!({"done": true})));

    // counter and check three times each, then end: 7 visits total, one
    // node-execution row per visit.
    let visited = node_ids(&h, &execution.id).await;
    assert_eq!(
        visited,
        vec!["counter", "check", "counter", "check", "counter", "check", "end"]
    );
}

#[tokio::test]
async fn self_loop_exceeds_iteration_bound() {
    use weir_core::ExecutionJournal;
    use weir_workflow::Execution;

    let h = harness();
    let wf = WorkflowBuilder::new("spin", "loop", "end")
        .node(Node::new("loop", "passthrough"))
        .node(Node::new("end", "passthrough"))
        .edge("loop", "loop")
        .max_iterations(5)
        .build()
        .unwrap();
    save(&h, &wf).await;

    let mut execution = Execution::new(&wf.id, json!({}), serde_json::Map::new(), None);
    h.journal.create_execution(&execution).await.unwrap();

    let err = h
        .engine
        .run(&wf, &mut execution, None, &RunContext::new())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Workflow execution exceeded maximum iterations (5)"
    );
    assert_eq!(execution.status, ExecutionStatus::Failed);

    // One node-execution row per visit: the bound allows exactly five.
    let records = h.journal.list_node_executions(&execution.id).await.unwrap();
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.node_id == "loop"));
}

#[tokio::test]
async fn conditional_branch_takes_the_truthy_condition() {
    let h = harness();
    let wf = WorkflowBuilder::new("branch", "score", "high")
        .node(Node::new("score", "passthrough").with_set_state("score", "75"))
        .node(transform("high", json!({"result": "high"})))
        .node(transform("low", json!({"result": "low"})))
        .conditional_edge(
            "score",
            vec![
                EdgeCondition {
                    condition: "state.score >= 70".into(),
                    node: "high".into(),
                },
                EdgeCondition {
                    condition: "true".into(),
                    node: "low".into(),
                },
            ],
        )
        .build()
        .unwrap();
    save(&h, &wf).await;

    let execution = h.engine.execute(&wf.id, ExecuteOptions::default()).await.unwrap();
    assert_eq!(execution.result, Some(json!({"result": "high"})));
    assert_eq!(node_ids(&h, &execution.id).await, vec!["score", "high"]);
}

#[tokio::test]
async fn parent_outputs_propagate_with_native_types() {
    let h = harness();
    let wf = WorkflowBuilder::new("parents", "A", "C")
        .node(transform("A", json!({"a": 1})))
        .node(transform("B", json!({"b": 2})))
        .node(transform(
            "C",
            json!({"fromA": "{{parent.A.a}}", "fromB": "{{parent.B.b}}"}),
        ))
        .edge("A", "B")
        .edge("B", "C")
        .build()
        .unwrap();
    save(&h, &wf).await;

    let execution = h.engine.execute(&wf.id, ExecuteOptions::default()).await.unwrap();
    // Full-expression templates keep numbers numeric.
    assert_eq!(execution.result, Some(json!({"fromA": 1, "fromB": 2})));
}

#[tokio::test]
async fn dynamic_edge_rejects_unknown_target() {
    let h = harness();
    let wf = WorkflowBuilder::new("bad-target", "a", "b")
        .node(Node::new("a", "passthrough"))
        .node(Node::new("b", "passthrough"))
        .dynamic_edge("a", "'non_existent_node'")
        .build()
        .unwrap();
    save(&h, &wf).await;

    let err = h.engine.execute(&wf.id, ExecuteOptions::default()).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Dynamic edge 'e1' returned invalid node ID 'non_existent_node'"
    );
}

// ============================================================================
// Boundary behaviors
// ============================================================================

#[tokio::test]
async fn iteration_bound_of_one_fails_two_node_chain() {
    let h = harness();
    let wf = WorkflowBuilder::new("tight", "a", "b")
        .node(Node::new("a", "passthrough"))
        .node(Node::new("b", "passthrough"))
        .edge("a", "b")
        .max_iterations(1)
        .build()
        .unwrap();
    save(&h, &wf).await;

    let err = h.engine.execute(&wf.id, ExecuteOptions::default()).await.unwrap_err();
    assert!(matches!(err, EngineError::IterationLimit(1)));
}

#[tokio::test]
async fn single_node_workflow_executes_once() {
    let h = harness();
    let wf = WorkflowBuilder::new("single", "only", "only")
        .node(transform("only", json!({"ok": true})))
        .build()
        .unwrap();
    save(&h, &wf).await;

    let execution = h.engine.execute(&wf.id, ExecuteOptions::default()).await.unwrap();
    assert_eq!(execution.result, Some(json!({"ok": true})));
    assert_eq!(node_ids(&h, &execution.id).await, vec!["only"]);
}

#[tokio::test]
async fn failing_set_state_rule_fails_the_node() {
    use weir_core::ExecutionJournal;
    use weir_workflow::Execution;

    let h = harness();
    let wf = WorkflowBuilder::new("boom", "a", "a")
        .node(
            transform("a", json!({}))
                .with_set_state("fine", "1")
                .with_set_state("broken", "1 / 0"),
        )
        .build()
        .unwrap();
    save(&h, &wf).await;

    let mut execution = Execution::new(&wf.id, json!({}), serde_json::Map::new(), None);
    h.journal.create_execution(&execution).await.unwrap();

    let err = h
        .engine
        .run(&wf, &mut execution, None, &RunContext::new())
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(
        message.starts_with("Failed to execute setState for key 'broken':"),
        "unexpected message: {message}"
    );
    assert_eq!(execution.status, ExecutionStatus::Failed);

    // The node-execution row carries the same failure.
    let records = h.journal.list_node_executions(&execution.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ExecutionStatus::Failed);
    assert!(records[0].error.as_deref().unwrap_or_default().contains("broken"));
}

#[tokio::test]
async fn dynamic_edge_rejects_non_string_result() {
    let h = harness();
    let wf = WorkflowBuilder::new("non-string", "a", "b")
        .node(Node::new("a", "passthrough"))
        .node(Node::new("b", "passthrough"))
        .dynamic_edge("a", "42")
        .build()
        .unwrap();
    save(&h, &wf).await;

    let err = h.engine.execute(&wf.id, ExecuteOptions::default()).await.unwrap_err();
    match err {
        EngineError::DynamicEdge { message, .. } => {
            assert!(message.contains("non-string"), "got: {message}")
        }
        other => panic!("expected DynamicEdge error, got {other}"),
    }
}

#[tokio::test]
async fn no_outgoing_edge_from_interior_node_fails() {
    let h = harness();
    let wf = WorkflowBuilder::new("dead-end", "a", "b")
        .node(Node::new("a", "passthrough"))
        .node(Node::new("b", "passthrough"))
        .build()
        .unwrap();
    save(&h, &wf).await;

    let err = h.engine.execute(&wf.id, ExecuteOptions::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "No outgoing edge found from 'a'");
}

#[tokio::test]
async fn validation_failure_marks_execution_failed() {
    use weir_core::{ExecutionJournal, WorkflowStore};

    let h = harness();
    // Bypass the builder's validation to store a structurally broken graph.
    let mut wf = WorkflowBuilder::new("broken", "a", "a")
        .node(Node::new("a", "passthrough"))
        .build()
        .unwrap();
    wf.start_node = "ghost".to_string();
    h.workflows.save_workflow(&wf).await.unwrap();

    let err = h.engine.execute(&wf.id, ExecuteOptions::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "Start node 'ghost' does not exist in workflow");
}

// ============================================================================
// Config resolution
// ============================================================================

#[tokio::test]
async fn config_variables_are_snapshotted_and_visible() {
    use weir_core::{ConfigSet, ConfigStore};

    let h = harness();
    let mut variables = serde_json::Map::new();
    variables.insert("greeting".to_string(), json!("hello"));
    h.configs
        .save_config(&ConfigSet::new("cfg-1", "default", variables))
        .await
        .unwrap();

    let wf = WorkflowBuilder::new("uses-config", "a", "a")
        .node(transform("a", json!({"msg": "{{config.greeting}} world"})))
        .build()
        .unwrap();
    save(&h, &wf).await;

    let execution = h
        .engine
        .execute(
            &wf.id,
            ExecuteOptions {
                config_id: Some("cfg-1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(execution.config_id.as_deref(), Some("cfg-1"));
    assert_eq!(execution.config.get("greeting"), Some(&json!("hello")));
    assert_eq!(execution.result, Some(json!({"msg": "hello world"})));
}

#[tokio::test]
async fn parameters_flow_into_templates() {
    let h = harness();
    let wf = WorkflowBuilder::new("params", "a", "a")
        .node(transform("a", json!({"doubled": "{{parameters.n * 2}}"})))
        .build()
        .unwrap();
    save(&h, &wf).await;

    let execution = h
        .engine
        .execute(&wf.id, ExecuteOptions::with_parameters(json!({"n": 21})))
        .await
        .unwrap();
    assert_eq!(execution.result, Some(json!({"doubled": 42})));
}

// ============================================================================
// Sub-workflows and custom executors
// ============================================================================

#[tokio::test]
async fn sub_workflow_output_becomes_node_output() {
    let h = harness();

    let child = WorkflowBuilder::new("child", "double", "double")
        .node(transform("double", json!({"doubled": "{{parameters.n * 2}}"})))
        .build()
        .unwrap();
    save(&h, &child).await;

    let parent = WorkflowBuilder::new("parent", "invoke", "invoke")
        .node(Node::new("invoke", "workflow_executor").with_config(json!({
            "workflow_id": child.id,
            "parameters": {"n": "{{parameters.n}}"}
        })))
        .build()
        .unwrap();
    save(&h, &parent).await;

    let execution = h
        .engine
        .execute(&parent.id, ExecuteOptions::with_parameters(json!({"n": 4})))
        .await
        .unwrap();
    assert_eq!(execution.result, Some(json!({"doubled": 8})));
}

#[tokio::test]
async fn sub_workflow_failure_fails_both_executions() {
    use weir_core::ExecutionJournal;
    use weir_workflow::Execution;

    let h = harness();

    let child = WorkflowBuilder::new("child", "explode", "explode")
        .node(Node::new("explode", "no_such_type"))
        .build()
        .unwrap();
    save(&h, &child).await;

    let parent = WorkflowBuilder::new("parent", "invoke", "invoke")
        .node(Node::new("invoke", "workflow_executor").with_config(json!({
            "workflow_id": child.id,
            "parameters": {}
        })))
        .build()
        .unwrap();
    save(&h, &parent).await;

    let mut execution = Execution::new(&parent.id, json!({}), serde_json::Map::new(), None);
    h.journal.create_execution(&execution).await.unwrap();

    let err = h
        .engine
        .run(&parent, &mut execution, None, &RunContext::new())
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(
        message.starts_with(&format!(
            "Workflow execution failed for workflow_id '{}':",
            child.id
        )),
        "unexpected message: {message}"
    );
    assert!(message.contains("executor not found for node type: no_such_type"));

    // Parent execution and its invoking node both failed.
    assert_eq!(execution.status, ExecutionStatus::Failed);
    let records = h.journal.list_node_executions(&execution.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn workflow_executor_requires_workflow_id_and_parameters() {
    let h = harness();
    let parent = WorkflowBuilder::new("parent", "invoke", "invoke")
        .node(Node::new("invoke", "workflow_executor").with_config(json!({
            "parameters": {}
        })))
        .build()
        .unwrap();
    save(&h, &parent).await;

    let err = h.engine.execute(&parent.id, ExecuteOptions::default()).await.unwrap_err();
    assert!(err.to_string().contains("requires 'workflow_id'"));
}

#[tokio::test]
async fn custom_executor_runs_its_source_workflow() {
    let h = harness();

    let source = WorkflowBuilder::new("shout", "upper", "upper")
        .node(transform("upper", json!({"text": "{{parameters.text}}!"})))
        .build()
        .unwrap();
    save(&h, &source).await;

    h.engine.registry().register_custom(CustomExecutorDef {
        kind: "shouter".to_string(),
        source_workflow_id: source.id.clone(),
        config_schema: None,
    });

    let wf = WorkflowBuilder::new("uses-custom", "a", "a")
        .node(Node::new("a", "shouter").with_config(json!({"text": "{{parameters.text}}"})))
        .build()
        .unwrap();
    save(&h, &wf).await;

    let execution = h
        .engine
        .execute(&wf.id, ExecuteOptions::with_parameters(json!({"text": "hey"})))
        .await
        .unwrap();
    assert_eq!(execution.result, Some(json!({"text": "hey!"})));
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn stream_events_arrive_in_order() {
    let h = harness();
    let wf = WorkflowBuilder::new("streamy", "A", "B")
        .node(transform("A", json!({"v": 1})))
        .node(transform("B", json!({"v": 2})))
        .edge("A", "B")
        .build()
        .unwrap();
    save(&h, &wf).await;

    let (sink, rx) = EventSink::channel(100);
    h.engine
        .execute(
            &wf.id,
            ExecuteOptions {
                sink: Some(sink),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let kinds: Vec<EventKind> = drain(rx).iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::WorkflowStart,
            EventKind::NodeStart,
            EventKind::NodeComplete,
            EventKind::NodeStart,
            EventKind::NodeComplete,
            EventKind::WorkflowComplete,
        ]
    );
}

#[tokio::test]
async fn nested_execution_events_carry_depth_and_path() {
    let h = harness();

    let child = WorkflowBuilder::new("child", "inner", "inner")
        .node(transform("inner", json!({"ok": true})))
        .build()
        .unwrap();
    save(&h, &child).await;

    let parent = WorkflowBuilder::new("parent", "invoke", "invoke")
        .node(Node::new("invoke", "workflow_executor").with_config(json!({
            "workflow_id": child.id,
            "parameters": {}
        })))
        .build()
        .unwrap();
    save(&h, &parent).await;

    let (sink, rx) = EventSink::channel(100);
    h.engine
        .execute(
            &parent.id,
            ExecuteOptions {
                sink: Some(sink),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let events = drain(rx);
    let child_start = events
        .iter()
        .find(|e| e.kind == EventKind::WorkflowStart && e.depth == 1)
        .expect("nested workflow_start");
    assert_eq!(child_start.path, vec!["invoke".to_string()]);
    assert!(child_start.parent_execution_id.is_some());

    // The nested workflow_complete precedes the parent's node_complete.
    let nested_complete = events
        .iter()
        .position(|e| e.kind == EventKind::WorkflowComplete && e.depth == 1)
        .unwrap();
    let parent_node_complete = events
        .iter()
        .position(|e| e.kind == EventKind::NodeComplete && e.depth == 0)
        .unwrap();
    assert!(nested_complete < parent_node_complete);
}

struct ChunkyExecutor;

#[async_trait]
impl NodeExecutor for ChunkyExecutor {
    fn kind(&self) -> &str {
        "chunky"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        _config: &Value,
        _input: &ExecutorInput,
        _ctx: &RunContext,
        chunks: Option<ChunkSink>,
    ) -> Result<Value, EngineError> {
        if let Some(chunks) = chunks {
            for i in 0..3 {
                chunks.send(json!({"i": i})).await;
            }
        }
        Ok(json!({"chunks": 3}))
    }
}

#[tokio::test]
async fn chunk_events_flow_between_start_and_complete() {
    let mut registry = ExecutorRegistry::new();
    registry.register(Arc::new(ChunkyExecutor));
    let h = harness_with_registry(registry);

    let wf = WorkflowBuilder::new("chunked", "a", "a")
        .node(Node::new("a", "chunky").with_streaming(None))
        .build()
        .unwrap();
    save(&h, &wf).await;

    let (sink, rx) = EventSink::channel(100);
    h.engine
        .execute(
            &wf.id,
            ExecuteOptions {
                sink: Some(sink),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let kinds: Vec<EventKind> = drain(rx).iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::WorkflowStart,
            EventKind::NodeStart,
            EventKind::NodeChunk,
            EventKind::NodeChunk,
            EventKind::NodeChunk,
            EventKind::NodeComplete,
            EventKind::WorkflowComplete,
        ]
    );
}

#[tokio::test]
async fn send_on_complete_false_suppresses_node_complete() {
    let mut registry = ExecutorRegistry::new();
    registry.register(Arc::new(ChunkyExecutor));
    let h = harness_with_registry(registry);

    let wf = WorkflowBuilder::new("quiet", "a", "a")
        .node(Node::new("a", "chunky").with_streaming(Some(false)))
        .build()
        .unwrap();
    save(&h, &wf).await;

    let (sink, rx) = EventSink::channel(100);
    h.engine
        .execute(
            &wf.id,
            ExecuteOptions {
                sink: Some(sink),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let kinds: Vec<EventKind> = drain(rx).iter().map(|e| e.kind).collect();
    assert!(!kinds.contains(&EventKind::NodeComplete));
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::NodeChunk).count(), 3);
}

#[tokio::test]
async fn failures_emit_an_error_event() {
    let h = harness();
    let wf = WorkflowBuilder::new("fails", "a", "a")
        .node(Node::new("a", "no_such_type"))
        .build()
        .unwrap();
    save(&h, &wf).await;

    let (sink, rx) = EventSink::channel(100);
    let result = h
        .engine
        .execute(
            &wf.id,
            ExecuteOptions {
                sink: Some(sink),
                ..Default::default()
            },
        )
        .await;
    assert!(result.is_err());

    let events = drain(rx);
    let last = events.last().unwrap();
    assert_eq!(last.kind, EventKind::Error);
    assert!(last.data["message"]
        .as_str()
        .unwrap()
        .contains("executor not found"));
}

// ============================================================================
// Cancellation and dry runs
// ============================================================================

#[tokio::test]
async fn canceled_context_fails_the_execution() {
    let h = harness();
    let wf = WorkflowBuilder::new("cancelable", "a", "a")
        .node(Node::new("a", "passthrough"))
        .build()
        .unwrap();
    save(&h, &wf).await;

    let ctx = RunContext::new();
    ctx.cancel();

    let err = h
        .engine
        .execute(
            &wf.id,
            ExecuteOptions {
                cancel: Some(ctx),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_canceled());
}

#[tokio::test]
async fn dry_run_journal_is_isolated() {
    use weir_core::ExecutionJournal;

    let h = harness();
    let wf = WorkflowBuilder::new("dry", "a", "a")
        .node(transform("a", json!({"ok": true})))
        .build()
        .unwrap();
    save(&h, &wf).await;

    let scratch = Arc::new(MemoryJournal::new());
    let dry_engine = h.engine.with_journal(scratch.clone());
    let execution = dry_engine.execute(&wf.id, ExecuteOptions::default()).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    // The durable journal never saw the execution.
    assert!(h.journal.get_execution(&execution.id).await.unwrap().is_none());
    assert!(scratch.get_execution(&execution.id).await.unwrap().is_some());
}
