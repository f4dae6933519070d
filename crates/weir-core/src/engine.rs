//! Workflow execution engine.
//!
//! Drives one execution from the workflow's start node to its end node:
//! validates the graph, expands each node's config against the execution
//! context, dispatches executors, applies `setState` rules, resolves
//! static and dynamic edges, recurses into sub-workflows, and reconciles
//! the execution journal. Optionally emits a live event stream.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use weir_workflow::{Edge, Execution, Node, NodeExecution, Workflow};

use crate::error::EngineError;
use crate::executor::{ChunkSink, ExecutorInput, ExecutorRegistry, NodeExecutor, ResolvedExecutor};
use crate::expression::evaluator::is_truthy;
use crate::expression::{parse, resolve_template, run_rule, EvalScope, Evaluator};
use crate::journal::ExecutionJournal;
use crate::runtime::{EngineConfig, RunContext};
use crate::store::{ConfigStore, WorkflowStore};
use crate::stream::{EventKind, EventSink, StreamHandle};

/// Options for one execution request.
pub struct ExecuteOptions {
    /// Workflow input, exposed to templates as `parameters`.
    pub parameters: Value,
    /// Config to snapshot; falls back to the workflow's default config.
    pub config_id: Option<String>,
    /// Event sink for live streaming.
    pub sink: Option<EventSink>,
    /// Cancellation context; a fresh one is created when absent.
    pub cancel: Option<RunContext>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            parameters: Value::Object(Map::new()),
            config_id: None,
            sink: None,
            cancel: None,
        }
    }
}

impl ExecuteOptions {
    pub fn with_parameters(parameters: Value) -> Self {
        Self {
            parameters,
            ..Default::default()
        }
    }
}

/// The live context of one execution, owned exclusively by the engine.
/// All fields are JSON objects; templates and rules see them as
/// `parameters`, `config`, `state`, and `parent`.
struct ExecutionScope {
    parameters: Value,
    config: Value,
    state: Value,
    parent: Value,
}

impl ExecutionScope {
    fn new(parameters: Value, config: &Map<String, Value>, initial_state: &Map<String, Value>) -> Self {
        Self {
            parameters,
            config: Value::Object(config.clone()),
            // Shallow copy: state mutation stays local to this execution.
            state: Value::Object(initial_state.clone()),
            parent: Value::Object(Map::new()),
        }
    }

    fn eval_scope<'a>(&'a self, output: Option<&'a Value>) -> EvalScope<'a> {
        EvalScope {
            parameters: &self.parameters,
            config: &self.config,
            state: &self.state,
            parent: &self.parent,
            output,
            locals: None,
        }
    }

    fn set_state(&mut self, key: String, value: Value) {
        if let Value::Object(map) = &mut self.state {
            map.insert(key, value);
        }
    }

    /// Record a node output, overwriting any prior value on revisit.
    fn record_output(&mut self, node_id: &str, output: Value) {
        if let Value::Object(map) = &mut self.parent {
            map.insert(node_id.to_string(), output);
        }
    }

    fn output_of(&self, node_id: &str) -> Option<&Value> {
        self.parent.as_object().and_then(|map| map.get(node_id))
    }
}

/// Workflow execution engine.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<ExecutorRegistry>,
    workflows: Arc<dyn WorkflowStore>,
    configs: Arc<dyn ConfigStore>,
    journal: Arc<dyn ExecutionJournal>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        configs: Arc<dyn ConfigStore>,
        journal: Arc<dyn ExecutionJournal>,
    ) -> Self {
        Self {
            registry: Arc::new(ExecutorRegistry::new()),
            workflows,
            configs,
            journal,
            config: EngineConfig::default(),
        }
    }

    /// Replace the executor registry.
    pub fn with_registry(mut self, registry: ExecutorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Same engine against a different journal. Used for dry-run requests,
    /// which swap in a request-scoped in-memory journal.
    pub fn with_journal(&self, journal: Arc<dyn ExecutionJournal>) -> Self {
        Self {
            registry: self.registry.clone(),
            workflows: self.workflows.clone(),
            configs: self.configs.clone(),
            journal,
            config: self.config.clone(),
        }
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    pub fn journal(&self) -> Arc<dyn ExecutionJournal> {
        self.journal.clone()
    }

    pub fn workflows(&self) -> Arc<dyn WorkflowStore> {
        self.workflows.clone()
    }

    pub fn configs(&self) -> Arc<dyn ConfigStore> {
        self.configs.clone()
    }

    pub fn event_buffer(&self) -> usize {
        self.config.event_buffer
    }

    /// Execute a stored workflow: resolve it, snapshot the config
    /// variables, create a pending execution record, and run.
    ///
    /// On success the returned execution is `completed` with its result;
    /// failures are recorded on the journal and propagated as errors.
    pub async fn execute(
        &self,
        workflow_id: &str,
        opts: ExecuteOptions,
    ) -> Result<Execution, EngineError> {
        let workflow = self
            .workflows
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;

        let config_id = opts.config_id.or_else(|| workflow.default_config_id.clone());
        let config_vars = match &config_id {
            Some(id) => {
                self.configs
                    .get_config(id)
                    .await?
                    .ok_or_else(|| EngineError::ConfigNotFound(id.clone()))?
                    .variables
            }
            None => Map::new(),
        };

        let mut execution = Execution::new(&workflow.id, opts.parameters, config_vars, config_id);
        self.journal.create_execution(&execution).await?;

        let ctx = opts.cancel.unwrap_or_default();
        let stream = opts
            .sink
            .map(|sink| StreamHandle::root(sink, &workflow.id, &execution.id));

        self.run(&workflow, &mut execution, stream, &ctx).await?;
        Ok(execution)
    }

    /// Run a workflow against an existing (pending) execution record.
    ///
    /// This is the recursion point for sub-workflows, so it returns a boxed
    /// future. Terminal status, result, and error are written to both the
    /// record and the journal before returning.
    pub fn run<'a>(
        &'a self,
        workflow: &'a Workflow,
        execution: &'a mut Execution,
        stream: Option<StreamHandle>,
        ctx: &'a RunContext,
    ) -> BoxFuture<'a, Result<Value, EngineError>> {
        Box::pin(async move {
            match self.traverse(workflow, execution, &stream, ctx).await {
                Ok(result) => {
                    execution.complete(result.clone());
                    self.journal
                        .complete_execution(&execution.id, &result)
                        .await?;
                    info!(workflow_id = %workflow.id, execution_id = %execution.id, "Workflow execution completed");
                    if let Some(stream) = &stream {
                        stream
                            .emit(EventKind::WorkflowComplete, json!({ "result": result }), None)
                            .await;
                    }
                    Ok(result)
                }
                Err(err) => {
                    let message = err.to_string();
                    execution.fail(&message);
                    error!(workflow_id = %workflow.id, execution_id = %execution.id, error = %message, "Workflow execution failed");
                    if let Err(journal_err) =
                        self.journal.fail_execution(&execution.id, &message).await
                    {
                        warn!(execution_id = %execution.id, error = %journal_err, "Failed to journal execution failure");
                    }
                    if let Some(stream) = &stream {
                        stream
                            .emit(EventKind::Error, json!({ "message": message }), None)
                            .await;
                    }
                    Err(err)
                }
            }
        })
    }

    /// Walk the graph from start to end. The end node executes inside the
    /// loop exactly once; the loop exits right after it completes.
    async fn traverse(
        &self,
        workflow: &Workflow,
        execution: &mut Execution,
        stream: &Option<StreamHandle>,
        ctx: &RunContext,
    ) -> Result<Value, EngineError> {
        workflow.validate()?;

        let node_index = workflow.node_index();
        let edge_index = workflow.edge_index();

        let mut scope = ExecutionScope::new(
            execution.parameters.clone(),
            &execution.config,
            &workflow.state,
        );

        execution.start();
        self.journal.mark_execution_running(&execution.id).await?;
        if let Some(stream) = stream {
            stream
                .emit(
                    EventKind::WorkflowStart,
                    json!({ "workflowId": workflow.id, "name": workflow.name }),
                    None,
                )
                .await;
        }

        let mut current = workflow.start_node.clone();
        let mut iterations: u32 = 0;

        loop {
            if ctx.is_canceled() {
                return Err(EngineError::Canceled);
            }
            if iterations >= workflow.max_iterations {
                return Err(EngineError::IterationLimit(workflow.max_iterations));
            }
            iterations += 1;

            let node = *node_index
                .get(current.as_str())
                .ok_or_else(|| EngineError::NodeNotFound(current.clone()))?;

            debug!(execution_id = %execution.id, node_id = %node.id, iterations, "Executing node");

            let record = NodeExecution::new(&execution.id, &node.id);
            let record_id = record.id.clone();
            self.journal.create_node_execution(&record).await?;
            if let Some(stream) = stream {
                stream
                    .emit(
                        EventKind::NodeStart,
                        json!({ "nodeId": node.id, "nodeType": node.kind }),
                        None,
                    )
                    .await;
            }

            let started = std::time::Instant::now();
            match self
                .run_node(node, &mut scope, execution, stream, ctx)
                .await
            {
                Ok(output) => {
                    self.journal
                        .complete_node_execution(&record_id, &output)
                        .await?;
                    scope.record_output(&node.id, output.clone());

                    let send_on_complete = node
                        .streaming
                        .map(|s| s.send_on_complete.unwrap_or(true))
                        .unwrap_or(true);
                    if send_on_complete {
                        if let Some(stream) = stream {
                            stream
                                .emit(
                                    EventKind::NodeComplete,
                                    output,
                                    Some(json!({
                                        "nodeId": node.id,
                                        "nodeType": node.kind,
                                        "duration": started.elapsed().as_millis() as u64,
                                    })),
                                )
                                .await;
                        }
                    }
                }
                Err(err) => {
                    if let Err(journal_err) = self
                        .journal
                        .fail_node_execution(&record_id, &err.to_string())
                        .await
                    {
                        warn!(node_id = %node.id, error = %journal_err, "Failed to journal node failure");
                    }
                    return Err(err);
                }
            }

            if current == workflow.end_node {
                break;
            }

            let edge = edge_index
                .get(current.as_str())
                .copied()
                .ok_or_else(|| EngineError::NoOutgoingEdge(current.clone()))?;
            current = self.next_node(edge, &scope, &node_index)?;
        }

        Ok(scope
            .output_of(&workflow.end_node)
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Execute one node: expand its config, dispatch the executor (or
    /// recurse for sub-workflows), then apply `setState` rules atomically.
    async fn run_node(
        &self,
        node: &Node,
        scope: &mut ExecutionScope,
        execution: &Execution,
        stream: &Option<StreamHandle>,
        ctx: &RunContext,
    ) -> Result<Value, EngineError> {
        let parsed = resolve_template(&node.config, &scope.eval_scope(None)).map_err(|e| {
            EngineError::Template {
                node: node.id.clone(),
                message: e.to_string(),
            }
        })?;

        let output = if node.is_sub_workflow() {
            self.dispatch_sub_workflow(node, &parsed, execution, stream, ctx)
                .await?
        } else {
            match self
                .registry
                .resolve(&node.kind, self.workflows.as_ref())
                .await?
            {
                ResolvedExecutor::Builtin(executor) => {
                    self.dispatch_builtin(node, executor, &parsed, scope, stream, ctx)
                        .await?
                }
                ResolvedExecutor::SubWorkflow(sub) => {
                    // Custom executor: its expanded config is the
                    // sub-workflow's input.
                    self.invoke_sub_workflow(&sub, node, parsed, execution, stream, ctx)
                        .await
                        .map_err(|e| wrap_sub_workflow_error(&sub.id, e))?
                }
            }
        };

        if !node.set_state.is_empty() {
            // All rules evaluate before any assignment lands, so a failing
            // rule leaves the state of this visit untouched.
            let mut updates = Vec::with_capacity(node.set_state.len());
            for entry in &node.set_state {
                let value = run_rule(&entry.rule, &scope.eval_scope(Some(&output)))
                    .map_err(|e| EngineError::StateUpdate {
                        key: entry.key.clone(),
                        message: e.to_string(),
                    })?
                    .unwrap_or(Value::Null);
                updates.push((entry.key.clone(), value));
            }
            for (key, value) in updates {
                scope.set_state(key, value);
            }
            if let Some(stream) = stream {
                stream
                    .emit(
                        EventKind::StateUpdated,
                        scope.state.clone(),
                        Some(json!({ "nodeId": node.id })),
                    )
                    .await;
            }
        }

        Ok(output)
    }

    async fn dispatch_builtin(
        &self,
        node: &Node,
        executor: Arc<dyn NodeExecutor>,
        parsed: &Value,
        scope: &ExecutionScope,
        stream: &Option<StreamHandle>,
        ctx: &RunContext,
    ) -> Result<Value, EngineError> {
        let input = ExecutorInput {
            parameters: scope.parameters.clone(),
            config: scope.config.clone(),
            state: scope.state.clone(),
            parent: scope.parent.clone(),
            context: stream.as_ref().map(|s| s.context().clone()),
        };

        let chunks_enabled = node.streaming.map(|s| s.enabled).unwrap_or(false)
            && executor.supports_streaming();

        let result = match (chunks_enabled, stream) {
            (true, Some(stream)) => {
                let (tx, mut rx) = mpsc::channel(self.config.chunk_buffer);
                let chunks = ChunkSink::new(tx);
                let drain = async {
                    while let Some(chunk) = rx.recv().await {
                        stream
                            .emit(
                                EventKind::NodeChunk,
                                chunk,
                                Some(json!({ "nodeId": node.id, "nodeType": node.kind })),
                            )
                            .await;
                    }
                };
                // The executor owns its sink; dropping it ends the drain.
                let (result, ()) =
                    tokio::join!(executor.execute(parsed, &input, ctx, Some(chunks)), drain);
                result
            }
            _ => executor.execute(parsed, &input, ctx, None).await,
        };

        result.map_err(|e| match e {
            canceled @ EngineError::Canceled => canceled,
            other => EngineError::Executor {
                node: node.id.clone(),
                message: other.to_string(),
            },
        })
    }

    /// Dispatch the reserved `workflow_executor` type: read `workflow_id`
    /// and `parameters` from the expanded config and recurse.
    async fn dispatch_sub_workflow(
        &self,
        node: &Node,
        parsed: &Value,
        execution: &Execution,
        stream: &Option<StreamHandle>,
        ctx: &RunContext,
    ) -> Result<Value, EngineError> {
        let workflow_id = parsed
            .get("workflow_id")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::InvalidNodeConfig {
                node: node.id.clone(),
                message: "workflow_executor requires 'workflow_id' in config".to_string(),
            })?
            .to_string();
        let parameters =
            parsed
                .get("parameters")
                .cloned()
                .ok_or_else(|| EngineError::InvalidNodeConfig {
                    node: node.id.clone(),
                    message: "workflow_executor requires 'parameters' in config".to_string(),
                })?;

        let sub = self
            .workflows
            .get_workflow(&workflow_id)
            .await?
            .ok_or_else(|| EngineError::SubWorkflow {
                workflow_id: workflow_id.clone(),
                message: format!("Workflow not found: {workflow_id}"),
            })?;

        self.invoke_sub_workflow(&sub, node, parameters, execution, stream, ctx)
            .await
            .map_err(|e| wrap_sub_workflow_error(&workflow_id, e))
    }

    /// Run a nested execution. It inherits the caller's config snapshot
    /// and, when streaming, a child envelope (depth + 1, extended path).
    async fn invoke_sub_workflow(
        &self,
        sub: &Workflow,
        node: &Node,
        parameters: Value,
        execution: &Execution,
        stream: &Option<StreamHandle>,
        ctx: &RunContext,
    ) -> Result<Value, EngineError> {
        let mut sub_execution = Execution::new(
            &sub.id,
            parameters,
            execution.config.clone(),
            execution.config_id.clone(),
        );
        self.journal.create_execution(&sub_execution).await?;

        let sub_stream = stream
            .as_ref()
            .map(|s| s.child(&node.id, &sub.id, &sub_execution.id));

        self.run(sub, &mut sub_execution, sub_stream, ctx).await
    }

    /// Resolve the next node id from an outgoing edge.
    fn next_node(
        &self,
        edge: &Edge,
        scope: &ExecutionScope,
        node_index: &HashMap<&str, &Node>,
    ) -> Result<String, EngineError> {
        let dynamic = match edge {
            Edge::Static(e) => return Ok(e.to.clone()),
            Edge::Dynamic(e) => e,
        };

        let result = if let Some(rule) = &dynamic.rule {
            run_rule(rule, &scope.eval_scope(None)).map_err(|e| EngineError::DynamicEdge {
                edge: dynamic.id.clone(),
                message: e.to_string(),
            })?
        } else if let Some(conditions) = &dynamic.conditions {
            let evaluator = Evaluator::new();
            let mut selected = None;
            for entry in conditions {
                let expr = parse(&entry.condition).map_err(|e| EngineError::DynamicEdge {
                    edge: dynamic.id.clone(),
                    message: e.to_string(),
                })?;
                let value = evaluator
                    .evaluate(&expr, &scope.eval_scope(None))
                    .map_err(|e| EngineError::DynamicEdge {
                        edge: dynamic.id.clone(),
                        message: e.to_string(),
                    })?;
                if value.as_ref().map(is_truthy).unwrap_or(false) {
                    selected = Some(Value::String(entry.node.clone()));
                    break;
                }
            }
            Some(selected.ok_or_else(|| EngineError::DynamicEdge {
                edge: dynamic.id.clone(),
                message: "No condition matched".to_string(),
            })?)
        } else {
            return Err(EngineError::DynamicEdge {
                edge: dynamic.id.clone(),
                message: "edge has neither a rule nor conditions".to_string(),
            });
        };

        let target = match result {
            Some(Value::String(target)) => target,
            other => {
                return Err(EngineError::DynamicEdge {
                    edge: dynamic.id.clone(),
                    message: format!(
                        "rule produced a non-string result: {}",
                        other
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "undefined".to_string())
                    ),
                })
            }
        };

        if !node_index.contains_key(target.as_str()) {
            return Err(EngineError::InvalidDynamicTarget {
                edge: dynamic.id.clone(),
                target,
            });
        }
        Ok(target)
    }
}

fn wrap_sub_workflow_error(workflow_id: &str, err: EngineError) -> EngineError {
    match err {
        canceled @ EngineError::Canceled => canceled,
        other => EngineError::SubWorkflow {
            workflow_id: workflow_id.to_string(),
            message: other.to_string(),
        },
    }
}
