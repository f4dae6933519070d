//! Node executor trait and registry.
//!
//! A node's `type` resolves to either a built-in executor instance or a
//! custom executor: a stored workflow invoked as a sub-execution. The
//! reserved `workflow_executor` type never reaches the registry; the
//! orchestrator handles it directly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use weir_workflow::Workflow;

use crate::error::EngineError;
use crate::runtime::RunContext;
use crate::store::WorkflowStore;
use crate::stream::StreamingContext;

/// The context object handed to an executor: the execution's bindings plus,
/// when streaming, the envelope identifying this execution in the stream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorInput {
    pub parameters: Value,
    pub config: Value,
    pub state: Value,
    pub parent: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<StreamingContext>,
}

/// Sending half of a node's chunk channel. Executors that support
/// streaming push incremental chunks here; the engine turns each chunk
/// into a `node_chunk` event.
#[derive(Debug, Clone)]
pub struct ChunkSink {
    tx: mpsc::Sender<Value>,
}

impl ChunkSink {
    pub fn new(tx: mpsc::Sender<Value>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, chunk: Value) {
        let _ = self.tx.send(chunk).await;
    }
}

/// A runnable node executor. Instances are registered once and invoked
/// concurrently; implementations must not keep per-invocation state and
/// must treat the input (including `state`) as read-only.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// The node type this executor handles.
    fn kind(&self) -> &str;

    /// Optional structural schema for the node config.
    fn config_schema(&self) -> Option<Value> {
        None
    }

    /// Whether this executor can deliver incremental chunks.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Run against an already template-expanded config. `chunks` is present
    /// only when both the node's streaming policy and the executor support
    /// it; ownership transfers so dropping it closes the chunk stream.
    async fn execute(
        &self,
        config: &Value,
        input: &ExecutorInput,
        ctx: &RunContext,
        chunks: Option<ChunkSink>,
    ) -> Result<Value, EngineError>;
}

/// Transform node: returns its expanded config as the node output. The
/// workhorse for shaping data out of `parameters`, `state`, and `parent`.
pub struct TransformExecutor;

#[async_trait]
impl NodeExecutor for TransformExecutor {
    fn kind(&self) -> &str {
        "transform"
    }

    async fn execute(
        &self,
        config: &Value,
        _input: &ExecutorInput,
        _ctx: &RunContext,
        _chunks: Option<ChunkSink>,
    ) -> Result<Value, EngineError> {
        Ok(config.clone())
    }
}

/// Pass-through node: produces no output of its own. Useful as a routing
/// point in front of a dynamic edge.
pub struct PassthroughExecutor;

#[async_trait]
impl NodeExecutor for PassthroughExecutor {
    fn kind(&self) -> &str {
        "passthrough"
    }

    async fn execute(
        &self,
        config: &Value,
        _input: &ExecutorInput,
        _ctx: &RunContext,
        _chunks: Option<ChunkSink>,
    ) -> Result<Value, EngineError> {
        match config {
            Value::Object(map) if map.is_empty() => Ok(Value::Null),
            other => Ok(other.clone()),
        }
    }
}

/// A custom executor record: a stored workflow exposed under an executor
/// type. The node config (after template expansion) becomes the
/// sub-workflow's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomExecutorDef {
    #[serde(rename = "type")]
    pub kind: String,
    pub source_workflow_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<Value>,
}

/// Outcome of resolving a node type.
pub enum ResolvedExecutor {
    Builtin(Arc<dyn NodeExecutor>),
    /// A custom executor's source workflow, run by the orchestrator as a
    /// sub-execution.
    SubWorkflow(Arc<Workflow>),
}

impl std::fmt::Debug for ResolvedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedExecutor::Builtin(e) => {
                f.debug_tuple("Builtin").field(&e.kind()).finish()
            }
            ResolvedExecutor::SubWorkflow(w) => {
                f.debug_tuple("SubWorkflow").field(w).finish()
            }
        }
    }
}

/// Registry mapping node types to executors. Built-ins are searched first,
/// then custom executors; resolved custom workflows are cached by type.
pub struct ExecutorRegistry {
    builtins: HashMap<String, Arc<dyn NodeExecutor>>,
    custom: DashMap<String, CustomExecutorDef>,
    cache: DashMap<String, Arc<Workflow>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            builtins: HashMap::new(),
            custom: DashMap::new(),
            cache: DashMap::new(),
        };
        registry.register(Arc::new(TransformExecutor));
        registry.register(Arc::new(PassthroughExecutor));
        registry
    }

    /// Register a built-in executor.
    pub fn register(&mut self, executor: Arc<dyn NodeExecutor>) {
        self.builtins
            .insert(executor.kind().to_string(), executor);
    }

    /// Register (or replace) a custom executor definition. Any cached
    /// workflow for the same type is evicted.
    pub fn register_custom(&self, def: CustomExecutorDef) {
        self.cache.remove(&def.kind);
        self.custom.insert(def.kind.clone(), def);
    }

    /// Resolve a node type. Custom executors load their source workflow
    /// through `workflows` on first use and reuse the cached copy after.
    pub async fn resolve(
        &self,
        kind: &str,
        workflows: &dyn WorkflowStore,
    ) -> Result<ResolvedExecutor, EngineError> {
        if let Some(executor) = self.builtins.get(kind) {
            return Ok(ResolvedExecutor::Builtin(executor.clone()));
        }

        if let Some(cached) = self.cache.get(kind) {
            return Ok(ResolvedExecutor::SubWorkflow(cached.clone()));
        }

        let def = self.custom.get(kind).map(|entry| entry.value().clone());
        if let Some(def) = def {
            let workflow = workflows
                .get_workflow(&def.source_workflow_id)
                .await?
                .ok_or_else(|| EngineError::WorkflowNotFound(def.source_workflow_id.clone()))?;
            let workflow = Arc::new(workflow);
            self.cache.insert(kind.to_string(), workflow.clone());
            return Ok(ResolvedExecutor::SubWorkflow(workflow));
        }

        Err(EngineError::ExecutorNotFound(kind.to_string()))
    }

    /// Evict one cached custom workflow, or all of them.
    pub fn clear_cache(&self, kind: Option<&str>) {
        match kind {
            Some(kind) => {
                self.cache.remove(kind);
            }
            None => self.cache.clear(),
        }
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
