//! # weir-core
//!
//! The weir workflow execution engine: template/expression evaluation,
//! executor resolution, the execution journal contract, and the graph
//! traversal orchestrator.
//!
//! ## Architecture
//!
//! - [`expression`] expands `{{ expr }}` templates and runs rule programs
//!   against the execution context.
//! - [`executor`] resolves a node's type to a built-in executor or a
//!   custom (workflow-backed) executor.
//! - [`journal`] is the persistence contract for execution and
//!   node-execution records, with an in-memory backing for dry runs.
//! - [`engine`] walks the graph, threading `parameters`, `config`,
//!   `state`, and per-node outputs (`parent`) through every node, and
//!   optionally emits the [`stream`] event feed.

pub mod engine;
pub mod error;
pub mod executor;
pub mod expression;
pub mod journal;
pub mod runtime;
pub mod store;
pub mod stream;

pub use engine::{Engine, ExecuteOptions};
pub use error::EngineError;
pub use executor::{
    ChunkSink, CustomExecutorDef, ExecutorInput, ExecutorRegistry, NodeExecutor,
    PassthroughExecutor, ResolvedExecutor, TransformExecutor,
};
pub use expression::{resolve_template, run_rule, EvalScope, Evaluator, ExpressionError};
pub use journal::{ExecutionJournal, MemoryJournal};
pub use runtime::{EngineConfig, RunContext};
pub use store::{ConfigSet, ConfigStore, MemoryConfigStore, MemoryWorkflowStore, WorkflowStore};
pub use stream::{EventKind, EventSink, StreamEvent, StreamHandle, StreamingContext};
