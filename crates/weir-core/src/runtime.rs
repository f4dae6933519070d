//! Engine configuration and per-run context.

use tokio_util::sync::CancellationToken;

/// Tunables for the execution engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Buffer size of the stream event channel.
    pub event_buffer: usize,
    /// Buffer size of a node's chunk channel while streaming.
    pub chunk_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_buffer: 100,
            chunk_buffer: 16,
        }
    }
}

/// Context threaded through one execution: carries the cooperative
/// cancellation signal. Cloning shares the same token.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token for executors that want to select on cancellation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
