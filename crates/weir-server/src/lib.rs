//! # weir-server
//!
//! HTTP surface for weir: workflow, config, and execution CRUD plus the
//! execute endpoint with optional server-sent-event streaming.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
