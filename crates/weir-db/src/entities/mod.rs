//! Database entities.
//!
//! Structs mapping directly to the PostgreSQL tables created by the
//! migrations in `migrations/`. Conversions to and from the model types in
//! `weir-workflow` live alongside each entity.

pub mod config;
pub mod execution;
pub mod workflow;

pub use config::*;
pub use execution::*;
pub use workflow::*;

/// Generate a 21-character nano ID for persisted entities.
pub fn generate_nano_id() -> String {
    nanoid::nanoid!(21)
}
