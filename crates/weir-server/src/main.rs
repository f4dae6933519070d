//! weir HTTP server.
//!
//! Serves the workflow/config/execution API. With `DATABASE_URL` set the
//! state is PostgreSQL-backed (migrations run at startup); otherwise
//! everything lives in memory.

use std::net::SocketAddr;

use tracing::info;
use tracing_subscriber::EnvFilter;
use weir_server::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = match std::env::var("DATABASE_URL") {
        Ok(_) => {
            let state = AppState::postgres(weir_db::DbConfig::from_env()).await?;
            info!("Connected to PostgreSQL");
            state
        }
        Err(_) => {
            info!("DATABASE_URL not set, using in-memory stores");
            AppState::in_memory()
        }
    };

    let addr: SocketAddr = std::env::var("WEIR_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("weir-server listening on {addr}");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutting down");
}
