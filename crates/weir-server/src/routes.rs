//! Route table.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/v1/workflows",
            post(handlers::workflows::create_workflow).get(handlers::workflows::list_workflows),
        )
        .route(
            "/api/v1/workflows/:id",
            get(handlers::workflows::get_workflow)
                .put(handlers::workflows::update_workflow)
                .delete(handlers::workflows::delete_workflow),
        )
        .route(
            "/api/v1/workflows/:id/execute",
            post(handlers::executions::execute_workflow),
        )
        .route(
            "/api/v1/workflows/:id/executions",
            get(handlers::executions::list_executions),
        )
        .route(
            "/api/v1/executions/:id",
            get(handlers::executions::get_execution),
        )
        .route(
            "/api/v1/executions/:id/nodes",
            get(handlers::executions::list_node_executions),
        )
        .route(
            "/api/v1/configs",
            post(handlers::configs::create_config).get(handlers::configs::list_configs),
        )
        .route(
            "/api/v1/configs/:id",
            get(handlers::configs::get_config).delete(handlers::configs::delete_config),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
