//! Execution handlers: starting executions (with optional SSE streaming)
//! and reading execution and node-execution records.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use weir_core::{EventSink, ExecuteOptions, ExecutionJournal, MemoryJournal};
use weir_workflow::{Execution, NodeExecution};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecuteRequest {
    pub parameters: Value,
    pub config_id: Option<String>,
    pub stream: bool,
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct ExecuteQuery {
    pub stream: Option<bool>,
}

/// POST /api/v1/workflows/:id/execute
///
/// With `stream` (body field or query parameter) the response becomes a
/// server-sent event stream of engine events; otherwise it is the final
/// execution record. `dryRun` swaps in a request-scoped journal, so
/// nothing is persisted.
pub async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ExecuteQuery>,
    Json(request): Json<ExecuteRequest>,
) -> ApiResult<Response> {
    let engine = if request.dry_run {
        state.engine.with_journal(Arc::new(MemoryJournal::new()))
    } else {
        state.engine.clone()
    };

    let parameters = match request.parameters {
        Value::Null => json!({}),
        other => other,
    };

    let streaming = request.stream || query.stream.unwrap_or(false);
    if !streaming {
        let execution = engine
            .execute(
                &id,
                ExecuteOptions {
                    parameters,
                    config_id: request.config_id,
                    ..Default::default()
                },
            )
            .await?;
        return Ok(Json(execution).into_response());
    }

    let (sink, rx) = EventSink::channel(engine.event_buffer());
    let opts = ExecuteOptions {
        parameters,
        config_id: request.config_id,
        sink: Some(sink),
        ..Default::default()
    };

    // The stream closes when the execution drops its sink; failures are
    // already on the stream as `error` events.
    tokio::spawn(async move {
        if let Err(e) = engine.execute(&id, opts).await {
            tracing::warn!(workflow_id = %id, error = %e, "Streaming execution failed");
        }
    });

    let events = ReceiverStream::new(rx).map(|event| {
        Ok::<_, Infallible>(
            Event::default().data(serde_json::to_string(&event).unwrap_or_default()),
        )
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response())
}

/// GET /api/v1/executions/:id
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Execution>> {
    let execution = state
        .engine
        .journal()
        .get_execution(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Execution not found: {id}")))?;
    Ok(Json(execution))
}

/// GET /api/v1/workflows/:id/executions
pub async fn list_executions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Execution>>> {
    Ok(Json(
        state
            .engine
            .journal()
            .list_executions_for_workflow(&id)
            .await?,
    ))
}

/// GET /api/v1/executions/:id/nodes
pub async fn list_node_executions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<NodeExecution>>> {
    Ok(Json(
        state.engine.journal().list_node_executions(&id).await?,
    ))
}
