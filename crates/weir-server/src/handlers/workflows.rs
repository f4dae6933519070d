//! Workflow CRUD handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value};
use weir_core::WorkflowStore;
use weir_db::generate_nano_id;
use weir_workflow::{Edge, Node, Workflow, DEFAULT_MAX_ITERATIONS};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub parameters_schema: Value,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    pub start_node: String,
    pub end_node: String,
    #[serde(default)]
    pub state: Map<String, Value>,
    pub max_iterations: Option<u32>,
    pub default_config_id: Option<String>,
}

impl WorkflowRequest {
    fn into_workflow(self, id: String) -> Workflow {
        let now = chrono::Utc::now();
        Workflow {
            id,
            name: self.name,
            parameters_schema: self.parameters_schema,
            nodes: self.nodes,
            edges: self.edges,
            start_node: self.start_node,
            end_node: self.end_node,
            state: self.state,
            max_iterations: self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
            default_config_id: self.default_config_id,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// POST /api/v1/workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(request): Json<WorkflowRequest>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    let workflow = request.into_workflow(generate_nano_id());
    workflow
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state.engine.workflows().save_workflow(&workflow).await?;
    tracing::info!(workflow_id = %workflow.id, "Created workflow");
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// GET /api/v1/workflows
pub async fn list_workflows(State(state): State<AppState>) -> ApiResult<Json<Vec<Workflow>>> {
    Ok(Json(state.engine.workflows().list_workflows().await?))
}

/// GET /api/v1/workflows/:id
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    let workflow = state
        .engine
        .workflows()
        .get_workflow(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow not found: {id}")))?;
    Ok(Json(workflow))
}

/// PUT /api/v1/workflows/:id
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<WorkflowRequest>,
) -> ApiResult<Json<Workflow>> {
    let store = state.engine.workflows();
    let existing = store
        .get_workflow(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow not found: {id}")))?;

    let mut workflow = request.into_workflow(id);
    workflow.created_at = existing.created_at;
    workflow
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    store.save_workflow(&workflow).await?;
    tracing::info!(workflow_id = %workflow.id, "Updated workflow");
    Ok(Json(workflow))
}

/// DELETE /api/v1/workflows/:id
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.engine.workflows().delete_workflow(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Workflow not found: {id}")))
    }
}
