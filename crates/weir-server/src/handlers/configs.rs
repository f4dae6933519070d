//! Config CRUD handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value};
use weir_core::{ConfigSet, ConfigStore};
use weir_db::generate_nano_id;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfigRequest {
    pub name: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

/// POST /api/v1/configs
pub async fn create_config(
    State(state): State<AppState>,
    Json(request): Json<ConfigRequest>,
) -> ApiResult<(StatusCode, Json<ConfigSet>)> {
    let config = ConfigSet::new(generate_nano_id(), request.name, request.variables);
    state.engine.configs().save_config(&config).await?;
    tracing::info!(config_id = %config.id, "Created config");
    Ok((StatusCode::CREATED, Json(config)))
}

/// GET /api/v1/configs
pub async fn list_configs(State(state): State<AppState>) -> ApiResult<Json<Vec<ConfigSet>>> {
    Ok(Json(state.engine.configs().list_configs().await?))
}

/// GET /api/v1/configs/:id
pub async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConfigSet>> {
    let config = state
        .engine
        .configs()
        .get_config(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Config not found: {id}")))?;
    Ok(Json(config))
}

/// DELETE /api/v1/configs/:id
pub async fn delete_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.engine.configs().delete_config(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Config not found: {id}")))
    }
}
