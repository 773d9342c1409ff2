use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use backend::models::{GraphUpdate, StatusUpdate, WorkflowDocument, WorkflowDraft};
use backend::WorkflowStore;
use uuid::Uuid;
use validator::Validate;

use crate::{ApiError, AppState};

pub async fn create(
    State(state): State<AppState>,
    Json(draft): Json<WorkflowDraft>,
) -> Result<(StatusCode, Json<WorkflowDocument>), ApiError> {
    draft.validate()?;
    let doc = state.store.create_workflow(&draft).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowDocument>, ApiError> {
    Ok(Json(state.store.get_workflow(id).await?))
}

pub async fn update_graph(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(graph): Json<GraphUpdate>,
) -> Result<StatusCode, ApiError> {
    state.store.update_graph(id, &graph).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(update): Json<StatusUpdate>,
) -> Result<StatusCode, ApiError> {
    state.store.set_status(id, update.enabled).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_workflow(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
