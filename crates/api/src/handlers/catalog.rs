use axum::extract::{Path, Query, State};
use axum::Json;
use backend::models::{CatalogEntry, CatalogQuery, ModelType, Page, TaskDetail, TaskId};
use backend::TaskCatalog;

use crate::{ApiError, AppState};

async fn list(state: AppState, kind: ModelType, query: CatalogQuery) -> Result<Json<Page<CatalogEntry>>, ApiError> {
    Ok(Json(state.store.list_tasks(kind, &query).await?))
}

async fn detail(state: AppState, kind: ModelType, id: TaskId) -> Result<Json<TaskDetail>, ApiError> {
    Ok(Json(state.store.task_detail(kind, id).await?))
}

pub async fn list_sync(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Page<CatalogEntry>>, ApiError> {
    list(state, ModelType::Sync, query).await
}

pub async fn list_process(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Page<CatalogEntry>>, ApiError> {
    list(state, ModelType::Process, query).await
}

pub async fn sync_detail(
    Path(id): Path<TaskId>,
    State(state): State<AppState>,
) -> Result<Json<TaskDetail>, ApiError> {
    detail(state, ModelType::Sync, id).await
}

pub async fn process_detail(
    Path(id): Path<TaskId>,
    State(state): State<AppState>,
) -> Result<Json<TaskDetail>, ApiError> {
    detail(state, ModelType::Process, id).await
}
