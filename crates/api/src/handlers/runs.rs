//! Run history and run requests.
//!
//! Each target kind answers with its own row shape, matching the real
//! service; the client unifies them.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use backend::models::{
    LogQuery, Page, ProcessLogRow, RunLogEntry, RunTarget, SyncLogRow, TaskId, WorkflowLogRow,
};
use backend::{RunHistory, RunLauncher};
use uuid::Uuid;

use crate::{ApiError, AppState};

async fn logs<R>(state: &AppState, target: RunTarget, query: &LogQuery) -> Result<Json<Page<R>>, ApiError>
where
    R: for<'a> From<&'a RunLogEntry>,
{
    let page = state.store.run_logs(target, query).await?;
    Ok(Json(Page {
        items: page.items.iter().map(|e| R::from(e)).collect(),
        total: page.total,
    }))
}

async fn run(state: &AppState, target: RunTarget) -> Result<StatusCode, ApiError> {
    state.store.launch(target).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn sync_logs(
    Path(id): Path<TaskId>,
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Page<SyncLogRow>>, ApiError> {
    logs(&state, RunTarget::SyncTask(id), &query).await
}

pub async fn process_logs(
    Path(id): Path<TaskId>,
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Page<ProcessLogRow>>, ApiError> {
    logs(&state, RunTarget::ProcessTask(id), &query).await
}

pub async fn workflow_logs(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Page<WorkflowLogRow>>, ApiError> {
    logs(&state, RunTarget::Workflow(id), &query).await
}

pub async fn run_sync(Path(id): Path<TaskId>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    run(&state, RunTarget::SyncTask(id)).await
}

pub async fn run_process(Path(id): Path<TaskId>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    run(&state, RunTarget::ProcessTask(id)).await
}

pub async fn run_workflow(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    run(&state, RunTarget::Workflow(id)).await
}
