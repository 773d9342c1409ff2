use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use backend::models::TimePlan;
use backend::{BackendError, TimePlanStore};
use uuid::Uuid;

use crate::{ApiError, AppState};

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<TimePlan>, ApiError> {
    state
        .store
        .time_plan(id)
        .await?
        .map(Json)
        .ok_or_else(|| BackendError::not_found(format!("time plan of workflow {id}")).into())
}

pub async fn create(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(plan): Json<TimePlan>,
) -> Result<StatusCode, ApiError> {
    plan.check()?;
    state.store.create_time_plan(id, &plan).await?;
    Ok(StatusCode::CREATED)
}

pub async fn update(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(plan): Json<TimePlan>,
) -> Result<StatusCode, ApiError> {
    plan.check()?;
    state.store.update_time_plan(id, &plan).await?;
    Ok(StatusCode::NO_CONTENT)
}
