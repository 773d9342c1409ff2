//! `api` crate — in-memory development backend.
//!
//! Serves the workflow REST surface over a [`MemoryBackend`] so the editor
//! and CLI can run without the real service. All routes live under
//! `/api/v1`:
//!
//!   POST   /workflows
//!   GET    /workflows/:id
//!   DELETE /workflows/:id
//!   PUT    /workflows/:id/graph
//!   PUT    /workflows/:id/status
//!   GET    /workflows/:id/time-plan   (also POST, PUT)
//!   GET    /workflows/:id/logs
//!   POST   /workflows/:id/run
//!   GET    /sync-tasks                (also /process-tasks)
//!   GET    /sync-tasks/:id
//!   GET    /sync-tasks/:id/logs
//!   POST   /sync-tasks/:id/run
//!
//! Runs are recorded as RUNNING log entries; nothing is executed.

pub mod error;
pub mod handlers;
pub mod seed;

use axum::routing::{get, post, put};
use axum::Router;
use backend::MemoryBackend;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;
pub use seed::seed_demo;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: MemoryBackend,
}

pub fn router(store: MemoryBackend) -> Router {
    use handlers::{catalog, runs, time_plans, workflows};

    let api = Router::new()
        .route("/workflows", post(workflows::create))
        .route("/workflows/:id", get(workflows::get).delete(workflows::delete))
        .route("/workflows/:id/graph", put(workflows::update_graph))
        .route("/workflows/:id/status", put(workflows::set_status))
        .route(
            "/workflows/:id/time-plan",
            get(time_plans::get).post(time_plans::create).put(time_plans::update),
        )
        .route("/workflows/:id/logs", get(runs::workflow_logs))
        .route("/workflows/:id/run", post(runs::run_workflow))
        .route("/sync-tasks", get(catalog::list_sync))
        .route("/sync-tasks/:id", get(catalog::sync_detail))
        .route("/sync-tasks/:id/logs", get(runs::sync_logs))
        .route("/sync-tasks/:id/run", post(runs::run_sync))
        .route("/process-tasks", get(catalog::list_process))
        .route("/process-tasks/:id", get(catalog::process_detail))
        .route("/process-tasks/:id/logs", get(runs::process_logs))
        .route("/process-tasks/:id/run", post(runs::run_process))
        .with_state(AppState { store });

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the development backend on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, store: MemoryBackend) -> std::io::Result<()> {
    info!(addr = ?listener.local_addr()?, "development backend listening");
    axum::serve(listener, router(store)).await
}
