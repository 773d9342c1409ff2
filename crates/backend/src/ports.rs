//! Capability traits — one per backend concern.
//!
//! Callers depend on the narrowest trait they need, so the poller can be
//! handed a [`RunHistory`] without gaining access to workflow storage.

use async_trait::async_trait;

use crate::models::{
    CatalogEntry, CatalogQuery, GraphUpdate, LogQuery, ModelType, Page, RunLogEntry, RunTarget,
    TaskDetail, TaskId, TimePlan, WorkflowDocument, WorkflowDraft, WorkflowId,
};
use crate::BackendError;

/// Persisted workflow records.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// `POST /workflows` — returns the stored record with its new id.
    async fn create_workflow(&self, draft: &WorkflowDraft) -> Result<WorkflowDocument, BackendError>;

    /// `PUT /workflows/{id}/graph`
    async fn update_graph(&self, id: WorkflowId, graph: &GraphUpdate) -> Result<(), BackendError>;

    /// `GET /workflows/{id}`
    async fn get_workflow(&self, id: WorkflowId) -> Result<WorkflowDocument, BackendError>;

    /// `PUT /workflows/{id}/status`
    async fn set_status(&self, id: WorkflowId, enabled: bool) -> Result<(), BackendError>;

    /// `DELETE /workflows/{id}`
    async fn delete_workflow(&self, id: WorkflowId) -> Result<(), BackendError>;
}

/// Externally-owned sync and process task definitions.
#[async_trait]
pub trait TaskCatalog: Send + Sync {
    async fn list_tasks(
        &self,
        kind: ModelType,
        query: &CatalogQuery,
    ) -> Result<Page<CatalogEntry>, BackendError>;

    async fn task_detail(&self, kind: ModelType, id: TaskId) -> Result<TaskDetail, BackendError>;
}

/// Read-only execution history.
#[async_trait]
pub trait RunHistory: Send + Sync {
    async fn run_logs(
        &self,
        target: RunTarget,
        query: &LogQuery,
    ) -> Result<Page<RunLogEntry>, BackendError>;
}

/// Fire-and-forget run requests.
#[async_trait]
pub trait RunLauncher: Send + Sync {
    async fn launch(&self, target: RunTarget) -> Result<(), BackendError>;
}

/// Recurring-trigger configuration of a workflow.
#[async_trait]
pub trait TimePlanStore: Send + Sync {
    /// `None` when the workflow has never been scheduled.
    async fn time_plan(&self, workflow: WorkflowId) -> Result<Option<TimePlan>, BackendError>;

    async fn create_time_plan(&self, workflow: WorkflowId, plan: &TimePlan) -> Result<(), BackendError>;

    async fn update_time_plan(&self, workflow: WorkflowId, plan: &TimePlan) -> Result<(), BackendError>;
}
