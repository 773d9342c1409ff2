//! `MemoryBackend` — an in-process implementation of every backend trait.
//!
//! Serves as the test double for the engine and monitor crates (it records
//! every call and can be told to fail or stall) and as the store behind the
//! development server in the `api` crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::ALL_NODES_DELETED;
use crate::models::{
    CatalogEntry, CatalogQuery, ExecutionMethod, GraphUpdate, LogQuery, ModelType, Page,
    RunLogEntry, RunStatus, RunTarget, TaskDetail, TaskId, TimePlan, WorkflowDocument,
    WorkflowDraft, WorkflowId,
};
use crate::{BackendError, RunHistory, RunLauncher, TaskCatalog, TimePlanStore, WorkflowStore};

#[derive(Default)]
struct State {
    workflows: HashMap<WorkflowId, WorkflowDocument>,
    tasks: HashMap<ModelType, Vec<TaskDetail>>,
    logs: HashMap<RunTarget, Vec<RunLogEntry>>,
    time_plans: HashMap<WorkflowId, TimePlan>,
    failures: HashMap<&'static str, (u16, Option<String>, String)>,
    next_log_id: i64,
}

/// Cheaply clonable handle; clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    latency: Arc<Mutex<Duration>>,
    /// Every operation seen, as `"<op> <subject>"`, in call order.
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the call, apply any configured latency, then any injected failure.
    async fn enter(&self, op: &'static str, subject: impl std::fmt::Display) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(format!("{op} {subject}"));

        let latency = *self.latency.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match self.state().failures.get(op) {
            Some((status, code, message)) => Err(BackendError::Api {
                status: *status,
                code: code.clone(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    // ---- seeding & inspection ----

    /// Make every subsequent call to `op` fail with the given response.
    pub fn fail(&self, op: &'static str, status: u16, code: Option<&str>, message: &str) {
        self.state()
            .failures
            .insert(op, (status, code.map(str::to_owned), message.to_owned()));
    }

    pub fn recover(&self, op: &'static str) {
        self.state().failures.remove(op);
    }

    /// Delay every call by `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = latency;
    }

    /// Number of recorded calls whose text starts with `prefix`.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn add_task(&self, kind: ModelType, detail: TaskDetail) {
        self.state().tasks.entry(kind).or_default().push(detail);
    }

    pub fn remove_task(&self, kind: ModelType, id: TaskId) {
        if let Some(tasks) = self.state().tasks.get_mut(&kind) {
            tasks.retain(|t| t.id != id);
        }
    }

    pub fn insert_workflow(&self, doc: WorkflowDocument) {
        self.state().workflows.insert(doc.id, doc);
    }

    pub fn workflow(&self, id: WorkflowId) -> Option<WorkflowDocument> {
        self.state().workflows.get(&id).cloned()
    }

    pub fn push_log(&self, target: RunTarget, mut entry: RunLogEntry) -> i64 {
        let mut state = self.state();
        state.next_log_id += 1;
        entry.id = state.next_log_id;
        state.logs.entry(target).or_default().push(entry);
        state.next_log_id
    }
}

#[async_trait]
impl WorkflowStore for MemoryBackend {
    async fn create_workflow(&self, draft: &WorkflowDraft) -> Result<WorkflowDocument, BackendError> {
        self.enter("create_workflow", &draft.name).await?;
        let doc = WorkflowDocument {
            id: Uuid::new_v4(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            enabled: false,
            nodes: draft.nodes.clone(),
            canvas: draft.canvas.clone(),
        };
        self.state().workflows.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn update_graph(&self, id: WorkflowId, graph: &GraphUpdate) -> Result<(), BackendError> {
        self.enter("update_graph", id).await?;
        let mut state = self.state();
        let doc = state
            .workflows
            .get_mut(&id)
            .ok_or_else(|| BackendError::not_found(format!("workflow {id}")))?;
        doc.nodes = graph.nodes.clone();
        doc.canvas = graph.canvas.clone();
        Ok(())
    }

    async fn get_workflow(&self, id: WorkflowId) -> Result<WorkflowDocument, BackendError> {
        self.enter("get_workflow", id).await?;
        self.state()
            .workflows
            .get(&id)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("workflow {id}")))
    }

    async fn set_status(&self, id: WorkflowId, enabled: bool) -> Result<(), BackendError> {
        self.enter("set_status", id).await?;
        let mut state = self.state();
        let doc = state
            .workflows
            .get_mut(&id)
            .ok_or_else(|| BackendError::not_found(format!("workflow {id}")))?;
        doc.enabled = enabled;
        Ok(())
    }

    async fn delete_workflow(&self, id: WorkflowId) -> Result<(), BackendError> {
        self.enter("delete_workflow", id).await?;
        let mut state = self.state();
        state
            .workflows
            .remove(&id)
            .ok_or_else(|| BackendError::not_found(format!("workflow {id}")))?;
        state.time_plans.remove(&id);
        state.logs.remove(&RunTarget::Workflow(id));
        Ok(())
    }
}

#[async_trait]
impl TaskCatalog for MemoryBackend {
    async fn list_tasks(
        &self,
        kind: ModelType,
        query: &CatalogQuery,
    ) -> Result<Page<CatalogEntry>, BackendError> {
        self.enter("list_tasks", kind).await?;
        let state = self.state();
        let keyword = query.keyword.as_deref().map(str::to_lowercase);
        let matching: Vec<CatalogEntry> = state
            .tasks
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|t| {
                keyword
                    .as_deref()
                    .map_or(true, |k| t.name.to_lowercase().contains(k))
            })
            .map(|t| CatalogEntry { id: t.id, name: t.name.clone() })
            .collect();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok(Page { items, total })
    }

    async fn task_detail(&self, kind: ModelType, id: TaskId) -> Result<TaskDetail, BackendError> {
        self.enter("task_detail", format!("{kind} {id}")).await?;
        self.state()
            .tasks
            .get(&kind)
            .and_then(|tasks| tasks.iter().find(|t| t.id == id))
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("{kind} task {id}")))
    }
}

#[async_trait]
impl RunHistory for MemoryBackend {
    async fn run_logs(
        &self,
        target: RunTarget,
        query: &LogQuery,
    ) -> Result<Page<RunLogEntry>, BackendError> {
        self.enter("run_logs", target).await?;
        let state = self.state();
        let entries = state.logs.get(&target).map(Vec::as_slice).unwrap_or_default();
        Ok(query.apply(entries))
    }
}

#[async_trait]
impl RunLauncher for MemoryBackend {
    async fn launch(&self, target: RunTarget) -> Result<(), BackendError> {
        self.enter("launch", target).await?;

        if let RunTarget::Workflow(id) = target {
            let state = self.state();
            let doc = state
                .workflows
                .get(&id)
                .ok_or_else(|| BackendError::not_found(format!("workflow {id}")))?;
            if doc.nodes.is_empty() {
                return Err(BackendError::Api {
                    status: 409,
                    code: Some(ALL_NODES_DELETED.to_owned()),
                    message: "workflow has no nodes".to_owned(),
                });
            }
        }

        self.push_log(
            target,
            RunLogEntry {
                id: 0,
                status: RunStatus::Running,
                start_time: Utc::now(),
                end_time: None,
                sync_count: matches!(target, RunTarget::SyncTask(_)).then_some(0),
                sync_method: ExecutionMethod::Manual,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl TimePlanStore for MemoryBackend {
    async fn time_plan(&self, workflow: WorkflowId) -> Result<Option<TimePlan>, BackendError> {
        self.enter("time_plan", workflow).await?;
        Ok(self.state().time_plans.get(&workflow).cloned())
    }

    async fn create_time_plan(&self, workflow: WorkflowId, plan: &TimePlan) -> Result<(), BackendError> {
        self.enter("create_time_plan", workflow).await?;
        let mut state = self.state();
        if !state.workflows.contains_key(&workflow) {
            return Err(BackendError::not_found(format!("workflow {workflow}")));
        }
        state.time_plans.insert(workflow, plan.clone());
        Ok(())
    }

    async fn update_time_plan(&self, workflow: WorkflowId, plan: &TimePlan) -> Result<(), BackendError> {
        self.enter("update_time_plan", workflow).await?;
        let mut state = self.state();
        let slot = state
            .time_plans
            .get_mut(&workflow)
            .ok_or_else(|| BackendError::not_found(format!("time plan of workflow {workflow}")))?;
        *slot = plan.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launching_an_empty_workflow_reports_all_nodes_deleted() {
        let backend = MemoryBackend::new();
        let doc = backend
            .create_workflow(&WorkflowDraft {
                name: "nightly".into(),
                description: String::new(),
                nodes: vec![],
                canvas: "[]".into(),
            })
            .await
            .unwrap();

        let err = backend.launch(RunTarget::Workflow(doc.id)).await.unwrap_err();
        assert_eq!(err.code(), Some(ALL_NODES_DELETED));
    }

    #[tokio::test]
    async fn launch_records_a_running_entry() {
        let backend = MemoryBackend::new();
        backend.launch(RunTarget::SyncTask(4)).await.unwrap();

        let page = backend
            .run_logs(RunTarget::SyncTask(4), &LogQuery::first_page(10))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].status, RunStatus::Running);
    }

    #[tokio::test]
    async fn injected_failures_persist_until_recovered() {
        let backend = MemoryBackend::new();
        backend.fail("run_logs", 503, None, "unavailable");

        let target = RunTarget::ProcessTask(1);
        assert!(backend.run_logs(target, &LogQuery::first_page(5)).await.is_err());
        assert!(backend.run_logs(target, &LogQuery::first_page(5)).await.is_err());

        backend.recover("run_logs");
        assert!(backend.run_logs(target, &LogQuery::first_page(5)).await.is_ok());
        assert_eq!(backend.call_count("run_logs"), 3);
    }

    #[tokio::test]
    async fn catalog_listing_filters_by_keyword_case_insensitively() {
        let backend = MemoryBackend::new();
        for (id, name) in [(1, "Orders sync"), (2, "Customers sync"), (3, "orders backfill")] {
            backend.add_task(
                ModelType::Sync,
                TaskDetail { id, name: name.into(), source_table: None, target_table: None },
            );
        }

        let page = backend
            .list_tasks(
                ModelType::Sync,
                &CatalogQuery { keyword: Some("ORDERS".into()), limit: 10, offset: 0 },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3]);
    }
}
