//! Workflow record endpoints.

use async_trait::async_trait;
use tracing::instrument;

use super::HttpBackend;
use crate::models::{GraphUpdate, StatusUpdate, WorkflowDocument, WorkflowDraft, WorkflowId};
use crate::{BackendError, WorkflowStore};

#[async_trait]
impl WorkflowStore for HttpBackend {
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    async fn create_workflow(&self, draft: &WorkflowDraft) -> Result<WorkflowDocument, BackendError> {
        let response = self.client.post(self.url("/workflows")).json(draft).send().await?;
        Self::parse_response(response).await
    }

    #[instrument(skip(self, graph), fields(nodes = graph.nodes.len()))]
    async fn update_graph(&self, id: WorkflowId, graph: &GraphUpdate) -> Result<(), BackendError> {
        let response = self
            .client
            .put(self.url(&format!("/workflows/{id}/graph")))
            .json(graph)
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn get_workflow(&self, id: WorkflowId) -> Result<WorkflowDocument, BackendError> {
        let response = self.client.get(self.url(&format!("/workflows/{id}"))).send().await?;
        Self::parse_response(response).await
    }

    async fn set_status(&self, id: WorkflowId, enabled: bool) -> Result<(), BackendError> {
        let response = self
            .client
            .put(self.url(&format!("/workflows/{id}/status")))
            .json(&StatusUpdate { enabled })
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn delete_workflow(&self, id: WorkflowId) -> Result<(), BackendError> {
        let response = self.client.delete(self.url(&format!("/workflows/{id}"))).send().await?;
        Self::check_status(response).await
    }
}
