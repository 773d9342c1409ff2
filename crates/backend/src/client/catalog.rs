//! Task catalog endpoints.

use async_trait::async_trait;

use super::HttpBackend;
use crate::models::{CatalogEntry, CatalogQuery, ModelType, Page, TaskDetail, TaskId};
use crate::{BackendError, TaskCatalog};

fn collection(kind: ModelType) -> &'static str {
    match kind {
        ModelType::Sync => "/sync-tasks",
        ModelType::Process => "/process-tasks",
    }
}

#[async_trait]
impl TaskCatalog for HttpBackend {
    async fn list_tasks(
        &self,
        kind: ModelType,
        query: &CatalogQuery,
    ) -> Result<Page<CatalogEntry>, BackendError> {
        let response = self
            .client
            .get(self.url(collection(kind)))
            .query(query)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn task_detail(&self, kind: ModelType, id: TaskId) -> Result<TaskDetail, BackendError> {
        let response = self
            .client
            .get(self.url(&format!("{}/{id}", collection(kind))))
            .send()
            .await?;
        Self::parse_response(response).await
    }
}
