//! Time plan endpoints.

use async_trait::async_trait;

use super::HttpBackend;
use crate::models::{TimePlan, WorkflowId};
use crate::{BackendError, TimePlanStore};

fn path(workflow: WorkflowId) -> String {
    format!("/workflows/{workflow}/time-plan")
}

#[async_trait]
impl TimePlanStore for HttpBackend {
    async fn time_plan(&self, workflow: WorkflowId) -> Result<Option<TimePlan>, BackendError> {
        let response = self.client.get(self.url(&path(workflow))).send().await?;
        match Self::parse_response(response).await {
            Ok(plan) => Ok(Some(plan)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_time_plan(&self, workflow: WorkflowId, plan: &TimePlan) -> Result<(), BackendError> {
        let response = self.client.post(self.url(&path(workflow))).json(plan).send().await?;
        Self::check_status(response).await
    }

    async fn update_time_plan(&self, workflow: WorkflowId, plan: &TimePlan) -> Result<(), BackendError> {
        let response = self.client.put(self.url(&path(workflow))).json(plan).send().await?;
        Self::check_status(response).await
    }
}
