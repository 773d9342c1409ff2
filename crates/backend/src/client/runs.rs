//! Run-history and run-trigger endpoints.
//!
//! The three log endpoints answer with different row shapes; they are
//! unified into [`RunLogEntry`] here so callers see a single view.

use async_trait::async_trait;
use tracing::instrument;

use super::HttpBackend;
use crate::models::{
    LogQuery, Page, ProcessLogRow, RunLogEntry, RunTarget, SyncLogRow, WorkflowLogRow,
};
use crate::{BackendError, RunHistory, RunLauncher};

fn unify<R: Into<RunLogEntry>>(page: Page<R>) -> Page<RunLogEntry> {
    Page {
        items: page.items.into_iter().map(Into::into).collect(),
        total: page.total,
    }
}

#[async_trait]
impl RunHistory for HttpBackend {
    #[instrument(skip(self, target, query), fields(run_target = %target))]
    async fn run_logs(
        &self,
        target: RunTarget,
        query: &LogQuery,
    ) -> Result<Page<RunLogEntry>, BackendError> {
        let response = self
            .client
            .get(self.url(&format!("{}/logs", target.path())))
            .query(query)
            .send()
            .await?;

        match target {
            RunTarget::SyncTask(_) => {
                Ok(unify(Self::parse_response::<Page<SyncLogRow>>(response).await?))
            }
            RunTarget::ProcessTask(_) => {
                Ok(unify(Self::parse_response::<Page<ProcessLogRow>>(response).await?))
            }
            RunTarget::Workflow(_) => {
                Ok(unify(Self::parse_response::<Page<WorkflowLogRow>>(response).await?))
            }
        }
    }
}

#[async_trait]
impl RunLauncher for HttpBackend {
    #[instrument(skip(self, target), fields(run_target = %target))]
    async fn launch(&self, target: RunTarget) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.url(&format!("{}/run", target.path())))
            .send()
            .await?;
        Self::check_status(response).await
    }
}
