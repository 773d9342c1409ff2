//! Recurrence schedule ("time plan") of a saved workflow.

use backend::models::{TimePlan, WorkflowId};
use backend::TimePlanStore;
use tracing::{info, instrument};

use crate::EngineError;

/// Whether [`save_time_plan`] created or replaced the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSaved {
    Created,
    Updated,
}

/// Validate `plan` and store it for `workflow`.
///
/// Validation, including `end_date >= start_date`, runs before any request
/// is made. The plan is created if the workflow has none yet and replaced
/// otherwise.
#[instrument(skip(store, plan))]
pub async fn save_time_plan(
    store: &dyn TimePlanStore,
    workflow: WorkflowId,
    plan: &TimePlan,
) -> Result<PlanSaved, EngineError> {
    plan.check()?;

    let saved = match store.time_plan(workflow).await? {
        None => {
            store.create_time_plan(workflow, plan).await?;
            PlanSaved::Created
        }
        Some(_) => {
            store.update_time_plan(workflow, plan).await?;
            PlanSaved::Updated
        }
    };
    info!(?saved, frequency = plan.frequency, "time plan stored");
    Ok(saved)
}
