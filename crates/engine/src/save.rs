//! Save gating and submission.
//!
//! Saving is split so the graph stays editable while a request is in
//! flight: the editor snapshots a [`SavePlan`] and takes a [`SaveGuard`],
//! the plan is submitted without borrowing the editor, and the outcome is
//! applied afterwards. While a guard is alive no second plan can be taken.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use backend::models::{GraphUpdate, WorkflowDocument, WorkflowDraft, WorkflowId};
use backend::WorkflowStore;
use tracing::{info, instrument};

use crate::EngineError;

#[derive(Debug, Clone, Default)]
pub struct SaveGate {
    busy: Arc<AtomicBool>,
}

impl SaveGate {
    /// Take the gate, or `None` while another save is pending.
    pub fn try_acquire(&self) -> Option<SaveGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SaveGuard { busy: Arc::clone(&self.busy) })
    }

    /// Whether the save action should be rendered disabled.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the gate when dropped, whatever the save's outcome.
#[derive(Debug)]
pub struct SaveGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Snapshot of what a save will send.
#[derive(Debug, Clone, PartialEq)]
pub enum SavePlan {
    /// First save of a new workflow.
    Create(WorkflowDraft),
    /// Subsequent save of a persisted workflow.
    Update { id: WorkflowId, graph: GraphUpdate },
}

/// Outcome of a submitted [`SavePlan`].
#[derive(Debug, Clone, PartialEq)]
pub enum Saved {
    Created(WorkflowDocument),
    Updated(WorkflowId),
}

/// Send `plan` to the backend, holding `guard` until the request resolves.
#[instrument(skip_all)]
pub async fn submit(
    store: &dyn WorkflowStore,
    plan: SavePlan,
    guard: SaveGuard,
) -> Result<Saved, EngineError> {
    let saved = match plan {
        SavePlan::Create(draft) => Saved::Created(store.create_workflow(&draft).await?),
        SavePlan::Update { id, graph } => {
            store.update_graph(id, &graph).await?;
            Saved::Updated(id)
        }
    };
    drop(guard);
    info!(?saved, "workflow saved");
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_guard_is_refused_until_first_is_dropped() {
        let gate = SaveGate::default();
        let first = gate.try_acquire().expect("gate starts open");
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());

        drop(first);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }
}
