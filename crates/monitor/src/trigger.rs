//! Fire-and-forget run requests for a node's task or a whole workflow.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use backend::error::ALL_NODES_DELETED;
use backend::models::RunTarget;
use backend::{BackendError, RunLauncher};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::LogPoller;

#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Repeat requests for the same target inside this window are dropped.
    pub cooldown: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self { cooldown: Duration::from_secs(2) }
    }
}

/// What the user is told after pressing "run".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started(String),
    /// Ignored as a double-click on a target run moments ago.
    Dropped,
    Failed(String),
}

pub struct RunTrigger {
    launcher: Arc<dyn RunLauncher>,
    config: TriggerConfig,
    last_fired: Mutex<HashMap<RunTarget, Instant>>,
}

impl RunTrigger {
    pub fn new(launcher: Arc<dyn RunLauncher>, config: TriggerConfig) -> Self {
        Self {
            launcher,
            config,
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    /// Ask the backend to start `target` now.
    ///
    /// Never retries; a failure is reported once.
    #[instrument(skip(self, target), fields(run_target = %target))]
    pub async fn trigger(&self, target: RunTarget) -> TriggerOutcome {
        if !self.claim(target) {
            info!("run request dropped inside cooldown");
            return TriggerOutcome::Dropped;
        }

        match self.launcher.launch(target).await {
            Ok(()) => {
                info!("run started");
                TriggerOutcome::Started(format!("{target} started"))
            }
            Err(err) => {
                warn!(error = %err, "run request failed");
                TriggerOutcome::Failed(failure_message(&err))
            }
        }
    }

    fn claim(&self, target: RunTarget) -> bool {
        let mut last_fired = self.last_fired.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let cooldown = self.config.cooldown;
        last_fired.retain(|_, at| now.duration_since(*at) < cooldown);
        if last_fired.contains_key(&target) {
            return false;
        }
        last_fired.insert(target, now);
        true
    }

    /// Targets still inside their cooldown.
    pub fn cooling_down(&self) -> usize {
        self.last_fired.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn failure_message(err: &BackendError) -> String {
    match err.code() {
        Some(ALL_NODES_DELETED) => {
            "this workflow has no nodes left to run; add a node and save first".to_owned()
        }
        _ => format!("could not start the run: {err}"),
    }
}

/// Trigger `target` and, if it started, point the poller at it so the new
/// run shows up without waiting for the next interval.
pub async fn run_and_watch(
    trigger: &RunTrigger,
    poller: &mut LogPoller,
    target: RunTarget,
) -> TriggerOutcome {
    let outcome = trigger.trigger(target).await;
    if matches!(outcome, TriggerOutcome::Started(_)) {
        poller.subscribe(target);
    }
    outcome
}
