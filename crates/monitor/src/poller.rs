//! Execution log poller.
//!
//! Keeps a run-history view of one target eventually consistent with the
//! backend by re-fetching on a fixed interval. At most one poll task exists
//! per [`LogPoller`]: every subscription change tears the previous task down
//! before starting the next, and dropping the poller stops it.

use std::sync::Arc;
use std::time::Duration;

use backend::models::{
    ExecutionMethod, LogQuery, Page, RunLogEntry, RunStatus, RunTarget, SortColumn, SortDirection,
};
use backend::{BackendError, RunHistory};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tuning knobs for [`LogPoller`].
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between fetches.
    pub interval: Duration,
    /// Rows per page.
    pub page_size: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            page_size: 10,
        }
    }
}

/// The published state of the run-history panel.
#[derive(Debug, Clone, PartialEq)]
pub struct LogView {
    /// Target being polled; `None` while idle.
    pub target: Option<RunTarget>,
    pub query: LogQuery,
    /// Current page. Cleared when a fetch fails.
    pub entries: Vec<RunLogEntry>,
    pub total: u64,
    /// Message of the last failed fetch, until the next success.
    pub error: Option<String>,
    /// Bumped on every subscription change; fetches carrying an older
    /// generation are discarded.
    pub generation: u64,
}

impl LogView {
    fn idle(query: LogQuery, generation: u64) -> Self {
        Self {
            target: None,
            query,
            entries: Vec::new(),
            total: 0,
            error: None,
            generation,
        }
    }
}

struct Subscription {
    target: RunTarget,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct LogPoller {
    history: Arc<dyn RunHistory>,
    config: PollerConfig,
    query: LogQuery,
    view: Arc<watch::Sender<LogView>>,
    active: Option<Subscription>,
    generation: u64,
}

impl LogPoller {
    pub fn new(history: Arc<dyn RunHistory>, config: PollerConfig) -> Self {
        let query = LogQuery::first_page(config.page_size);
        let (view, _) = watch::channel(LogView::idle(query.clone(), 0));
        Self {
            history,
            config,
            query,
            view: Arc::new(view),
            active: None,
            generation: 0,
        }
    }

    /// Receiver that observes every published [`LogView`].
    pub fn view(&self) -> watch::Receiver<LogView> {
        self.view.subscribe()
    }

    /// Copy of the current view.
    pub fn snapshot(&self) -> LogView {
        self.view.borrow().clone()
    }

    pub fn query(&self) -> &LogQuery {
        &self.query
    }

    pub fn active_target(&self) -> Option<RunTarget> {
        self.active.as_ref().map(|s| s.target)
    }

    pub fn is_polling(&self) -> bool {
        self.active.as_ref().is_some_and(|s| !s.handle.is_finished())
    }

    /// Start polling `target`, replacing any current subscription.
    ///
    /// The first fetch is issued immediately.
    pub fn subscribe(&mut self, target: RunTarget) {
        self.teardown();
        self.generation += 1;
        let generation = self.generation;

        let query = self.query.clone();
        self.view.send_replace(LogView {
            target: Some(target),
            ..LogView::idle(query.clone(), generation)
        });

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.history),
            Arc::clone(&self.view),
            target,
            query,
            generation,
            self.config.interval,
            cancel.clone(),
        ));
        info!(run_target = %target, generation, "log poller subscribed");
        self.active = Some(Subscription { target, cancel, handle });
    }

    /// Stop polling and clear the view.
    pub fn unsubscribe(&mut self) {
        if let Some(target) = self.active_target() {
            info!(run_target = %target, "log poller unsubscribed");
        }
        self.teardown();
        self.generation += 1;
        self.view.send_replace(LogView::idle(self.query.clone(), self.generation));
    }

    /// Fetch the active target now and restart the interval from here.
    pub fn refresh(&mut self) {
        if let Some(target) = self.active_target() {
            self.subscribe(target);
        }
    }

    pub fn set_sort(&mut self, sort: SortColumn, direction: SortDirection) {
        self.query.sort = sort;
        self.query.direction = direction;
        self.restart_from_first_page();
    }

    pub fn set_status_filter(&mut self, status: Option<RunStatus>) {
        self.query.status = status;
        self.restart_from_first_page();
    }

    pub fn set_method_filter(&mut self, method: Option<ExecutionMethod>) {
        self.query.method = method;
        self.restart_from_first_page();
    }

    /// Jump to zero-based `page`.
    pub fn set_page(&mut self, page: u32) {
        self.query.offset = page.saturating_mul(self.query.limit);
        self.refresh();
    }

    fn restart_from_first_page(&mut self) {
        self.query.offset = 0;
        self.refresh();
    }

    fn teardown(&mut self) {
        if let Some(sub) = self.active.take() {
            sub.cancel.cancel();
            sub.handle.abort();
            debug!(run_target = %sub.target, "poll task stopped");
        }
    }
}

impl Drop for LogPoller {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn poll_loop(
    history: Arc<dyn RunHistory>,
    view: Arc<watch::Sender<LogView>>,
    target: RunTarget,
    query: LogQuery,
    generation: u64,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            fetched = history.run_logs(target, &query) => fetched,
        };
        publish(&view, generation, fetched);
    }
}

fn publish(view: &watch::Sender<LogView>, generation: u64, fetched: Result<Page<RunLogEntry>, BackendError>) {
    view.send_if_modified(|current| {
        if current.generation != generation {
            debug!(generation, current = current.generation, "stale poll result discarded");
            return false;
        }
        match fetched {
            Ok(page) => {
                current.entries = page.items;
                current.total = page.total;
                current.error = None;
            }
            Err(err) => {
                warn!(error = %err, "run history fetch failed");
                current.entries.clear();
                current.total = 0;
                current.error = Some(err.to_string());
            }
        }
        true
    });
}
