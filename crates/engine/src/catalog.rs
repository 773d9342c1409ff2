//! Node catalog loader — the two draggable task lists beside the canvas.
//!
//! Each category (sync, process) is an append-only, infinitely scrolled
//! listing. Changing the keyword resets both to page one. The loader also
//! tracks which catalog tasks are already on the canvas so the list can
//! render them disabled; a task can only be placed once per workflow.

use std::collections::HashSet;
use std::time::Duration;

use backend::models::{CatalogEntry, CatalogQuery, ModelType, Page, TaskId};
use backend::{BackendError, TaskCatalog};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::models::NodeDefinition;

/// Tuning knobs for the catalog sidebar.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Entries fetched per page.
    pub page_size: u32,
    /// Quiet period before a typed keyword is searched.
    pub debounce: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            debounce: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Default)]
struct Listing {
    items: Vec<CatalogEntry>,
    total: u64,
    loaded_once: bool,
}

impl Listing {
    fn has_more(&self) -> bool {
        !self.loaded_once || (self.items.len() as u64) < self.total
    }

    fn append(&mut self, page: Page<CatalogEntry>) -> usize {
        let added = page.items.len();
        self.items.extend(page.items);
        self.total = page.total;
        self.loaded_once = true;
        added
    }
}

/// A catalog row as rendered in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub entry: CatalogEntry,
    /// Already backing a node; rendered disabled and not draggable.
    pub placed: bool,
}

#[derive(Debug)]
pub struct CatalogLoader {
    config: CatalogConfig,
    keyword: Option<String>,
    sync: Listing,
    process: Listing,
    placed: HashSet<(ModelType, TaskId)>,
}

impl CatalogLoader {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            keyword: None,
            sync: Listing::default(),
            process: Listing::default(),
            placed: HashSet::new(),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    fn listing(&self, kind: ModelType) -> &Listing {
        match kind {
            ModelType::Sync => &self.sync,
            ModelType::Process => &self.process,
        }
    }

    fn listing_mut(&mut self, kind: ModelType) -> &mut Listing {
        match kind {
            ModelType::Sync => &mut self.sync,
            ModelType::Process => &mut self.process,
        }
    }

    fn query_for(&self, kind: ModelType) -> CatalogQuery {
        CatalogQuery {
            keyword: self.keyword.clone(),
            limit: self.config.page_size,
            offset: self.listing(kind).items.len() as u32,
        }
    }

    /// Fetch the next page of `kind` and append it.
    ///
    /// Returns the number of entries added; `0` once the listing is exhausted.
    #[instrument(skip(self, catalog))]
    pub async fn load_more(
        &mut self,
        catalog: &dyn TaskCatalog,
        kind: ModelType,
    ) -> Result<usize, BackendError> {
        if !self.listing(kind).has_more() {
            return Ok(0);
        }
        let page = catalog.list_tasks(kind, &self.query_for(kind)).await?;
        let added = self.listing_mut(kind).append(page);
        debug!(%kind, added, "catalog page appended");
        Ok(added)
    }

    /// Apply a new keyword to both categories.
    ///
    /// Accumulated results are cleared and page one of each category is
    /// fetched. Searching for the current keyword again is a no-op.
    #[instrument(skip(self, catalog))]
    pub async fn search(
        &mut self,
        catalog: &dyn TaskCatalog,
        keyword: &str,
    ) -> Result<(), BackendError> {
        let keyword = Some(keyword.trim().to_owned()).filter(|k| !k.is_empty());
        if keyword == self.keyword && self.sync.loaded_once && self.process.loaded_once {
            return Ok(());
        }

        self.keyword = keyword;
        self.sync = Listing::default();
        self.process = Listing::default();

        let sync_query = self.query_for(ModelType::Sync);
        let process_query = self.query_for(ModelType::Process);
        let (sync, process) = tokio::join!(
            catalog.list_tasks(ModelType::Sync, &sync_query),
            catalog.list_tasks(ModelType::Process, &process_query),
        );
        // Keep whichever category succeeded before reporting a failure.
        let sync = sync.map(|page| self.sync.append(page));
        let process = process.map(|page| self.process.append(page));
        sync?;
        process?;
        Ok(())
    }

    /// Open a search box whose keystrokes settle for `config.debounce`
    /// before [`CatalogLoader::next_search`] applies them.
    pub fn search_box(&self) -> SearchBox {
        let (input, rx) = mpsc::channel(16);
        SearchBox {
            input,
            settled: debounce(rx, self.config.debounce),
        }
    }

    /// Wait for the next settled keyword of `search_box` and search for it.
    ///
    /// Returns `None` if the debounce task has stopped.
    pub async fn next_search(
        &mut self,
        catalog: &dyn TaskCatalog,
        search_box: &mut SearchBox,
    ) -> Option<Result<(), BackendError>> {
        let keyword = search_box.settled.recv().await?;
        Some(self.search(catalog, &keyword).await)
    }

    pub fn items(&self, kind: ModelType) -> Vec<CatalogItem> {
        self.listing(kind)
            .items
            .iter()
            .map(|entry| CatalogItem {
                entry: entry.clone(),
                placed: self.placed.contains(&(kind, entry.id)),
            })
            .collect()
    }

    pub fn has_more(&self, kind: ModelType) -> bool {
        self.listing(kind).has_more()
    }

    /// Drag payload for a listed entry; `None` when the entry is not listed
    /// or already placed.
    pub fn drag(&self, kind: ModelType, id: TaskId) -> Option<NodeDefinition> {
        if self.is_placed(kind, id) {
            return None;
        }
        self.listing(kind)
            .items
            .iter()
            .find(|e| e.id == id)
            .map(|e| NodeDefinition {
                model_id: e.id,
                model_type: kind,
                name: e.name.clone(),
            })
    }

    // ---- placement tracking ----

    pub fn is_placed(&self, kind: ModelType, id: TaskId) -> bool {
        self.placed.contains(&(kind, id))
    }

    pub fn mark_placed(&mut self, kind: ModelType, id: TaskId) {
        self.placed.insert((kind, id));
    }

    pub fn release(&mut self, kind: ModelType, id: TaskId) {
        self.placed.remove(&(kind, id));
    }

    /// Replace the placed set, e.g. after loading a workflow.
    pub fn reset_placed(&mut self, placed: impl IntoIterator<Item = (ModelType, TaskId)>) {
        self.placed = placed.into_iter().collect();
    }
}

/// Keyword input of the catalog sidebar.
///
/// Every keystroke is sent as the full current text; only the value left
/// standing after a quiet period reaches the backend.
#[derive(Debug)]
pub struct SearchBox {
    input: mpsc::Sender<String>,
    settled: mpsc::Receiver<String>,
}

impl SearchBox {
    /// Record the current text of the box. Returns `false` if the debounce
    /// task is gone.
    pub async fn input(&self, keyword: impl Into<String>) -> bool {
        self.input.send(keyword.into()).await.is_ok()
    }
}

/// Forward the last value received on `input` once it has been quiet for
/// `window`. Intermediate values typed within the window are dropped.
///
/// The returned channel closes after `input` closes and any pending value
/// has been flushed.
pub fn debounce(mut input: mpsc::Receiver<String>, window: Duration) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        let mut pending: Option<(String, Instant)> = None;
        loop {
            let deadline = pending.as_ref().map(|(_, at)| *at);
            tokio::select! {
                received = input.recv() => match received {
                    Some(value) => pending = Some((value, Instant::now() + window)),
                    None => {
                        if let Some((value, _)) = pending.take() {
                            let _ = tx.send(value).await;
                        }
                        break;
                    }
                },
                _ = sleep_until_opt(deadline), if deadline.is_some() => {
                    if let Some((value, _)) = pending.take() {
                        if tx.send(value).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    });

    rx
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
