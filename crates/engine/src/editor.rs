//! The canvas editor: glue between user gestures, the [`DagModel`] and a
//! [`GraphSurface`].
//!
//! Every visual mutation goes through [`Editor::handle`], which validates
//! against the DAG first and only then mirrors the change onto the surface.
//! The surface never writes topology back.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use backend::models::{ModelType, TaskId, WorkflowDraft, WorkflowId};
use backend::{TaskCatalog, WorkflowStore};
use surface::{CellId, EditMode, GraphSurface, NodeAction, NodeData, Point, RenderContext, SurfaceError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::catalog::{CatalogConfig, CatalogLoader};
use crate::dag::DagModel;
use crate::error::{EngineError, Notice};
use crate::models::{NodeDefinition, PipelineNode, Selection};
use crate::save::{self, SaveGate, SaveGuard, SavePlan, Saved};
use crate::wire::{self, LoadedGraph, NodeDisplay};

/// A context-menu click routed out of the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCommand {
    pub node_id: String,
    pub action: NodeAction,
}

/// The [`RenderContext`] handed to the surface at construction.
struct EditorContext {
    mode: Arc<RwLock<EditMode>>,
    commands: mpsc::UnboundedSender<NodeCommand>,
}

impl RenderContext for EditorContext {
    fn mode(&self) -> EditMode {
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, node_id: &str, action: NodeAction) {
        let command = NodeCommand { node_id: node_id.to_owned(), action };
        if self.commands.send(command).is_err() {
            debug!(node_id, ?action, "node command dropped: no listener");
        }
    }
}

/// A user interaction on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// A catalog item was dropped at `position`.
    Drop { definition: Option<NodeDefinition>, position: Point },
    /// A port-to-port drag finished. The surface may already show the edge.
    Connect { source: CellId, target: CellId },
    DeleteNode(CellId),
    DeleteEdge(CellId),
    Select(CellId),
    ClearSelection,
    Move { cell: CellId, position: Point },
    Rename { cell: CellId, name: String },
}

impl Gesture {
    fn mutates(&self) -> bool {
        !matches!(self, Gesture::Select(_) | Gesture::ClearSelection)
    }
}

/// Name, description and identity of the open workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowMeta {
    /// `None` until the first successful save.
    pub id: Option<WorkflowId>,
    pub name: String,
    pub description: String,
}

pub struct Editor<S: GraphSurface> {
    mode: Arc<RwLock<EditMode>>,
    meta: WorkflowMeta,
    dag: DagModel,
    surface: S,
    cells: HashMap<CellId, String>,
    node_cells: HashMap<String, CellId>,
    catalog: CatalogLoader,
    save_gate: SaveGate,
}

impl<S: GraphSurface> Editor<S> {
    /// Open an empty editor in [`EditMode::Create`].
    ///
    /// `build_surface` receives the render context the surface must consult
    /// for the current mode and use to dispatch node actions. Those actions
    /// arrive on the returned receiver.
    pub fn new(
        catalog: CatalogConfig,
        build_surface: impl FnOnce(Arc<dyn RenderContext>) -> S,
    ) -> (Self, mpsc::UnboundedReceiver<NodeCommand>) {
        let mode = Arc::new(RwLock::new(EditMode::Create));
        let (commands, rx) = mpsc::unbounded_channel();
        let ctx: Arc<dyn RenderContext> = Arc::new(EditorContext { mode: Arc::clone(&mode), commands });

        let editor = Self {
            mode,
            meta: WorkflowMeta::default(),
            dag: DagModel::new(),
            surface: build_surface(ctx),
            cells: HashMap::new(),
            node_cells: HashMap::new(),
            catalog: CatalogLoader::new(catalog),
            save_gate: SaveGate::default(),
        };
        (editor, rx)
    }

    pub fn mode(&self) -> EditMode {
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_mode(&mut self, mode: EditMode) {
        *self.mode.write().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub fn meta(&self) -> &WorkflowMeta {
        &self.meta
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.meta.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.meta.description = description.into();
    }

    pub fn dag(&self) -> &DagModel {
        &self.dag
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Direct access for the host toolkit, e.g. to draw a speculative edge
    /// before reporting [`Gesture::Connect`].
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn catalog(&self) -> &CatalogLoader {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut CatalogLoader {
        &mut self.catalog
    }

    pub fn save_gate(&self) -> &SaveGate {
        &self.save_gate
    }

    pub fn cell_of(&self, node_id: &str) -> Option<CellId> {
        self.node_cells.get(node_id).copied()
    }

    pub fn node_of(&self, cell: CellId) -> Option<&str> {
        self.cells.get(&cell).map(String::as_str)
    }

    fn node_id(&self, cell: CellId) -> Result<String, EngineError> {
        self.cells
            .get(&cell)
            .cloned()
            .ok_or(EngineError::Surface(SurfaceError::UnknownCell(cell)))
    }

    // -----------------------------------------------------------------------
    // Gestures
    // -----------------------------------------------------------------------

    /// Apply a gesture. Rejections come back as a [`Notice`] and leave both
    /// the model and the surface as they were.
    pub fn handle(&mut self, gesture: Gesture) -> Option<Notice> {
        match self.apply(gesture) {
            Ok(notice) => notice,
            Err(err) => {
                warn!(error = %err, "gesture rejected");
                Some(Notice::from(&err))
            }
        }
    }

    /// Drop a catalog item listed by the loader. Dropping an item that is
    /// already on the canvas does nothing.
    pub fn place(&mut self, kind: ModelType, id: TaskId, position: Point) -> Option<Notice> {
        if self.catalog.is_placed(kind, id) {
            debug!(%kind, id, "catalog item already placed");
            return None;
        }
        let definition = self.catalog.drag(kind, id);
        self.handle(Gesture::Drop { definition, position })
    }

    fn apply(&mut self, gesture: Gesture) -> Result<Option<Notice>, EngineError> {
        if gesture.mutates() && self.mode().is_read_only() {
            if let Gesture::Connect { source, target } = gesture {
                self.discard_drawn_edge(source, target);
            }
            return Err(EngineError::ReadOnly);
        }

        match gesture {
            Gesture::Drop { definition, position } => self.drop_node(definition, position),
            Gesture::Connect { source, target } => self.connect(source, target),
            Gesture::DeleteNode(cell) => self.delete_node(cell),
            Gesture::DeleteEdge(cell) => self.delete_edge(cell),
            Gesture::Select(cell) => self.select(cell),
            Gesture::ClearSelection => {
                self.dag.clear_selection();
                self.surface.highlight(None);
                Ok(None)
            }
            Gesture::Move { cell, position } => {
                let node_id = self.node_id(cell)?;
                self.dag.move_node(&node_id, position)?;
                self.surface.move_node(cell, position)?;
                Ok(None)
            }
            Gesture::Rename { cell, name } => self.rename(cell, &name),
        }
    }

    fn drop_node(
        &mut self,
        definition: Option<NodeDefinition>,
        position: Point,
    ) -> Result<Option<Notice>, EngineError> {
        let node_id = self.dag.add_node(definition.as_ref(), position)?;
        let node = self
            .dag
            .node(&node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.clone()))?;
        let (kind, id) = node.catalog_key();
        let data = node_data(node, None);

        let cell = self.surface.add_node(data, position);
        self.bind(cell, node_id);
        self.catalog.mark_placed(kind, id);
        Ok(None)
    }

    fn connect(&mut self, source: CellId, target: CellId) -> Result<Option<Notice>, EngineError> {
        let ends = self.node_id(source).and_then(|s| self.node_id(target).map(|t| (s, t)));
        let (source_id, target_id) = match ends {
            Ok(ends) => ends,
            Err(err) => {
                self.discard_drawn_edge(source, target);
                return Err(err);
            }
        };

        match self.dag.propose_edge(&source_id, &target_id) {
            Ok(()) => {
                if self.surface.find_edge(source, target).is_none() {
                    self.surface.add_edge(source, target)?;
                }
                Ok(None)
            }
            // The drawn edge is the existing one; keep it.
            Err(err @ EngineError::DuplicateEdge { .. }) => Err(err),
            Err(err) => {
                self.discard_drawn_edge(source, target);
                Err(err)
            }
        }
    }

    /// Remove a speculatively drawn edge that the model did not accept.
    fn discard_drawn_edge(&mut self, source: CellId, target: CellId) {
        if let Some(edge) = self.surface.find_edge(source, target) {
            if let Err(err) = self.surface.remove_edge(edge) {
                warn!(error = %err, %edge, "failed to roll back edge");
            }
        }
    }

    fn delete_node(&mut self, cell: CellId) -> Result<Option<Notice>, EngineError> {
        let node_id = self.node_id(cell)?;
        if self.surface.node(cell).is_none() {
            return Err(SurfaceError::UnknownCell(cell).into());
        }

        let node = self.dag.remove_node(&node_id)?;
        self.surface.remove_node(cell)?;
        self.cells.remove(&cell);
        self.node_cells.remove(&node_id);
        let (kind, id) = node.catalog_key();
        self.catalog.release(kind, id);
        self.sync_highlight();
        Ok(None)
    }

    fn delete_edge(&mut self, cell: CellId) -> Result<Option<Notice>, EngineError> {
        let edge = *self
            .surface
            .edge(cell)
            .ok_or(EngineError::Surface(SurfaceError::UnknownCell(cell)))?;
        let source_id = self.node_id(edge.source)?;
        let target_id = self.node_id(edge.target)?;

        self.dag.remove_edge(&source_id, &target_id);
        self.surface.remove_edge(cell)?;
        self.sync_highlight();
        Ok(None)
    }

    fn select(&mut self, cell: CellId) -> Result<Option<Notice>, EngineError> {
        let selection = if let Some(node_id) = self.cells.get(&cell) {
            Selection::Node(node_id.clone())
        } else {
            let edge = *self
                .surface
                .edge(cell)
                .ok_or(EngineError::Surface(SurfaceError::UnknownCell(cell)))?;
            Selection::Edge {
                source: self.node_id(edge.source)?,
                target: self.node_id(edge.target)?,
            }
        };
        self.dag.select(selection)?;
        self.surface.highlight(Some(cell));
        Ok(None)
    }

    fn rename(&mut self, cell: CellId, name: &str) -> Result<Option<Notice>, EngineError> {
        let node_id = self.node_id(cell)?;
        self.dag.rename(&node_id, name)?;

        let label = self
            .dag
            .node(&node_id)
            .map(|n| n.name.clone())
            .ok_or_else(|| EngineError::UnknownNode(node_id.clone()))?;
        if let Some(drawn) = self.surface.node(cell) {
            let data = NodeData { label, ..drawn.data.clone() };
            self.surface.update_node(cell, data)?;
        }
        Ok(None)
    }

    /// Drop the surface highlight when the model no longer has a selection.
    fn sync_highlight(&mut self) {
        if self.dag.selection().is_none() {
            self.surface.highlight(None);
        }
    }

    fn bind(&mut self, cell: CellId, node_id: String) {
        self.node_cells.insert(node_id.clone(), cell);
        self.cells.insert(cell, node_id);
    }

    // -----------------------------------------------------------------------
    // Save
    // -----------------------------------------------------------------------

    /// Validate the open workflow and snapshot what a save would send.
    ///
    /// Nothing touches the network here; an empty graph or an invalid name
    /// is rejected before any request is built.
    pub fn prepare_save(&self) -> Result<(SavePlan, SaveGuard), EngineError> {
        if self.mode().is_read_only() {
            return Err(EngineError::ReadOnly);
        }
        let graph = wire::to_wire(&self.dag)?;
        let plan = match self.meta.id {
            Some(id) => SavePlan::Update { id, graph },
            None => {
                let draft = WorkflowDraft {
                    name: self.meta.name.trim().to_owned(),
                    description: self.meta.description.clone(),
                    nodes: graph.nodes,
                    canvas: graph.canvas,
                };
                draft.validate()?;
                SavePlan::Create(draft)
            }
        };
        let guard = self.save_gate.try_acquire().ok_or(EngineError::SaveInProgress)?;
        Ok((plan, guard))
    }

    /// Apply the outcome of a submitted plan.
    pub fn complete_save(&mut self, saved: &Saved) -> Notice {
        match saved {
            Saved::Created(doc) => {
                self.meta.id = Some(doc.id);
                self.set_mode(EditMode::Edit);
                Notice::info(format!("workflow '{}' created", doc.name))
            }
            Saved::Updated(_) => Notice::info("workflow saved"),
        }
    }

    /// Prepare, submit and complete a save in one step.
    pub async fn save(&mut self, store: &dyn WorkflowStore) -> Result<Notice, EngineError> {
        let (plan, guard) = self.prepare_save()?;
        let saved = save::submit(store, plan, guard).await?;
        Ok(self.complete_save(&saved))
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Start over with an unsaved, empty workflow.
    pub fn reset(&mut self) {
        self.surface.clear();
        self.cells.clear();
        self.node_cells.clear();
        self.dag = DagModel::new();
        self.meta = WorkflowMeta::default();
        self.catalog.reset_placed([]);
        self.set_mode(EditMode::Create);
    }

    /// Fetch workflow `id` and replace the canvas with it.
    ///
    /// `mode` is [`EditMode::Edit`] or [`EditMode::Preview`]. If `cancel`
    /// fires first the editor is left untouched. Entries dropped to keep the
    /// graph consistent are reported as one warning.
    #[instrument(skip(self, store, catalog, cancel))]
    pub async fn load(
        &mut self,
        store: &dyn WorkflowStore,
        catalog: &dyn TaskCatalog,
        id: WorkflowId,
        mode: EditMode,
        cancel: &CancellationToken,
    ) -> Result<Vec<Notice>, EngineError> {
        let doc = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            doc = store.get_workflow(id) => doc?,
        };
        let loaded = wire::from_wire(&doc.nodes, &doc.canvas, catalog, cancel).await?;

        let mut notices = Vec::new();
        if !loaded.healed.is_empty() {
            notices.push(Notice::warning(format!(
                "{} inconsistent entries were dropped while loading '{}'",
                loaded.healed.len(),
                doc.name
            )));
        }

        let mode = if mode == EditMode::Create { EditMode::Edit } else { mode };
        self.install(
            WorkflowMeta { id: Some(doc.id), name: doc.name, description: doc.description },
            loaded,
            mode,
        )?;
        Ok(notices)
    }

    fn install(&mut self, meta: WorkflowMeta, loaded: LoadedGraph, mode: EditMode) -> Result<(), EngineError> {
        let LoadedGraph { dag, display, .. } = loaded;

        self.surface.clear();
        self.cells.clear();
        self.node_cells.clear();

        for node in dag.nodes() {
            let detail = display.get(&node.node_id).map(|d| d.detail_line(node.model_id));
            let cell = self.surface.add_node(node_data(node, detail), node.position);
            self.bind(cell, node.node_id.clone());
        }
        for (source, target) in dag.edges() {
            if let (Some(&s), Some(&t)) = (self.node_cells.get(&source), self.node_cells.get(&target)) {
                self.surface.add_edge(s, t)?;
            }
        }

        self.catalog.reset_placed(dag.nodes().map(PipelineNode::catalog_key));
        info!(id = ?meta.id, nodes = dag.len(), ?mode, "workflow opened");
        self.dag = dag;
        self.meta = meta;
        self.set_mode(mode);
        Ok(())
    }
}

fn node_data(node: &PipelineNode, detail: Option<String>) -> NodeData {
    NodeData {
        node_id: node.node_id.clone(),
        label: node.name.clone(),
        badge: node.model_type.to_string(),
        detail: detail.or_else(|| Some(NodeDisplay { task: None }.detail_line(node.model_id))),
    }
}
