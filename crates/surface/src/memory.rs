//! `MemorySurface` — a headless [`GraphSurface`] backed by ordered maps.
//!
//! Used by the CLI for textual rendering and by tests in place of a real
//! canvas library.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::traits::{
    CellId, GraphSurface, NodeAction, NodeData, Point, RenderContext, SurfaceEdge, SurfaceNode,
};
use crate::SurfaceError;

pub struct MemorySurface {
    ctx: Arc<dyn RenderContext>,
    next_cell: u64,
    nodes: BTreeMap<CellId, SurfaceNode>,
    edges: BTreeMap<CellId, SurfaceEdge>,
    highlighted: Option<CellId>,
}

impl MemorySurface {
    /// Create an empty surface rendering under `ctx`.
    pub fn new(ctx: Arc<dyn RenderContext>) -> Self {
        Self {
            ctx,
            next_cell: 1,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            highlighted: None,
        }
    }

    fn allocate(&mut self) -> CellId {
        let id = CellId(self.next_cell);
        self.next_cell += 1;
        id
    }

    pub fn highlighted(&self) -> Option<CellId> {
        self.highlighted
    }

    /// Context-menu entries for a node under the current mode.
    pub fn menu(&self, cell: CellId) -> Result<&'static [NodeAction], SurfaceError> {
        if !self.nodes.contains_key(&cell) {
            return Err(SurfaceError::UnknownCell(cell));
        }
        Ok(NodeAction::available(self.ctx.mode()))
    }

    /// Simulate a click on a context-menu entry.
    ///
    /// Returns `false` when the action is not offered under the current mode.
    pub fn click(&self, cell: CellId, action: NodeAction) -> Result<bool, SurfaceError> {
        let node = self.nodes.get(&cell).ok_or(SurfaceError::UnknownCell(cell))?;
        if !NodeAction::available(self.ctx.mode()).contains(&action) {
            return Ok(false);
        }
        self.ctx.dispatch(&node.data.node_id, action);
        Ok(true)
    }
}

impl GraphSurface for MemorySurface {
    fn add_node(&mut self, data: NodeData, position: Point) -> CellId {
        let cell = self.allocate();
        debug!(%cell, node_id = %data.node_id, "surface: node added");
        self.nodes.insert(cell, SurfaceNode { cell, position, data });
        cell
    }

    fn remove_node(&mut self, cell: CellId) -> Result<(), SurfaceError> {
        self.nodes.remove(&cell).ok_or(SurfaceError::UnknownCell(cell))?;
        self.edges.retain(|_, e| e.source != cell && e.target != cell);
        if self.highlighted == Some(cell) {
            self.highlighted = None;
        }
        debug!(%cell, "surface: node removed");
        Ok(())
    }

    fn add_edge(&mut self, source: CellId, target: CellId) -> Result<CellId, SurfaceError> {
        for end in [source, target] {
            if !self.nodes.contains_key(&end) {
                return Err(SurfaceError::UnknownCell(end));
            }
        }
        if self.find_edge(source, target).is_some() {
            return Err(SurfaceError::DuplicateEdge { from: source, to: target });
        }
        let cell = self.allocate();
        self.edges.insert(cell, SurfaceEdge { cell, source, target });
        Ok(cell)
    }

    fn remove_edge(&mut self, edge: CellId) -> Result<(), SurfaceError> {
        self.edges.remove(&edge).ok_or(SurfaceError::UnknownCell(edge))?;
        if self.highlighted == Some(edge) {
            self.highlighted = None;
        }
        Ok(())
    }

    fn find_edge(&self, source: CellId, target: CellId) -> Option<CellId> {
        self.edges
            .values()
            .find(|e| e.source == source && e.target == target)
            .map(|e| e.cell)
    }

    fn node(&self, cell: CellId) -> Option<&SurfaceNode> {
        self.nodes.get(&cell)
    }

    fn edge(&self, cell: CellId) -> Option<&SurfaceEdge> {
        self.edges.get(&cell)
    }

    fn update_node(&mut self, cell: CellId, data: NodeData) -> Result<(), SurfaceError> {
        let node = self.nodes.get_mut(&cell).ok_or(SurfaceError::UnknownCell(cell))?;
        node.data = data;
        Ok(())
    }

    fn move_node(&mut self, cell: CellId, position: Point) -> Result<(), SurfaceError> {
        let node = self.nodes.get_mut(&cell).ok_or(SurfaceError::UnknownCell(cell))?;
        node.position = position;
        Ok(())
    }

    fn highlight(&mut self, cell: Option<CellId>) {
        self.highlighted = cell;
    }

    fn nodes(&self) -> Vec<SurfaceNode> {
        self.nodes.values().cloned().collect()
    }

    fn edges(&self) -> Vec<SurfaceEdge> {
        self.edges.values().copied().collect()
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.highlighted = None;
    }
}
