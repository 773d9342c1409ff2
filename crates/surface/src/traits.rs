//! The `GraphSurface` trait — the contract every canvas backend must fulfil.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SurfaceError;

/// Canvas-assigned identity of a node or edge cell.
///
/// Distinct from the pipeline `node_id`: the engine keeps the mapping
/// between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub u64);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// A 2D canvas coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Payload rendered inside a node cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Pipeline node id this cell renders.
    pub node_id: String,
    /// Display label.
    pub label: String,
    /// Short badge, e.g. `SYNC` or `PROCESS`.
    pub badge: String,
    /// Secondary line (source → target tables, or the bare task id).
    pub detail: Option<String>,
}

/// A node cell as currently laid out on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceNode {
    pub cell: CellId,
    pub position: Point,
    pub data: NodeData,
}

/// An edge cell connecting the output port of `source` to the input port of `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceEdge {
    pub cell: CellId,
    pub source: CellId,
    pub target: CellId,
}

/// Editing mode the canvas renders under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// A workflow that has never been saved.
    Create,
    /// A persisted workflow open for editing.
    Edit,
    /// Read-only run-history view.
    Preview,
}

impl EditMode {
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Preview)
    }
}

/// Per-node action offered by the node's context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAction {
    Run,
    ViewLogs,
    Rename,
    Delete,
}

impl NodeAction {
    /// Actions offered for a node under the given mode.
    pub fn available(mode: EditMode) -> &'static [NodeAction] {
        match mode {
            EditMode::Create => &[NodeAction::Rename, NodeAction::Delete],
            EditMode::Edit => &[
                NodeAction::Rename,
                NodeAction::Delete,
                NodeAction::Run,
                NodeAction::ViewLogs,
            ],
            EditMode::Preview => &[NodeAction::Run, NodeAction::ViewLogs],
        }
    }
}

/// Context handed to a surface at construction time.
///
/// Node rendering reads the current mode through it and routes context-menu
/// clicks back to the owner through `dispatch`.
pub trait RenderContext: Send + Sync {
    fn mode(&self) -> EditMode;

    fn dispatch(&self, node_id: &str, action: NodeAction);
}

/// Create/delete/enumerate capability over a canvas library.
///
/// Implementations must keep edges consistent with nodes: removing a node
/// removes every edge attached to its ports.
pub trait GraphSurface {
    /// Place a node cell and return its canvas identity.
    fn add_node(&mut self, data: NodeData, position: Point) -> CellId;

    /// Remove a node cell together with its attached edges.
    fn remove_node(&mut self, cell: CellId) -> Result<(), SurfaceError>;

    /// Draw an edge from `source`'s output port to `target`'s input port.
    fn add_edge(&mut self, source: CellId, target: CellId) -> Result<CellId, SurfaceError>;

    /// Remove an edge cell.
    fn remove_edge(&mut self, edge: CellId) -> Result<(), SurfaceError>;

    /// Find the edge cell connecting `source` to `target`, if drawn.
    fn find_edge(&self, source: CellId, target: CellId) -> Option<CellId>;

    fn node(&self, cell: CellId) -> Option<&SurfaceNode>;

    fn edge(&self, cell: CellId) -> Option<&SurfaceEdge>;

    fn update_node(&mut self, cell: CellId, data: NodeData) -> Result<(), SurfaceError>;

    fn move_node(&mut self, cell: CellId, position: Point) -> Result<(), SurfaceError>;

    /// Highlight a single cell, or clear highlighting with `None`.
    fn highlight(&mut self, cell: Option<CellId>);

    /// All node cells in insertion order.
    fn nodes(&self) -> Vec<SurfaceNode>;

    /// All edge cells in insertion order.
    fn edges(&self) -> Vec<SurfaceEdge>;

    /// Remove every cell.
    fn clear(&mut self);
}
