//! Core domain models of the workflow editor.
//!
//! These types are the source of truth for what the open workflow looks
//! like in memory. The canvas only renders them; the wire format in the
//! `backend` crate is produced from them by [`crate::wire`].

use backend::models::{ModelType, TaskId};
use serde::{Deserialize, Serialize};
use surface::Point;

// ---------------------------------------------------------------------------
// NodeDefinition
// ---------------------------------------------------------------------------

/// A catalog task definition, as carried by a drag gesture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub model_id: TaskId,
    pub model_type: ModelType,
    /// The task definition's own name; becomes the node's initial label.
    pub name: String,
}

// ---------------------------------------------------------------------------
// PipelineNode
// ---------------------------------------------------------------------------

/// One task instance placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineNode {
    /// Unique within the workflow, stable across save/reload.
    pub node_id: String,
    pub model_id: TaskId,
    pub model_type: ModelType,
    /// Direct predecessors, in connection order. Sole source of topology.
    pub pre_node_id: Vec<String>,
    /// Layout only; has no effect on execution order.
    pub position: Point,
    /// Display label, editable independently of the task definition.
    pub name: String,
}

impl PipelineNode {
    pub fn catalog_key(&self) -> (ModelType, TaskId) {
        (self.model_type, self.model_id)
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// The single selected element of the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Node(String),
    /// The edge `source → target`, i.e. `source ∈ target.pre_node_id`.
    Edge { source: String, target: String },
}
