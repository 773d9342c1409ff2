//! Workflow serializer — live graph ⇄ persisted wire format.
//!
//! A persisted workflow is two lists joined by node id: the strongly-typed
//! `nodes` adjacency and the opaque `canvas` string holding layout. Saving
//! emits both from the [`DagModel`]; loading joins them back, resolves each
//! node's task metadata and re-proposes every edge, healing whatever does
//! not fit instead of failing the load.

use std::collections::{HashMap, HashSet};

use backend::models::{CanvasEntry, GraphUpdate, ModelType, Position, TaskDetail, WireNode};
use backend::TaskCatalog;
use futures::future::join_all;
use surface::Point;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::dag::DagModel;
use crate::models::PipelineNode;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Canvas string
// ---------------------------------------------------------------------------

pub fn encode_canvas(entries: &[CanvasEntry]) -> Result<String, EngineError> {
    Ok(serde_json::to_string(entries)?)
}

/// Parse the `canvas` field. A blank string is an empty layout.
pub fn decode_canvas(canvas: &str) -> Result<Vec<CanvasEntry>, EngineError> {
    if canvas.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(canvas)?)
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Serialize the live graph.
///
/// # Errors
/// [`EngineError::EmptyWorkflow`] when there are no nodes: an empty canvas
/// is not a valid save.
pub fn to_wire(dag: &DagModel) -> Result<GraphUpdate, EngineError> {
    if dag.is_empty() {
        return Err(EngineError::EmptyWorkflow);
    }

    let nodes = dag
        .nodes()
        .map(|n| WireNode {
            node_id: n.node_id.clone(),
            model_id: n.model_id,
            model_type: n.model_type,
            pre_node_id: n.pre_node_id.clone(),
        })
        .collect();

    let canvas: Vec<CanvasEntry> = dag
        .nodes()
        .map(|n| CanvasEntry {
            id: n.node_id.clone(),
            position: Position { x: n.position.x, y: n.position.y },
            name: n.name.clone(),
        })
        .collect();

    Ok(GraphUpdate {
        nodes,
        canvas: encode_canvas(&canvas)?,
    })
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Something [`from_wire`] dropped to keep the loaded graph consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Healed {
    /// A `nodes` entry had no `canvas` counterpart.
    MissingLayout { node_id: String },
    /// A second `nodes` entry reused an id.
    DuplicateNode { node_id: String },
    /// A second node referenced an already-placed catalog task.
    DuplicateTask { node_id: String, model_type: ModelType, model_id: i64 },
    /// A predecessor referenced a node absent from the document.
    DanglingPredecessor { node_id: String, missing: String },
    /// A predecessor entry was a self-loop, a repeat, or closed a cycle.
    RejectedEdge { source: String, target: String, reason: String },
}

/// Display metadata of a loaded node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDisplay {
    /// Resolved task detail; `None` when the catalog lookup failed.
    pub task: Option<TaskDetail>,
}

impl NodeDisplay {
    /// Secondary label: `source → target`, the task name, or the bare id.
    pub fn detail_line(&self, model_id: i64) -> String {
        match &self.task {
            Some(TaskDetail { source_table: Some(s), target_table: Some(t), .. }) => {
                format!("{s} → {t}")
            }
            Some(task) => task.name.clone(),
            None => format!("#{model_id}"),
        }
    }
}

/// Result of [`from_wire`].
#[derive(Debug, Clone)]
pub struct LoadedGraph {
    pub dag: DagModel,
    pub display: HashMap<String, NodeDisplay>,
    pub healed: Vec<Healed>,
}

/// Rebuild a live graph from its wire form.
///
/// Task metadata for every surviving node is resolved concurrently; a
/// failed lookup degrades that node to its bare id. If `cancel` fires
/// before resolution finishes, everything resolved so far is discarded.
#[instrument(skip_all, fields(nodes = nodes.len()))]
pub async fn from_wire(
    nodes: &[WireNode],
    canvas: &str,
    catalog: &dyn TaskCatalog,
    cancel: &CancellationToken,
) -> Result<LoadedGraph, EngineError> {
    let layout: HashMap<String, CanvasEntry> = decode_canvas(canvas)?
        .into_iter()
        .map(|e| (e.id.clone(), e))
        .collect();

    let mut healed = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut survivors: Vec<(&WireNode, &CanvasEntry)> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if !seen.insert(node.node_id.as_str()) {
            healed.push(Healed::DuplicateNode { node_id: node.node_id.clone() });
            continue;
        }
        match layout.get(&node.node_id) {
            Some(entry) => survivors.push((node, entry)),
            None => healed.push(Healed::MissingLayout { node_id: node.node_id.clone() }),
        }
    }

    let lookups = join_all(
        survivors
            .iter()
            .map(|(n, _)| catalog.task_detail(n.model_type, n.model_id)),
    );
    let details = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        details = lookups => details,
    };

    let mut dag = DagModel::new();
    let mut display = HashMap::with_capacity(survivors.len());
    for ((node, entry), detail) in survivors.iter().zip(details) {
        let task = match detail {
            Ok(task) => Some(task),
            Err(e) => {
                debug!(model_id = node.model_id, error = %e, "task metadata unavailable; showing bare id");
                None
            }
        };
        let restored = PipelineNode {
            node_id: node.node_id.clone(),
            model_id: node.model_id,
            model_type: node.model_type,
            pre_node_id: Vec::new(),
            position: Point::new(entry.position.x, entry.position.y),
            name: entry.name.clone(),
        };
        match dag.insert(restored) {
            Ok(()) => {
                display.insert(node.node_id.clone(), NodeDisplay { task });
            }
            Err(_) => healed.push(Healed::DuplicateTask {
                node_id: node.node_id.clone(),
                model_type: node.model_type,
                model_id: node.model_id,
            }),
        }
    }

    for (node, _) in &survivors {
        if !dag.contains(&node.node_id) {
            continue;
        }
        for pre in &node.pre_node_id {
            if !dag.contains(pre) {
                healed.push(Healed::DanglingPredecessor {
                    node_id: node.node_id.clone(),
                    missing: pre.clone(),
                });
                continue;
            }
            if let Err(e) = dag.propose_edge(pre, &node.node_id) {
                healed.push(Healed::RejectedEdge {
                    source: pre.clone(),
                    target: node.node_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    for item in &healed {
        warn!(?item, "healed inconsistent workflow document");
    }

    Ok(LoadedGraph { dag, display, healed })
}
