//! DAG model and invariant enforcer.
//!
//! Owns every [`PipelineNode`] of the open workflow and keeps the
//! predecessor relation acyclic at all times. The invariant is enforced
//! incrementally: every edge goes through [`DagModel::propose_edge`], which
//! walks the ancestors of the source and refuses the edge when the target
//! is among them. No post-hoc cycle check is ever needed.
//!
//! Rules enforced:
//! 1. Node ids are unique within the workflow.
//! 2. A catalog task backs at most one node.
//! 3. No self-loops, no duplicate edges, no cycles.
//! 4. At most one element is selected.

use std::collections::{HashMap, HashSet, VecDeque};

use backend::models::{ModelType, TaskId};
use surface::Point;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{NodeDefinition, PipelineNode, Selection};
use crate::EngineError;

#[derive(Debug, Clone, Default)]
pub struct DagModel {
    /// node_id → node.
    nodes: HashMap<String, PipelineNode>,
    /// Insertion order, used for every enumeration.
    order: Vec<String>,
    /// Catalog task → node_id of the node it backs.
    placed: HashMap<(ModelType, TaskId), String>,
    selection: Option<Selection>,
}

impl DagModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn node(&self, node_id: &str) -> Option<&PipelineNode> {
        self.nodes.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &PipelineNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Every edge as `(source, target)`, ordered by target then connection order.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.nodes()
            .flat_map(|n| n.pre_node_id.iter().map(|p| (p.clone(), n.node_id.clone())))
            .collect()
    }

    /// Node currently backed by the given catalog task, if any.
    pub fn placed_node(&self, model_type: ModelType, model_id: TaskId) -> Option<&str> {
        self.placed.get(&(model_type, model_id)).map(String::as_str)
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Create a node for `definition` with no predecessors and return its id.
    ///
    /// # Errors
    /// - [`EngineError::MissingDefinition`] if `definition` is `None`.
    /// - [`EngineError::AlreadyPlaced`] if the task already backs a node.
    pub fn add_node(
        &mut self,
        definition: Option<&NodeDefinition>,
        position: Point,
    ) -> Result<String, EngineError> {
        let definition = definition.ok_or(EngineError::MissingDefinition)?;
        let node = PipelineNode {
            node_id: Uuid::new_v4().to_string(),
            model_id: definition.model_id,
            model_type: definition.model_type,
            pre_node_id: Vec::new(),
            position,
            name: definition.name.clone(),
        };
        let node_id = node.node_id.clone();
        self.insert(node)?;
        info!(node_id = %node_id, model_id = definition.model_id, "node added");
        Ok(node_id)
    }

    /// Insert a node restored from a saved document, keeping its id.
    ///
    /// Its predecessor list is ignored: edges are re-proposed one by one.
    pub(crate) fn insert(&mut self, mut node: PipelineNode) -> Result<(), EngineError> {
        let key = node.catalog_key();
        if self.placed.contains_key(&key) {
            return Err(EngineError::AlreadyPlaced {
                model_type: key.0,
                model_id: key.1,
            });
        }
        if self.nodes.contains_key(&node.node_id) {
            return Err(EngineError::Validation(duplicate_id_error(&node.node_id)));
        }

        node.pre_node_id.clear();
        self.placed.insert(key, node.node_id.clone());
        self.order.push(node.node_id.clone());
        self.nodes.insert(node.node_id.clone(), node);
        Ok(())
    }

    /// Delete a node and strip it from every predecessor list.
    pub fn remove_node(&mut self, node_id: &str) -> Result<PipelineNode, EngineError> {
        let node = self
            .nodes
            .remove(node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.to_owned()))?;

        self.order.retain(|id| id != node_id);
        self.placed.remove(&node.catalog_key());
        for other in self.nodes.values_mut() {
            other.pre_node_id.retain(|p| p != node_id);
        }

        let selected_here = match &self.selection {
            Some(Selection::Node(id)) => id == node_id,
            Some(Selection::Edge { source, target }) => source == node_id || target == node_id,
            None => false,
        };
        if selected_here {
            self.selection = None;
        }

        info!(node_id, "node removed");
        Ok(node)
    }

    pub fn rename(&mut self, node_id: &str, name: &str) -> Result<(), EngineError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 64 {
            return Err(EngineError::Validation(name_length_error()));
        }
        if self.nodes().any(|n| n.node_id != node_id && n.name == name) {
            return Err(EngineError::DuplicateName(name.to_owned()));
        }
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.to_owned()))?;
        node.name = name.to_owned();
        Ok(())
    }

    pub fn move_node(&mut self, node_id: &str, position: Point) -> Result<(), EngineError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.to_owned()))?;
        node.position = position;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Every node reachable backwards from `node_id` through `pre_node_id`,
    /// including `node_id` itself.
    ///
    /// The existing relation is acyclic, so the depth-first walk terminates;
    /// the visited set only keeps diamonds from being walked twice.
    pub fn ancestors(&self, node_id: &str) -> HashSet<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut stack: Vec<&str> = vec![node_id];

        while let Some(current) = stack.pop() {
            if !seen.insert(current.to_owned()) {
                continue;
            }
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.pre_node_id.iter().map(String::as_str));
            }
        }

        seen
    }

    /// Validate and, on success, add the edge `source → target`.
    ///
    /// # Errors
    /// - [`EngineError::UnknownNode`] if either endpoint is missing.
    /// - [`EngineError::SelfLoop`] if `source == target`.
    /// - [`EngineError::DuplicateEdge`] if the edge already exists.
    /// - [`EngineError::CycleRejected`] if `target` is an ancestor of `source`.
    ///
    /// A rejected proposal leaves the model unchanged.
    pub fn propose_edge(&mut self, source: &str, target: &str) -> Result<(), EngineError> {
        for end in [source, target] {
            if !self.nodes.contains_key(end) {
                return Err(EngineError::UnknownNode(end.to_owned()));
            }
        }
        if source == target {
            return Err(EngineError::SelfLoop(source.to_owned()));
        }
        if self.nodes[target].pre_node_id.iter().any(|p| p == source) {
            return Err(EngineError::DuplicateEdge {
                source_id: source.to_owned(),
                target_id: target.to_owned(),
            });
        }
        if self.ancestors(source).contains(target) {
            debug!(source, target, "edge rejected: target is an ancestor of source");
            return Err(EngineError::CycleRejected {
                source_id: source.to_owned(),
                target_id: target.to_owned(),
            });
        }

        if let Some(node) = self.nodes.get_mut(target) {
            node.pre_node_id.push(source.to_owned());
        }
        info!(source, target, "edge accepted");
        Ok(())
    }

    /// Remove the edge `source → target`. Returns whether it existed.
    ///
    /// Removal can never introduce a cycle, so nothing is re-validated.
    pub fn remove_edge(&mut self, source: &str, target: &str) -> bool {
        let Some(node) = self.nodes.get_mut(target) else {
            return false;
        };
        let before = node.pre_node_id.len();
        node.pre_node_id.retain(|p| p != source);
        let removed = node.pre_node_id.len() != before;

        if removed
            && self.selection
                == Some(Selection::Edge {
                    source: source.to_owned(),
                    target: target.to_owned(),
                })
        {
            self.selection = None;
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Select one node or edge, implicitly deselecting everything else.
    pub fn select(&mut self, selection: Selection) -> Result<(), EngineError> {
        match &selection {
            Selection::Node(id) if !self.contains(id) => {
                return Err(EngineError::UnknownNode(id.clone()));
            }
            Selection::Edge { source, target } => {
                let exists = self
                    .nodes
                    .get(target)
                    .is_some_and(|n| n.pre_node_id.contains(source));
                if !exists {
                    return Err(EngineError::UnknownEdge {
                        source_id: source.clone(),
                        target_id: target.clone(),
                    });
                }
            }
            _ => {}
        }
        self.selection = Some(selection);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    /// Node ids in a topological order (Kahn's algorithm), ties broken by
    /// insertion order.
    pub fn topological_order(&self) -> Vec<String> {
        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut in_degree: HashMap<&str, usize> = HashMap::new();

        for node in self.nodes() {
            in_degree.insert(node.node_id.as_str(), node.pre_node_id.len());
            for pre in &node.pre_node_id {
                successors.entry(pre.as_str()).or_default().push(node.node_id.as_str());
            }
        }

        // Seed the queue with nodes that have no predecessors.
        let mut queue: VecDeque<&str> = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();

        let mut sorted: Vec<String> = Vec::with_capacity(self.len());
        while let Some(node_id) = queue.pop_front() {
            sorted.push(node_id.to_owned());
            for &next in successors.get(node_id).map(Vec::as_slice).unwrap_or_default() {
                if let Some(deg) = in_degree.get_mut(next) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        debug_assert_eq!(sorted.len(), self.len(), "predecessor relation must stay acyclic");
        sorted
    }
}

fn duplicate_id_error(node_id: &str) -> validator::ValidationErrors {
    let mut errors = validator::ValidationErrors::new();
    let mut error = validator::ValidationError::new("duplicate_node_id");
    error.add_param("node_id".into(), &node_id);
    errors.add("node_id", error);
    errors
}

fn name_length_error() -> validator::ValidationErrors {
    let mut errors = validator::ValidationErrors::new();
    let mut error = validator::ValidationError::new("length");
    error.message = Some("node name must be 1-64 characters".into());
    errors.add("name", error);
    errors
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn def(id: TaskId) -> NodeDefinition {
        NodeDefinition {
            model_id: id,
            model_type: ModelType::Sync,
            name: format!("task-{id}"),
        }
    }

    fn add(dag: &mut DagModel, id: TaskId) -> String {
        dag.add_node(Some(&def(id)), Point::default()).unwrap()
    }

    /// a → b → c
    fn chain() -> (DagModel, String, String, String) {
        let mut dag = DagModel::new();
        let a = add(&mut dag, 1);
        let b = add(&mut dag, 2);
        let c = add(&mut dag, 3);
        dag.propose_edge(&a, &b).unwrap();
        dag.propose_edge(&b, &c).unwrap();
        (dag, a, b, c)
    }

    fn has_cycle(dag: &DagModel) -> bool {
        dag.nodes()
            .any(|n| n.pre_node_id.iter().any(|p| dag.ancestors(p).contains(&n.node_id)))
    }

    #[test]
    fn closing_edge_through_second_path_is_rejected() {
        let (mut dag, a, _b, c) = chain();
        let before = dag.edges();

        assert!(matches!(
            dag.propose_edge(&c, &a),
            Err(EngineError::CycleRejected { .. })
        ));
        assert_eq!(dag.edges(), before, "rejection must leave the model unchanged");
    }

    #[test]
    fn self_loop_is_rejected_on_isolated_node() {
        let mut dag = DagModel::new();
        let a = add(&mut dag, 1);
        assert!(matches!(dag.propose_edge(&a, &a), Err(EngineError::SelfLoop(_))));
        assert!(dag.node(&a).unwrap().pre_node_id.is_empty());
    }

    #[test]
    fn node_without_predecessors_has_only_itself_as_ancestor() {
        let mut dag = DagModel::new();
        let a = add(&mut dag, 1);
        assert_eq!(dag.ancestors(&a), HashSet::from([a.clone()]));
    }

    #[test]
    fn accepted_edge_appends_source_to_target_predecessors() {
        let (dag, a, b, c) = chain();
        assert_eq!(dag.node(&b).unwrap().pre_node_id, vec![a.clone()]);
        assert_eq!(dag.node(&c).unwrap().pre_node_id, vec![b.clone()]);
        assert_eq!(dag.ancestors(&c), HashSet::from([a, b, c]));
    }

    #[test]
    fn diamond_is_allowed() {
        //   a
        //  / \
        // b   c
        //  \ /
        //   d
        let mut dag = DagModel::new();
        let a = add(&mut dag, 1);
        let b = add(&mut dag, 2);
        let c = add(&mut dag, 3);
        let d = add(&mut dag, 4);
        dag.propose_edge(&a, &b).unwrap();
        dag.propose_edge(&a, &c).unwrap();
        dag.propose_edge(&b, &d).unwrap();
        dag.propose_edge(&c, &d).unwrap();

        let order = dag.topological_order();
        assert_eq!(order.first(), Some(&a));
        assert_eq!(order.last(), Some(&d));
        assert!(dag.propose_edge(&d, &a).is_err());
    }

    #[test]
    fn duplicate_edge_is_rejected() {
        let (mut dag, a, b, _) = chain();
        assert!(matches!(
            dag.propose_edge(&a, &b),
            Err(EngineError::DuplicateEdge { .. })
        ));
    }

    #[test]
    fn add_node_without_definition_fails() {
        let mut dag = DagModel::new();
        assert!(matches!(
            dag.add_node(None, Point::default()),
            Err(EngineError::MissingDefinition)
        ));
        assert!(dag.is_empty());
    }

    #[test]
    fn catalog_task_can_only_be_placed_once_until_removed() {
        let mut dag = DagModel::new();
        let a = add(&mut dag, 7);
        assert!(matches!(
            dag.add_node(Some(&def(7)), Point::default()),
            Err(EngineError::AlreadyPlaced { model_id: 7, .. })
        ));
        assert_eq!(dag.len(), 1);

        dag.remove_node(&a).unwrap();
        assert!(dag.add_node(Some(&def(7)), Point::default()).is_ok());
    }

    #[test]
    fn removing_a_node_strips_it_from_every_predecessor_list() {
        let (mut dag, a, b, c) = chain();
        dag.propose_edge(&a, &c).unwrap();

        dag.remove_node(&b).unwrap();

        assert_eq!(dag.node(&c).unwrap().pre_node_id, vec![a]);
        assert!(!dag.contains(&b));
    }

    #[test]
    fn remove_edge_always_succeeds() {
        let (mut dag, a, b, _) = chain();
        assert!(dag.remove_edge(&a, &b));
        assert!(!dag.remove_edge(&a, &b));
        assert!(!dag.remove_edge("ghost", "nobody"));
    }

    #[test]
    fn selecting_replaces_previous_selection() {
        let (mut dag, a, b, _) = chain();
        dag.select(Selection::Node(a.clone())).unwrap();
        dag.select(Selection::Edge { source: a.clone(), target: b.clone() }).unwrap();
        assert_eq!(
            dag.selection(),
            Some(&Selection::Edge { source: a.clone(), target: b.clone() })
        );

        dag.remove_edge(&a, &b);
        assert_eq!(dag.selection(), None);
    }

    #[test]
    fn rename_enforces_unique_non_empty_names() {
        let (mut dag, a, b, _) = chain();
        dag.rename(&a, "  extract  ").unwrap();
        assert_eq!(dag.node(&a).unwrap().name, "extract");

        assert!(matches!(dag.rename(&b, "extract"), Err(EngineError::DuplicateName(_))));
        assert!(matches!(dag.rename(&b, "   "), Err(EngineError::Validation(_))));
        dag.rename(&a, "extract").unwrap();
    }

    #[test]
    fn selecting_a_missing_edge_names_both_ends() {
        let (mut dag, a, _b, c) = chain();
        match dag.select(Selection::Edge { source: a.clone(), target: c.clone() }) {
            Err(EngineError::UnknownEdge { source_id, target_id }) => {
                assert_eq!(source_id, a);
                assert_eq!(target_id, c);
            }
            other => panic!("expected UnknownEdge, got {other:?}"),
        }
        assert_eq!(dag.selection(), None);
    }

    proptest! {
        /// Any sequence of proposals over a fixed node set leaves the graph
        /// acyclic, and a rejected proposal never changes it.
        #[test]
        fn edge_proposals_never_create_a_cycle(
            proposals in prop::collection::vec((0usize..8, 0usize..8), 0..120)
        ) {
            let mut dag = DagModel::new();
            let ids: Vec<String> = (0..8).map(|i| add(&mut dag, i)).collect();

            for (s, t) in proposals {
                let before = dag.edges();
                if dag.propose_edge(&ids[s], &ids[t]).is_err() {
                    prop_assert_eq!(dag.edges(), before);
                }
                prop_assert!(!has_cycle(&dag));
            }
            prop_assert_eq!(dag.topological_order().len(), 8);
        }
    }
}
