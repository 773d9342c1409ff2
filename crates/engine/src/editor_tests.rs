//! Scenario tests for the canvas editor.
//!
//! Every test drives an `Editor<MemorySurface>` through gestures and checks
//! the DAG and the surface agree afterwards. `MemoryBackend` stands in for
//! the REST backend and records every call, so "no request was made" is
//! asserted through its call log.

use backend::models::{ModelType, TaskDetail, TimePlan, WorkflowId};
use backend::MemoryBackend;
use chrono::NaiveDate;
use surface::{CellId, EditMode, GraphSurface, MemorySurface, NodeAction, Point};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::save;
use crate::{
    save_time_plan, CatalogConfig, Editor, EngineError, Gesture, Level, NodeCommand,
    NodeDefinition, PlanSaved,
};

// ============================================================
// Fixtures
// ============================================================

fn editor() -> (Editor<MemorySurface>, UnboundedReceiver<NodeCommand>) {
    Editor::new(CatalogConfig::default(), MemorySurface::new)
}

fn definition(id: i64) -> NodeDefinition {
    NodeDefinition {
        model_id: id,
        model_type: ModelType::Sync,
        name: format!("task {id}"),
    }
}

/// Drop catalog task `id` and return the new node's cell.
fn drop_task(ed: &mut Editor<MemorySurface>, id: i64) -> CellId {
    let position = Point::new(id as f64 * 120.0, 40.0);
    let notice = ed.handle(Gesture::Drop { definition: Some(definition(id)), position });
    assert_eq!(notice, None, "drop of task {id} should be accepted");
    ed.surface().nodes().last().expect("node drawn").cell
}

fn connect(ed: &mut Editor<MemorySurface>, source: CellId, target: CellId) {
    assert_eq!(ed.handle(Gesture::Connect { source, target }), None);
}

fn backend_with_tasks(ids: &[i64]) -> MemoryBackend {
    let backend = MemoryBackend::new();
    for &id in ids {
        backend.add_task(
            ModelType::Sync,
            TaskDetail {
                id,
                name: format!("task {id}"),
                source_table: Some(format!("src_{id}")),
                target_table: Some(format!("dst_{id}")),
            },
        );
    }
    backend
}

/// Save a two-node chain `1 → 2` and return its id.
async fn saved_chain(backend: &MemoryBackend) -> WorkflowId {
    let (mut ed, _rx) = editor();
    ed.set_name("nightly import");
    let a = drop_task(&mut ed, 1);
    let b = drop_task(&mut ed, 2);
    connect(&mut ed, a, b);
    ed.save(backend).await.expect("save succeeds");
    ed.meta().id.expect("id assigned on create")
}

fn plan(start: NaiveDate, end: Option<NaiveDate>) -> TimePlan {
    TimePlan {
        frequency: 1,
        execution_time: "02:30".into(),
        start_date: start,
        end_date: end,
        activation: true,
    }
}

// ============================================================
// Connecting
// ============================================================

#[test]
fn closing_a_cycle_is_rejected_and_the_drawn_edge_rolled_back() {
    let (mut ed, _rx) = editor();
    let a = drop_task(&mut ed, 1);
    let b = drop_task(&mut ed, 2);
    let c = drop_task(&mut ed, 3);
    connect(&mut ed, a, b);
    connect(&mut ed, b, c);

    // The canvas library draws the edge before the gesture is reported.
    ed.surface_mut().add_edge(c, a).unwrap();
    let notice = ed.handle(Gesture::Connect { source: c, target: a }).expect("rejected");

    assert_eq!(notice.level, Level::Warning);
    assert!(notice.message.contains("ancestor"), "got: {}", notice.message);
    assert_eq!(ed.dag().edges().len(), 2);
    assert_eq!(ed.surface().edges().len(), 2);
    assert!(ed.surface().find_edge(c, a).is_none());
}

#[test]
fn self_loop_is_rejected() {
    let (mut ed, _rx) = editor();
    let a = drop_task(&mut ed, 1);

    let notice = ed.handle(Gesture::Connect { source: a, target: a }).expect("rejected");
    assert_eq!(notice.level, Level::Warning);
    assert!(ed.dag().edges().is_empty());
    assert!(ed.surface().edges().is_empty());
}

#[test]
fn reconnecting_an_existing_edge_keeps_it_drawn() {
    let (mut ed, _rx) = editor();
    let a = drop_task(&mut ed, 1);
    let b = drop_task(&mut ed, 2);
    connect(&mut ed, a, b);

    let notice = ed.handle(Gesture::Connect { source: a, target: b }).expect("duplicate");
    assert_eq!(notice.level, Level::Info);
    assert_eq!(ed.surface().edges().len(), 1);
    assert_eq!(ed.dag().edges().len(), 1);
}

#[test]
fn diamond_is_accepted() {
    let (mut ed, _rx) = editor();
    let a = drop_task(&mut ed, 1);
    let b = drop_task(&mut ed, 2);
    let c = drop_task(&mut ed, 3);
    let d = drop_task(&mut ed, 4);
    connect(&mut ed, a, b);
    connect(&mut ed, a, c);
    connect(&mut ed, b, d);
    connect(&mut ed, c, d);

    let sink = ed.node_of(d).unwrap().to_owned();
    assert_eq!(ed.dag().node(&sink).unwrap().pre_node_id.len(), 2);
    assert_eq!(ed.surface().edges().len(), 4);
}

// ============================================================
// Deleting and selecting
// ============================================================

#[test]
fn deleting_a_node_removes_its_edges_everywhere() {
    let (mut ed, _rx) = editor();
    let a = drop_task(&mut ed, 1);
    let b = drop_task(&mut ed, 2);
    let c = drop_task(&mut ed, 3);
    connect(&mut ed, a, b);
    connect(&mut ed, b, c);
    ed.handle(Gesture::Select(b));

    assert_eq!(ed.handle(Gesture::DeleteNode(b)), None);

    assert_eq!(ed.dag().len(), 2);
    assert!(ed.dag().edges().is_empty());
    assert!(ed.surface().edges().is_empty());
    assert_eq!(ed.surface().nodes().len(), 2);
    assert!(ed.dag().selection().is_none());
    assert_eq!(ed.surface().highlighted(), None);
    assert!(!ed.catalog().is_placed(ModelType::Sync, 2));
}

#[test]
fn deleting_an_edge_updates_predecessors() {
    let (mut ed, _rx) = editor();
    let a = drop_task(&mut ed, 1);
    let b = drop_task(&mut ed, 2);
    connect(&mut ed, a, b);
    let edge = ed.surface().find_edge(a, b).unwrap();

    assert_eq!(ed.handle(Gesture::DeleteEdge(edge)), None);

    let target = ed.node_of(b).unwrap().to_owned();
    assert!(ed.dag().node(&target).unwrap().pre_node_id.is_empty());
    assert!(ed.surface().edges().is_empty());
}

#[test]
fn selecting_an_edge_highlights_it() {
    let (mut ed, _rx) = editor();
    let a = drop_task(&mut ed, 1);
    let b = drop_task(&mut ed, 2);
    connect(&mut ed, a, b);
    let edge = ed.surface().find_edge(a, b).unwrap();

    assert_eq!(ed.handle(Gesture::Select(edge)), None);
    assert_eq!(ed.surface().highlighted(), Some(edge));
    assert!(matches!(ed.dag().selection(), Some(crate::Selection::Edge { .. })));

    ed.handle(Gesture::ClearSelection);
    assert_eq!(ed.surface().highlighted(), None);
    assert!(ed.dag().selection().is_none());
}

#[test]
fn rename_updates_the_drawn_label_and_rejects_duplicates() {
    let (mut ed, _rx) = editor();
    let a = drop_task(&mut ed, 1);
    let b = drop_task(&mut ed, 2);

    assert_eq!(ed.handle(Gesture::Rename { cell: a, name: "  extract  ".into() }), None);
    assert_eq!(ed.surface().node(a).unwrap().data.label, "extract");

    let notice = ed.handle(Gesture::Rename { cell: b, name: "extract".into() }).unwrap();
    assert_eq!(notice.level, Level::Warning);
    assert_eq!(ed.surface().node(b).unwrap().data.label, "task 2");
}

// ============================================================
// Catalog placement
// ============================================================

#[tokio::test]
async fn placing_the_same_catalog_item_twice_is_a_no_op() {
    let backend = backend_with_tasks(&[1, 2]);
    let (mut ed, _rx) = editor();
    ed.catalog_mut().load_more(&backend, ModelType::Sync).await.unwrap();

    assert_eq!(ed.place(ModelType::Sync, 1, Point::new(0.0, 0.0)), None);
    assert_eq!(ed.place(ModelType::Sync, 1, Point::new(50.0, 0.0)), None);
    assert_eq!(ed.dag().len(), 1);
    assert_eq!(ed.surface().nodes().len(), 1);
    assert!(ed.catalog().items(ModelType::Sync)[0].placed);

    // A raw drop carrying the same definition leaves the model unchanged too.
    let notice = ed
        .handle(Gesture::Drop { definition: Some(definition(1)), position: Point::new(9.0, 9.0) })
        .unwrap();
    assert_eq!(notice.level, Level::Info);
    assert_eq!(ed.dag().len(), 1);

    let cell = ed.surface().nodes()[0].cell;
    ed.handle(Gesture::DeleteNode(cell));
    assert_eq!(ed.place(ModelType::Sync, 1, Point::new(0.0, 0.0)), None);
    assert_eq!(ed.dag().len(), 1);
}

#[test]
fn drop_without_payload_is_refused() {
    let (mut ed, _rx) = editor();
    let notice = ed
        .handle(Gesture::Drop { definition: None, position: Point::new(0.0, 0.0) })
        .unwrap();
    assert_eq!(notice.level, Level::Warning);
    assert!(ed.dag().is_empty());
    assert!(ed.surface().nodes().is_empty());
}

// ============================================================
// Saving
// ============================================================

#[tokio::test]
async fn empty_workflow_is_rejected_before_any_request() {
    let backend = MemoryBackend::new();
    let (mut ed, _rx) = editor();
    ed.set_name("empty");

    let err = ed.save(&backend).await.unwrap_err();

    assert!(matches!(err, EngineError::EmptyWorkflow));
    assert_eq!(err.to_string(), "add at least one node");
    assert_eq!(backend.call_count(""), 0);
}

#[tokio::test]
async fn unnamed_workflow_is_rejected_before_any_request() {
    let backend = MemoryBackend::new();
    let (mut ed, _rx) = editor();
    drop_task(&mut ed, 1);

    let err = ed.save(&backend).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(backend.call_count(""), 0);
}

#[tokio::test]
async fn first_save_creates_then_later_saves_update() {
    let backend = MemoryBackend::new();
    let (mut ed, _rx) = editor();
    ed.set_name("nightly import");
    let a = drop_task(&mut ed, 1);
    let b = drop_task(&mut ed, 2);
    connect(&mut ed, a, b);

    ed.save(&backend).await.unwrap();
    assert_eq!(ed.mode(), EditMode::Edit);
    let id = ed.meta().id.unwrap();
    assert_eq!(backend.call_count("create_workflow"), 1);

    drop_task(&mut ed, 3);
    ed.save(&backend).await.unwrap();
    assert_eq!(backend.call_count("create_workflow"), 1);
    assert_eq!(backend.call_count("update_graph"), 1);
    assert_eq!(backend.workflow(id).unwrap().nodes.len(), 3);
}

#[tokio::test]
async fn second_save_is_blocked_while_first_is_pending() {
    let backend = MemoryBackend::new();
    let (mut ed, _rx) = editor();
    ed.set_name("nightly import");
    drop_task(&mut ed, 1);

    let (plan, guard) = ed.prepare_save().unwrap();
    assert!(ed.save_gate().is_busy());
    assert!(matches!(ed.prepare_save(), Err(EngineError::SaveInProgress)));

    // Editing continues while the request is in flight.
    drop_task(&mut ed, 2);
    assert_eq!(ed.dag().len(), 2);

    let saved = save::submit(&backend, plan, guard).await.unwrap();
    ed.complete_save(&saved);
    assert!(!ed.save_gate().is_busy());

    // The pending edit goes out with the next save.
    ed.save(&backend).await.unwrap();
    let id = ed.meta().id.unwrap();
    assert_eq!(backend.workflow(id).unwrap().nodes.len(), 2);
}

#[tokio::test]
async fn failed_save_releases_the_gate() {
    let backend = MemoryBackend::new();
    backend.fail("create_workflow", 500, None, "database unavailable");
    let (mut ed, _rx) = editor();
    ed.set_name("nightly import");
    drop_task(&mut ed, 1);

    let err = ed.save(&backend).await.unwrap_err();
    assert!(matches!(err, EngineError::Backend(_)));
    assert!(!ed.save_gate().is_busy());
    assert_eq!(ed.mode(), EditMode::Create);
}

// ============================================================
// Loading
// ============================================================

#[tokio::test]
async fn load_materializes_nodes_then_edges() {
    let backend = backend_with_tasks(&[1, 2]);
    let id = saved_chain(&backend).await;

    let (mut ed, _rx) = editor();
    let notices = ed
        .load(&backend, &backend, id, EditMode::Edit, &CancellationToken::new())
        .await
        .unwrap();

    assert!(notices.is_empty());
    assert_eq!(ed.mode(), EditMode::Edit);
    assert_eq!(ed.meta().name, "nightly import");
    assert_eq!(ed.surface().nodes().len(), 2);
    assert_eq!(ed.surface().edges().len(), 1);
    assert_eq!(ed.dag().edges().len(), 1);
    assert!(ed.catalog().is_placed(ModelType::Sync, 1));
    assert!(ed.catalog().is_placed(ModelType::Sync, 2));

    let details: Vec<_> = ed.surface().nodes().into_iter().map(|n| n.data.detail).collect();
    assert!(details.contains(&Some("src_1 → dst_1".to_owned())));
}

#[tokio::test]
async fn preview_mode_is_read_only() {
    let backend = backend_with_tasks(&[1, 2]);
    let id = saved_chain(&backend).await;

    let (mut ed, mut rx) = editor();
    ed.load(&backend, &backend, id, EditMode::Preview, &CancellationToken::new())
        .await
        .unwrap();
    let cells: Vec<CellId> = ed.surface().nodes().iter().map(|n| n.cell).collect();

    let notice = ed
        .handle(Gesture::Drop { definition: Some(definition(9)), position: Point::new(0.0, 0.0) })
        .unwrap();
    assert_eq!(notice.message, EngineError::ReadOnly.to_string());
    assert!(ed.handle(Gesture::DeleteNode(cells[0])).is_some());
    assert_eq!(ed.dag().len(), 2);
    assert!(matches!(ed.prepare_save(), Err(EngineError::ReadOnly)));

    // Selection still works, and the node menu offers run actions only.
    assert_eq!(ed.handle(Gesture::Select(cells[0])), None);
    assert_eq!(ed.surface().menu(cells[0]).unwrap(), &[NodeAction::Run, NodeAction::ViewLogs]);
    assert!(!ed.surface().click(cells[0], NodeAction::Delete).unwrap());
    assert!(ed.surface().click(cells[0], NodeAction::Run).unwrap());

    let command = rx.try_recv().unwrap();
    assert_eq!(command.action, NodeAction::Run);
    assert_eq!(Some(command.node_id.as_str()), ed.node_of(cells[0]));
}

#[tokio::test]
async fn healed_entries_are_reported_as_one_warning() {
    let backend = backend_with_tasks(&[1, 2]);
    let id = saved_chain(&backend).await;
    let mut doc = backend.workflow(id).unwrap();
    doc.nodes[0].pre_node_id.push("ghost".into());
    backend.insert_workflow(doc);

    let (mut ed, _rx) = editor();
    let notices = ed
        .load(&backend, &backend, id, EditMode::Edit, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, Level::Warning);
    assert_eq!(ed.dag().edges().len(), 1);
}

#[tokio::test]
async fn cancelled_load_leaves_the_editor_untouched() {
    let backend = backend_with_tasks(&[1, 2]);
    let id = saved_chain(&backend).await;

    let (mut ed, _rx) = editor();
    drop_task(&mut ed, 7);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = ed.load(&backend, &backend, id, EditMode::Edit, &cancel).await.unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert_eq!(ed.dag().len(), 1);
    assert_eq!(ed.mode(), EditMode::Create);
    assert_eq!(ed.meta().id, None);
}

#[tokio::test]
async fn reset_starts_a_new_workflow() {
    let backend = backend_with_tasks(&[1, 2]);
    let id = saved_chain(&backend).await;
    let (mut ed, _rx) = editor();
    ed.load(&backend, &backend, id, EditMode::Edit, &CancellationToken::new())
        .await
        .unwrap();

    ed.reset();

    assert_eq!(ed.mode(), EditMode::Create);
    assert!(ed.dag().is_empty());
    assert!(ed.surface().nodes().is_empty());
    assert!(!ed.catalog().is_placed(ModelType::Sync, 1));
}

// ============================================================
// Time plans
// ============================================================

#[tokio::test]
async fn end_date_before_start_date_is_rejected_without_a_request() {
    let backend = MemoryBackend::new();
    let start = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
    let end = start.pred_opt().unwrap();

    let err = save_time_plan(&backend, WorkflowId::new_v4(), &plan(start, Some(end)))
        .await
        .unwrap_err();

    match err {
        EngineError::Validation(errors) => {
            assert!(errors.field_errors().contains_key("end_date"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(backend.call_count(""), 0);
}

#[tokio::test]
async fn time_plan_is_created_once_then_updated() {
    let backend = backend_with_tasks(&[1, 2]);
    let id = saved_chain(&backend).await;
    let start = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

    let first = save_time_plan(&backend, id, &plan(start, None)).await.unwrap();
    let second = save_time_plan(&backend, id, &plan(start, Some(start))).await.unwrap();

    assert_eq!(first, PlanSaved::Created);
    assert_eq!(second, PlanSaved::Updated);
    assert_eq!(backend.call_count("create_time_plan"), 1);
    assert_eq!(backend.call_count("update_time_plan"), 1);
}
