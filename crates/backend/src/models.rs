//! Wire structs exchanged with the workflow backend.
//!
//! These are *transport* models. They carry no graph behaviour; the DAG
//! model and its invariants live in the `engine` crate.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

/// Backend id of a sync or process task definition.
pub type TaskId = i64;

/// Backend id of a workflow.
pub type WorkflowId = Uuid;

// ---------------------------------------------------------------------------
// Task catalog
// ---------------------------------------------------------------------------

/// The two categories of task that can be placed as a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    Sync,
    Process,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "SYNC"),
            Self::Process => write!(f, "PROCESS"),
        }
    }
}

impl std::str::FromStr for ModelType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SYNC" => Ok(Self::Sync),
            "PROCESS" => Ok(Self::Process),
            other => Err(format!("unknown model type: {other}")),
        }
    }
}

/// One row of a catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: TaskId,
    pub name: String,
}

/// Task-type-specific detail fetched in a second round-trip per item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDetail {
    pub id: TaskId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_table: Option<String>,
}

/// Keyword-filtered page request against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CatalogQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self { items: Vec::new(), total: 0 }
    }
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

/// Adjacency record of one node, decoupled from layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireNode {
    pub node_id: String,
    pub model_id: TaskId,
    pub model_type: ModelType,
    #[serde(default)]
    pub pre_node_id: Vec<String>,
}

/// Layout coordinate as stored inside the `canvas` string.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Presentational record of one node inside the `canvas` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasEntry {
    pub id: String,
    pub position: Position,
    pub name: String,
}

/// A persisted workflow as returned by `GET /workflows/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    pub nodes: Vec<WireNode>,
    /// JSON-encoded array of [`CanvasEntry`], kept opaque on the wire.
    pub canvas: String,
}

/// Body of `POST /workflows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct WorkflowDraft {
    #[validate(length(min = 1, max = 64, message = "workflow name must be 1-64 characters"))]
    pub name: String,
    #[validate(length(max = 256, message = "description cannot exceed 256 characters"))]
    #[serde(default)]
    pub description: String,
    pub nodes: Vec<WireNode>,
    pub canvas: String,
}

/// Body of `PUT /workflows/{id}/graph`.
///
/// Adjacency and layout travel in one request so they persist together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphUpdate {
    pub nodes: Vec<WireNode>,
    pub canvas: String,
}

/// Body of `PUT /workflows/{id}/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub enabled: bool,
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Run history
// ---------------------------------------------------------------------------

/// What a run or a run-history query is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RunTarget {
    SyncTask(TaskId),
    ProcessTask(TaskId),
    Workflow(WorkflowId),
}

impl RunTarget {
    /// Target for a node referencing the given task definition.
    pub fn for_task(model_type: ModelType, model_id: TaskId) -> Self {
        match model_type {
            ModelType::Sync => Self::SyncTask(model_id),
            ModelType::Process => Self::ProcessTask(model_id),
        }
    }

    /// Resource path of this target, e.g. `/sync-tasks/7`.
    pub fn path(&self) -> String {
        match self {
            Self::SyncTask(id) => format!("/sync-tasks/{id}"),
            Self::ProcessTask(id) => format!("/process-tasks/{id}"),
            Self::Workflow(id) => format!("/workflows/{id}"),
        }
    }
}

impl std::fmt::Display for RunTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SyncTask(id) => write!(f, "sync task {id}"),
            Self::ProcessTask(id) => write!(f, "process task {id}"),
            Self::Workflow(id) => write!(f, "workflow {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failure,
    Running,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
            Self::Running => write!(f, "RUNNING"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            "RUNNING" => Ok(Self::Running),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// How a run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMethod {
    Manual,
    Scheduled,
}

impl ExecutionMethod {
    fn from_schedule_flag(scheduled: bool) -> Self {
        if scheduled { Self::Scheduled } else { Self::Manual }
    }

    fn is_scheduled(self) -> bool {
        matches!(self, Self::Scheduled)
    }
}

/// One execution record, unified across the three log endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: i64,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Rows moved; only sync runs report it.
    pub sync_count: Option<u64>,
    pub sync_method: ExecutionMethod,
}

/// Row shape of `GET /sync-tasks/{id}/logs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogRow {
    pub id: i64,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub sync_count: u64,
    pub schedule_execute: bool,
}

/// Row shape of `GET /process-tasks/{id}/logs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessLogRow {
    pub id: i64,
    pub state: RunStatus,
    pub begin_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
    pub schedule_execute: bool,
}

/// Row shape of `GET /workflows/{id}/logs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowLogRow {
    pub id: i64,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub schedule_execute: bool,
}

impl From<SyncLogRow> for RunLogEntry {
    fn from(row: SyncLogRow) -> Self {
        Self {
            id: row.id,
            status: row.status,
            start_time: row.start_time,
            end_time: row.end_time,
            sync_count: Some(row.sync_count),
            sync_method: ExecutionMethod::from_schedule_flag(row.schedule_execute),
        }
    }
}

impl From<ProcessLogRow> for RunLogEntry {
    fn from(row: ProcessLogRow) -> Self {
        Self {
            id: row.id,
            status: row.state,
            start_time: row.begin_time,
            end_time: row.finish_time,
            sync_count: None,
            sync_method: ExecutionMethod::from_schedule_flag(row.schedule_execute),
        }
    }
}

impl From<WorkflowLogRow> for RunLogEntry {
    fn from(row: WorkflowLogRow) -> Self {
        Self {
            id: row.id,
            status: row.status,
            start_time: row.start_time,
            end_time: row.end_time,
            sync_count: None,
            sync_method: ExecutionMethod::from_schedule_flag(row.schedule_execute),
        }
    }
}

impl From<&RunLogEntry> for SyncLogRow {
    fn from(e: &RunLogEntry) -> Self {
        Self {
            id: e.id,
            status: e.status,
            start_time: e.start_time,
            end_time: e.end_time,
            sync_count: e.sync_count.unwrap_or(0),
            schedule_execute: e.sync_method.is_scheduled(),
        }
    }
}

impl From<&RunLogEntry> for ProcessLogRow {
    fn from(e: &RunLogEntry) -> Self {
        Self {
            id: e.id,
            state: e.status,
            begin_time: e.start_time,
            finish_time: e.end_time,
            schedule_execute: e.sync_method.is_scheduled(),
        }
    }
}

impl From<&RunLogEntry> for WorkflowLogRow {
    fn from(e: &RunLogEntry) -> Self {
        Self {
            id: e.id,
            status: e.status,
            start_time: e.start_time,
            end_time: e.end_time,
            schedule_execute: e.sync_method.is_scheduled(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    StartTime,
    EndTime,
    SyncCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Paginated, sorted and filtered run-history request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogQuery {
    pub offset: u32,
    pub limit: u32,
    pub sort: SortColumn,
    pub direction: SortDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(
        rename = "scheduleExecute",
        default,
        skip_serializing_if = "Option::is_none",
        with = "schedule_flag"
    )]
    pub method: Option<ExecutionMethod>,
}

impl LogQuery {
    /// First page of the default view: newest runs first, no filters.
    pub fn first_page(limit: u32) -> Self {
        Self {
            offset: 0,
            limit,
            sort: SortColumn::default(),
            direction: SortDirection::default(),
            status: None,
            method: None,
        }
    }

    /// Filter, sort and paginate `entries` the way the backend does.
    pub fn apply(&self, entries: &[RunLogEntry]) -> Page<RunLogEntry> {
        let mut matching: Vec<RunLogEntry> = entries
            .iter()
            .filter(|e| self.status.map_or(true, |s| e.status == s))
            .filter(|e| self.method.map_or(true, |m| e.sync_method == m))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ord = match self.sort {
                SortColumn::StartTime => a.start_time.cmp(&b.start_time),
                SortColumn::EndTime => a.end_time.cmp(&b.end_time),
                SortColumn::SyncCount => a.sync_count.cmp(&b.sync_count),
            };
            match self.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect();
        Page { items, total }
    }
}

/// `scheduleExecute` travels as a boolean.
mod schedule_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::ExecutionMethod;

    pub fn serialize<S: Serializer>(
        method: &Option<ExecutionMethod>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match method {
            Some(m) => serializer.serialize_bool(m.is_scheduled()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ExecutionMethod>, D::Error> {
        let flag = Option::<bool>::deserialize(deserializer)?;
        Ok(flag.map(ExecutionMethod::from_schedule_flag))
    }
}

// ---------------------------------------------------------------------------
// Time plan
// ---------------------------------------------------------------------------

/// Recurring-trigger configuration owned 1:1 by a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TimePlan {
    /// Repeat every `frequency` days.
    #[validate(range(min = 1, max = 31, message = "frequency must be between 1 and 31 days"))]
    pub frequency: u8,
    /// Time of day, `HH:mm`.
    #[validate(custom(function = "validate_execution_time"))]
    pub execution_time: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub activation: bool,
}

impl TimePlan {
    /// Field-level validation, including the cross-field date ordering.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(e) => e,
        };

        if let Some(end) = self.end_date {
            if end < self.start_date {
                let mut error = ValidationError::new("end_before_start");
                error.message = Some(Cow::Borrowed("end date must not precede start date"));
                errors.add("end_date", error);
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn validate_execution_time(value: &str) -> Result<(), ValidationError> {
    let well_formed = value.len() == 5
        && value.as_bytes()[2] == b':'
        && NaiveTime::parse_from_str(value, "%H:%M").is_ok();
    if well_formed {
        Ok(())
    } else {
        let mut error = ValidationError::new("execution_time");
        error.message = Some(Cow::Borrowed("execution time must be HH:mm"));
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn plan(start: NaiveDate, end: Option<NaiveDate>) -> TimePlan {
        TimePlan {
            frequency: 1,
            execution_time: "02:30".into(),
            start_date: start,
            end_date: end,
            activation: true,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn end_date_before_start_is_a_field_error() {
        let err = plan(day(10), Some(day(9))).check().unwrap_err();
        assert!(err.field_errors().contains_key("end_date"));
    }

    #[test]
    fn same_day_end_is_valid() {
        assert!(plan(day(10), Some(day(10))).check().is_ok());
        assert!(plan(day(10), None).check().is_ok());
    }

    #[test]
    fn frequency_and_time_are_range_checked() {
        let mut p = plan(day(1), None);
        p.frequency = 0;
        p.execution_time = "7:5".into();
        let err = p.check().unwrap_err();
        let fields = err.field_errors();
        assert!(fields.contains_key("frequency"));
        assert!(fields.contains_key("execution_time"));

        p.frequency = 32;
        p.execution_time = "24:00".into();
        let err = p.check().unwrap_err();
        assert!(err.field_errors().contains_key("frequency"));
        assert!(err.field_errors().contains_key("execution_time"));
    }

    #[test]
    fn process_rows_unify_without_sync_count() {
        let row = ProcessLogRow {
            id: 3,
            state: RunStatus::Running,
            begin_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            finish_time: None,
            schedule_execute: true,
        };
        let entry = RunLogEntry::from(row);
        assert_eq!(entry.status, RunStatus::Running);
        assert_eq!(entry.sync_count, None);
        assert_eq!(entry.sync_method, ExecutionMethod::Scheduled);
    }

    #[test]
    fn log_query_filters_sorts_and_pages() {
        let at = |h| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap();
        let entry = |id, h, status| RunLogEntry {
            id,
            status,
            start_time: at(h),
            end_time: None,
            sync_count: Some(id as u64),
            sync_method: ExecutionMethod::Manual,
        };
        let entries = vec![
            entry(1, 1, RunStatus::Success),
            entry(2, 2, RunStatus::Failure),
            entry(3, 3, RunStatus::Success),
            entry(4, 4, RunStatus::Success),
        ];

        let mut query = LogQuery::first_page(2);
        query.status = Some(RunStatus::Success);
        let page = query.apply(&entries);
        assert_eq!(page.total, 3);
        assert_eq!(page.items.iter().map(|e| e.id).collect::<Vec<_>>(), vec![4, 3]);

        query.offset = 2;
        let page = query.apply(&entries);
        assert_eq!(page.items.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn schedule_filter_travels_as_boolean() {
        let mut query = LogQuery::first_page(10);
        query.method = Some(ExecutionMethod::Scheduled);
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["scheduleExecute"], serde_json::json!(true));

        query.method = None;
        let json = serde_json::to_value(&query).unwrap();
        assert!(json.get("scheduleExecute").is_none());
    }
}
