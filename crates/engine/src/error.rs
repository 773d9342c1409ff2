//! Engine-level error types and user-facing notices.

use thiserror::Error;
use validator::ValidationErrors;

/// Errors produced by the workflow graph engine.
///
/// `Display` strings are written for the person at the canvas: gesture
/// handlers turn them into [`Notice`]s rather than propagating them.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Structural rejections ------

    /// A drop gesture arrived without a task definition payload.
    #[error("nothing to place: the dragged item carries no task definition")]
    MissingDefinition,

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("no edge from '{source_id}' to '{target_id}'")]
    UnknownEdge { source_id: String, target_id: String },

    /// The proposed edge would close a cycle.
    #[error("cannot connect '{source_id}' to '{target_id}': would reconnect to an ancestor through a second path")]
    CycleRejected { source_id: String, target_id: String },

    #[error("a node cannot be connected to itself")]
    SelfLoop(String),

    #[error("'{source_id}' is already connected to '{target_id}'")]
    DuplicateEdge { source_id: String, target_id: String },

    /// The catalog item already backs a node on this canvas.
    #[error("{model_type} task {model_id} is already placed on the canvas")]
    AlreadyPlaced {
        model_type: backend::models::ModelType,
        model_id: backend::models::TaskId,
    },

    // ------ Validation errors ------

    #[error("add at least one node")]
    EmptyWorkflow,

    #[error("invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("node name '{0}' is already used in this workflow")]
    DuplicateName(String),

    // ------ Editor state ------

    #[error("a save is already in progress")]
    SaveInProgress,

    #[error("the workflow is open read-only")]
    ReadOnly,

    #[error("load cancelled")]
    Cancelled,

    // ------ Data and collaborator errors ------

    /// The persisted `canvas` string is not a JSON layout array.
    #[error("unreadable canvas layout: {0}")]
    InvalidCanvas(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(#[from] backend::BackendError),

    #[error("canvas error: {0}")]
    Surface(#[from] surface::SurfaceError),
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// A human-readable message for the user, shown inline or as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: Level::Info, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: Level::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: Level::Error, message: message.into() }
    }
}

impl From<&EngineError> for Notice {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::AlreadyPlaced { .. } | EngineError::DuplicateEdge { .. } => {
                Notice::info(err.to_string())
            }
            EngineError::CycleRejected { .. }
            | EngineError::SelfLoop(_)
            | EngineError::EmptyWorkflow
            | EngineError::Validation(_)
            | EngineError::DuplicateName(_)
            | EngineError::SaveInProgress
            | EngineError::ReadOnly
            | EngineError::MissingDefinition => Notice::warning(err.to_string()),
            _ => Notice::error(err.to_string()),
        }
    }
}
