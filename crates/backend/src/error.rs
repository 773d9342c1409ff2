//! Typed error type for the backend crate.

use thiserror::Error;

/// Error code the backend returns when a workflow run is requested after
/// every node of the workflow has been deleted.
pub const ALL_NODES_DELETED: &str = "ALL_NODES_DELETED";

/// Error code for a missing record.
pub const NOT_FOUND: &str = "NOT_FOUND";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("http error: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("backend error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::Api {
            status: 404,
            code: Some(NOT_FOUND.to_owned()),
            message: format!("{what} not found"),
        }
    }

    /// Domain error code carried by an [`BackendError::Api`] response.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}
