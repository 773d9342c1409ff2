//! Surface-level error type.

use thiserror::Error;

use crate::CellId;

/// Errors returned by a [`GraphSurface`](crate::GraphSurface) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The referenced cell does not exist on the canvas.
    #[error("unknown cell {0}")]
    UnknownCell(CellId),

    /// An edge between the two cells is already drawn.
    #[error("edge {from} -> {to} already exists")]
    DuplicateEdge { from: CellId, to: CellId },
}
