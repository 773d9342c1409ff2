//! `surface` crate — the capability interface over a 2D graph canvas.
//!
//! The canvas is a rendering projection only. It owns cell identities,
//! positions and labels, but never graph topology: that lives in the
//! `engine` crate's DAG model, which drives every mutation made here.

pub mod error;
pub mod traits;
pub mod memory;

pub use error::SurfaceError;
pub use memory::MemorySurface;
pub use traits::{
    CellId, EditMode, GraphSurface, NodeAction, NodeData, Point, RenderContext, SurfaceEdge,
    SurfaceNode,
};
