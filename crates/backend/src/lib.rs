//! `backend` crate — the workflow REST backend as seen from the editor.
//!
//! Provides the wire DTOs, one capability trait per backend concern, an
//! HTTP client implementing all of them, and an in-memory implementation
//! used as a test double and by the development server.
//! No graph logic lives here.

pub mod error;
pub mod models;
pub mod ports;
pub mod client;
pub mod memory;

pub use client::{BackendConfig, HttpBackend};
pub use error::BackendError;
pub use memory::MemoryBackend;
pub use ports::{RunHistory, RunLauncher, TaskCatalog, TimePlanStore, WorkflowStore};
