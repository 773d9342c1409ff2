//! `engine` crate — the workflow graph, its validation, and the editor that
//! keeps a canvas in step with it.

pub mod models;
pub mod error;
pub mod dag;
pub mod wire;
pub mod catalog;
pub mod save;
pub mod editor;
pub mod schedule;

pub use models::{NodeDefinition, PipelineNode, Selection};
pub use error::{EngineError, Level, Notice};
pub use dag::DagModel;
pub use wire::{from_wire, to_wire, Healed, LoadedGraph, NodeDisplay};
pub use catalog::{debounce, CatalogConfig, CatalogItem, CatalogLoader, SearchBox};
pub use save::{SaveGate, SaveGuard, SavePlan, Saved};
pub use editor::{Editor, Gesture, NodeCommand, WorkflowMeta};
pub use schedule::{save_time_plan, PlanSaved};

#[cfg(test)]
mod editor_tests;
