//! `monitor` crate — execution log polling and run triggering.
//!
//! Depends on the backend capability traits only; nothing here can reach
//! the workflow graph.

pub mod poller;
pub mod trigger;

pub use poller::{LogPoller, LogView, PollerConfig};
pub use trigger::{run_and_watch, RunTrigger, TriggerConfig, TriggerOutcome};
