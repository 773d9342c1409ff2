pub mod catalog;
pub mod runs;
pub mod time_plans;
pub mod workflows;
