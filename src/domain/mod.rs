pub mod dependency;
pub mod graph;
pub mod task;
pub mod task_validation;
