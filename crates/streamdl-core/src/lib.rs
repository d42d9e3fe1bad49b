pub mod config;
pub mod control;
pub mod job;
pub mod logging;
pub mod progress;
pub mod queue;
pub mod store;
pub mod supervisor;
