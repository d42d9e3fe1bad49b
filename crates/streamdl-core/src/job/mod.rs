//! Job model: captured stream metadata, the mutable job record, and its logs.
//!
//! A `Job` is created from a `StreamDescriptor` at enqueue time and is only
//! mutated by the queue manager (status transitions) and by progress
//! observations applied on its behalf.

mod stream;
mod types;

pub use stream::{StreamDescriptor, StreamError};
pub use types::{Job, JobId, JobLogs, JobStatus, ProgressSnapshot};
