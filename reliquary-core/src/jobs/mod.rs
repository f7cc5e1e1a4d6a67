//! Background job model and the runner that executes jobs.

pub mod job;
pub mod runner;

pub use job::{JobHandle, JobId, JobKind, JobPayload, JobRecord, JobState};
pub use runner::{DispatchStatus, JobDispatcher, JobRunner};
