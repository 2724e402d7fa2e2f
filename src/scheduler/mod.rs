//! Scheduler — job-admission queuing, concurrency limiting, and API rate
//! limiting (SPEC_FULL.md §E.3).
//!
//! Meant to sit in front of the Pipeline Engine in a process that dispatches
//! many jobs: `wait_for_slot` blocks a caller until a job may run, honoring a
//! priority queue, a concurrency cap, and a sliding-window rate limit shared
//! across jobs. The single-job `run` CLI command doesn't need admission
//! control and so doesn't call into it directly.

mod config;
mod core;
mod queue;

pub use config::SchedulerConfig;
pub use core::Scheduler;
pub use queue::{QueueEntry, QueueEntryStatus, QueueState, ScheduleResult, ScheduledRequest, SchedulerStats};
