//! Core domain types for the research pipeline
//!
//! A job traverses a fixed step sequence; the checkpoint is the durable
//! per-job state document the engine reads and writes between steps.

mod checkpoint;
mod job;
mod package;
mod priority;
mod source;

pub use checkpoint::{Checkpoint, CheckpointStatus, ErrorEntry, ErrorKind};
pub use job::Job;
pub use package::Package;
pub use priority::Priority;
pub use source::{Source, Tier};
