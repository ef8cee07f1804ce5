//! Background compilation scheduling.
//!
//! [`CompilationSet`] is a deduplicating work queue with a concurrency budget
//! that switches between a foreground and a background thread count.
//! [`CompilationWorkers`] drains it from a dedicated scheduler thread and runs
//! each task on a rayon pool.

#![warn(missing_docs)]

pub mod error;
pub mod set;
pub mod stats;
pub mod task;
pub mod token;
pub mod workers;

pub use error::SchedulerError;
pub use set::{CompilationSet, TaskOutcome};
pub use stats::{format_hms, CompilationStats};
pub use task::CompilationTask;
pub use token::CancellationToken;
pub use workers::{CompilationWorkers, TaskRunner};
