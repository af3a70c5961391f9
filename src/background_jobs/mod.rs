//! Background job scheduling and instrumented execution.
//!
//! Jobs are wrapped by [`InstrumentationWrapper`] so that every run reports
//! its lifecycle, progress and outcome to the metrics sink, then registered on
//! a [`JobScheduler`] that triggers them on fixed intervals.

mod instrumented;
mod job;
pub mod jobs;
mod progress;
mod registry;
mod scheduler;

pub use instrumented::{InstrumentationWrapper, InstrumentedJob, JobRun, RunStatus};
pub use job::{BackgroundJob, Every, JobError, TimeUnit};
pub use progress::ProgressTracker;
pub use registry::{JobRegistry, ScheduledJob};
pub use scheduler::JobScheduler;
