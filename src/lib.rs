//! Instrumented background jobs
//!
//! Runs periodic jobs on fixed intervals and reports each run's lifecycle,
//! progress and outcome as metrics.

pub mod background_jobs;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types for convenience
pub use background_jobs::{
    BackgroundJob, Every, InstrumentationWrapper, InstrumentedJob, JobError, JobRun,
    JobScheduler, ProgressTracker, RunStatus,
};
pub use error::ConfigurationError;
pub use telemetry::{init_telemetry, JobInstruments, MetricsSink, NoopSink, PrometheusSink};
