//! Instrumentation of job runs.
//!
//! [`InstrumentationWrapper::wrap`] turns any [`BackgroundJob`] into an
//! [`InstrumentedJob`]. Every call to [`InstrumentedJob::run`] is one job run:
//! it emits the lifecycle timestamps, resets and relays progress, classifies
//! the outcome and updates the run counters. Whatever the job body does,
//! including panicking, `run` returns normally.

use super::job::{BackgroundJob, JobError};
use super::progress::ProgressTracker;
use crate::error::ConfigurationError;
use crate::telemetry::instruments::{EVENT_LABEL, JOB_NAME_LABEL, STATUS_LABEL};
use crate::telemetry::JobInstruments;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Outcome of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }

    /// Value written to the `job_last_status` gauge.
    pub fn last_status_value(&self) -> f64 {
        match self {
            RunStatus::Success => 1.0,
            RunStatus::Error => 0.0,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened during one execution of a job.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub processed_count: u64,
    pub total_count: u64,
    /// Whole seconds measured on the monotonic clock.
    pub duration_secs: u64,
    pub error: Option<String>,
}

/// Factory for instrumented jobs sharing one set of instruments.
#[derive(Clone)]
pub struct InstrumentationWrapper {
    instruments: Arc<JobInstruments>,
    show_progress: bool,
}

impl InstrumentationWrapper {
    pub fn new(instruments: Arc<JobInstruments>) -> Self {
        Self {
            instruments,
            show_progress: false,
        }
    }

    /// Draw a terminal progress bar for every run.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn wrap<J>(&self, job_name: &str, job: J) -> Result<InstrumentedJob, ConfigurationError>
    where
        J: BackgroundJob + 'static,
    {
        if job_name.is_empty() {
            return Err(ConfigurationError::EmptyJobName);
        }

        Ok(InstrumentedJob {
            name: job_name.to_string(),
            job: Arc::new(job),
            instruments: Arc::clone(&self.instruments),
            show_progress: self.show_progress,
        })
    }
}

/// A job bound to its name and the shared instruments.
#[derive(Clone)]
pub struct InstrumentedJob {
    name: String,
    job: Arc<dyn BackgroundJob>,
    instruments: Arc<JobInstruments>,
    show_progress: bool,
}

impl fmt::Debug for InstrumentedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedJob")
            .field("name", &self.name)
            .field("show_progress", &self.show_progress)
            .finish_non_exhaustive()
    }
}

impl InstrumentedJob {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute the job once and emit all of its metrics.
    pub fn run(&self) -> JobRun {
        let name = self.name.as_str();
        let instruments = &self.instruments;
        let job_label = [(JOB_NAME_LABEL, name)];

        debug!("job {} started", name);
        let clock = Instant::now();
        let started_at = Utc::now();
        instruments.time.set(
            started_at.timestamp() as f64,
            &[(JOB_NAME_LABEL, name), (EVENT_LABEL, "started")],
        );

        let mut tracker =
            ProgressTracker::new(name, Arc::clone(instruments), self.show_progress);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.job.execute(&mut tracker)))
            .unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(&*payload))));

        let (status, error) = match outcome {
            Ok(()) => (RunStatus::Success, None),
            Err(e) => {
                error!("job {} failed: {}", name, e);
                (RunStatus::Error, Some(e.to_string()))
            }
        };
        instruments
            .status
            .add(1.0, &[(JOB_NAME_LABEL, name), (STATUS_LABEL, status.as_str())]);
        instruments
            .last_status
            .set(status.last_status_value(), &job_label);

        let (processed_count, total_count) = tracker.finish();

        instruments.run_count.add(1.0, &job_label);
        let duration_secs = clock.elapsed().as_secs();
        instruments.duration.set(duration_secs as f64, &job_label);
        let finished_at = Utc::now().max(started_at);
        instruments.time.set(
            finished_at.timestamp() as f64,
            &[(JOB_NAME_LABEL, name), (EVENT_LABEL, "finished")],
        );
        debug!("job {} finished", name);

        JobRun {
            job_name: self.name.clone(),
            started_at,
            finished_at,
            status,
            processed_count,
            total_count,
            duration_secs,
            error,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
