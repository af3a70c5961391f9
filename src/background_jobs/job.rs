use super::progress::ProgressTracker;
use crate::error::ConfigurationError;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Unit of a fixed-interval schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn as_secs(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 60 * 60,
            TimeUnit::Days => 24 * 60 * 60,
        }
    }

    fn singular(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "second",
            TimeUnit::Minutes => "minute",
            TimeUnit::Hours => "hour",
            TimeUnit::Days => "day",
        }
    }
}

/// Fixed-interval schedule: run every `count` `unit`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Every {
    pub count: u64,
    pub unit: TimeUnit,
}

impl Every {
    pub fn new(count: u64, unit: TimeUnit) -> Self {
        Self { count, unit }
    }

    pub fn seconds(count: u64) -> Self {
        Self::new(count, TimeUnit::Seconds)
    }

    pub fn minutes(count: u64) -> Self {
        Self::new(count, TimeUnit::Minutes)
    }

    pub fn hours(count: u64) -> Self {
        Self::new(count, TimeUnit::Hours)
    }

    pub fn days(count: u64) -> Self {
        Self::new(count, TimeUnit::Days)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.count.saturating_mul(self.unit.as_secs()))
    }

    /// Reject schedules that would never advance or whose first slot cannot
    /// be represented on the monotonic clock.
    pub fn validate(&self, job_name: &str) -> Result<(), ConfigurationError> {
        if self.count == 0 {
            return Err(ConfigurationError::InvalidSchedule {
                job_name: job_name.to_string(),
                reason: "interval count must be at least 1".to_string(),
            });
        }
        if Instant::now().checked_add(self.interval()).is_none() {
            return Err(ConfigurationError::InvalidSchedule {
                job_name: job_name.to_string(),
                reason: format!("interval of {} is too large", self),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Every {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 1 {
            write!(f, "every 1 {}", self.unit.singular())
        } else {
            write!(f, "every {} {}s", self.count, self.unit.singular())
        }
    }
}

/// Errors a job body can end with. The instrumentation wrapper turns every
/// one of them into an `error` run; none reaches the scheduler.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    ExecutionFailed(String),

    #[error("job panicked: {0}")]
    Panicked(String),
}

/// A unit of background work.
///
/// Jobs are executed synchronously in a blocking context and report their
/// progress through the tracker they are handed for the current run.
pub trait BackgroundJob: Send + Sync {
    fn execute(&self, progress: &mut ProgressTracker) -> Result<(), JobError>;
}

impl<F> BackgroundJob for F
where
    F: Fn(&mut ProgressTracker) -> Result<(), JobError> + Send + Sync,
{
    fn execute(&self, progress: &mut ProgressTracker) -> Result<(), JobError> {
        self(progress)
    }
}
