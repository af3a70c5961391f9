use super::instrumented::InstrumentedJob;
use super::job::Every;
use crate::error::ConfigurationError;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::time::Instant;

/// A registered job together with its scheduling state.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    job: InstrumentedJob,
    every: Every,
    /// `None` once the next slot lies past what the clock can represent.
    next_due_at: Option<Instant>,
    last_run_at: Option<DateTime<Utc>>,
}

impl ScheduledJob {
    pub fn name(&self) -> &str {
        self.job.name()
    }

    pub fn job(&self) -> &InstrumentedJob {
        &self.job
    }

    pub fn every(&self) -> Every {
        self.every
    }

    pub fn next_due_at(&self) -> Option<Instant> {
        self.next_due_at
    }

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due_at.is_some_and(|due| due <= now)
    }

    /// Move to the next slot on the fixed-rate grid that lies after `after`.
    ///
    /// Slots that passed while the job (or another one) was running are
    /// skipped rather than run back to back.
    pub(crate) fn advance(&mut self, after: Instant) {
        let interval = self.every.interval();
        let mut next = self.next_due_at;
        while let Some(due) = next {
            next = due.checked_add(interval);
            if next.is_some_and(|slot| slot > after) {
                break;
            }
        }
        self.next_due_at = next;
    }

    /// Restart the schedule from `from`, used after out-of-schedule runs.
    pub(crate) fn reschedule_from(&mut self, from: Instant) {
        self.next_due_at = from.checked_add(self.every.interval());
    }

    pub(crate) fn mark_run(&mut self, at: DateTime<Utc>) {
        self.last_run_at = Some(at);
    }
}

impl fmt::Display for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last_run = self
            .last_run_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        let next_run = self
            .next_due_at
            .map(|due| format!("in {}s", due.saturating_duration_since(Instant::now()).as_secs()))
            .unwrap_or_else(|| "never".to_string());
        write!(
            f,
            "{} {} (last run: {}, next run {})",
            self.name(),
            self.every,
            last_run,
            next_run
        )
    }
}

/// Named jobs in registration order.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<ScheduledJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `job`, first due one interval after `now`.
    pub fn register(
        &mut self,
        job: InstrumentedJob,
        every: Every,
        now: Instant,
    ) -> Result<(), ConfigurationError> {
        every.validate(job.name())?;
        if self.get(job.name()).is_some() {
            return Err(ConfigurationError::DuplicateJobName(job.name().to_string()));
        }

        let next_due_at = now.checked_add(every.interval()).ok_or_else(|| {
            ConfigurationError::InvalidSchedule {
                job_name: job.name().to_string(),
                reason: format!("interval of {} is too large", every),
            }
        })?;

        self.jobs.push(ScheduledJob {
            job,
            every,
            next_due_at: Some(next_due_at),
            last_run_at: None,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ScheduledJob> {
        self.jobs.iter().find(|job| job.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledJob> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Positions of the jobs due at `now`, in registration order.
    pub fn due_at(&self, now: Instant) -> Vec<usize> {
        self.jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.is_due(now))
            .map(|(index, _)| index)
            .collect()
    }

    /// Earliest due instant across all jobs.
    pub fn next_due_at(&self) -> Option<Instant> {
        self.jobs.iter().filter_map(ScheduledJob::next_due_at).min()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut ScheduledJob> {
        self.jobs.get_mut(index)
    }
}
