use super::instrumented::{InstrumentedJob, JobRun};
use super::job::Every;
use super::registry::{JobRegistry, ScheduledJob};
use crate::error::ConfigurationError;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Runs registered jobs on their fixed-interval schedules.
///
/// Jobs due on the same tick run one after the other in registration order.
/// Each body runs on the blocking pool and the scheduler waits for it to
/// finish before starting the next, so runs never overlap. A job that blocks
/// holds up every other job until it returns.
#[derive(Debug, Default)]
pub struct JobScheduler {
    registry: JobRegistry,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job, first due one interval from now.
    pub fn register(&mut self, job: InstrumentedJob, every: Every) -> Result<(), ConfigurationError> {
        self.register_at(job, every, Instant::now())
    }

    /// Register a job whose schedule starts at `now`.
    pub fn register_at(
        &mut self,
        job: InstrumentedJob,
        every: Every,
        now: Instant,
    ) -> Result<(), ConfigurationError> {
        info!("Registering job: {} - {}", job.name(), every);
        self.registry.register(job, every, now)
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Earliest instant at which any job becomes due.
    pub fn next_run(&self) -> Option<Instant> {
        self.registry.next_due_at()
    }

    /// Time left until the next job is due, zero if one is already due.
    pub fn idle_time(&self, now: Instant) -> Option<Duration> {
        self.next_run()
            .map(|next| next.saturating_duration_since(now))
    }

    /// Log every registered job, one line each.
    pub fn log_jobs(&self) {
        for job in self.registry.iter() {
            info!("{}", job);
        }
    }

    /// Run every job due at `now` and return the runs in execution order.
    pub async fn run_pending(&mut self, now: Instant) -> Vec<JobRun> {
        let due = self.registry.due_at(now);
        let mut runs = Vec::with_capacity(due.len());

        for index in due {
            let Some(scheduled) = self.registry.get_mut(index) else {
                continue;
            };

            if let Some(run) = execute(scheduled).await {
                runs.push(run);
            }
            scheduled.advance(now.max(Instant::now()));
            match scheduled.next_due_at() {
                Some(next) => debug!(
                    "Job {} next run in {:?}",
                    scheduled.name(),
                    next.saturating_duration_since(Instant::now())
                ),
                None => warn!(
                    "Job {} has no representable next run, it will not run again",
                    scheduled.name()
                ),
            }
        }

        runs
    }

    /// Run every registered job once, right away, whatever its schedule.
    ///
    /// Each job's schedule restarts one interval after its run finished.
    pub async fn run_all(&mut self) -> Vec<JobRun> {
        let mut runs = Vec::with_capacity(self.registry.len());

        for index in 0..self.registry.len() {
            let Some(scheduled) = self.registry.get_mut(index) else {
                continue;
            };

            if let Some(run) = execute(scheduled).await {
                runs.push(run);
            }
            scheduled.reschedule_from(Instant::now());
        }

        runs
    }

    /// Main scheduler loop. Never returns.
    pub async fn run_forever(mut self, tick: Duration) {
        info!(
            "Starting job scheduler with {} registered jobs",
            self.registry.len()
        );
        self.log_jobs();

        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_pending(Instant::now()).await;
        }
    }
}

/// Run one job on the blocking pool and wait for it.
async fn execute(scheduled: &mut ScheduledJob) -> Option<JobRun> {
    let job = scheduled.job().clone();
    let result = tokio::task::spawn_blocking(move || job.run()).await;

    match result {
        Ok(run) => {
            scheduled.mark_run(run.finished_at);
            Some(run)
        }
        Err(e) => {
            // run() contains panics itself, this only fires if the runtime
            // is shutting down underneath us
            error!("Job {} could not be executed: {}", scheduled.name(), e);
            None
        }
    }
}
