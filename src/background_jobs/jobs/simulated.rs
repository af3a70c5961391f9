//! Randomized stand-in workload.
//!
//! Picks a random number of records, walks through them in batches with a
//! random pause before each batch and fails now and then, so dashboards have
//! something realistic to show.

use crate::background_jobs::{BackgroundJob, JobError, ProgressTracker};
use rand::Rng;
use std::ops::RangeInclusive;
use std::time::Duration;

const TOTAL_CHOICES: [u64; 5] = [50, 100, 150, 200, 250];

#[derive(Debug, Clone)]
pub struct SimulatedWorkload {
    batch_size: u64,
    pause_secs: RangeInclusive<u64>,
    failure_probability: f64,
}

impl Default for SimulatedWorkload {
    fn default() -> Self {
        Self {
            batch_size: 50,
            pause_secs: 3..=10,
            failure_probability: 0.01,
        }
    }
}

impl SimulatedWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pause_secs(mut self, pause_secs: RangeInclusive<u64>) -> Self {
        let (low, high) = pause_secs.into_inner();
        self.pause_secs = low.min(high)..=low.max(high);
        self
    }

    /// Chance for each batch to fail, clamped to `0.0..=1.0`.
    pub fn with_failure_probability(mut self, probability: f64) -> Self {
        self.failure_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl BackgroundJob for SimulatedWorkload {
    fn execute(&self, progress: &mut ProgressTracker) -> Result<(), JobError> {
        let mut rng = rand::rng();
        let total = TOTAL_CHOICES[rng.random_range(0..TOTAL_CHOICES.len())];

        let mut done = 0;
        while done < total {
            let pause = rng.random_range(self.pause_secs.clone());
            std::thread::sleep(Duration::from_secs(pause));

            if rng.random_bool(self.failure_probability) {
                return Err(JobError::ExecutionFailed(format!(
                    "simulated failure after {done} of {total} records"
                )));
            }

            let batch = self.batch_size.min(total - done);
            progress.report(batch, total);
            done += batch;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::{InstrumentationWrapper, RunStatus};
    use crate::telemetry::testing::RecordingSink;
    use crate::telemetry::JobInstruments;
    use std::sync::Arc;

    fn wrapper(sink: &RecordingSink) -> InstrumentationWrapper {
        InstrumentationWrapper::new(Arc::new(JobInstruments::declare(sink, "test").unwrap()))
    }

    #[test]
    fn test_completes_all_records() {
        let sink = RecordingSink::default();
        let workload = SimulatedWorkload::new()
            .with_pause_secs(0..=0)
            .with_failure_probability(0.0);
        let job = wrapper(&sink).wrap("job 1", workload).unwrap();

        let run = job.run();

        assert_eq!(run.status, RunStatus::Success);
        assert!(TOTAL_CHOICES.contains(&run.total_count));
        assert_eq!(run.processed_count, run.total_count);

        let totals: Vec<f64> = sink
            .writes_to("_job_records")
            .into_iter()
            .filter(|w| w.has_label("type", "total"))
            .map(|w| w.value)
            .collect();
        // the initial reset plus one report per batch of 50
        assert_eq!(totals.len() as u64, 1 + run.total_count / 50);
    }

    #[test]
    fn test_failure_before_first_batch() {
        let sink = RecordingSink::default();
        let workload = SimulatedWorkload::new()
            .with_pause_secs(0..=0)
            .with_failure_probability(1.0);
        let job = wrapper(&sink).wrap("job 2", workload).unwrap();

        let run = job.run();

        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.processed_count, 0);
        assert!(run
            .error
            .as_deref()
            .unwrap()
            .starts_with("simulated failure after 0 of"));
    }

    #[test]
    fn test_uneven_batches() {
        let sink = RecordingSink::default();
        let workload = SimulatedWorkload::new()
            .with_pause_secs(0..=0)
            .with_failure_probability(0.0)
            .with_batch_size(40);
        let run = wrapper(&sink).wrap("job 3", workload).unwrap().run();

        assert_eq!(run.processed_count, run.total_count);
    }

    #[test]
    fn test_builder_clamps() {
        let workload = SimulatedWorkload::new()
            .with_failure_probability(3.0)
            .with_batch_size(0);
        assert_eq!(workload.failure_probability, 1.0);
        assert_eq!(workload.batch_size, 1);
    }
}
