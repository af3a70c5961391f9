use crate::telemetry::instruments::{JOB_NAME_LABEL, TYPE_LABEL};
use crate::telemetry::JobInstruments;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

const PROCESSED: &str = "processed";
const TOTAL: &str = "total";

/// Progress accumulator for a single job run.
///
/// Processed counts add up across reports, the total is whatever the last
/// report said. Both `job_records` gauges are re-emitted after every report.
/// A tracker never outlives the run it was created for.
pub struct ProgressTracker {
    job_name: String,
    instruments: Arc<JobInstruments>,
    processed: u64,
    total: u64,
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    pub(crate) fn new(job_name: &str, instruments: Arc<JobInstruments>, show_progress: bool) -> Self {
        let bar = show_progress.then(|| progress_bar(job_name));
        let tracker = Self {
            job_name: job_name.to_string(),
            instruments,
            processed: 0,
            total: 0,
            bar,
        };
        tracker.emit();
        tracker
    }

    /// Announce that `delta` more records were processed out of `total`.
    pub fn report(&mut self, delta: u64, total: u64) {
        self.processed = self.processed.saturating_add(delta);
        self.total = total;

        if let Some(bar) = &self.bar {
            bar.set_length(total);
            bar.inc(delta);
        }

        self.emit();
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Close the progress bar and hand back `(processed, total)`.
    pub(crate) fn finish(self) -> (u64, u64) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
        (self.processed, self.total)
    }

    fn emit(&self) {
        let records = &self.instruments.records;
        records.set(
            self.processed as f64,
            &[(JOB_NAME_LABEL, self.job_name.as_str()), (TYPE_LABEL, PROCESSED)],
        );
        records.set(
            self.total as f64,
            &[(JOB_NAME_LABEL, self.job_name.as_str()), (TYPE_LABEL, TOTAL)],
        );
    }
}

fn progress_bar(job_name: &str) -> ProgressBar {
    let style = ProgressStyle::with_template("{msg} [{elapsed_precise}] {wide_bar} {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(0)
        .with_style(style)
        .with_message(format!("{job_name} progress"))
}
