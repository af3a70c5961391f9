use super::{Counter, Gauge, InstrumentDesc, MetricsSink};
use crate::error::ConfigurationError;
use std::sync::Arc;

pub const JOB_NAME_LABEL: &str = "job_name";
pub const STATUS_LABEL: &str = "status";
pub const TYPE_LABEL: &str = "type";
pub const EVENT_LABEL: &str = "event";

/// The six instruments every job run writes to.
///
/// Declared once at startup and shared read-only afterwards.
#[derive(Clone)]
pub struct JobInstruments {
    pub run_count: Arc<dyn Counter>,
    pub status: Arc<dyn Counter>,
    pub duration: Arc<dyn Gauge>,
    pub records: Arc<dyn Gauge>,
    pub last_status: Arc<dyn Gauge>,
    pub time: Arc<dyn Gauge>,
}

impl JobInstruments {
    /// Declare all instruments on `sink`, each name prefixed with `prefix_`.
    pub fn declare(sink: &dyn MetricsSink, prefix: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            run_count: sink.counter(&run_count_desc(prefix))?,
            status: sink.counter(&status_desc(prefix))?,
            duration: sink.gauge(&duration_desc(prefix))?,
            records: sink.gauge(&records_desc(prefix))?,
            last_status: sink.gauge(&last_status_desc(prefix))?,
            time: sink.gauge(&time_desc(prefix))?,
        })
    }
}

pub fn run_count_desc(prefix: &str) -> InstrumentDesc {
    InstrumentDesc {
        name: format!("{prefix}_job_run_count"),
        description: "How many times the job has been run",
        unit: "{count}",
        label_names: &[JOB_NAME_LABEL],
    }
}

pub fn status_desc(prefix: &str) -> InstrumentDesc {
    InstrumentDesc {
        name: format!("{prefix}_job_status"),
        description: "Job counter by status (success, error)",
        unit: "{count}",
        label_names: &[JOB_NAME_LABEL, STATUS_LABEL],
    }
}

pub fn duration_desc(prefix: &str) -> InstrumentDesc {
    InstrumentDesc {
        name: format!("{prefix}_job_duration"),
        description: "Job execution duration in seconds",
        unit: "s",
        label_names: &[JOB_NAME_LABEL],
    }
}

pub fn records_desc(prefix: &str) -> InstrumentDesc {
    InstrumentDesc {
        name: format!("{prefix}_job_records"),
        description: "Number of records in job (processed, total)",
        unit: "{count}",
        label_names: &[JOB_NAME_LABEL, TYPE_LABEL],
    }
}

pub fn last_status_desc(prefix: &str) -> InstrumentDesc {
    InstrumentDesc {
        name: format!("{prefix}_job_last_status"),
        description: "Last job status (1, 0)",
        unit: "{status}",
        label_names: &[JOB_NAME_LABEL],
    }
}

pub fn time_desc(prefix: &str) -> InstrumentDesc {
    InstrumentDesc {
        name: format!("{prefix}_job_time"),
        description: "Job start and finish time in unix timestamp (started, finished)",
        unit: "s",
        label_names: &[JOB_NAME_LABEL, EVENT_LABEL],
    }
}
