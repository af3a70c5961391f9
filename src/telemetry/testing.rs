use super::{Counter, Gauge, InstrumentDesc, Labels, MetricsSink};
use crate::error::ConfigurationError;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Add,
    Set,
}

/// One recorded write, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub instrument: String,
    pub kind: WriteKind,
    pub value: f64,
    pub labels: Vec<(String, String)>,
}

impl Write {
    pub fn has_label(&self, key: &str, value: &str) -> bool {
        self.labels.iter().any(|(k, v)| k == key && v == value)
    }
}

/// Sink that keeps every write in memory so tests can assert on order.
#[derive(Clone, Default)]
pub struct RecordingSink {
    writes: Arc<Mutex<Vec<Write>>>,
}

struct Recorder {
    name: String,
    writes: Arc<Mutex<Vec<Write>>>,
}

impl Recorder {
    fn record(&self, kind: WriteKind, value: f64, labels: &Labels<'_>) {
        self.writes.lock().unwrap().push(Write {
            instrument: self.name.clone(),
            kind,
            value,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }
}

impl Counter for Recorder {
    fn add(&self, amount: f64, labels: &Labels<'_>) {
        self.record(WriteKind::Add, amount, labels);
    }
}

impl Gauge for Recorder {
    fn set(&self, value: f64, labels: &Labels<'_>) {
        self.record(WriteKind::Set, value, labels);
    }
}

impl RecordingSink {
    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    /// Writes to instruments whose name ends with `suffix`.
    pub fn writes_to(&self, suffix: &str) -> Vec<Write> {
        self.writes()
            .into_iter()
            .filter(|w| w.instrument.ends_with(suffix))
            .collect()
    }

    /// Sum of all additions to `suffix` carrying the given labels.
    pub fn counter_total(&self, suffix: &str, labels: &Labels<'_>) -> f64 {
        self.writes_to(suffix)
            .iter()
            .filter(|w| labels.iter().all(|(k, v)| w.has_label(k, v)))
            .map(|w| w.value)
            .sum()
    }

    /// Last value set on `suffix` with the given labels.
    pub fn last_gauge(&self, suffix: &str, labels: &Labels<'_>) -> Option<f64> {
        self.writes_to(suffix)
            .iter()
            .rev()
            .find(|w| labels.iter().all(|(k, v)| w.has_label(k, v)))
            .map(|w| w.value)
    }
}

impl MetricsSink for RecordingSink {
    fn counter(&self, desc: &InstrumentDesc) -> Result<Arc<dyn Counter>, ConfigurationError> {
        Ok(Arc::new(Recorder {
            name: desc.name.clone(),
            writes: Arc::clone(&self.writes),
        }))
    }

    fn gauge(&self, desc: &InstrumentDesc) -> Result<Arc<dyn Gauge>, ConfigurationError> {
        Ok(Arc::new(Recorder {
            name: desc.name.clone(),
            writes: Arc::clone(&self.writes),
        }))
    }
}
