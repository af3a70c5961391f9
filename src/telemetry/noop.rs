use super::{Counter, Gauge, InstrumentDesc, Labels, MetricsSink};
use crate::error::ConfigurationError;
use std::sync::Arc;

/// Sink used when telemetry sending is disabled. Every write is discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

struct NoopInstrument;

impl Counter for NoopInstrument {
    fn add(&self, _amount: f64, _labels: &Labels<'_>) {}
}

impl Gauge for NoopInstrument {
    fn set(&self, _value: f64, _labels: &Labels<'_>) {}
}

impl MetricsSink for NoopSink {
    fn counter(&self, _desc: &InstrumentDesc) -> Result<Arc<dyn Counter>, ConfigurationError> {
        Ok(Arc::new(NoopInstrument))
    }

    fn gauge(&self, _desc: &InstrumentDesc) -> Result<Arc<dyn Gauge>, ConfigurationError> {
        Ok(Arc::new(NoopInstrument))
    }
}
