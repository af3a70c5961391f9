//! Telemetry sinks and the job instruments written to them.
//!
//! The scheduling core only knows about the [`MetricsSink`] capability: a
//! factory for counters and gauges. [`PrometheusSink`] keeps the values in a
//! `prometheus::Registry` that the [`PushExporter`] ships to a Pushgateway,
//! [`NoopSink`] swallows everything when sending is disabled. Log events
//! follow the same toggle through [`init_log_shipping`].

pub mod exporter;
pub mod instruments;
pub mod logs;
mod noop;
mod prometheus_sink;
#[cfg(test)]
pub(crate) mod testing;

pub use exporter::{ExportError, PushExporter};
pub use instruments::JobInstruments;
pub use logs::{init_log_shipping, LogExportHandle, LogShippingLayer};
pub use noop::NoopSink;
pub use prometheus_sink::PrometheusSink;

use crate::config::TelemetrySettings;
use crate::error::ConfigurationError;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Label set attached to a single write, as `(name, value)` pairs.
pub type Labels<'a> = [(&'a str, &'a str)];

/// Static metadata of an instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentDesc {
    /// Full metric name, prefix included.
    pub name: String,
    pub description: &'static str,
    pub unit: &'static str,
    /// Label names every write must provide.
    pub label_names: &'static [&'static str],
}

/// A monotonically increasing value.
pub trait Counter: Send + Sync {
    fn add(&self, amount: f64, labels: &Labels<'_>);
}

/// A point-in-time value, overwritten on each write.
pub trait Gauge: Send + Sync {
    fn set(&self, value: f64, labels: &Labels<'_>);
}

/// Push-model telemetry backend.
///
/// Implementations must never panic on a write: dropped or rejected data is
/// the sink's business, not the caller's.
pub trait MetricsSink: Send + Sync {
    fn counter(&self, desc: &InstrumentDesc) -> Result<Arc<dyn Counter>, ConfigurationError>;

    fn gauge(&self, desc: &InstrumentDesc) -> Result<Arc<dyn Gauge>, ConfigurationError>;
}

/// Sink selected at startup plus the exporter task feeding the backend, if any.
pub struct Telemetry {
    pub sink: Arc<dyn MetricsSink>,
    pub exporter: Option<JoinHandle<()>>,
}

/// Build the sink described by `settings`.
///
/// With sending enabled this registers a fresh Prometheus registry and spawns
/// a [`PushExporter`] for it, so it must be called from within a Tokio runtime.
pub fn init_telemetry(settings: &TelemetrySettings, service_name: &str) -> Telemetry {
    if !settings.sending_enabled {
        warn!("Sending metrics is disabled. Using no-op metrics sink.");
        return Telemetry {
            sink: Arc::new(NoopSink),
            exporter: None,
        };
    }

    let sink = PrometheusSink::new();
    let exporter = PushExporter::new(
        sink.registry().clone(),
        &settings.push_url,
        service_name,
        settings.export_interval,
    );
    info!(
        "Pushing metrics to {} every {:?}",
        exporter.endpoint(),
        settings.export_interval
    );

    Telemetry {
        sink: Arc::new(sink),
        exporter: Some(exporter.spawn()),
    }
}
