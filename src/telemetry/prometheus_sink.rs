use super::{Counter, Gauge, InstrumentDesc, Labels, MetricsSink};
use crate::error::ConfigurationError;
use prometheus::proto::MetricType;
use prometheus::{CounterVec, GaugeVec, Opts, Registry};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Sink backed by a Prometheus registry.
///
/// Each instrument becomes a labelled `CounterVec`/`GaugeVec` registered in
/// the sink's own registry, which the push exporter encodes periodically.
#[derive(Clone, Default)]
pub struct PrometheusSink {
    registry: Registry,
}

impl PrometheusSink {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current value of the series `name{labels}`, if it has been written.
    ///
    /// `labels` must name every label of the series; order does not matter.
    pub fn sample(&self, name: &str, labels: &Labels<'_>) -> Option<f64> {
        let family = self
            .registry
            .gather()
            .into_iter()
            .find(|family| family.get_name() == name)?;

        let metric = family.get_metric().iter().find(|metric| {
            let pairs = metric.get_label();
            pairs.len() == labels.len()
                && labels.iter().all(|(key, value)| {
                    pairs
                        .iter()
                        .any(|pair| pair.get_name() == *key && pair.get_value() == *value)
                })
        })?;

        match family.get_field_type() {
            MetricType::COUNTER => Some(metric.get_counter().get_value()),
            MetricType::GAUGE => Some(metric.get_gauge().get_value()),
            _ => None,
        }
    }

    fn opts(desc: &InstrumentDesc) -> Opts {
        Opts::new(
            desc.name.clone(),
            format!("{} ({})", desc.description, desc.unit),
        )
    }

    fn register_error(desc: &InstrumentDesc, err: prometheus::Error) -> ConfigurationError {
        ConfigurationError::InvalidInstrument {
            name: desc.name.clone(),
            reason: err.to_string(),
        }
    }
}

fn label_map<'a>(labels: &'a Labels<'a>) -> HashMap<&'a str, &'a str> {
    labels.iter().copied().collect()
}

struct PrometheusCounter {
    name: String,
    inner: CounterVec,
}

impl Counter for PrometheusCounter {
    fn add(&self, amount: f64, labels: &Labels<'_>) {
        if amount.is_nan() || amount < 0.0 {
            warn!("Dropping invalid increment {} for counter {}", amount, self.name);
            return;
        }
        match self.inner.get_metric_with(&label_map(labels)) {
            Ok(counter) => counter.inc_by(amount),
            Err(e) => warn!("Dropping write to counter {}: {}", self.name, e),
        }
    }
}

struct PrometheusGauge {
    name: String,
    inner: GaugeVec,
}

impl Gauge for PrometheusGauge {
    fn set(&self, value: f64, labels: &Labels<'_>) {
        match self.inner.get_metric_with(&label_map(labels)) {
            Ok(gauge) => gauge.set(value),
            Err(e) => warn!("Dropping write to gauge {}: {}", self.name, e),
        }
    }
}

impl MetricsSink for PrometheusSink {
    fn counter(&self, desc: &InstrumentDesc) -> Result<Arc<dyn Counter>, ConfigurationError> {
        let inner = CounterVec::new(Self::opts(desc), desc.label_names)
            .map_err(|e| Self::register_error(desc, e))?;
        self.registry
            .register(Box::new(inner.clone()))
            .map_err(|e| Self::register_error(desc, e))?;

        Ok(Arc::new(PrometheusCounter {
            name: desc.name.clone(),
            inner,
        }))
    }

    fn gauge(&self, desc: &InstrumentDesc) -> Result<Arc<dyn Gauge>, ConfigurationError> {
        let inner = GaugeVec::new(Self::opts(desc), desc.label_names)
            .map_err(|e| Self::register_error(desc, e))?;
        self.registry
            .register(Box::new(inner.clone()))
            .map_err(|e| Self::register_error(desc, e))?;

        Ok(Arc::new(PrometheusGauge {
            name: desc.name.clone(),
            inner,
        }))
    }
}
