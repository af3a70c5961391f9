//! Shipping of log events to an OTLP/HTTP logs endpoint.
//!
//! [`LogShippingLayer`] sits in the `tracing` subscriber next to the fmt
//! layer and hands every event to a bounded queue. The [`LogExporter`] task
//! drains that queue in batches and POSTs them as OTLP JSON. A full queue
//! drops records instead of blocking the caller, and a failed push drops
//! the batch.

use super::exporter::ExportError;
use crate::config::TelemetrySettings;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::field::{Field, Visit};
use tracing::{debug, warn, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub const MAX_QUEUE_SIZE: usize = 2048;
pub const MAX_EXPORT_BATCH_SIZE: usize = 512;
pub const SCHEDULE_DELAY: Duration = Duration::from_secs(1);

/// Target prefixes of the HTTP stack used for export. Shipping its events
/// would feed every push back into the queue.
const IGNORED_TARGET_PREFIXES: &[&str] = &["reqwest", "hyper", "h2", "rustls", "want"];

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// `tracing` layer feeding the log export queue.
pub struct LogShippingLayer {
    sender: mpsc::Sender<LogRecord>,
}

impl LogShippingLayer {
    /// A layer plus the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LogRecord>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl<S: Subscriber> Layer<S> for LogShippingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if target == module_path!()
            || IGNORED_TARGET_PREFIXES
                .iter()
                .any(|ignored| target.starts_with(ignored))
        {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        // queue full or exporter gone: the record is dropped
        let _ = self.sender.try_send(LogRecord {
            timestamp: Utc::now(),
            level: *metadata.level(),
            target: target.to_string(),
            message: visitor.finish(),
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        let fields = self.fields.join(" ");
        if self.message.is_empty() {
            fields
        } else {
            format!("{} {}", self.message, fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Records waiting to be exported.
struct LogBatch {
    records: Vec<LogRecord>,
    max_size: usize,
}

impl LogBatch {
    fn new(max_size: usize) -> Self {
        Self {
            records: Vec::new(),
            max_size: max_size.max(1),
        }
    }

    /// Queue `record`, handing back the whole batch once it is full.
    fn push(&mut self, record: LogRecord) -> Option<Vec<LogRecord>> {
        self.records.push(record);
        (self.records.len() >= self.max_size).then(|| self.take())
    }

    fn take(&mut self) -> Vec<LogRecord> {
        std::mem::take(&mut self.records)
    }

    fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct LogExporter {
    client: reqwest::Client,
    endpoint: String,
    service_name: String,
    max_batch_size: usize,
    delay: Duration,
}

impl LogExporter {
    pub fn new(endpoint: &str, service_name: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            service_name: service_name.to_string(),
            max_batch_size: MAX_EXPORT_BATCH_SIZE,
            delay: SCHEDULE_DELAY,
        }
    }

    /// Export once `max_batch_size` records are queued, or every `delay`.
    pub fn with_batching(mut self, max_batch_size: usize, delay: Duration) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self.delay = delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// OTLP/JSON `ExportLogsServiceRequest` body for `batch`.
    pub fn encode(&self, batch: &[LogRecord]) -> Value {
        let log_records: Vec<Value> = batch
            .iter()
            .map(|record| {
                json!({
                    "timeUnixNano": record
                        .timestamp
                        .timestamp_nanos_opt()
                        .unwrap_or_default()
                        .to_string(),
                    "severityNumber": severity_number(record.level),
                    "severityText": record.level.to_string(),
                    "body": { "stringValue": record.message },
                    "attributes": [
                        { "key": "code.namespace", "value": { "stringValue": record.target } }
                    ],
                })
            })
            .collect();

        json!({
            "resourceLogs": [{
                "resource": {
                    "attributes": [
                        { "key": "service.name", "value": { "stringValue": self.service_name } }
                    ]
                },
                "scopeLogs": [{
                    "scope": { "name": env!("CARGO_PKG_NAME") },
                    "logRecords": log_records,
                }],
            }]
        })
    }

    pub async fn push(&self, batch: &[LogRecord]) -> Result<(), ExportError> {
        self.client
            .post(&self.endpoint)
            .json(&self.encode(batch))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn export(&self, batch: Vec<LogRecord>) {
        match self.push(&batch).await {
            Ok(()) => debug!("Exported {} log records to {}", batch.len(), self.endpoint),
            Err(e) => warn!("Dropping {} log records: {}", batch.len(), e),
        }
    }

    /// Run the batching loop until the returned handle is shut down.
    pub fn spawn(self, mut receiver: mpsc::Receiver<LogRecord>) -> LogExportHandle {
        let (shutdown, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut batch = LogBatch::new(self.max_batch_size);
            let mut ticker = tokio::time::interval(self.delay);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    record = receiver.recv() => match record {
                        Some(record) => {
                            if let Some(full) = batch.push(record) {
                                self.export(full).await;
                            }
                        }
                        None => break,
                    },
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            self.export(batch.take()).await;
                        }
                    }
                    _ = &mut shutdown_rx => {
                        while let Ok(record) = receiver.try_recv() {
                            if let Some(full) = batch.push(record) {
                                self.export(full).await;
                            }
                        }
                        break;
                    }
                }
            }

            if !batch.is_empty() {
                self.export(batch.take()).await;
            }
        });

        LogExportHandle { task, shutdown }
    }
}

fn severity_number(level: Level) -> u8 {
    match level {
        Level::TRACE => 1,
        Level::DEBUG => 5,
        Level::INFO => 9,
        Level::WARN => 13,
        _ => 17,
    }
}

/// Running export task.
pub struct LogExportHandle {
    task: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl LogExportHandle {
    /// Flush what is queued and stop. Returns `false` if the final export
    /// did not finish within `timeout`.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        let _ = self.shutdown.send(());
        tokio::time::timeout(timeout, self.task).await.is_ok()
    }
}

/// Layer and export task for `settings`; both `None` when sending is
/// disabled, which leaves a no-op layer in the subscriber.
///
/// With sending enabled the export task is spawned right away, so this must
/// be called from within a Tokio runtime.
pub fn init_log_shipping(
    settings: &TelemetrySettings,
    service_name: &str,
) -> (Option<LogShippingLayer>, Option<LogExportHandle>) {
    if !settings.sending_enabled {
        return (None, None);
    }

    let (layer, receiver) = LogShippingLayer::channel(MAX_QUEUE_SIZE);
    let handle = LogExporter::new(&settings.logs_url, service_name).spawn(receiver);
    (Some(layer), Some(handle))
}
