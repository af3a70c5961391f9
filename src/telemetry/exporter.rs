//! Periodic push of the metrics registry to a Pushgateway-compatible endpoint.

use prometheus::{Encoder, Registry, TextEncoder};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("Failed to push telemetry: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct PushExporter {
    client: reqwest::Client,
    registry: Registry,
    endpoint: String,
    interval: Duration,
}

impl PushExporter {
    pub fn new(registry: Registry, push_url: &str, service_name: &str, interval: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            registry,
            endpoint: push_endpoint(push_url, service_name),
            interval,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Encode the registry in the text exposition format.
    pub fn encode(&self) -> Result<Vec<u8>, ExportError> {
        let encoder = TextEncoder::new();
        let mut buffer = vec![];
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    /// Push the current state of the registry once.
    pub async fn push(&self) -> Result<(), ExportError> {
        let body = self.encode()?;
        self.client
            .put(&self.endpoint)
            .header(CONTENT_TYPE, TextEncoder::new().format_type())
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Run the export loop on the Tokio runtime.
    ///
    /// Failed pushes are logged and retried at the next interval; the task
    /// never ends on its own.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match self.push().await {
                    Ok(()) => debug!("Pushed metrics to {}", self.endpoint),
                    Err(e) => warn!("{} ({})", e, self.endpoint),
                }
            }
        })
    }
}

fn push_endpoint(push_url: &str, service_name: &str) -> String {
    format!(
        "{}/metrics/job/{}",
        push_url.trim_end_matches('/'),
        urlencoding::encode(service_name)
    )
}
