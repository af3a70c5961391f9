mod file_config;

pub use file_config::{FileConfig, JobConfig};

use crate::background_jobs::{Every, TimeUnit};
use crate::error::ConfigurationError;
use std::time::Duration;

pub const DEFAULT_EXPORT_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_METRIC_PREFIX: &str = "test";
pub const DEFAULT_PUSH_URL: &str = "http://localhost:9091";
pub const DEFAULT_LOGS_URL: &str = "http://localhost:4318/v1/logs";
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Flag/environment values that can be used for config resolution.
/// TOML file values override these where present.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub service_name: Option<String>,
    /// Raw toggle; only the case-insensitive string `true` enables sending.
    pub metrics_enabled: Option<String>,
    pub export_interval_ms: u64,
    pub metric_prefix: String,
    pub push_url: String,
    pub logs_url: String,
    pub tick_interval_ms: u64,
    /// Raw toggle; progress bars are on unless this says otherwise.
    pub show_progress: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            service_name: None,
            metrics_enabled: None,
            export_interval_ms: DEFAULT_EXPORT_INTERVAL_MS,
            metric_prefix: DEFAULT_METRIC_PREFIX.to_string(),
            push_url: DEFAULT_PUSH_URL.to_string(),
            logs_url: DEFAULT_LOGS_URL.to_string(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            show_progress: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub telemetry: TelemetrySettings,
    pub tick_interval: Duration,
    pub show_progress: bool,
    pub jobs: Vec<JobSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    pub sending_enabled: bool,
    pub export_interval: Duration,
    pub metric_prefix: String,
    pub push_url: String,
    /// OTLP/HTTP logs endpoint, used as-is.
    pub logs_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    pub name: String,
    pub every: Every,
}

impl From<JobConfig> for JobSettings {
    fn from(job: JobConfig) -> Self {
        JobSettings {
            name: job.name,
            every: Every::new(job.every, job.unit),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from flag/env values and an optional TOML file.
    /// TOML values override flag/env values where present.
    pub fn resolve(
        cli: &CliConfig,
        file_config: Option<FileConfig>,
    ) -> Result<Self, ConfigurationError> {
        let file = file_config.unwrap_or_default();

        let service_name = file
            .service_name
            .or_else(|| cli.service_name.clone())
            .filter(|name| !name.trim().is_empty())
            .ok_or(ConfigurationError::MissingServiceName)?;

        let sending_enabled = file
            .metrics_enabled
            .unwrap_or_else(|| cli.metrics_enabled.as_deref().is_some_and(parse_toggle));

        let export_interval_ms = file.export_interval_ms.unwrap_or(cli.export_interval_ms);
        if export_interval_ms == 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: "export_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        let tick_interval_ms = file.tick_interval_ms.unwrap_or(cli.tick_interval_ms);
        if tick_interval_ms == 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: "tick_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        let metric_prefix = file
            .metric_prefix
            .unwrap_or_else(|| cli.metric_prefix.clone());
        let push_url = file.push_url.unwrap_or_else(|| cli.push_url.clone());
        let logs_url = file.logs_url.unwrap_or_else(|| cli.logs_url.clone());

        let show_progress = file
            .show_progress
            .unwrap_or_else(|| cli.show_progress.as_deref().map_or(true, parse_toggle));

        let jobs: Vec<JobSettings> = match file.jobs {
            Some(jobs) => jobs.into_iter().map(JobSettings::from).collect(),
            None => default_jobs(),
        };
        for job in &jobs {
            job.every.validate(&job.name)?;
        }

        Ok(Self {
            service_name,
            telemetry: TelemetrySettings {
                sending_enabled,
                export_interval: Duration::from_millis(export_interval_ms),
                metric_prefix,
                push_url,
                logs_url,
            },
            tick_interval: Duration::from_millis(tick_interval_ms),
            show_progress,
            jobs,
        })
    }
}

/// Jobs registered when the config file does not list any.
pub fn default_jobs() -> Vec<JobSettings> {
    vec![
        JobSettings {
            name: "job 1".to_string(),
            every: Every::new(1, TimeUnit::Minutes),
        },
        JobSettings {
            name: "job 2".to_string(),
            every: Every::new(20, TimeUnit::Seconds),
        },
    ]
}

fn parse_toggle(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}
