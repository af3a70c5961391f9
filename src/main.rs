use anyhow::{Context, Result};
use clap::Parser;
use instrumented_jobs::background_jobs::jobs::SimulatedWorkload;
use instrumented_jobs::background_jobs::{InstrumentationWrapper, JobScheduler};
use instrumented_jobs::config::{
    AppConfig, CliConfig, FileConfig, DEFAULT_EXPORT_INTERVAL_MS, DEFAULT_LOGS_URL,
    DEFAULT_METRIC_PREFIX, DEFAULT_PUSH_URL, DEFAULT_TICK_INTERVAL_MS,
};
use instrumented_jobs::telemetry::{init_log_shipping, init_telemetry, JobInstruments};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Service name attached to every pushed metric. Required.
    #[clap(long, env = "OTEL_SERVICE_NAME")]
    pub service_name: Option<String>,

    /// Push metrics to the gateway. Only "true" (any case) enables it.
    #[clap(long, env = "SENDING_LOGS_AND_METRICS_ENABLED")]
    pub metrics_enabled: Option<String>,

    /// Interval in milliseconds between metric pushes.
    #[clap(long, env = "OTEL_EXPORT_INTERVAL", default_value_t = DEFAULT_EXPORT_INTERVAL_MS)]
    pub export_interval_ms: u64,

    /// Prefix prepended to every metric name.
    #[clap(long, env = "METRIC_PREFIX", default_value = DEFAULT_METRIC_PREFIX)]
    pub metric_prefix: String,

    /// Base URL of the Prometheus Pushgateway.
    #[clap(long, env = "METRICS_PUSH_URL", default_value = DEFAULT_PUSH_URL)]
    pub push_url: String,

    /// OTLP/HTTP endpoint log events are shipped to when sending is enabled.
    #[clap(long, env = "OTEL_EXPORTER_OTLP_LOGS_ENDPOINT", default_value = DEFAULT_LOGS_URL)]
    pub logs_url: String,

    /// How often the scheduler checks for due jobs, in milliseconds.
    #[clap(long, env = "SCHEDULER_TICK_MS", default_value_t = DEFAULT_TICK_INTERVAL_MS)]
    pub tick_interval_ms: u64,

    /// Draw a progress bar per running job.
    #[clap(long, env = "SHOW_PROGRESS")]
    pub show_progress: Option<String>,

    /// Path to a TOML config file. Values in the file override flags and env.
    #[clap(long, env = "JOBS_CONFIG_FILE", value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            service_name: self.service_name.clone(),
            metrics_enabled: self.metrics_enabled.clone(),
            export_interval_ms: self.export_interval_ms,
            metric_prefix: self.metric_prefix.clone(),
            push_url: self.push_url.clone(),
            logs_url: self.logs_url.clone(),
            tick_interval_ms: self.tick_interval_ms,
            show_progress: self.show_progress.clone(),
        }
    }
}

/// How long shutdown waits for the running job and the final log export.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")
}

/// Drop the runtime without waiting past `grace` for blocking tasks, such as
/// a job still running on the blocking pool.
fn shutdown(runtime: Runtime, grace: Duration) {
    runtime.shutdown_timeout(grace);
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let runtime = build_runtime()?;
    let result = runtime.block_on(run(cli_args));
    shutdown(runtime, SHUTDOWN_GRACE_PERIOD);
    result
}

async fn run(cli_args: CliArgs) -> Result<()> {
    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)
        .context("Invalid configuration")?;

    let (log_layer, log_export) =
        init_log_shipping(&app_config.telemetry, &app_config.service_name);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(log_layer)
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    if let Some(path) = &cli_args.config {
        info!("Loaded config from {:?}", path);
    }
    if log_export.is_some() {
        info!("Shipping logs to {}", app_config.telemetry.logs_url);
    }

    info!("Initializing metrics for {}...", app_config.service_name);
    let telemetry = init_telemetry(&app_config.telemetry, &app_config.service_name);
    let instruments = JobInstruments::declare(
        telemetry.sink.as_ref(),
        &app_config.telemetry.metric_prefix,
    )
    .context("Failed to declare job metrics")?;

    let wrapper =
        InstrumentationWrapper::new(Arc::new(instruments)).with_progress(app_config.show_progress);

    let mut scheduler = JobScheduler::new();
    for job in &app_config.jobs {
        let instrumented = wrapper.wrap(&job.name, SimulatedWorkload::new())?;
        scheduler.register(instrumented, job.every)?;
    }

    tokio::select! {
        _ = scheduler.run_forever(app_config.tick_interval) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!(
                "Shutdown signal received, waiting up to {:?} for the running job to finish",
                SHUTDOWN_GRACE_PERIOD
            );
        }
    }

    if let Some(exporter) = telemetry.exporter {
        exporter.abort();
    }
    if let Some(log_export) = log_export {
        if !log_export.shutdown(SHUTDOWN_GRACE_PERIOD).await {
            warn!("Log export did not finish within {:?}", SHUTDOWN_GRACE_PERIOD);
        }
    }

    Ok(())
}
