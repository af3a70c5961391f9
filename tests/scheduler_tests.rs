//! End-to-end job runs through the public API, observed on a Prometheus registry.

use instrumented_jobs::background_jobs::{
    Every, InstrumentationWrapper, JobError, JobScheduler, ProgressTracker, RunStatus,
};
use instrumented_jobs::config::TelemetrySettings;
use instrumented_jobs::telemetry::{
    init_log_shipping, init_telemetry, JobInstruments, NoopSink, PrometheusSink,
};
use instrumented_jobs::ConfigurationError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const PREFIX: &str = "test";

fn prometheus_wrapper() -> (PrometheusSink, InstrumentationWrapper) {
    let sink = PrometheusSink::new();
    let instruments = JobInstruments::declare(&sink, PREFIX).unwrap();
    let wrapper = InstrumentationWrapper::new(Arc::new(instruments)).with_progress(false);
    (sink, wrapper)
}

fn metric(name: &str) -> String {
    format!("{PREFIX}_{name}")
}

#[test]
fn test_successful_run_reports_final_progress() {
    let (sink, wrapper) = prometheus_wrapper();
    let job = wrapper
        .wrap("import", |progress: &mut ProgressTracker| -> Result<(), JobError> {
            progress.report(50, 100);
            progress.report(50, 100);
            Ok(())
        })
        .unwrap();

    let run = job.run();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.processed_count, 100);
    assert_eq!(run.total_count, 100);
    assert!(run.finished_at >= run.started_at);

    let job_name = ("job_name", "import");
    assert_eq!(
        sink.sample(&metric("job_records"), &[job_name, ("type", "processed")]),
        Some(100.0)
    );
    assert_eq!(
        sink.sample(&metric("job_records"), &[job_name, ("type", "total")]),
        Some(100.0)
    );
    assert_eq!(
        sink.sample(&metric("job_status"), &[job_name, ("status", "success")]),
        Some(1.0)
    );
    assert_eq!(
        sink.sample(&metric("job_status"), &[job_name, ("status", "error")]),
        None
    );
    assert_eq!(sink.sample(&metric("job_last_status"), &[job_name]), Some(1.0));
    assert_eq!(sink.sample(&metric("job_run_count"), &[job_name]), Some(1.0));

    let started = sink
        .sample(&metric("job_time"), &[job_name, ("event", "started")])
        .unwrap();
    let finished = sink
        .sample(&metric("job_time"), &[job_name, ("event", "finished")])
        .unwrap();
    assert!(finished >= started);
}

#[test]
fn test_failed_run_freezes_progress() {
    let (sink, wrapper) = prometheus_wrapper();
    let job = wrapper
        .wrap("export", |progress: &mut ProgressTracker| -> Result<(), JobError> {
            progress.report(50, 150);
            Err(JobError::ExecutionFailed("upstream went away".to_string()))
        })
        .unwrap();

    let run = job.run();

    assert_eq!(run.status, RunStatus::Error);
    assert_eq!(run.processed_count, 50);
    assert_eq!(run.total_count, 150);
    assert_eq!(run.error.as_deref(), Some("upstream went away"));

    let job_name = ("job_name", "export");
    assert_eq!(
        sink.sample(&metric("job_records"), &[job_name, ("type", "processed")]),
        Some(50.0)
    );
    assert_eq!(
        sink.sample(&metric("job_status"), &[job_name, ("status", "error")]),
        Some(1.0)
    );
    assert_eq!(
        sink.sample(&metric("job_status"), &[job_name, ("status", "success")]),
        None
    );
    assert_eq!(sink.sample(&metric("job_last_status"), &[job_name]), Some(0.0));
    assert_eq!(sink.sample(&metric("job_run_count"), &[job_name]), Some(1.0));
}

#[test]
fn test_run_count_tracks_every_execution() {
    let (sink, wrapper) = prometheus_wrapper();
    let attempts = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&attempts);
    let job = wrapper
        .wrap("flaky", move |_: &mut ProgressTracker| -> Result<(), JobError> {
            let mut attempts = counter.lock().unwrap();
            *attempts += 1;
            if *attempts % 2 == 0 {
                Err(JobError::ExecutionFailed("even attempt".to_string()))
            } else {
                Ok(())
            }
        })
        .unwrap();

    for _ in 0..5 {
        job.run();
    }

    let job_name = ("job_name", "flaky");
    assert_eq!(sink.sample(&metric("job_run_count"), &[job_name]), Some(5.0));
    assert_eq!(
        sink.sample(&metric("job_status"), &[job_name, ("status", "success")]),
        Some(3.0)
    );
    assert_eq!(
        sink.sample(&metric("job_status"), &[job_name, ("status", "error")]),
        Some(2.0)
    );
    // the fifth attempt succeeded
    assert_eq!(sink.sample(&metric("job_last_status"), &[job_name]), Some(1.0));
}

#[tokio::test]
async fn test_jobs_due_together_run_in_registration_order() {
    let (sink, wrapper) = prometheus_wrapper();
    let trace: Arc<Mutex<Vec<String>>> = Arc::default();

    let mut scheduler = JobScheduler::new();
    let base = Instant::now();
    for (name, every) in [("A", Every::seconds(20)), ("B", Every::seconds(60))] {
        let trace = Arc::clone(&trace);
        let job = wrapper
            .wrap(name, move |progress: &mut ProgressTracker| -> Result<(), JobError> {
                trace.lock().unwrap().push(format!("{name} start"));
                std::thread::sleep(Duration::from_millis(10));
                progress.report(1, 1);
                trace.lock().unwrap().push(format!("{name} end"));
                Ok(())
            })
            .unwrap();
        scheduler.register_at(job, every, base).unwrap();
    }

    let runs = scheduler.run_pending(base + Duration::from_secs(60)).await;

    assert_eq!(runs.len(), 2);
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["A start", "A end", "B start", "B end"]
    );
    for name in ["A", "B"] {
        assert_eq!(
            sink.sample(&metric("job_run_count"), &[("job_name", name)]),
            Some(1.0)
        );
    }
}

#[test]
fn test_empty_job_name_is_rejected_without_emitting() {
    let (sink, wrapper) = prometheus_wrapper();

    let result = wrapper.wrap("", |_: &mut ProgressTracker| -> Result<(), JobError> { Ok(()) });

    assert_eq!(result.unwrap_err(), ConfigurationError::EmptyJobName);
    assert!(sink.registry().gather().is_empty());
}

#[test]
fn test_noop_sink_runs_jobs_unchanged() {
    let instruments = JobInstruments::declare(&NoopSink, PREFIX).unwrap();
    let wrapper = InstrumentationWrapper::new(Arc::new(instruments)).with_progress(false);
    let ok = wrapper
        .wrap("quiet", |progress: &mut ProgressTracker| -> Result<(), JobError> {
            progress.report(10, 10);
            Ok(())
        })
        .unwrap();
    let failing = wrapper
        .wrap("quiet failure", |_: &mut ProgressTracker| -> Result<(), JobError> {
            Err(JobError::ExecutionFailed("nobody is listening".to_string()))
        })
        .unwrap();

    let run = ok.run();
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.processed_count, 10);

    assert_eq!(failing.run().status, RunStatus::Error);
}

#[test]
fn test_disabled_telemetry_uses_noop_sink() {
    let settings = TelemetrySettings {
        sending_enabled: false,
        export_interval: Duration::from_millis(5000),
        metric_prefix: PREFIX.to_string(),
        push_url: "http://localhost:9091".to_string(),
        logs_url: "http://localhost:4318/v1/logs".to_string(),
    };

    let telemetry = init_telemetry(&settings, "jobs-service");

    assert!(telemetry.exporter.is_none());
    assert!(JobInstruments::declare(telemetry.sink.as_ref(), PREFIX).is_ok());
}

#[tokio::test]
async fn test_enabled_telemetry_spawns_exporter() {
    let settings = TelemetrySettings {
        sending_enabled: true,
        export_interval: Duration::from_secs(60),
        metric_prefix: PREFIX.to_string(),
        push_url: "http://127.0.0.1:9".to_string(),
        logs_url: "http://127.0.0.1:9/v1/logs".to_string(),
    };

    let telemetry = init_telemetry(&settings, "jobs-service");
    let exporter = telemetry.exporter.expect("exporter should be running");
    assert!(JobInstruments::declare(telemetry.sink.as_ref(), PREFIX).is_ok());

    exporter.abort();
}

#[test]
fn test_disabled_sending_ships_no_logs() {
    let settings = TelemetrySettings {
        sending_enabled: false,
        export_interval: Duration::from_millis(5000),
        metric_prefix: PREFIX.to_string(),
        push_url: "http://localhost:9091".to_string(),
        logs_url: "http://localhost:4318/v1/logs".to_string(),
    };

    let (layer, export) = init_log_shipping(&settings, "jobs-service");

    assert!(layer.is_none());
    assert!(export.is_none());
}

#[tokio::test]
async fn test_enabled_sending_starts_log_export() {
    let settings = TelemetrySettings {
        sending_enabled: true,
        export_interval: Duration::from_secs(60),
        metric_prefix: PREFIX.to_string(),
        push_url: "http://127.0.0.1:9".to_string(),
        logs_url: "http://127.0.0.1:9/v1/logs".to_string(),
    };

    let (layer, export) = init_log_shipping(&settings, "jobs-service");

    assert!(layer.is_some());
    let export = export.expect("log export should be running");
    assert!(export.shutdown(Duration::from_secs(10)).await);
}
