use thiserror::Error;

/// Fatal errors raised while the process is being set up.
///
/// Anything in this enum is raised at startup or job registration time and
/// stops the process before the scheduling loop begins.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("OTEL_SERVICE_NAME is not set")]
    MissingServiceName,

    #[error("job_name is required")]
    EmptyJobName,

    #[error("a job named '{0}' is already registered")]
    DuplicateJobName(String),

    #[error("invalid schedule for job '{job_name}': {reason}")]
    InvalidSchedule { job_name: String, reason: String },

    #[error("failed to declare instrument '{name}': {reason}")]
    InvalidInstrument { name: String, reason: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}
