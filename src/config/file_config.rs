use crate::background_jobs::TimeUnit;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI/env)
    pub service_name: Option<String>,
    pub metrics_enabled: Option<bool>,
    pub export_interval_ms: Option<u64>,
    pub metric_prefix: Option<String>,
    pub push_url: Option<String>,
    pub logs_url: Option<String>,
    pub tick_interval_ms: Option<u64>,
    pub show_progress: Option<bool>,

    pub jobs: Option<Vec<JobConfig>>,
}

/// One `[[jobs]]` entry.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub name: String,
    pub every: u64,
    pub unit: TimeUnit,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
