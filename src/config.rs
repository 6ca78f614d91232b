//! Batch file loading and the parameter records handed to the core.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::JobSpec;

/// A batch file as written by the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFile {
    /// Product finder page every attempt starts from
    pub target_url: String,
    /// Jobs, in the order they run
    pub products: Vec<JobSpec>,
    #[serde(default)]
    pub download_settings: DownloadSettings,
    #[serde(default)]
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadSettings {
    pub download_dir: PathBuf,
    pub max_attempts: u32,
    pub wait_between_attempts_secs: u64,
    pub wait_between_products_secs: u64,
    pub download_timeout_secs: u64,
    pub attempt_timeout_secs: u64,
    /// Suffixes marking a download still in flight
    pub partial_suffixes: Vec<String>,
    /// Extensions accepted as a finished artifact (case-insensitive, no dot)
    pub final_extensions: Vec<String>,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            max_attempts: 3,
            wait_between_attempts_secs: 10,
            wait_between_products_secs: 10,
            download_timeout_secs: 90,
            attempt_timeout_secs: 600,
            partial_suffixes: [".crdownload", ".part", ".partial", ".download", ".tmp"]
                .into_iter()
                .map(String::from)
                .collect(),
            final_extensions: ["pdf", "dwg", "dxf", "zip", "png", "svg"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Every wait in the core is bounded by one of these
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    /// Page load plus root marker
    pub navigation_secs: u64,
    /// Embedded configurator mount after the configure trigger
    pub configurator_secs: u64,
    /// Primary strategy for ordinary elements
    pub element_secs: u64,
    /// Fallback strategies and structural probes
    pub probe_ms: u64,
    /// How long an element may stay obstructed before a click gives up
    pub clickable_ms: u64,
    /// Window in which a click is expected to change the page
    pub click_verify_ms: u64,
    pub poll_interval_ms: u64,
    /// Compare an input's value with what was typed
    pub verify_input: bool,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_secs: 30,
            configurator_secs: 30,
            element_secs: 10,
            probe_ms: 1500,
            clickable_ms: 5000,
            click_verify_ms: 2000,
            poll_interval_ms: 250,
            verify_input: true,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn configurator(&self) -> Duration {
        Duration::from_secs(self.configurator_secs)
    }

    pub fn element(&self) -> Duration {
        Duration::from_secs(self.element_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    pub fn clickable(&self) -> Duration {
        Duration::from_millis(self.clickable_ms)
    }

    pub fn click_verify(&self) -> Duration {
        Duration::from_millis(self.click_verify_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Batch-level parameters consumed by the orchestrator
#[derive(Debug, Clone)]
pub struct BatchParams {
    pub max_attempts: u32,
    pub inter_attempt_delay: Duration,
    pub inter_job_delay: Duration,
    pub output_dir: PathBuf,
    pub attempt_timeout: Duration,
}

impl BatchParams {
    pub fn from_settings(settings: &DownloadSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            inter_attempt_delay: Duration::from_secs(settings.wait_between_attempts_secs),
            inter_job_delay: Duration::from_secs(settings.wait_between_products_secs),
            output_dir: settings.download_dir.clone(),
            attempt_timeout: Duration::from_secs(settings.attempt_timeout_secs),
        }
    }
}

impl BatchFile {
    /// Read and validate a batch file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .context(format!("Failed to read batch file: {}", path.display()))?;
        let batch: BatchFile = serde_json::from_str(&raw)
            .context(format!("Invalid batch file: {}", path.display()))?;
        batch.validate()?;
        Ok(batch)
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.target_url)
            .context(format!("Invalid target_url: {}", self.target_url))?;
        if !matches!(url.scheme(), "http" | "https" | "file") {
            anyhow::bail!("Unsupported target_url scheme: {}", url.scheme());
        }
        if self.download_settings.max_attempts == 0 {
            anyhow::bail!("download_settings.max_attempts must be at least 1");
        }
        if self.timeouts.poll_interval_ms == 0 {
            anyhow::bail!("timeouts.poll_interval_ms must be greater than 0");
        }
        if let Some(pos) = self.products.iter().position(|p| p.name.trim().is_empty()) {
            anyhow::bail!("products[{}] has an empty name", pos);
        }
        Ok(())
    }

    /// Keep only the named products, preserving file order
    pub fn retain_products(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        if let Some(missing) = names
            .iter()
            .find(|n| !self.products.iter().any(|p| &p.name == *n))
        {
            anyhow::bail!("Product not found in batch file: {}", missing);
        }
        self.products.retain(|p| names.contains(&p.name));
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
