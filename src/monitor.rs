//! Download/artifact monitor: decides from directory listings alone whether
//! the target application finished saving a new artifact.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::DownloadSettings;
use crate::errors::{ErrorKind, WorkflowError};

/// File names in a directory at one instant, each flagged if it is still being written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputDirectorySnapshot {
    files: BTreeMap<String, bool>,
}

impl OutputDirectorySnapshot {
    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Names carrying a partial-download marker
    pub fn partial(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .filter(|(_, partial)| **partial)
            .map(|(name, _)| name.as_str())
    }
}

/// Verdict of comparing a listing against the baseline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadState {
    /// At least one partial marker is present
    InProgress,
    /// Nothing new with a final extension yet
    NoArtifact,
    Complete(PathBuf),
}

#[derive(Debug, Clone)]
pub struct DownloadMonitor {
    partial_suffixes: Vec<String>,
    final_extensions: Vec<String>,
    poll_interval: Duration,
}

impl DownloadMonitor {
    pub fn new(
        partial_suffixes: Vec<String>,
        final_extensions: Vec<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            partial_suffixes: partial_suffixes.iter().map(|s| s.to_lowercase()).collect(),
            final_extensions: final_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            poll_interval,
        }
    }

    pub fn from_settings(settings: &DownloadSettings, poll_interval: Duration) -> Self {
        Self::new(
            settings.partial_suffixes.clone(),
            settings.final_extensions.clone(),
            poll_interval,
        )
    }

    fn is_partial(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.partial_suffixes.iter().any(|s| lower.ends_with(s))
    }

    fn is_final(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.final_extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }

    fn read_snapshot(&self, dir: &Path) -> io::Result<OutputDirectorySnapshot> {
        let mut files = BTreeMap::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(OutputDirectorySnapshot { files });
            }
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let partial = self.is_partial(&name);
            files.insert(name, partial);
        }
        Ok(OutputDirectorySnapshot { files })
    }

    /// Current listing of `dir`; a missing or unreadable directory reads as empty
    pub fn snapshot(&self, dir: &Path) -> OutputDirectorySnapshot {
        self.read_snapshot(dir).unwrap_or_else(|e| {
            warn!("Failed to list {}: {}", dir.display(), e);
            OutputDirectorySnapshot::default()
        })
    }

    /// Complete needs no new partial markers AND a final-extension file absent from `baseline`.
    /// Partial files already in `baseline` are leftovers of an earlier session and are ignored.
    pub fn evaluate(
        &self,
        dir: &Path,
        baseline: &OutputDirectorySnapshot,
        current: &OutputDirectorySnapshot,
    ) -> DownloadState {
        if current.partial().any(|name| !baseline.contains(name)) {
            return DownloadState::InProgress;
        }
        current
            .files
            .keys()
            .find(|name| !baseline.contains(name) && self.is_final(name))
            .map(|name| DownloadState::Complete(dir.join(name)))
            .unwrap_or(DownloadState::NoArtifact)
    }

    /// Wait for a new artifact, using the directory as it is now for the baseline
    pub async fn confirm(&self, dir: &Path, timeout: Duration) -> Result<PathBuf, WorkflowError> {
        let baseline = self.snapshot(dir);
        self.confirm_since(dir, &baseline, timeout).await
    }

    /// Wait for an artifact that is new relative to `baseline`
    pub async fn confirm_since(
        &self,
        dir: &Path,
        baseline: &OutputDirectorySnapshot,
        timeout: Duration,
    ) -> Result<PathBuf, WorkflowError> {
        info!(
            "Waiting up to {}s for a download in {}",
            timeout.as_secs(),
            dir.display()
        );
        let deadline = Instant::now() + timeout;
        let mut last = None;

        loop {
            let current = self.snapshot(dir);
            let state = self.evaluate(dir, baseline, &current);
            if last.as_ref() != Some(&state) {
                debug!("Download state: {:?}", state);
            }
            if let DownloadState::Complete(path) = state {
                info!("Download complete: {}", path.display());
                return Ok(path);
            }
            last = Some(state);

            let now = Instant::now();
            if now >= deadline {
                let detail = match last {
                    Some(DownloadState::InProgress) => "download still in progress",
                    _ => "no new artifact appeared",
                };
                return Err(WorkflowError::new(
                    ErrorKind::DownloadTimeout,
                    format!("{} after {}s in {}", detail, timeout.as_secs(), dir.display()),
                ));
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
#[path = "monitor_test.rs"]
mod monitor_test;
