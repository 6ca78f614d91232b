use anyhow::Result;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

use crate::errors::ErrorKind;

/// Output format for CLI results
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per event, final report as JSON
    Json,
    /// Human-readable summary
    Simple,
}

/// Browser window dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl ViewportSize {
    /// Parse viewport size from "WIDTHxHEIGHT" format (e.g., "1920x1080")
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('x').collect();
        if parts.len() != 2 {
            anyhow::bail!("Invalid viewport format. Use WIDTHxHEIGHT (e.g., 1920x1080)");
        }

        let width = parts[0]
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid width in viewport size"))?;
        let height = parts[1]
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid height in viewport size"))?;

        Ok(ViewportSize { width, height })
    }
}

/// Label → desired value pairs, kept in the order they were written.
///
/// Order only affects logging; fields are filled independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Specification {
    entries: Vec<(String, String)>,
}

impl Specification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field; a repeated label replaces the earlier value in place
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: Into<String>, V: Into<String>> FromIterator<(L, V)> for Specification {
    fn from_iter<I: IntoIterator<Item = (L, V)>>(iter: I) -> Self {
        let mut spec = Specification::new();
        for (l, v) in iter {
            spec.insert(l, v);
        }
        spec
    }
}

impl Serialize for Specification {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(l, v)| (l, v)))
    }
}

impl<'de> Deserialize<'de> for Specification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SpecVisitor;

        impl<'de> Visitor<'de> for SpecVisitor {
            type Value = Specification;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field labels to string or number values")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut spec = Specification::new();
                while let Some((label, value)) = map.next_entry::<String, serde_json::Value>()? {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Number(n) => n.to_string(),
                        serde_json::Value::Bool(b) => b.to_string(),
                        other => {
                            return Err(serde::de::Error::custom(format!(
                                "field '{}' must be a string or number, got {}",
                                label, other
                            )));
                        }
                    };
                    spec.insert(label, value);
                }
                Ok(spec)
            }
        }

        deserializer.deserialize_map(SpecVisitor)
    }
}

/// One unit of work as supplied by the job source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    #[serde(default)]
    pub specs: Specification,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, specs: Specification) -> Self {
        Self {
            name: name.into(),
            specs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// A Job as tracked by the orchestrator across its attempts
#[derive(Debug, Clone)]
pub struct Job {
    pub spec: JobSpec,
    attempts_used: u32,
    status: JobStatus,
    last_error: Option<ErrorKind>,
    artifact: Option<PathBuf>,
    skipped_fields: Vec<String>,
}

impl Job {
    pub fn new(spec: JobSpec) -> Self {
        Self {
            spec,
            attempts_used: 0,
            status: JobStatus::Pending,
            last_error: None,
            artifact: None,
            skipped_fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    /// Start another attempt. Returns false once the budget is spent or the
    /// Job is already terminal; a spent budget forces `Failed`.
    pub fn begin_attempt(&mut self, max_attempts: u32) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if self.attempts_used >= max_attempts {
            self.status = JobStatus::Failed;
            return false;
        }
        self.status = JobStatus::Running;
        self.attempts_used += 1;
        true
    }

    pub fn record_failure(&mut self, kind: ErrorKind, skipped_fields: Vec<String>) {
        if self.status == JobStatus::Running {
            self.last_error = Some(kind);
            self.skipped_fields = skipped_fields;
        }
    }

    pub fn succeed(&mut self, artifact: PathBuf, skipped_fields: Vec<String>) {
        if self.status == JobStatus::Running {
            self.status = JobStatus::Succeeded;
            self.artifact = Some(artifact);
            self.skipped_fields = skipped_fields;
        }
    }

    /// Finalize a Job whose attempts all failed
    pub fn fail(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Failed;
        }
    }

    pub fn report(&self) -> JobReport {
        JobReport {
            name: self.spec.name.clone(),
            status: self.status,
            attempts_used: self.attempts_used,
            last_error: self.last_error,
            artifact: self.artifact.clone(),
            skipped_fields: self.skipped_fields.clone(),
        }
    }
}

/// Terminal record of one Job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub name: String,
    pub status: JobStatus,
    pub attempts_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skipped_fields: Vec<String>,
}

/// What `run()` always produces, even when every Job fails
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    pub fn push(&mut self, report: JobReport) {
        match report.status {
            JobStatus::Succeeded => self.succeeded += 1,
            _ => self.failed += 1,
        }
        self.jobs.push(report);
    }

    pub fn job(&self, name: &str) -> Option<&JobReport> {
        self.jobs.iter().find(|j| j.name == name)
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
