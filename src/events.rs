//! Structured progress events and the sinks that present them.
//!
//! The core only emits [`Event`] values; formatting for humans or machines
//! is the sink's job.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ErrorKind;
use crate::fields::FieldKind;
use crate::types::{BatchReport, JobStatus};
use crate::workflow::WorkflowState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    BatchStarted {
        jobs: usize,
        max_attempts: u32,
    },
    AttemptStarted {
        job: String,
        attempt: u32,
        attempt_id: Uuid,
    },
    StateEntered {
        job: String,
        attempt_id: Uuid,
        state: WorkflowState,
    },
    FieldFilled {
        job: String,
        attempt_id: Uuid,
        label: String,
        kind: FieldKind,
    },
    FieldSkipped {
        job: String,
        attempt_id: Uuid,
        label: String,
        reason: String,
    },
    AttemptFailed {
        job: String,
        attempt: u32,
        attempt_id: Uuid,
        state: Option<WorkflowState>,
        kind: ErrorKind,
        detail: String,
    },
    AttemptSucceeded {
        job: String,
        attempt: u32,
        attempt_id: Uuid,
        artifact: PathBuf,
    },
    JobFinished {
        job: String,
        status: JobStatus,
        attempts_used: u32,
        last_error: Option<ErrorKind>,
    },
    BatchFinished {
        succeeded: usize,
        failed: usize,
    },
}

impl Event {
    pub fn batch_finished(report: &BatchReport) -> Self {
        Event::BatchFinished {
            succeeded: report.succeeded,
            failed: report.failed,
        }
    }
}

/// Receives every event the orchestrator and workflow emit
pub trait ReportSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Renders events as log lines through `tracing`
#[derive(Debug, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::BatchStarted { jobs, max_attempts } => {
                info!("Starting batch of {} job(s), up to {} attempt(s) each", jobs, max_attempts)
            }
            Event::AttemptStarted { job, attempt, attempt_id } => {
                info!(%attempt_id, "Job '{}': attempt {}", job, attempt)
            }
            Event::StateEntered { job, state, .. } => info!("Job '{}': entering {:?}", job, state),
            Event::FieldFilled { job, label, kind, .. } => {
                info!("Job '{}': filled '{}' as {:?}", job, label, kind)
            }
            Event::FieldSkipped { job, label, reason, .. } => {
                warn!("Job '{}': skipped '{}': {}", job, label, reason)
            }
            Event::AttemptFailed { job, attempt, state, kind, detail, .. } => warn!(
                "Job '{}': attempt {} failed in {:?} with {}: {}",
                job, attempt, state, kind, detail
            ),
            Event::AttemptSucceeded { job, attempt, artifact, .. } => info!(
                "Job '{}': attempt {} saved {}",
                job,
                attempt,
                artifact.display()
            ),
            Event::JobFinished { job, status, attempts_used, last_error } => info!(
                "Job '{}' finished {:?} after {} attempt(s), last error {:?}",
                job, status, attempts_used, last_error
            ),
            Event::BatchFinished { succeeded, failed } => {
                info!("Batch finished: {} succeeded, {} failed", succeeded, failed)
            }
        }
    }
}

#[derive(Serialize)]
struct Record<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a Event,
}

/// One timestamped JSON object per line
pub struct JsonLinesSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

impl ReportSink for JsonLinesSink {
    fn emit(&self, event: &Event) {
        let record = Record {
            timestamp: Utc::now(),
            event,
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize event: {}", e);
                return;
            }
        };
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            warn!("Failed to write event: {}", e);
        }
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ReportSink for MemorySink {
    fn emit(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Forwards every event to each inner sink in order
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl ReportSink for MultiSink {
    fn emit(&self, event: &Event) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

impl<T: ReportSink + ?Sized> ReportSink for std::sync::Arc<T> {
    fn emit(&self, event: &Event) {
        (**self).emit(event)
    }
}
