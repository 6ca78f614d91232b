//! Batch orchestrator: runs Jobs sequentially with a bounded retry budget,
//! one fresh session per attempt.
//!
//! `run` always returns a [`BatchReport`]; attempt failures, panics and hung
//! drivers all end up as recorded error kinds.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BatchParams;
use crate::errors::WorkflowError;
use crate::events::{Event, ReportSink};
use crate::session::{Session, SessionProvider};
use crate::types::{BatchReport, Job, JobReport, JobSpec};
use crate::workflow::{AttemptContext, AttemptFailure, AttemptSuccess, Workflow};

/// Upper bound on tearing a session down
const QUIT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BatchOrchestrator<P: SessionProvider> {
    provider: P,
    workflow: Workflow,
    params: BatchParams,
    sink: Box<dyn ReportSink>,
}

impl<P: SessionProvider> BatchOrchestrator<P> {
    pub fn new(
        provider: P,
        workflow: Workflow,
        params: BatchParams,
        sink: Box<dyn ReportSink>,
    ) -> Self {
        Self {
            provider,
            workflow,
            params,
            sink,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run every Job in order and report each one's terminal state
    pub async fn run(&self, jobs: Vec<JobSpec>) -> BatchReport {
        self.sink.emit(&Event::BatchStarted {
            jobs: jobs.len(),
            max_attempts: self.params.max_attempts,
        });
        if let Err(e) = std::fs::create_dir_all(&self.params.output_dir) {
            warn!(
                "Failed to create output directory {}: {}",
                self.params.output_dir.display(),
                e
            );
        }

        let mut report = BatchReport::default();
        for (index, spec) in jobs.into_iter().enumerate() {
            if index > 0 && !self.params.inter_job_delay.is_zero() {
                info!("Waiting {:?} before the next job", self.params.inter_job_delay);
                sleep(self.params.inter_job_delay).await;
            }

            let job = self.run_job(spec).await;
            self.sink.emit(&Event::JobFinished {
                job: job.name.clone(),
                status: job.status,
                attempts_used: job.attempts_used,
                last_error: job.last_error,
            });
            report.push(job);
        }

        self.sink.emit(&Event::batch_finished(&report));
        report
    }

    async fn run_job(&self, spec: JobSpec) -> JobReport {
        let mut job = Job::new(spec);

        while job.begin_attempt(self.params.max_attempts) {
            let attempt = job.attempts_used();
            if attempt > 1 && !self.params.inter_attempt_delay.is_zero() {
                info!(
                    "Retrying '{}' in {:?}",
                    job.name(),
                    self.params.inter_attempt_delay
                );
                sleep(self.params.inter_attempt_delay).await;
            }

            let attempt_id = Uuid::new_v4();
            self.sink.emit(&Event::AttemptStarted {
                job: job.name().to_string(),
                attempt,
                attempt_id,
            });

            match self.attempt(&job.spec, attempt_id).await {
                Ok(success) => {
                    self.sink.emit(&Event::AttemptSucceeded {
                        job: job.name().to_string(),
                        attempt,
                        attempt_id,
                        artifact: success.artifact.clone(),
                    });
                    job.succeed(success.artifact, success.skipped_fields);
                }
                Err(failure) => {
                    self.sink.emit(&Event::AttemptFailed {
                        job: job.name().to_string(),
                        attempt,
                        attempt_id,
                        state: failure.state,
                        kind: failure.error.kind,
                        detail: failure.error.detail.clone(),
                    });
                    job.record_failure(failure.error.kind, failure.skipped_fields);
                }
            }
        }

        job.fail();
        job.report()
    }

    /// Open, run, and always quit one session. Open and run share one deadline.
    async fn attempt(
        &self,
        spec: &JobSpec,
        attempt_id: Uuid,
    ) -> Result<AttemptSuccess, AttemptFailure> {
        let budget = self.params.attempt_timeout;
        let deadline = Instant::now() + budget;

        let open = AssertUnwindSafe(self.provider.open(&self.params.output_dir)).catch_unwind();
        let mut session = match timeout_at(deadline, open).await {
            Ok(Ok(Ok(session))) => session,
            Ok(Ok(Err(e))) => {
                return Err(fatal(format!("could not open a browser session: {}", e)));
            }
            Ok(Err(panic)) => {
                return Err(fatal(format!(
                    "opening a browser session panicked: {}",
                    panic_message(panic.as_ref())
                )));
            }
            Err(_) => {
                return Err(fatal(format!(
                    "opening a browser session took longer than {:?}",
                    budget
                )));
            }
        };

        let ctx = AttemptContext {
            job: &spec.name,
            attempt_id,
            output_dir: &self.params.output_dir,
            sink: &*self.sink,
        };
        let run = AssertUnwindSafe(self.workflow.run(&mut session, spec, &ctx)).catch_unwind();
        let result = match timeout_at(deadline, run).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(fatal(format!(
                "attempt panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(fatal(format!("attempt exceeded its {:?} budget", budget))),
        };

        close(session).await;
        result
    }
}

/// Quit runs even after the attempt deadline, under its own bound
async fn close<S: Session>(mut session: S) {
    let quit = AssertUnwindSafe(session.quit()).catch_unwind();
    match timeout(QUIT_TIMEOUT, quit).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!("Failed to close session cleanly: {}", e),
        Ok(Err(panic)) => warn!(
            "Closing the session panicked: {}",
            panic_message(panic.as_ref())
        ),
        Err(_) => warn!("Closing the session timed out; dropping it"),
    }
}

fn fatal(detail: String) -> AttemptFailure {
    AttemptFailure::outside_workflow(WorkflowError::session_fatal(detail))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod orchestrator_test;
