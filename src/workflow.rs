//! One Job attempt as a linear state machine over a single session.
//!
//! Every state re-resolves what it needs; no element handle crosses a state
//! boundary. The only recoverable failure is an unfillable field.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{DownloadSettings, Timeouts};
use crate::errors::{ErrorKind, SessionError, WorkflowError};
use crate::events::{Event, ReportSink};
use crate::fields::FieldFiller;
use crate::interact::Interactor;
use crate::monitor::{DownloadMonitor, OutputDirectorySnapshot};
use crate::resolver::{Constraint, Resolver};
use crate::session::{ElementScope, Session};
use crate::targets::StrategyTable;
use crate::types::JobSpec;

/// Named workflow step, reported on entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Navigate,
    SelectProduct,
    OpenConfigurator,
    FillSpecifications,
    TriggerGeneration,
    ConfirmArtifact,
}

impl WorkflowState {
    pub const FIRST: WorkflowState = WorkflowState::Navigate;

    /// Strictly linear; `None` after the last state
    pub fn next(self) -> Option<WorkflowState> {
        use WorkflowState::*;
        match self {
            Navigate => Some(SelectProduct),
            SelectProduct => Some(OpenConfigurator),
            OpenConfigurator => Some(FillSpecifications),
            FillSpecifications => Some(TriggerGeneration),
            TriggerGeneration => Some(ConfirmArtifact),
            ConfirmArtifact => None,
        }
    }
}

/// Who is running and where events and downloads go
pub struct AttemptContext<'a> {
    pub job: &'a str,
    pub attempt_id: Uuid,
    pub output_dir: &'a Path,
    pub sink: &'a dyn ReportSink,
}

impl AttemptContext<'_> {
    fn enter(&self, state: WorkflowState) -> WorkflowState {
        debug!("Job '{}' entering {:?}", self.job, state);
        self.sink.emit(&Event::StateEntered {
            job: self.job.to_string(),
            attempt_id: self.attempt_id,
            state,
        });
        state
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSuccess {
    pub artifact: PathBuf,
    pub skipped_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    pub error: WorkflowError,
    /// State the attempt died in; `None` when it never reached the workflow
    pub state: Option<WorkflowState>,
    pub skipped_fields: Vec<String>,
}

impl AttemptFailure {
    pub fn outside_workflow(error: WorkflowError) -> Self {
        Self {
            error,
            state: None,
            skipped_fields: Vec::new(),
        }
    }
}

type StateResult<T> = Result<T, (WorkflowState, WorkflowError)>;

pub struct Workflow {
    target_url: String,
    navigation_timeout: Duration,
    download_timeout: Duration,
    table: StrategyTable,
    interactor: Interactor,
    monitor: DownloadMonitor,
}

impl Workflow {
    pub fn new(target_url: impl Into<String>, timeouts: &Timeouts, downloads: &DownloadSettings) -> Self {
        let resolver = Resolver::new(timeouts.poll_interval());
        Self {
            target_url: target_url.into(),
            navigation_timeout: timeouts.navigation(),
            download_timeout: Duration::from_secs(downloads.download_timeout_secs),
            table: StrategyTable::new(timeouts),
            interactor: Interactor::new(
                resolver,
                timeouts.clickable(),
                timeouts.click_verify(),
                timeouts.verify_input,
            ),
            monitor: DownloadMonitor::from_settings(downloads, timeouts.poll_interval()),
        }
    }

    pub fn table(&self) -> &StrategyTable {
        &self.table
    }

    /// Drive one attempt from Navigate to ConfirmArtifact
    pub async fn run<S: Session>(
        &self,
        session: &mut S,
        job: &JobSpec,
        ctx: &AttemptContext<'_>,
    ) -> Result<AttemptSuccess, AttemptFailure> {
        let mut skipped = Vec::new();
        match self.run_states(session, job, ctx, &mut skipped).await {
            Ok(artifact) => Ok(AttemptSuccess {
                artifact,
                skipped_fields: skipped,
            }),
            Err((state, error)) => Err(AttemptFailure {
                error,
                state: Some(state),
                skipped_fields: skipped,
            }),
        }
    }

    async fn run_states<S: Session>(
        &self,
        session: &mut S,
        job: &JobSpec,
        ctx: &AttemptContext<'_>,
        skipped: &mut Vec<String>,
    ) -> StateResult<PathBuf> {
        let state = ctx.enter(WorkflowState::Navigate);
        self.navigate(session).await.map_err(|e| (state, e))?;

        // Nothing below navigates, so the page is only borrowed from here on
        let session = &*session;

        let state = ctx.enter(WorkflowState::SelectProduct);
        self.select_product(session, &job.name)
            .await
            .map_err(|e| (state, e))?;

        let state = ctx.enter(WorkflowState::OpenConfigurator);
        self.open_configurator(session)
            .await
            .map_err(|e| (state, e))?;

        let state = ctx.enter(WorkflowState::FillSpecifications);
        self.fill_specifications(session, job, ctx, skipped)
            .await
            .map_err(|e| (state, e))?;

        let state = ctx.enter(WorkflowState::TriggerGeneration);
        let baseline = self
            .trigger_generation(session, ctx.output_dir)
            .await
            .map_err(|e| (state, e))?;

        let state = ctx.enter(WorkflowState::ConfirmArtifact);
        self.monitor
            .confirm_since(ctx.output_dir, &baseline, self.download_timeout)
            .await
            .map_err(|e| (state, e))
    }

    async fn navigate<S: Session>(&self, session: &mut S) -> Result<(), WorkflowError> {
        info!("Opening {}", self.target_url);
        match tokio::time::timeout(self.navigation_timeout, session.navigate(&self.target_url)).await
        {
            Err(_) => {
                return Err(WorkflowError::new(
                    ErrorKind::NavigationTimeout,
                    format!(
                        "{} did not load within {}s",
                        self.target_url,
                        self.navigation_timeout.as_secs()
                    ),
                ));
            }
            Ok(Err(SessionError::Unresponsive(msg))) => return Err(WorkflowError::session_fatal(msg)),
            Ok(Err(e)) => {
                return Err(WorkflowError::new(ErrorKind::NavigationTimeout, e.to_string()));
            }
            Ok(Ok(())) => {}
        }

        self.interactor
            .resolver()
            .resolve(&*session, &self.table.page_root(), ElementScope::Page, Constraint::Present)
            .await
            .map(|_| ())
            .map_err(|e| not_rendered(e, "page root marker never appeared"))
    }

    async fn select_product<S: Session>(&self, session: &S, name: &str) -> Result<(), WorkflowError> {
        let resolver = self.interactor.resolver();
        let collection = resolver
            .resolve(
                session,
                &self.table.product_collection(),
                ElementScope::Page,
                Constraint::Present,
            )
            .await?;
        let card = resolver
            .resolve(
                session,
                &self.table.product_card(name),
                collection.scope(),
                Constraint::Interactable,
            )
            .await?;
        info!("Found product card for '{}'", name);

        self.interactor
            .safe_click(session, &self.table.configure_trigger(), card.scope())
            .await?;
        Ok(())
    }

    async fn open_configurator<S: Session>(&self, session: &S) -> Result<(), WorkflowError> {
        self.interactor
            .resolver()
            .resolve(
                session,
                &self.table.configurator_root(),
                ElementScope::Page,
                Constraint::Present,
            )
            .await
            .map(|_| info!("Configurator mounted"))
            .map_err(|e| not_rendered(e, "configurator never mounted"))
    }

    async fn fill_specifications<S: Session>(
        &self,
        session: &S,
        job: &JobSpec,
        ctx: &AttemptContext<'_>,
        skipped: &mut Vec<String>,
    ) -> Result<(), WorkflowError> {
        let filler = FieldFiller::new(&self.table, &self.interactor);
        for (label, value) in job.specs.iter() {
            match filler.fill(session, label, value).await {
                Ok(kind) => ctx.sink.emit(&Event::FieldFilled {
                    job: ctx.job.to_string(),
                    attempt_id: ctx.attempt_id,
                    label: label.to_string(),
                    kind,
                }),
                Err(e) if e.kind.is_fatal() => return Err(e),
                Err(e) => {
                    skipped.push(label.to_string());
                    ctx.sink.emit(&Event::FieldSkipped {
                        job: ctx.job.to_string(),
                        attempt_id: ctx.attempt_id,
                        label: label.to_string(),
                        reason: e.detail,
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns the directory listing taken just before the click
    async fn trigger_generation<S: Session>(
        &self,
        session: &S,
        output_dir: &Path,
    ) -> Result<OutputDirectorySnapshot, WorkflowError> {
        let baseline = self.monitor.snapshot(output_dir);
        let outcome = self
            .interactor
            .safe_click(session, &self.table.generate_trigger(), ElementScope::Page)
            .await?;
        debug!("Generate click outcome: {:?}", outcome);
        Ok(baseline)
    }
}

/// A missing readiness marker means the page never rendered
fn not_rendered(err: WorkflowError, what: &str) -> WorkflowError {
    match err.kind {
        ErrorKind::LocatorNotFound => {
            WorkflowError::new(ErrorKind::NavigationTimeout, format!("{}: {}", what, err.detail))
        }
        _ => err,
    }
}

#[cfg(test)]
#[path = "workflow_test.rs"]
mod workflow_test;
