//! Interaction primitives: resolve, scroll, wait until actionable, act, verify.
//!
//! A stale reference during the action gets exactly one re-resolve and retry.

use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::errors::{ErrorKind, SessionError, WorkflowError};
use crate::locator::StrategyList;
use crate::resolver::{Constraint, ResolvedElement, Resolver};
use crate::session::{ElementScope, PageFingerprint, Session};

/// What `safe_click` observed after clicking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOutcome {
    /// The page fingerprint (URL or node count) changed within the verify window
    pub page_changed: bool,
    /// The first click hit a stale element and was retried
    pub retried: bool,
}

#[derive(Debug, Clone, Copy)]
enum Action<'v> {
    Click,
    Input(&'v str),
    Select(&'v str),
}

#[derive(Debug, Clone)]
pub struct Interactor {
    resolver: Resolver,
    clickable_timeout: Duration,
    verify_window: Duration,
    verify_input: bool,
}

impl Interactor {
    pub fn new(
        resolver: Resolver,
        clickable_timeout: Duration,
        verify_window: Duration,
        verify_input: bool,
    ) -> Self {
        Self {
            resolver,
            clickable_timeout,
            verify_window,
            verify_input,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve, scroll to centre, wait until clickable, click, then watch for a page change
    pub async fn safe_click<S: Session>(
        &self,
        session: &S,
        list: &StrategyList,
        scope: ElementScope<'_, S::Handle>,
    ) -> Result<ClickOutcome, WorkflowError> {
        let before = session.fingerprint().await.ok();
        let retried = self.perform(session, list, scope, Action::Click).await?;

        let page_changed = match before {
            Some(before) => self.page_changed(session, &before).await,
            None => false,
        };
        if !page_changed {
            debug!("No visible page change after clicking {}", list);
        }

        Ok(ClickOutcome {
            page_changed,
            retried,
        })
    }

    /// Resolve, scroll, clear, type `value`, and (optionally) read it back
    pub async fn safe_input<S: Session>(
        &self,
        session: &S,
        list: &StrategyList,
        scope: ElementScope<'_, S::Handle>,
        value: &str,
    ) -> Result<(), WorkflowError> {
        self.perform(session, list, scope, Action::Input(value))
            .await
            .map(|_| ())
    }

    /// Resolve a native `<select>` and choose the option labelled `label`
    pub async fn safe_select<S: Session>(
        &self,
        session: &S,
        list: &StrategyList,
        scope: ElementScope<'_, S::Handle>,
        label: &str,
    ) -> Result<(), WorkflowError> {
        self.perform(session, list, scope, Action::Select(label))
            .await
            .map(|_| ())
    }

    /// Returns whether the stale-retry was used
    async fn perform<S: Session>(
        &self,
        session: &S,
        list: &StrategyList,
        scope: ElementScope<'_, S::Handle>,
        action: Action<'_>,
    ) -> Result<bool, WorkflowError> {
        let mut retried = false;
        loop {
            let el = self
                .resolver
                .resolve(session, list, scope, Constraint::Interactable)
                .await?;

            match self.act(session, &el, action).await {
                Ok(()) => {
                    info!("{:?} on {} succeeded", action, list);
                    return Ok(retried);
                }
                Err(ActError::Session(e)) if e.is_stale() && !retried => {
                    warn!("{} went stale during {:?}, re-resolving once", list, action);
                    retried = true;
                }
                Err(ActError::Session(e)) => {
                    return Err(e.into_workflow(ErrorKind::InteractionFailed));
                }
                Err(ActError::Failed(detail)) => {
                    return Err(WorkflowError::interaction_failed(format!(
                        "{}: {}",
                        list, detail
                    )));
                }
            }
        }
    }

    async fn act<S: Session>(
        &self,
        session: &S,
        el: &ResolvedElement<'_, S>,
        action: Action<'_>,
    ) -> Result<(), ActError> {
        let handle = el.handle();
        session.scroll_into_view(handle).await?;

        match action {
            Action::Click => {
                self.wait_clickable(session, handle).await?;
                session.click(handle).await?;
            }
            Action::Input(value) => {
                session.clear(handle).await?;
                session.type_text(handle, value).await?;
                if self.verify_input {
                    let actual = session.value(handle).await?.unwrap_or_default();
                    if actual != value {
                        return Err(ActError::Failed(format!(
                            "field holds '{}' after typing '{}'",
                            actual, value
                        )));
                    }
                }
            }
            Action::Select(label) => {
                session.select_by_label(handle, label).await?;
            }
        }
        Ok(())
    }

    async fn wait_clickable<S: Session>(
        &self,
        session: &S,
        handle: &S::Handle,
    ) -> Result<(), ActError> {
        let deadline = Instant::now() + self.clickable_timeout;
        loop {
            if session.is_clickable(handle).await? {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ActError::Failed(format!(
                    "still obstructed after {}ms",
                    self.clickable_timeout.as_millis()
                )));
            }
            sleep(self.resolver.poll_interval().min(deadline - now)).await;
        }
    }

    async fn page_changed<S: Session>(&self, session: &S, before: &PageFingerprint) -> bool {
        let deadline = Instant::now() + self.verify_window;
        loop {
            match session.fingerprint().await {
                Ok(now) if now != *before => return true,
                Ok(_) => {}
                // A navigation in progress can make the probe itself fail
                Err(e) => debug!("Fingerprint probe failed: {}", e),
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            sleep(self.resolver.poll_interval().min(deadline - now)).await;
        }
    }
}

enum ActError {
    Session(SessionError),
    Failed(String),
}

impl From<SessionError> for ActError {
    fn from(err: SessionError) -> Self {
        ActError::Session(err)
    }
}

#[cfg(test)]
#[path = "interact_test.rs"]
mod interact_test;
