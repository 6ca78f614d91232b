//! Element resolver: ordered fallback over a [`StrategyList`] against a live page.

use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::errors::{SessionError, WorkflowError};
use crate::locator::{LocatorStrategy, StrategyList};
use crate::session::{ElementScope, Session};

/// What a candidate must satisfy to count as a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Attached to the DOM; used for mount/readiness markers
    Present,
    /// Displayed and enabled
    Interactable,
}

/// Ephemeral element handle.
///
/// Borrows the session it came from, so it cannot outlive a navigation
/// (which needs `&mut Session`). Not `Clone`; callers resolve, use, and
/// drop it within one workflow state.
pub struct ResolvedElement<'s, S: Session> {
    session: &'s S,
    handle: S::Handle,
    strategy: usize,
}

impl<'s, S: Session> ResolvedElement<'s, S> {
    pub fn handle(&self) -> &S::Handle {
        &self.handle
    }

    /// Index of the strategy that produced this element
    pub fn strategy_index(&self) -> usize {
        self.strategy
    }

    /// Use this element as the search root for another resolution
    pub fn scope(&self) -> ElementScope<'_, S::Handle> {
        ElementScope::Within(&self.handle)
    }

    pub async fn text(&self) -> Result<String, SessionError> {
        self.session.text(&self.handle).await
    }

    pub async fn attr(&self, name: &str) -> Result<Option<String>, SessionError> {
        self.session.attr(&self.handle, name).await
    }
}

impl<S: Session> fmt::Debug for ResolvedElement<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedElement")
            .field("handle", &self.handle)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Tries strategies strictly in list order, polling each up to its own timeout
#[derive(Debug, Clone)]
pub struct Resolver {
    poll_interval: Duration,
}

impl Resolver {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// First match of the first productive strategy
    pub async fn resolve<'s, S: Session>(
        &self,
        session: &'s S,
        list: &StrategyList,
        scope: ElementScope<'_, S::Handle>,
        constraint: Constraint,
    ) -> Result<ResolvedElement<'s, S>, WorkflowError> {
        let mut all = self.resolve_all(session, list, scope, constraint).await?;
        // resolve_all never returns an empty Ok
        Ok(all.swap_remove(0))
    }

    /// Every match of the first productive strategy, in document order
    pub async fn resolve_all<'s, S: Session>(
        &self,
        session: &'s S,
        list: &StrategyList,
        scope: ElementScope<'_, S::Handle>,
        constraint: Constraint,
    ) -> Result<Vec<ResolvedElement<'s, S>>, WorkflowError> {
        debug!("Resolving {} within {:?}", list, scope);

        for (index, strategy) in list.iter().enumerate() {
            let found = self.poll_strategy(session, strategy, scope, constraint).await?;
            if !found.is_empty() {
                debug!(
                    "Resolved {} via strategy #{} {} ({} match(es))",
                    list,
                    index,
                    strategy,
                    found.len()
                );
                return Ok(found
                    .into_iter()
                    .map(|handle| ResolvedElement {
                        session,
                        handle,
                        strategy: index,
                    })
                    .collect());
            }
            debug!("Strategy {} produced no match for {}", strategy, list);
        }

        Err(WorkflowError::locator_not_found(list))
    }

    async fn poll_strategy<S: Session>(
        &self,
        session: &S,
        strategy: &LocatorStrategy,
        scope: ElementScope<'_, S::Handle>,
        constraint: Constraint,
    ) -> Result<Vec<S::Handle>, WorkflowError> {
        let query = strategy.query();
        let deadline = Instant::now() + strategy.timeout;

        loop {
            match session.find_all(&query, scope.handle()).await {
                Ok(candidates) => {
                    let matches = Self::filter(session, candidates, constraint).await?;
                    if !matches.is_empty() {
                        return Ok(matches);
                    }
                }
                Err(SessionError::Unresponsive(msg)) => {
                    return Err(WorkflowError::session_fatal(msg));
                }
                Err(SessionError::Stale(msg)) if scope.handle().is_some() => {
                    // The scoping element itself was re-rendered away
                    return Err(WorkflowError::interaction_failed(format!(
                        "search scope went stale: {}",
                        msg
                    )));
                }
                Err(e) => {
                    warn!("Strategy {} failed: {}", strategy, e);
                    return Ok(Vec::new());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Drop candidates that are hidden, disabled, or vanished mid-check
    async fn filter<S: Session>(
        session: &S,
        candidates: Vec<S::Handle>,
        constraint: Constraint,
    ) -> Result<Vec<S::Handle>, WorkflowError> {
        if constraint == Constraint::Present {
            return Ok(candidates);
        }

        let mut kept = Vec::with_capacity(candidates.len());
        for el in candidates {
            match Self::interactable(session, &el).await {
                Ok(true) => kept.push(el),
                Ok(false) => {}
                Err(SessionError::Unresponsive(msg)) => {
                    return Err(WorkflowError::session_fatal(msg));
                }
                Err(e) => debug!("Skipping candidate {:?}: {}", el, e),
            }
        }
        Ok(kept)
    }

    async fn interactable<S: Session>(session: &S, el: &S::Handle) -> Result<bool, SessionError> {
        Ok(session.is_displayed(el).await? && session.is_enabled(el).await?)
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod resolver_test;
