use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure categories a Job attempt can end with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No strategy produced a visible, enabled match in time
    LocatorNotFound,
    /// Element went stale or stayed obstructed during a click/input
    InteractionFailed,
    /// Target page (or its configurator) never rendered its marker
    NavigationTimeout,
    /// A specification field could not be located or classified (non-fatal)
    SpecificationUnfillable,
    /// No completed artifact appeared in the output directory
    DownloadTimeout,
    /// The browser session died, hung, or could not be opened
    SessionFatal,
}

impl ErrorKind {
    /// Whether this kind aborts the current attempt
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ErrorKind::SpecificationUnfillable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::LocatorNotFound => "locator_not_found",
            ErrorKind::InteractionFailed => "interaction_failed",
            ErrorKind::NavigationTimeout => "navigation_timeout",
            ErrorKind::SpecificationUnfillable => "specification_unfillable",
            ErrorKind::DownloadTimeout => "download_timeout",
            ErrorKind::SessionFatal => "session_fatal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure threaded through resolver, primitives, workflow and orchestrator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct WorkflowError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl WorkflowError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn locator_not_found(target: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::LocatorNotFound,
            format!("no interactable match for {}", target),
        )
    }

    pub fn interaction_failed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InteractionFailed, detail)
    }

    pub fn session_fatal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionFatal, detail)
    }
}

/// Low-level failure reported by a browser session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The element handle no longer refers to a live node
    #[error("stale element reference: {0}")]
    Stale(String),
    /// Another element would receive the click
    #[error("element click intercepted: {0}")]
    Obstructed(String),
    /// The driver or browser stopped answering
    #[error("session unresponsive: {0}")]
    Unresponsive(String),
    /// Anything else the driver reported
    #[error("{0}")]
    Other(String),
}

impl SessionError {
    /// Classify a driver error message
    pub fn from_message(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let lower = msg.to_lowercase();

        if lower.contains("stale element") || lower.contains("is not attached to the page") {
            SessionError::Stale(msg)
        } else if lower.contains("click intercepted")
            || lower.contains("not interactable")
            || lower.contains("obscures it")
        {
            SessionError::Obstructed(msg)
        } else if lower.contains("invalid session id")
            || lower.contains("session deleted")
            || lower.contains("connection refused")
            || lower.contains("connection lost")
            || lower.contains("webdriver session has been closed")
            || lower.contains("disconnected")
        {
            SessionError::Unresponsive(msg)
        } else {
            SessionError::Other(msg)
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, SessionError::Stale(_))
    }

    /// Map into the attempt-level taxonomy, using `fallback` for non-fatal driver noise
    pub fn into_workflow(self, fallback: ErrorKind) -> WorkflowError {
        match self {
            SessionError::Unresponsive(msg) => WorkflowError::session_fatal(msg),
            SessionError::Stale(msg) | SessionError::Obstructed(msg) => {
                WorkflowError::interaction_failed(msg)
            }
            SessionError::Other(msg) => WorkflowError::new(fallback, msg),
        }
    }
}

impl From<fantoccini::error::CmdError> for SessionError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        SessionError::from_message(err.to_string())
    }
}

impl From<fantoccini::error::NewSessionError> for SessionError {
    fn from(err: fantoccini::error::NewSessionError) -> Self {
        SessionError::Unresponsive(err.to_string())
    }
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod errors_test;
