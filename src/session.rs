//! The browser capability the core drives, and the provider that hands out fresh sessions.
//!
//! Everything above this module talks to a page only through [`Session`];
//! `webdriver.rs` is the production implementation.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;

use crate::errors::SessionError;
use crate::locator::Query;

/// Cheap page identity used to notice that a click changed something
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFingerprint {
    pub url: String,
    pub node_count: u64,
}

/// A live page. Queries take `&self`; anything that tears the page down takes
/// `&mut self`, so no element handle borrowed from the session can survive it.
#[async_trait]
pub trait Session: Send + Sync {
    /// Driver-side element reference. Only valid until the page re-renders.
    type Handle: Clone + fmt::Debug + Send + Sync;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// All nodes matching `query`, searched within `scope` or the whole document
    async fn find_all(
        &self,
        query: &Query,
        scope: Option<&Self::Handle>,
    ) -> Result<Vec<Self::Handle>, SessionError>;

    async fn is_displayed(&self, el: &Self::Handle) -> Result<bool, SessionError>;

    async fn is_enabled(&self, el: &Self::Handle) -> Result<bool, SessionError>;

    /// Whether a click at the element's centre would land on the element itself
    async fn is_clickable(&self, el: &Self::Handle) -> Result<bool, SessionError>;

    async fn scroll_into_view(&self, el: &Self::Handle) -> Result<(), SessionError>;

    async fn click(&self, el: &Self::Handle) -> Result<(), SessionError>;

    async fn clear(&self, el: &Self::Handle) -> Result<(), SessionError>;

    async fn type_text(&self, el: &Self::Handle, text: &str) -> Result<(), SessionError>;

    /// Choose the `<option>` whose visible label is `label`
    async fn select_by_label(&self, el: &Self::Handle, label: &str) -> Result<(), SessionError>;

    /// Current `value` property of a form control
    async fn value(&self, el: &Self::Handle) -> Result<Option<String>, SessionError>;

    async fn text(&self, el: &Self::Handle) -> Result<String, SessionError>;

    async fn attr(&self, el: &Self::Handle, name: &str) -> Result<Option<String>, SessionError>;

    async fn fingerprint(&self) -> Result<PageFingerprint, SessionError>;

    /// End the session. Must be safe to call on an already-broken session.
    async fn quit(&mut self) -> Result<(), SessionError>;
}

/// Hands out one fresh, isolated session per Job attempt
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: Session;

    /// Open a session whose browser saves downloads into `output_dir`
    async fn open(&self, output_dir: &Path) -> Result<Self::Session, SessionError>;
}

/// Where a strategy searches: the whole page or inside one element
pub enum ElementScope<'a, H> {
    Page,
    Within(&'a H),
}

impl<H> Clone for ElementScope<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H> Copy for ElementScope<'_, H> {}

impl<'a, H> ElementScope<'a, H> {
    pub fn handle(&self) -> Option<&'a H> {
        match self {
            ElementScope::Page => None,
            ElementScope::Within(h) => Some(h),
        }
    }
}

impl<H> fmt::Debug for ElementScope<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementScope::Page => f.write_str("page"),
            ElementScope::Within(_) => f.write_str("element"),
        }
    }
}
