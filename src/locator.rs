//! Locator strategies: immutable, reusable descriptors of how to find one UI element.
//!
//! A [`StrategyList`] is evaluated strictly in order by the resolver; the
//! first strategy that yields a visible, enabled element wins.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// The four ways a target can be described
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocatorKind {
    ExactId,
    CssPath,
    TextContains,
    StructuralAncestor,
}

/// What a single strategy searches for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Locator {
    /// Exact `id` attribute
    Id { id: String },
    /// CSS selector path
    Css { selector: String },
    /// Normalized text containment, optionally restricted to one tag
    Text { tag: Option<String>, text: String },
    /// XPath expressing a structural relationship (ancestor, sibling, position)
    Structural { xpath: String },
}

/// Query form handed to a session; every locator lowers to one of these
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    Id(String),
    Css(String),
    XPath(String),
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Id(id) => write!(f, "id={}", id),
            Query::Css(sel) => write!(f, "css={}", sel),
            Query::XPath(xpath) => write!(f, "xpath={}", xpath),
        }
    }
}

impl Locator {
    pub fn kind(&self) -> LocatorKind {
        match self {
            Locator::Id { .. } => LocatorKind::ExactId,
            Locator::Css { .. } => LocatorKind::CssPath,
            Locator::Text { .. } => LocatorKind::TextContains,
            Locator::Structural { .. } => LocatorKind::StructuralAncestor,
        }
    }

    /// The raw pattern as written in the strategy table
    pub fn pattern(&self) -> &str {
        match self {
            Locator::Id { id } => id,
            Locator::Css { selector } => selector,
            Locator::Text { text, .. } => text,
            Locator::Structural { xpath } => xpath,
        }
    }

    /// Lower to a driver query. Text and structural locators become relative
    /// XPath so they work both page-wide and inside a scoping element.
    pub fn query(&self) -> Query {
        match self {
            Locator::Id { id } => Query::Id(id.clone()),
            Locator::Css { selector } => Query::Css(selector.clone()),
            Locator::Text { tag: Some(tag), text } => Query::XPath(format!(
                ".//{}[contains(normalize-space(.), {})]",
                tag,
                xpath_literal(text)
            )),
            // Without a tag, every ancestor of the text node matches too; keep the innermost.
            Locator::Text { tag: None, text } => {
                let lit = xpath_literal(text);
                Query::XPath(format!(
                    ".//*[contains(normalize-space(.), {lit})][not(.//*[contains(normalize-space(.), {lit})])]"
                ))
            }
            Locator::Structural { xpath } => Query::XPath(xpath.clone()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id { id } => write!(f, "id={}", id),
            Locator::Css { selector } => write!(f, "css={}", selector),
            Locator::Text { tag: Some(tag), text } => write!(f, "text={}@{}", text, tag),
            Locator::Text { tag: None, text } => write!(f, "text={}", text),
            Locator::Structural { xpath } => write!(f, "xpath={}", xpath),
        }
    }
}

/// One `(kind, pattern, timeout)` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatorStrategy {
    #[serde(flatten)]
    pub locator: Locator,
    #[serde(rename = "timeout_ms", serialize_with = "serialize_millis")]
    pub timeout: Duration,
}

impl LocatorStrategy {
    pub fn id(id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            locator: Locator::Id { id: id.into() },
            timeout,
        }
    }

    pub fn css(selector: impl Into<String>, timeout: Duration) -> Self {
        Self {
            locator: Locator::Css {
                selector: selector.into(),
            },
            timeout,
        }
    }

    pub fn text(text: impl Into<String>, timeout: Duration) -> Self {
        Self {
            locator: Locator::Text {
                tag: None,
                text: text.into(),
            },
            timeout,
        }
    }

    pub fn text_in(tag: impl Into<String>, text: impl Into<String>, timeout: Duration) -> Self {
        Self {
            locator: Locator::Text {
                tag: Some(tag.into()),
                text: text.into(),
            },
            timeout,
        }
    }

    pub fn structural(xpath: impl Into<String>, timeout: Duration) -> Self {
        Self {
            locator: Locator::Structural {
                xpath: xpath.into(),
            },
            timeout,
        }
    }

    pub fn kind(&self) -> LocatorKind {
        self.locator.kind()
    }

    pub fn query(&self) -> Query {
        self.locator.query()
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}ms)", self.locator, self.timeout.as_millis())
    }
}

/// Ordered strategies for one logical target, most confident first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyList {
    pub target: String,
    pub strategies: Vec<LocatorStrategy>,
}

impl StrategyList {
    pub fn new(target: impl Into<String>, strategies: Vec<LocatorStrategy>) -> Self {
        Self {
            target: target.into(),
            strategies,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocatorStrategy> {
        self.strategies.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Worst-case resolution latency: every strategy runs out its timeout
    pub fn total_timeout(&self) -> Duration {
        self.strategies.iter().map(|s| s.timeout).sum()
    }
}

impl fmt::Display for StrategyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target)
    }
}

/// Quote arbitrary text as an XPath 1.0 string literal
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text
            .split('\'')
            .map(|part| format!("'{}'", part))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Collapse whitespace and drop a trailing label colon
pub fn normalize_label(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches([':', '：'])
        .trim_end()
        .to_string()
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
#[path = "locator_test.rs"]
mod locator_test;
