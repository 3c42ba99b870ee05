//! The seam between the download pipeline and a live browser.
//!
//! Lookups report absence and staleness as values ([`Lookup`], [`Click`]) so
//! that callers branch on them instead of treating them as errors. Only a
//! broken session surfaces as [`BrowserError`].

use std::fmt;

/// How to find an element. Chosen per layout variant, never built from
/// arbitrary strings at call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    ClassName(String),
    /// Element whose own visible text contains the given string.
    Text(String),
    XPath(String),
    Tag(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::ClassName(name) => write!(f, "class {name:?}"),
            Locator::Text(text) => write!(f, "text {text:?}"),
            Locator::XPath(path) => write!(f, "xpath {path:?}"),
            Locator::Tag(tag) => write!(f, "tag <{tag}>"),
        }
    }
}

/// How the download control of a unit is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTrigger {
    pub locator: Locator,
}

impl DownloadTrigger {
    pub fn new(locator: Locator) -> Self {
        Self { locator }
    }
}

/// Outcome of a single-element lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    /// The element existed but its reference outlived a page refresh.
    Stale,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound | Lookup::Stale => None,
        }
    }
}

/// Outcome of clicking an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Click {
    Clicked,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrowserError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("webdriver session error: {0}")]
    Session(String),
    #[error("could not start browser: {0}")]
    Startup(String),
}

/// A single, serially used browser session.
///
/// Element handles are only valid until the page navigates.
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    type Element: Clone + Send + Sync;

    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Returns to the top-level document.
    async fn leave_frames(&self) -> Result<(), BrowserError>;

    /// Switches the session into the given frame element.
    async fn enter_frame(&self, frame: &Self::Element) -> Result<Click, BrowserError>;

    async fn find(&self, locator: &Locator) -> Result<Lookup<Self::Element>, BrowserError>;

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self::Element>, BrowserError>;

    async fn text(&self, element: &Self::Element) -> Result<Lookup<String>, BrowserError>;

    async fn click(&self, element: &Self::Element) -> Result<Click, BrowserError>;

    async fn type_text(&self, element: &Self::Element, text: &str) -> Result<Click, BrowserError>;

    /// Visible text of the current document body.
    async fn body_text(&self) -> Result<String, BrowserError>;

    /// Rendered markup of the current document.
    async fn page_source(&self) -> Result<String, BrowserError>;

    /// Text of the JavaScript dialogue currently open, if any.
    async fn alert_text(&self) -> Result<Option<String>, BrowserError>;
}
