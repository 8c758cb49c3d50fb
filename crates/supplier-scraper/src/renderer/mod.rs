//! Renderer abstraction for browser-based page interaction.
//!
//! Defines the `Launcher`, `Renderer` and `RenderContext` traits that abstract
//! over the browser engine (currently Chromium via chromiumoxide). Site
//! adapters only ever talk to a `RenderContext`.

pub mod chromium;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod script;

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Browser window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// How to start the browser for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub headless: bool,
    pub user_agent: Option<String>,
    pub viewport: Option<Viewport>,
    /// Extra Chromium command-line switches.
    pub args: Vec<String>,
}

/// How to find elements on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Plain CSS selector.
    Css(String),
    /// Elements matching `scope` whose text contains `text`
    /// (case-insensitive, whitespace-collapsed).
    Text { scope: String, text: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn with_text(scope: impl Into<String>, text: impl Into<String>) -> Self {
        Locator::Text {
            scope: scope.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "{selector}"),
            Locator::Text { scope, text } => write!(f, "{scope}:has-text(\"{text}\")"),
        }
    }
}

/// Starts a browser engine.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launch a fresh browser with the given options.
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Renderer>>;
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
///
/// Query methods never wait: they report what the DOM holds right now.
/// Use [`wait_for_selector`] and [`wait_for_url`] for bounded waits.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Wait until the document has finished parsing.
    async fn wait_for_dom_content_loaded(&self, timeout_ms: u64) -> Result<()>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Text content of the first match, `None` if nothing matches.
    async fn text_content(&self, locator: &Locator) -> Result<Option<String>>;
    /// Text content of every match, in document order.
    async fn all_text_contents(&self, locator: &Locator) -> Result<Vec<String>>;
    /// Number of matching elements.
    async fn count(&self, locator: &Locator) -> Result<usize>;
    /// Whether the `index`-th match is rendered and visible.
    async fn is_visible(&self, locator: &Locator, index: usize) -> Result<bool>;
    /// Text of the first `child` CSS match inside the `index`-th match.
    async fn text_content_within(
        &self,
        locator: &Locator,
        index: usize,
        child: &str,
    ) -> Result<Option<String>>;
    /// Click the first match. Fails if nothing matches.
    async fn click(&self, locator: &Locator) -> Result<()>;
    /// Replace the value of the first matching input.
    async fn fill(&self, locator: &Locator, value: &str) -> Result<()>;
    /// Tick the first matching checkbox.
    async fn check(&self, locator: &Locator) -> Result<()>;
    /// Submit the first form matching `form_selector` programmatically.
    async fn submit_form(&self, form_selector: &str) -> Result<()>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Poll until at least one element matches, or fail after `timeout_ms`.
pub async fn wait_for_selector(
    ctx: &dyn RenderContext,
    locator: &Locator,
    timeout_ms: u64,
    poll: Duration,
) -> Result<()> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        // Transient evaluation errors during navigation count as "not yet".
        if matches!(ctx.count(locator).await, Ok(n) if n > 0) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("timed out after {timeout_ms}ms waiting for {locator}");
        }
        tokio::time::sleep(poll).await;
    }
}

/// Poll the current URL until `accept` returns true, or fail after `timeout_ms`.
pub async fn wait_for_url<F>(
    ctx: &dyn RenderContext,
    accept: F,
    timeout_ms: u64,
    poll: Duration,
) -> Result<String>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let mut last = String::new();
    loop {
        if let Ok(url) = ctx.get_url().await {
            if accept(&url) {
                return Ok(url);
            }
            last = url;
        }
        if Instant::now() >= deadline {
            bail!("timed out after {timeout_ms}ms waiting for navigation (still at {last:?})");
        }
        tokio::time::sleep(poll).await;
    }
}

/// Wait for `locator` to appear, then click it.
pub async fn click_when_ready(
    ctx: &dyn RenderContext,
    locator: &Locator,
    timeout_ms: u64,
    poll: Duration,
) -> Result<()> {
    wait_for_selector(ctx, locator, timeout_ms, poll).await?;
    ctx.click(locator).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::css("h1.title").to_string(), "h1.title");
        assert_eq!(
            Locator::with_text("button", "OK pour moi").to_string(),
            "button:has-text(\"OK pour moi\")"
        );
    }
}
