//! Scripted in-memory browser.
//!
//! Pages are static maps from locator (its `Display` form) to elements.
//! Used by the test suites and by callers that want to exercise the
//! pipeline without Chromium.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use super::{LaunchOptions, Launcher, Locator, NavigationResult, RenderContext, Renderer};
use crate::config::Timeouts;

/// One element on a fake page.
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub text: String,
    pub visible: bool,
    /// Text of descendants, keyed by child CSS selector.
    pub children: HashMap<String, String>,
}

impl FakeElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: true,
            children: HashMap::new(),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn child(mut self, selector: &str, text: impl Into<String>) -> Self {
        self.children.insert(selector.to_string(), text.into());
        self
    }
}

/// A page: elements grouped by the locator that matches them.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    elements: HashMap<String, Vec<FakeElement>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one element matching `locator` (CSS selector or `Locator` display form).
    pub fn element(mut self, locator: impl ToString, element: FakeElement) -> Self {
        self.elements
            .entry(locator.to_string())
            .or_default()
            .push(element);
        self
    }

    /// Shorthand for a visible element with plain text.
    pub fn text(self, locator: impl ToString, text: &str) -> Self {
        self.element(locator, FakeElement::new(text))
    }

    fn matches(&self, locator: &Locator) -> &[FakeElement] {
        self.elements
            .get(&locator.to_string())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
struct LoginRule {
    trigger: String,
    username: String,
    password: String,
    landing_url: String,
}

/// What happened while the fake browser was in use.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    pub launches: Vec<LaunchOptions>,
    pub navigations: Vec<String>,
    pub actions: Vec<String>,
    pub contexts_opened: usize,
    pub contexts_closed: usize,
    pub shutdowns: usize,
}

/// A scripted portal.
#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    pages: HashMap<String, FakePage>,
    broken: HashMap<String, String>,
    panicking: HashSet<String>,
    login: Option<LoginRule>,
    launch_error: Option<String>,
    journal: Arc<Mutex<Journal>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Navigating to `url` fails with `message`.
    pub fn broken(mut self, url: &str, message: &str) -> Self {
        self.broken.insert(url.to_string(), message.to_string());
        self
    }

    /// Navigating to `url` panics.
    pub fn panics_on(mut self, url: &str) -> Self {
        self.panicking.insert(url.to_string());
        self
    }

    /// Clicking or submitting `trigger` after filling in these credentials
    /// moves the context to `landing_url`.
    pub fn accepts_login(
        mut self,
        trigger: impl ToString,
        username: &str,
        password: &str,
        landing_url: &str,
    ) -> Self {
        self.login = Some(LoginRule {
            trigger: trigger.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            landing_url: landing_url.to_string(),
        });
        self
    }

    /// Launching the browser fails.
    pub fn unlaunchable(mut self, message: &str) -> Self {
        self.launch_error = Some(message.to_string());
        self
    }

    /// Snapshot of everything recorded so far.
    pub fn journal(&self) -> Journal {
        self.record().clone()
    }

    fn record(&self) -> MutexGuard<'_, Journal> {
        self.journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// [`Launcher`] over a [`FakeSite`].
#[derive(Debug, Clone)]
pub struct FakeLauncher {
    site: Arc<FakeSite>,
}

impl FakeLauncher {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
        }
    }

    pub fn journal(&self) -> Journal {
        self.site.journal()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Renderer>> {
        if let Some(message) = &self.site.launch_error {
            bail!("{message}");
        }
        self.site.record().launches.push(options.clone());
        Ok(Box::new(FakeRenderer {
            site: Arc::clone(&self.site),
        }))
    }
}

pub struct FakeRenderer {
    site: Arc<FakeSite>,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.site.record().contexts_opened += 1;
        Ok(Box::new(FakeContext {
            site: Arc::clone(&self.site),
            state: Mutex::new(ContextState::default()),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.site.record().shutdowns += 1;
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        let journal = self.site.record();
        journal.contexts_opened - journal.contexts_closed
    }
}

#[derive(Debug, Default)]
struct ContextState {
    url: String,
    fills: Vec<(String, String)>,
}

pub struct FakeContext {
    site: Arc<FakeSite>,
    state: Mutex<ContextState>,
}

impl FakeContext {
    fn state(&self) -> MutexGuard<'_, ContextState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn page(&self) -> Option<&FakePage> {
        let url = self.state().url.clone();
        self.site.pages.get(&url)
    }

    fn matches(&self, locator: &Locator) -> Vec<FakeElement> {
        self.page()
            .map(|page| page.matches(locator).to_vec())
            .unwrap_or_default()
    }

    fn require(&self, locator: &Locator, action: &str) -> Result<()> {
        self.site.record().actions.push(format!("{action} {locator}"));
        if self.matches(locator).is_empty() {
            bail!("{action}: no element matches {locator}");
        }
        Ok(())
    }

    fn maybe_log_in(&self, target: &str) {
        let Some(rule) = &self.site.login else {
            return;
        };
        if rule.trigger != target {
            return;
        }
        let mut state = self.state();
        let filled = |value: &str| state.fills.iter().any(|(_, v)| v == value);
        if filled(&rule.username) && filled(&rule.password) {
            state.url = rule.landing_url.clone();
        }
    }
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        self.site.record().navigations.push(url.to_string());
        if self.site.panicking.contains(url) {
            panic!("renderer crashed while loading {url}");
        }
        if let Some(message) = self.site.broken.get(url) {
            bail!("{message}");
        }
        self.state().url = url.to_string();
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 0,
        })
    }

    async fn wait_for_dom_content_loaded(&self, _timeout_ms: u64) -> Result<()> {
        Ok(())
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.state().url.clone())
    }

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>> {
        Ok(self.matches(locator).into_iter().next().map(|e| e.text))
    }

    async fn all_text_contents(&self, locator: &Locator) -> Result<Vec<String>> {
        Ok(self.matches(locator).into_iter().map(|e| e.text).collect())
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        Ok(self.matches(locator).len())
    }

    async fn is_visible(&self, locator: &Locator, index: usize) -> Result<bool> {
        Ok(self
            .matches(locator)
            .get(index)
            .map(|e| e.visible)
            .unwrap_or(false))
    }

    async fn text_content_within(
        &self,
        locator: &Locator,
        index: usize,
        child: &str,
    ) -> Result<Option<String>> {
        let elements = self.matches(locator);
        let element = elements
            .get(index)
            .ok_or_else(|| anyhow!("no element #{index} for {locator}"))?;
        Ok(element.children.get(child).cloned())
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        self.require(locator, "click")?;
        self.maybe_log_in(&locator.to_string());
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        self.require(locator, "fill")?;
        self.state().fills.push((locator.to_string(), value.to_string()));
        Ok(())
    }

    async fn check(&self, locator: &Locator) -> Result<()> {
        self.require(locator, "check")
    }

    async fn submit_form(&self, form_selector: &str) -> Result<()> {
        self.require(&Locator::css(form_selector), "submit")?;
        self.maybe_log_in(form_selector);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.site.record().contexts_closed += 1;
        Ok(())
    }
}

/// Timeouts short enough that absent elements fail fast.
pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        navigation_ms: 1_000,
        dom_ready_ms: 100,
        cookie_consent_ms: 20,
        consent_settle_ms: 0,
        element_ms: 100,
        login_redirect_ms: 100,
        list_wait_ms: 20,
        tiers_wait_ms: 20,
        poll_interval_ms: 5,
    }
}
