//! Chromium-based renderer using chromiumoxide.

use super::script::{self, ActionOutcome, TextProbe};
use super::{LaunchOptions, Launcher, Locator, NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. SUPPLIER_SCRAPER_CHROMIUM env
    if let Ok(p) = std::env::var(crate::config::ENV_CHROMIUM) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Chrome for Testing under the home directory
    if let Some(home) = dirs::home_dir() {
        let candidates = [
            home.join(".cache/ms-playwright/chromium/chrome-linux/chrome"),
            home.join(".local/share/chromium/chrome-linux64/chrome"),
        ];
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches one Chromium process per batch.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    chromium_path: Option<PathBuf>,
}

impl ChromiumLauncher {
    /// Use `chromium_path` if given, otherwise discover the binary at launch.
    pub fn new(chromium_path: Option<PathBuf>) -> Self {
        Self { chromium_path }
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Renderer>> {
        let chrome_path = match &self.chromium_path {
            Some(path) => path.clone(),
            None => find_chromium().with_context(|| {
                format!(
                    "Chromium not found. Install Chrome/Chromium or set {}.",
                    crate::config::ENV_CHROMIUM
                )
            })?,
        };
        Ok(Box::new(ChromiumRenderer::launch(chrome_path, options).await?))
    }
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance at `chrome_path`.
    pub async fn launch(chrome_path: PathBuf, options: &LaunchOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");

        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };

        if let Some(ua) = &options.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        if let Some(vp) = options.viewport {
            builder = builder
                .window_size(vp.width, vp.height)
                .viewport(chromiumoxide::handler::viewport::Viewport {
                    width: vp.width,
                    height: vp.height,
                    ..Default::default()
                });
        }
        for arg in &options.args {
            builder = builder.arg(arg.clone());
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Drive the CDP connection until the browser goes away.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("chromium handler event error: {e}");
                }
            }
        });

        tracing::debug!(headless = options.headless, "chromium launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        let _ = browser.wait().await;
        self.handler.abort();
        closed.context("failed to close Chromium")?;
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    /// Evaluate a script from [`script`] and decode its JSON-string reply.
    async fn eval<T: DeserializeOwned>(&self, js: &str) -> Result<T> {
        let result = self
            .page
            .evaluate(js)
            .await
            .context("JS execution failed")?;

        let raw: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))?;

        serde_json::from_str(&raw).context("malformed JS reply")
    }

    async fn act(&self, js: &str, what: &str, target: String) -> Result<()> {
        let outcome: ActionOutcome = self.eval(js).await?;
        if !outcome.success {
            bail!("{what} failed: no element matches {target}");
        }
        Ok(())
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => bail!("navigation to {url} timed out after {timeout_ms}ms"),
        }
    }

    async fn wait_for_dom_content_loaded(&self, timeout_ms: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let state: String = self.eval(&script::ready_state()).await?;
            if state != "loading" {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("DOMContentLoaded not reached after {timeout_ms}ms");
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>> {
        let probe: TextProbe = self.eval(&script::text_content(locator)).await?;
        Ok(probe.found.then(|| probe.text.unwrap_or_default()))
    }

    async fn all_text_contents(&self, locator: &Locator) -> Result<Vec<String>> {
        self.eval(&script::all_text_contents(locator)).await
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        self.eval(&script::count(locator)).await
    }

    async fn is_visible(&self, locator: &Locator, index: usize) -> Result<bool> {
        self.eval(&script::is_visible(locator, index)).await
    }

    async fn text_content_within(
        &self,
        locator: &Locator,
        index: usize,
        child: &str,
    ) -> Result<Option<String>> {
        let probe: TextProbe = self
            .eval(&script::text_content_within(locator, index, child))
            .await?;
        Ok(probe.found.then(|| probe.text.unwrap_or_default()))
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        self.act(&script::click(locator), "click", locator.to_string()).await
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        self.act(&script::fill(locator, value), "fill", locator.to_string()).await
    }

    async fn check(&self, locator: &Locator) -> Result<()> {
        self.act(&script::check(locator), "check", locator.to_string()).await
    }

    async fn submit_form(&self, form_selector: &str) -> Result<()> {
        self.act(
            &script::submit_form(form_selector),
            "form submit",
            form_selector.to_string(),
        )
        .await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}
