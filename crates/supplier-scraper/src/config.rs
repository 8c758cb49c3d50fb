//! Runtime configuration: browser launch settings and wait timeouts.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the Chromium binary path.
pub const ENV_CHROMIUM: &str = "SUPPLIER_SCRAPER_CHROMIUM";
/// Environment variable toggling headless mode (`0`/`false` shows the window).
pub const ENV_HEADLESS: &str = "SUPPLIER_SCRAPER_HEADLESS";
/// Environment variable overriding the page navigation timeout.
pub const ENV_NAV_TIMEOUT_MS: &str = "SUPPLIER_SCRAPER_NAV_TIMEOUT_MS";

/// Every bounded wait in the pipeline.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Page navigation (`goto`).
    pub navigation_ms: u64,
    /// Waiting for `DOMContentLoaded` after navigation.
    pub dom_ready_ms: u64,
    /// Cookie-consent banners.
    pub cookie_consent_ms: u64,
    /// Pause after dismissing a consent banner that animates out.
    pub consent_settle_ms: u64,
    /// Form inputs and buttons on the login page.
    pub element_ms: u64,
    /// Leaving the login page after submitting credentials.
    pub login_redirect_ms: u64,
    /// List fields (technical references).
    pub list_wait_ms: u64,
    /// Pricing tier rows.
    pub tiers_wait_ms: u64,
    /// Poll interval for selector and URL waits.
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            dom_ready_ms: 10_000,
            cookie_consent_ms: 3_000,
            consent_settle_ms: 500,
            element_ms: 10_000,
            login_redirect_ms: 10_000,
            list_wait_ms: 3_000,
            tiers_wait_ms: 5_000,
            poll_interval_ms: 100,
        }
    }
}

impl Timeouts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Scraper configuration.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Run the browser without a window.
    pub headless: bool,
    /// Explicit Chromium binary; discovered automatically when `None`.
    pub chromium_path: Option<PathBuf>,
    pub timeouts: Timeouts,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl ScraperConfig {
    /// Defaults overlaid with any `SUPPLIER_SCRAPER_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var(ENV_CHROMIUM) {
            if !path.trim().is_empty() {
                config.chromium_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(value) = std::env::var(ENV_HEADLESS) {
            match parse_bool(&value) {
                Some(headless) => config.headless = headless,
                None => tracing::warn!("ignoring {ENV_HEADLESS}={value:?}: not a boolean"),
            }
        }

        if let Ok(value) = std::env::var(ENV_NAV_TIMEOUT_MS) {
            match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.timeouts.navigation_ms = ms,
                _ => tracing::warn!("ignoring {ENV_NAV_TIMEOUT_MS}={value:?}: not a positive integer"),
            }
        }

        config
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
