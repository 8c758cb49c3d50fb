//! Site adapters: one per supplier portal.
//!
//! Each adapter knows its portal's login form, cookie banner and product
//! page markup. They share the [`SiteAdapter`] interface; [`Site`] is the
//! tagged selector used by callers.

pub mod eklor;
pub mod powr_connect;
pub mod voltaneo;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Timeouts;
use crate::extract::FieldCollector;
use crate::renderer::{LaunchOptions, RenderContext, Viewport};
use crate::types::{Credentials, ExtractionOutcome, ProductRef, ScrapeError};

/// Browser fingerprint overrides some portals need before they serve pages.
#[derive(Debug, Clone, Copy)]
pub struct Spoof {
    pub user_agent: &'static str,
    pub viewport: Viewport,
    pub args: &'static [&'static str],
}

/// Static, per-site configuration consumed by the pipeline and normalizer.
#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    pub name: &'static str,
    pub login_url: &'static str,
    /// Raw field keys this site produces; all set to the sentinel when the
    /// product page fails to load.
    pub fields: &'static [&'static str],
    /// Stock text containing this phrase (case-insensitive) means available.
    pub availability_phrase: &'static str,
    /// Sites with a single price get it as tier 1 under this unit label.
    pub single_unit_label: Option<&'static str>,
    /// Whether technical references need whitespace cleanup.
    pub clean_technical_refs: bool,
    pub spoof: Option<Spoof>,
}

impl SiteProfile {
    /// Browser launch options for this site.
    pub fn launch_options(&self, headless: bool) -> LaunchOptions {
        match self.spoof {
            Some(spoof) => LaunchOptions {
                headless,
                user_agent: Some(spoof.user_agent.to_string()),
                viewport: Some(spoof.viewport),
                args: spoof.args.iter().map(|a| a.to_string()).collect(),
            },
            None => LaunchOptions {
                headless,
                ..Default::default()
            },
        }
    }
}

/// Login and extraction against one portal.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn profile(&self) -> &'static SiteProfile;

    /// Dismiss the cookie banner if one shows up. Never fails.
    async fn accept_cookies(&self, ctx: &dyn RenderContext, timeouts: &Timeouts);

    /// Log in on a fresh context. Any error means the session is unusable.
    async fn login(
        &self,
        ctx: &mut dyn RenderContext,
        credentials: &Credentials,
        timeouts: &Timeouts,
    ) -> anyhow::Result<()>;

    /// Extract this site's fields from the loaded product page.
    async fn extract_fields(
        &self,
        ctx: &dyn RenderContext,
        fields: &mut FieldCollector,
        timeouts: &Timeouts,
    );

    /// Visit one product page and extract every field.
    ///
    /// A failed navigation short-circuits to an all-sentinel outcome; field
    /// failures are folded into the outcome. An `Err` here means something
    /// broke outside that handling.
    async fn extract_product(
        &self,
        ctx: &mut dyn RenderContext,
        item: &ProductRef,
        timeouts: &Timeouts,
    ) -> anyhow::Result<ExtractionOutcome> {
        if let Err(e) = open_product_page(self, ctx, &item.url, timeouts).await {
            tracing::warn!(url = %item.url, "product page failed to load: {e:#}");
            return Ok(ExtractionOutcome::navigation_failed(
                item.clone(),
                self.profile().fields,
                &format!("{e:#}"),
            ));
        }

        let mut fields = FieldCollector::new();
        self.extract_fields(&*ctx, &mut fields, timeouts).await;
        Ok(fields.finish(item.clone()))
    }
}

async fn open_product_page<A: SiteAdapter + ?Sized>(
    adapter: &A,
    ctx: &mut dyn RenderContext,
    url: &str,
    timeouts: &Timeouts,
) -> anyhow::Result<()> {
    ctx.navigate(url, timeouts.navigation_ms).await?;
    ctx.wait_for_dom_content_loaded(timeouts.dom_ready_ms).await?;
    adapter.accept_cookies(&*ctx, timeouts).await;
    Ok(())
}

/// Run an optional step, logging and discarding any failure.
pub(crate) async fn best_effort<F>(what: &str, step: F)
where
    F: Future<Output = anyhow::Result<()>>,
{
    match step.await {
        Ok(()) => tracing::debug!("{what}: done"),
        Err(e) => tracing::debug!("{what}: skipped ({e})"),
    }
}

/// The supported portals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Site {
    Eklor,
    PowrConnect,
    Voltaneo,
}

impl Site {
    pub const ALL: [Site; 3] = [Site::Eklor, Site::PowrConnect, Site::Voltaneo];

    /// URL-safe identifier (`eklor`, `powr-connect`, `voltaneo`).
    pub fn slug(self) -> &'static str {
        match self {
            Site::Eklor => "eklor",
            Site::PowrConnect => "powr-connect",
            Site::Voltaneo => "voltaneo",
        }
    }

    pub fn adapter(self) -> &'static dyn SiteAdapter {
        match self {
            Site::Eklor => &eklor::Eklor,
            Site::PowrConnect => &powr_connect::PowrConnect,
            Site::Voltaneo => &voltaneo::Voltaneo,
        }
    }

    pub fn profile(self) -> &'static SiteProfile {
        self.adapter().profile()
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Site {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Site::ALL
            .into_iter()
            .find(|site| site.slug() == wanted || site.slug().replace('-', "") == wanted)
            .ok_or_else(|| ScrapeError::UnknownSite(s.to_string()))
    }
}
