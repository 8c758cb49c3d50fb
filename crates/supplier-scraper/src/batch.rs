//! Batch runner: one browser, one login, every item in order.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;

use crate::config::{ScraperConfig, Timeouts};
use crate::normalize::normalize;
use crate::renderer::{Launcher, Renderer};
use crate::session::Session;
use crate::sites::{Site, SiteAdapter};
use crate::types::{
    ExtractionOutcome, ProductRef, ScrapeError, ScrapeOutput, ScrapeRequest, ScrapeResult,
};

/// Visit every item on `session`, strictly in input order.
///
/// Returns exactly one outcome per item. An adapter error or panic degrades
/// that item only. The session is closed once the loop ends.
pub async fn run_batch(
    mut session: Session,
    adapter: &dyn SiteAdapter,
    items: &[ProductRef],
    timeouts: &Timeouts,
) -> Vec<ExtractionOutcome> {
    let mut outcomes = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let started = Instant::now();
        let attempt = AssertUnwindSafe(adapter.extract_product(session.context_mut(), item, timeouts))
            .catch_unwind()
            .await;

        let outcome = match attempt {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(session = %session.id, url = %item.url, "extraction failed: {e:#}");
                ExtractionOutcome::failed(item.clone(), format!("{e:#}"))
            }
            Err(panic_info) => {
                let message = extract_panic_message(&panic_info);
                tracing::warn!(session = %session.id, url = %item.url, "extraction panicked: {message}");
                ExtractionOutcome::failed(item.clone(), message)
            }
        };

        tracing::info!(
            session = %session.id,
            item = index + 1,
            of = items.len(),
            ok = outcome.is_ok == 1,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "item done"
        );
        outcomes.push(outcome);
    }

    let session_id = session.id.clone();
    if let Err(e) = session.close().await {
        tracing::warn!(session = %session_id, "failed to close session: {e:#}");
    }
    outcomes
}

/// Scrape one batch end to end: launch, log in, extract, normalize.
///
/// Login failure is a normal result ([`ScrapeOutput::LoginFailed`]); only
/// browser problems come back as errors. The browser is shut down on every
/// path.
pub async fn scrape(
    launcher: &dyn Launcher,
    site: Site,
    request: &ScrapeRequest,
    config: &ScraperConfig,
) -> ScrapeResult<ScrapeOutput> {
    let adapter = site.adapter();
    let profile = adapter.profile();
    tracing::info!(site = profile.name, items = request.items.len(), "starting batch");

    let renderer = launcher
        .launch(&profile.launch_options(config.headless))
        .await
        .map_err(|e| ScrapeError::BrowserUnavailable(format!("{e:#}")))?;

    let result = scrape_with(renderer.as_ref(), adapter, request, &config.timeouts).await;

    if let Err(e) = renderer.shutdown().await {
        tracing::warn!(site = profile.name, "browser shutdown failed: {e:#}");
    }
    result
}

async fn scrape_with(
    renderer: &dyn Renderer,
    adapter: &dyn SiteAdapter,
    request: &ScrapeRequest,
    timeouts: &Timeouts,
) -> ScrapeResult<ScrapeOutput> {
    let context = renderer
        .new_context()
        .await
        .map_err(|e| ScrapeError::BrowserUnavailable(format!("{e:#}")))?;

    let session = match Session::establish(adapter, context, &request.credentials, timeouts).await {
        Ok(session) => session,
        Err(ScrapeError::LoginFailed(_)) => return Ok(ScrapeOutput::LoginFailed),
        Err(e) => return Err(e),
    };

    let outcomes = run_batch(session, adapter, &request.items, timeouts).await;
    let failed = outcomes.iter().filter(|o| o.is_ok == 0).count();
    tracing::info!(
        site = adapter.profile().name,
        items = outcomes.len(),
        failed,
        "batch finished"
    );
    Ok(ScrapeOutput::Records(normalize(
        &outcomes,
        adapter.profile(),
        Utc::now(),
    )))
}

/// Best-effort text of a caught panic payload.
pub fn extract_panic_message(panic_info: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
