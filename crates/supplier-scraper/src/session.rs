//! Authenticated portal sessions.
//!
//! A session owns one browser context that has been through a site's login
//! flow. It is handed to the batch runner and closed once, after the batch.

use std::time::{Duration, Instant};

use crate::config::Timeouts;
use crate::renderer::RenderContext;
use crate::sites::SiteAdapter;
use crate::types::{Credentials, ScrapeError, ScrapeResult};

/// A logged-in browser context.
pub struct Session {
    /// Identifier used in log lines (`<site>-<n>`).
    pub id: String,
    /// Portal display name.
    pub site: &'static str,
    context: Box<dyn RenderContext>,
    created_at: Instant,
}

impl Session {
    /// Run the adapter's login flow on a fresh context.
    ///
    /// On failure the context is closed before returning
    /// [`ScrapeError::LoginFailed`].
    pub async fn establish(
        adapter: &dyn SiteAdapter,
        mut context: Box<dyn RenderContext>,
        credentials: &Credentials,
        timeouts: &Timeouts,
    ) -> ScrapeResult<Self> {
        let site = adapter.profile().name;
        tracing::info!(site, user = %credentials.username, "logging in");

        let started = Instant::now();
        match adapter.login(context.as_mut(), credentials, timeouts).await {
            Ok(()) => {
                let id = format!("{}-{}", site.to_ascii_lowercase().replace(' ', "-"), next_id());
                tracing::info!(
                    session = %id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "login succeeded"
                );
                Ok(Self {
                    id,
                    site,
                    context,
                    created_at: Instant::now(),
                })
            }
            Err(e) => {
                tracing::warn!(site, "login failed: {e:#}");
                if let Err(close_err) = context.close().await {
                    tracing::debug!(site, "closing context after failed login: {close_err:#}");
                }
                Err(ScrapeError::LoginFailed(format!("{e:#}")))
            }
        }
    }

    /// The browser context for this session.
    pub fn context_mut(&mut self) -> &mut dyn RenderContext {
        self.context.as_mut()
    }

    /// How long the session has been alive.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Close the session and release the browser context.
    pub async fn close(self) -> anyhow::Result<()> {
        tracing::debug!(session = %self.id, age_ms = self.age().as_millis() as u64, "closing session");
        self.context.close().await
    }
}

fn next_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}
