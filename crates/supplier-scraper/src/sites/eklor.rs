//! Eklor (`eklor.shop`).

use async_trait::async_trait;

use super::{best_effort, SiteAdapter, SiteProfile, Spoof};
use crate::config::Timeouts;
use crate::extract::{FieldCollector, FieldSpec};
use crate::renderer::{
    click_when_ready, wait_for_selector, wait_for_url, Locator, RenderContext, Viewport,
};
use crate::types::Credentials;

pub const LOGIN_URL: &str = "https://eklor.shop/login";
/// Where a successful login lands.
pub const HOME_URL: &str = "https://eklor.shop/";

const EMAIL_INPUT: &str = "input[type=\"email\"]";
const PASSWORD_INPUT: &str = "input[type=\"password\"]";
const SUBMIT_BUTTON: &str = "button[type=\"submit\"]";
/// Elements that may carry the cookie banner's accept text.
pub const CONSENT_SCOPE: &str = "button, a, [role=button], div, span";
pub const CONSENT_TEXT: &str = "OK pour moi";

const FIELDS: [FieldSpec; 5] = [
    FieldSpec::text("name", "name", "h1.mb-4.text-2xl.font-medium"),
    FieldSpec::text("price_per_unit", "price", "span.text-3xl.font-semibold"),
    FieldSpec::text("stock", "stock", "button.Stock-label.Stock-label"),
    FieldSpec::text("description", "description", "p.mb-6.text-base.font-normal"),
    FieldSpec::list("technical_ref", "technical_ref", "li.bullet-list"),
];

static PROFILE: SiteProfile = SiteProfile {
    name: "Eklor",
    login_url: LOGIN_URL,
    fields: &["name", "price_per_unit", "stock", "description", "technical_ref"],
    availability_phrase: "produits en stock",
    single_unit_label: Some("À l'unité"),
    clean_technical_refs: false,
    spoof: Some(Spoof {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        viewport: Viewport {
            width: 1280,
            height: 800,
        },
        args: &["--disable-blink-features=AutomationControlled"],
    }),
};

/// Site A.
pub struct Eklor;

#[async_trait]
impl SiteAdapter for Eklor {
    fn profile(&self) -> &'static SiteProfile {
        &PROFILE
    }

    async fn accept_cookies(&self, ctx: &dyn RenderContext, timeouts: &Timeouts) {
        best_effort(
            "eklor cookie consent",
            click_when_ready(
                ctx,
                &Locator::with_text(CONSENT_SCOPE, CONSENT_TEXT),
                timeouts.cookie_consent_ms,
                timeouts.poll_interval(),
            ),
        )
        .await;
    }

    async fn login(
        &self,
        ctx: &mut dyn RenderContext,
        credentials: &Credentials,
        timeouts: &Timeouts,
    ) -> anyhow::Result<()> {
        ctx.navigate(LOGIN_URL, timeouts.navigation_ms).await?;

        let email = Locator::css(EMAIL_INPUT);
        wait_for_selector(&*ctx, &email, timeouts.element_ms, timeouts.poll_interval()).await?;
        ctx.fill(&email, &credentials.username).await?;
        ctx.fill(&Locator::css(PASSWORD_INPUT), &credentials.password)
            .await?;

        // The banner overlays the submit button.
        self.accept_cookies(&*ctx, timeouts).await;

        ctx.click(&Locator::css(SUBMIT_BUTTON)).await?;
        wait_for_url(
            &*ctx,
            |url| url == HOME_URL,
            timeouts.login_redirect_ms,
            timeouts.poll_interval(),
        )
        .await?;
        Ok(())
    }

    async fn extract_fields(
        &self,
        ctx: &dyn RenderContext,
        fields: &mut FieldCollector,
        timeouts: &Timeouts,
    ) {
        for field in &FIELDS {
            fields.extract(ctx, field, timeouts).await;
        }
    }
}
