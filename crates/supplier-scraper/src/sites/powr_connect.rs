//! Powr Connect (`powr-connect.shop`).

use std::time::Duration;

use async_trait::async_trait;

use super::{best_effort, SiteAdapter, SiteProfile};
use crate::config::Timeouts;
use crate::extract::{FieldCollector, FieldSpec};
use crate::renderer::{click_when_ready, wait_for_selector, wait_for_url, Locator, RenderContext};
use crate::types::Credentials;

pub const LOGIN_URL: &str = "https://powr-connect.shop/connexion";

const CONSENT_WIDGET: &str = "div[class*=\"axeptio_widget_wrapper\"]";
const CONSENT_TEXT: &str = "OK pour moi";
const USERNAME_INPUT: &str = "input[name=\"username\"]";
const PASSWORD_INPUT: &str = "input[name=\"password\"]";
const STAY_CONNECTED: &str = "input[name=\"stayConnected\"]";
const LOGIN_FORM: &str = "form[action*=\"/connexion\"]";

const FIELDS: [FieldSpec; 5] = [
    FieldSpec::text("name", "name", "h1.text-2xl.font-semibold.tracking-tight"),
    FieldSpec::text("description", "description", "p.mt-4"),
    FieldSpec::text("price_per_unit", "price", "p.text-2xl.font-semibold.leading-none"),
    FieldSpec::text("stock", "stock", "button.Stock-label.Stock-label"),
    FieldSpec::list("technical_ref", "technical_ref", "ul.bulleted-list li"),
];

static PROFILE: SiteProfile = SiteProfile {
    name: "Powr Connect",
    login_url: LOGIN_URL,
    fields: &["name", "description", "price_per_unit", "stock", "technical_ref"],
    availability_phrase: "produits en stock",
    single_unit_label: Some("À l'unité"),
    clean_technical_refs: false,
    spoof: None,
};

/// Site B.
pub struct PowrConnect;

fn left_login_page(url: &str) -> bool {
    !url.trim_end_matches('/').ends_with("/connexion")
}

#[async_trait]
impl SiteAdapter for PowrConnect {
    fn profile(&self) -> &'static SiteProfile {
        &PROFILE
    }

    async fn accept_cookies(&self, ctx: &dyn RenderContext, timeouts: &Timeouts) {
        best_effort("powr-connect cookie consent", async {
            let poll = timeouts.poll_interval();
            wait_for_selector(
                ctx,
                &Locator::css(CONSENT_WIDGET),
                timeouts.cookie_consent_ms,
                poll,
            )
            .await?;
            click_when_ready(
                ctx,
                &Locator::with_text("button", CONSENT_TEXT),
                timeouts.cookie_consent_ms,
                poll,
            )
            .await?;
            // Let the widget animate out before touching the page.
            tokio::time::sleep(Duration::from_millis(timeouts.consent_settle_ms)).await;
            Ok(())
        })
        .await;
    }

    async fn login(
        &self,
        ctx: &mut dyn RenderContext,
        credentials: &Credentials,
        timeouts: &Timeouts,
    ) -> anyhow::Result<()> {
        ctx.navigate(LOGIN_URL, timeouts.navigation_ms).await?;
        self.accept_cookies(&*ctx, timeouts).await;

        let username = Locator::css(USERNAME_INPUT);
        wait_for_selector(&*ctx, &username, timeouts.element_ms, timeouts.poll_interval())
            .await?;
        ctx.fill(&username, &credentials.username).await?;
        ctx.fill(&Locator::css(PASSWORD_INPUT), &credentials.password)
            .await?;

        best_effort(
            "powr-connect stay connected",
            ctx.check(&Locator::css(STAY_CONNECTED)),
        )
        .await;

        // The submit button is covered by overlays; post the form directly.
        ctx.submit_form(LOGIN_FORM).await?;
        wait_for_url(
            &*ctx,
            left_login_page,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_login_page() {
        assert!(!left_login_page("https://powr-connect.shop/connexion"));
        assert!(!left_login_page("https://powr-connect.shop/connexion/"));
        assert!(left_login_page("https://powr-connect.shop/"));
        assert!(left_login_page("https://powr-connect.shop/mon-compte"));
    }
}
