//! Voltaneo (`webshop.voltaneo.com`).
//!
//! Unlike the other portals, Voltaneo lists up to three packaging tiers
//! (unit label + price) per product and splits stock into a label and an
//! optional quantity.

use anyhow::bail;
use async_trait::async_trait;

use super::{best_effort, SiteAdapter, SiteProfile};
use crate::config::Timeouts;
use crate::extract::{FieldCollector, FieldSpec};
use crate::renderer::{click_when_ready, wait_for_selector, wait_for_url, Locator, RenderContext};
use crate::types::{Credentials, FieldValue};

pub const LOGIN_URL: &str = "https://webshop.voltaneo.com/login";

/// Maximum number of packaging tiers kept per product.
pub const MAX_TIERS: usize = 3;

const CONSENT_BUTTON: &str = "button.cmplz-btn.cmplz-accept";
const USERNAME_INPUT: &str = "input[name=\"username\"]";
const PASSWORD_INPUT: &str = "input[name=\"password\"]";
const REMEMBER_ME: &str = "input[name=\"rememberme\"]";
const SUBMIT_TEXT: &str = "Se connecter";

const TIER_ROWS: &str = "section.addToCartSection p.conditionnement";
const TIER_LABEL: &str = "span.label";
const TIER_NUMBER: &str = "span.number";
const STOCK_LABEL: &str = "div.stock span.label";
const STOCK_NUMBER: &str = "div.stock span.number";

const NAME: FieldSpec = FieldSpec::text("name", "name", "h1.product_title.entry-title");
const DESCRIPTION: FieldSpec = FieldSpec::text("description", "description", "div.product_description");
const TECHNICAL_REF: FieldSpec =
    FieldSpec::list_after("technical_ref", "technical_ref", "div.col div.fcat", "div.col");

static PROFILE: SiteProfile = SiteProfile {
    name: "Voltaneo",
    login_url: LOGIN_URL,
    fields: &[
        "name",
        "description",
        "unit_1",
        "price_per_unit_1",
        "unit_2",
        "price_per_unit_2",
        "unit_3",
        "price_per_unit_3",
        "stock",
        "technical_ref",
    ],
    availability_phrase: "stock",
    single_unit_label: None,
    clean_technical_refs: true,
    spoof: None,
};

/// Site C.
pub struct Voltaneo;

fn left_login_page(url: &str) -> bool {
    !url.trim_end_matches('/').ends_with("/login")
}

/// Visible tier rows, in page order, capped at [`MAX_TIERS`].
async fn read_tiers(
    ctx: &dyn RenderContext,
    timeouts: &Timeouts,
) -> anyhow::Result<Vec<(FieldValue, FieldValue)>> {
    let rows = Locator::css(TIER_ROWS);
    wait_for_selector(ctx, &rows, timeouts.tiers_wait_ms, timeouts.poll_interval()).await?;

    let count = ctx.count(&rows).await?;
    let mut tiers = Vec::with_capacity(MAX_TIERS);
    for index in 0..count.min(MAX_TIERS) {
        if !ctx.is_visible(&rows, index).await? {
            continue;
        }
        let Some(label) = ctx.text_content_within(&rows, index, TIER_LABEL).await? else {
            bail!("tier row {index} has no {TIER_LABEL}");
        };
        let Some(number) = ctx.text_content_within(&rows, index, TIER_NUMBER).await? else {
            bail!("tier row {index} has no {TIER_NUMBER}");
        };
        tiers.push((
            FieldValue::from_text(Some(&label)),
            FieldValue::from_text(Some(&number)),
        ));
    }
    Ok(tiers)
}

/// Stock label, with the quantity appended when the page shows one.
async fn read_stock(ctx: &dyn RenderContext) -> anyhow::Result<Option<String>> {
    let label = ctx.text_content(&Locator::css(STOCK_LABEL)).await?;
    let label = label.as_deref().map(str::trim).unwrap_or_default();
    if label.is_empty() {
        return Ok(None);
    }

    let number_locator = Locator::css(STOCK_NUMBER);
    let mut number = String::new();
    if ctx.count(&number_locator).await? > 0 {
        if let Some(n) = ctx.text_content(&number_locator).await? {
            number = n.trim().to_string();
        }
    }
    Ok(Some(format!("{label} {number}").trim().to_string()))
}

#[async_trait]
impl SiteAdapter for Voltaneo {
    fn profile(&self) -> &'static SiteProfile {
        &PROFILE
    }

    async fn accept_cookies(&self, ctx: &dyn RenderContext, timeouts: &Timeouts) {
        best_effort(
            "voltaneo cookie consent",
            click_when_ready(
                ctx,
                &Locator::css(CONSENT_BUTTON),
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
        self.accept_cookies(&*ctx, timeouts).await;

        let username = Locator::css(USERNAME_INPUT);
        wait_for_selector(&*ctx, &username, timeouts.element_ms, timeouts.poll_interval())
            .await?;
        ctx.fill(&username, &credentials.username).await?;
        ctx.fill(&Locator::css(PASSWORD_INPUT), &credentials.password)
            .await?;

        best_effort("voltaneo remember me", ctx.check(&Locator::css(REMEMBER_ME))).await;

        click_when_ready(
            &*ctx,
            &Locator::with_text("button", SUBMIT_TEXT),
            timeouts.element_ms,
            timeouts.poll_interval(),
        )
        .await?;
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
        fields.extract(ctx, &NAME, timeouts).await;
        fields.extract(ctx, &DESCRIPTION, timeouts).await;

        match read_tiers(ctx, timeouts).await {
            Ok(tiers) => {
                let mut tiers = tiers.into_iter();
                for slot in 1..=MAX_TIERS {
                    let (unit, price) = tiers.next().unwrap_or_default();
                    fields.set(&format!("unit_{slot}"), unit);
                    fields.set(&format!("price_per_unit_{slot}"), price);
                }
            }
            Err(e) => {
                for slot in 1..=MAX_TIERS {
                    fields.set(&format!("unit_{slot}"), FieldValue::Missing);
                    fields.set(&format!("price_per_unit_{slot}"), FieldValue::Missing);
                }
                fields.error(format!("price options error: {e}"));
            }
        }

        match read_stock(ctx).await {
            Ok(Some(stock)) => fields.set("stock", FieldValue::Text(stock)),
            Ok(None) => {
                fields.set("stock", FieldValue::Missing);
                fields.error("missing stock label");
            }
            Err(e) => {
                fields.set("stock", FieldValue::Missing);
                fields.error(format!("stock error: {e}"));
            }
        }

        fields.extract(ctx, &TECHNICAL_REF, timeouts).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_login_page_accepts_both_slash_forms() {
        assert!(!left_login_page("https://webshop.voltaneo.com/login"));
        assert!(!left_login_page("https://webshop.voltaneo.com/login/"));
        assert!(left_login_page("https://webshop.voltaneo.com/mon-compte/"));
    }
}
