//! Field extraction: turn one selector into one value, never failing.
//!
//! Every driver error, timeout or empty match becomes the sentinel plus a
//! message. The [`FieldCollector`] gathers those messages for one item so
//! sibling fields are always attempted.

use crate::config::Timeouts;
use crate::renderer::{wait_for_selector, Locator, RenderContext};
use crate::types::{ExtractionOutcome, FieldValue, ProductRef, RawFieldSet};

/// Shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Trimmed text of the first match.
    Text,
    /// Trimmed text of every match. Waits for `wait_for` (or the field's own
    /// selector) before reading.
    List { wait_for: Option<&'static str> },
}

/// One field on a product page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Output key in the raw field set.
    pub key: &'static str,
    /// Name used in error messages (`missing <label>`).
    pub label: &'static str,
    pub selector: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn text(key: &'static str, label: &'static str, selector: &'static str) -> Self {
        Self {
            key,
            label,
            selector,
            kind: FieldKind::Text,
        }
    }

    pub const fn list(key: &'static str, label: &'static str, selector: &'static str) -> Self {
        Self {
            key,
            label,
            selector,
            kind: FieldKind::List { wait_for: None },
        }
    }

    /// A list field that waits on a different (usually parent) selector.
    pub const fn list_after(
        key: &'static str,
        label: &'static str,
        selector: &'static str,
        wait_for: &'static str,
    ) -> Self {
        Self {
            key,
            label,
            selector,
            kind: FieldKind::List {
                wait_for: Some(wait_for),
            },
        }
    }
}

/// Value plus the error recorded while extracting it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub value: FieldValue,
    pub error: Option<String>,
}

impl Extracted {
    fn ok(value: FieldValue) -> Self {
        Self { value, error: None }
    }

    fn missing(label: &str) -> Self {
        Self {
            value: FieldValue::Missing,
            error: Some(format!("missing {label}")),
        }
    }

    fn failed(label: &str, err: &anyhow::Error) -> Self {
        Self {
            value: FieldValue::Missing,
            error: Some(format!("{label} error: {err}")),
        }
    }
}

/// Extract one field from the current page.
pub async fn extract(ctx: &dyn RenderContext, field: &FieldSpec, timeouts: &Timeouts) -> Extracted {
    let locator = Locator::css(field.selector);
    match field.kind {
        FieldKind::Text => match ctx.text_content(&locator).await {
            Ok(raw) => match FieldValue::from_text(raw.as_deref()) {
                FieldValue::Missing => Extracted::missing(field.label),
                value => Extracted::ok(value),
            },
            Err(e) => Extracted::failed(field.label, &e),
        },
        FieldKind::List { wait_for } => {
            let wait_locator = Locator::css(wait_for.unwrap_or(field.selector));
            if let Err(e) = wait_for_selector(
                ctx,
                &wait_locator,
                timeouts.list_wait_ms,
                timeouts.poll_interval(),
            )
            .await
            {
                return Extracted::failed(field.label, &e);
            }
            match ctx.all_text_contents(&locator).await {
                Ok(items) if items.is_empty() => Extracted::missing(field.label),
                Ok(items) => Extracted::ok(FieldValue::List(
                    items.iter().map(|s| s.trim().to_string()).collect(),
                )),
                Err(e) => Extracted::failed(field.label, &e),
            }
        }
    }
}

/// Accumulates one item's fields and field-level errors.
#[derive(Debug, Default)]
pub struct FieldCollector {
    fields: RawFieldSet,
    errors: Vec<String>,
}

impl FieldCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract `field` and record its value and error, if any.
    pub async fn extract(&mut self, ctx: &dyn RenderContext, field: &FieldSpec, timeouts: &Timeouts) {
        let extracted = extract(ctx, field, timeouts).await;
        tracing::debug!(
            field = field.key,
            ok = extracted.error.is_none(),
            "field extracted"
        );
        self.record(field.key, extracted);
    }

    pub fn record(&mut self, key: &str, extracted: Extracted) {
        self.fields.insert(key, extracted.value);
        if let Some(err) = extracted.error {
            self.errors.push(err);
        }
    }

    pub fn set(&mut self, key: &str, value: FieldValue) {
        self.fields.insert(key, value);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn finish(self, item: ProductRef) -> ExtractionOutcome {
        ExtractionOutcome::from_fields(item, self.fields, self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::fake::{fast_timeouts, FakeLauncher, FakePage, FakeSite};
    use crate::renderer::{LaunchOptions, Launcher};

    const URL: &str = "https://shop.test/p/1";

    async fn page(page: FakePage) -> Box<dyn RenderContext> {
        let launcher = FakeLauncher::new(FakeSite::new().page(URL, page));
        let renderer = launcher.launch(&LaunchOptions::default()).await.unwrap();
        let mut ctx = renderer.new_context().await.unwrap();
        ctx.navigate(URL, 1_000).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_text_field_is_trimmed() {
        let ctx = page(FakePage::new().text("h1", "  Câble  \n")).await;
        let got = extract(ctx.as_ref(), &FieldSpec::text("name", "name", "h1"), &fast_timeouts()).await;
        assert_eq!(got.value, FieldValue::text("Câble"));
        assert!(got.error.is_none());
    }

    #[tokio::test]
    async fn test_blank_text_reports_missing_label() {
        let ctx = page(FakePage::new().text("span.price", "   ")).await;
        let field = FieldSpec::text("price_per_unit", "price", "span.price");
        let got = extract(ctx.as_ref(), &field, &fast_timeouts()).await;
        assert!(got.value.is_missing());
        assert_eq!(got.error.as_deref(), Some("missing price"));
    }

    #[tokio::test]
    async fn test_list_field_times_out_with_label_error() {
        let ctx = page(FakePage::new()).await;
        let field = FieldSpec::list("technical_ref", "technical_ref", "li.ref");
        let got = extract(ctx.as_ref(), &field, &fast_timeouts()).await;
        assert!(got.value.is_missing());
        assert!(got
            .error
            .as_deref()
            .unwrap()
            .starts_with("technical_ref error: timed out"));
    }

    #[tokio::test]
    async fn test_list_field_waits_on_parent_and_keeps_order() {
        let ctx = page(
            FakePage::new()
                .text("div.col", "")
                .text("div.col span", " b ")
                .text("div.col span", "a"),
        )
        .await;
        let field = FieldSpec::list_after("technical_ref", "technical_ref", "div.col span", "div.col");
        let got = extract(ctx.as_ref(), &field, &fast_timeouts()).await;
        assert_eq!(got.value, FieldValue::List(vec!["b".into(), "a".into()]));
    }

    #[tokio::test]
    async fn test_list_parent_without_entries_is_missing() {
        let ctx = page(FakePage::new().text("div.col", "")).await;
        let field = FieldSpec::list_after("technical_ref", "technical_ref", "div.col span", "div.col");
        let got = extract(ctx.as_ref(), &field, &fast_timeouts()).await;
        assert_eq!(got.error.as_deref(), Some("missing technical_ref"));
    }

    #[tokio::test]
    async fn test_collector_keeps_going_after_errors() {
        let ctx = page(FakePage::new().text("h1", "Câble")).await;
        let timeouts = fast_timeouts();
        let mut fields = FieldCollector::new();
        fields
            .extract(ctx.as_ref(), &FieldSpec::text("price_per_unit", "price", "span"), &timeouts)
            .await;
        fields
            .extract(ctx.as_ref(), &FieldSpec::text("stock", "stock", "button"), &timeouts)
            .await;
        fields
            .extract(ctx.as_ref(), &FieldSpec::text("name", "name", "h1"), &timeouts)
            .await;
        assert_eq!(fields.errors(), ["missing price", "missing stock"]);

        let outcome = fields.finish(ProductRef::new(URL));
        assert_eq!(outcome.is_ok, 0);
        assert_eq!(outcome.fields.get("name"), &FieldValue::text("Câble"));
        assert_eq!(outcome.error.as_deref(), Some("missing price; missing stock"));
    }
}
