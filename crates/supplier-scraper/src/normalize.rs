//! Normalization of raw outcomes into canonical records.
//!
//! Pure functions only: every site's outcomes go through the same price,
//! availability and technical-reference rules, differing only by the
//! [`SiteProfile`] flags.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::sites::SiteProfile;
use crate::types::{CanonicalRecord, ExtractionOutcome, FieldValue};

/// Number of (unit, price) tiers in every record.
pub const TIER_COUNT: usize = 3;

fn price_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Digits with `.`/`,` separators, plus space-separated thousands groups.
        Regex::new(r"\d[\d.,]*(?:[ \x{A0}\x{202F}]\d{3}[\d.,]*)*")
            .expect("price run regex is valid")
    })
}

/// Outcome of reading a price out of free text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPrice {
    /// No digits at all.
    NoDigits,
    Number(f64),
    /// Digits were found but did not coerce to a number.
    Unparsed(String),
}

/// Read the first numeric run in `text` as a price.
///
/// The last of `.`/`,` is the decimal separator when both appear; a lone
/// comma is decimal; repeated dots are thousands separators.
pub fn parse_price_text(text: &str) -> ParsedPrice {
    let Some(found) = price_run().find(text) else {
        return ParsedPrice::NoDigits;
    };
    let run: String = found
        .as_str()
        .trim_end_matches(['.', ','])
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .collect();

    let normalized = match (run.rfind(','), run.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => run.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => run.replace(',', ""),
        (Some(comma), None) => {
            let (int_part, frac) = run.split_at(comma);
            format!("{}.{}", int_part.replace(',', ""), &frac[1..])
        }
        (None, Some(_)) if run.matches('.').count() > 1 => run.replace('.', ""),
        _ => run.clone(),
    };

    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => ParsedPrice::Number(value),
        _ => ParsedPrice::Unparsed(run),
    }
}

/// Coerce a raw price field.
///
/// Text without digits becomes the sentinel; text whose digits do not
/// coerce is kept as the matched run.
pub fn parse_price(raw: &FieldValue) -> FieldValue {
    match raw {
        FieldValue::Text(text) => match parse_price_text(text) {
            ParsedPrice::NoDigits => FieldValue::Missing,
            ParsedPrice::Number(value) => FieldValue::Number(value),
            ParsedPrice::Unparsed(run) => {
                tracing::warn!(raw = %text, "price did not coerce to a number, keeping {run:?}");
                FieldValue::Text(run)
            }
        },
        other => other.clone(),
    }
}

/// 1 when the stock text contains `phrase` (case-insensitive), else 0.
pub fn is_available(stock: &FieldValue, phrase: &str) -> u8 {
    match stock {
        FieldValue::Text(text) => u8::from(text.to_lowercase().contains(&phrase.to_lowercase())),
        _ => 0,
    }
}

fn clean_reference(raw: &str) -> String {
    raw.replace(['\n', '\r'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip line breaks and collapse whitespace in technical references.
/// Entries that end up empty are dropped; nothing left means the sentinel.
pub fn clean_technical_refs(raw: &FieldValue) -> FieldValue {
    match raw {
        FieldValue::List(items) => {
            let cleaned: Vec<String> = items
                .iter()
                .map(|item| clean_reference(item))
                .filter(|item| !item.is_empty())
                .collect();
            if cleaned.is_empty() {
                FieldValue::Missing
            } else {
                FieldValue::List(cleaned)
            }
        }
        FieldValue::Text(text) => FieldValue::from_text(Some(&clean_reference(text))),
        other => other.clone(),
    }
}

fn tiers(outcome: &ExtractionOutcome, profile: &SiteProfile) -> [(FieldValue, FieldValue); TIER_COUNT] {
    let mut tiers: [(FieldValue, FieldValue); TIER_COUNT] = Default::default();
    match profile.single_unit_label {
        Some(label) => {
            tiers[0] = (
                FieldValue::text(label),
                parse_price(outcome.fields.get("price_per_unit")),
            );
        }
        None => {
            for (i, tier) in tiers.iter_mut().enumerate() {
                let n = i + 1;
                *tier = (
                    outcome.fields.get(&format!("unit_{n}")).clone(),
                    parse_price(outcome.fields.get(&format!("price_per_unit_{n}"))),
                );
            }
        }
    }
    tiers
}

/// Project one outcome onto the canonical column set.
pub fn normalize_one(
    outcome: &ExtractionOutcome,
    profile: &SiteProfile,
    now: DateTime<Utc>,
) -> CanonicalRecord {
    let item = &outcome.item;
    let fields = &outcome.fields;

    let technical_ref = if profile.clean_technical_refs {
        clean_technical_refs(fields.get("technical_ref"))
    } else {
        fields.get("technical_ref").clone()
    };
    let stock = fields.get("stock").clone();
    let [(unit_1, price_per_unit_1), (unit_2, price_per_unit_2), (unit_3, price_per_unit_3)] =
        tiers(outcome, profile);

    CanonicalRecord {
        product_category: item.passthrough_or_sentinel("product_category"),
        manufacturer: item.passthrough_or_sentinel("manufacturer"),
        manufacturer_id: item.passthrough_or_sentinel("manufacturer_id"),
        supplier: item.passthrough_or_sentinel("supplier"),
        url: item.url.clone(),
        name: fields.get("name").clone(),
        description: fields.get("description").clone(),
        technical_ref,
        unit_1,
        price_per_unit_1,
        unit_2,
        price_per_unit_2,
        unit_3,
        price_per_unit_3,
        is_available: is_available(&stock, profile.availability_phrase),
        stock,
        is_ok: outcome.is_ok,
        error: outcome.error.clone(),
        created_at: now,
    }
}

/// Normalize a whole batch, preserving order. Every record shares `now`.
pub fn normalize(
    outcomes: &[ExtractionOutcome],
    profile: &SiteProfile,
    now: DateTime<Utc>,
) -> Vec<CanonicalRecord> {
    outcomes
        .iter()
        .map(|outcome| normalize_one(outcome, profile, now))
        .collect()
}
