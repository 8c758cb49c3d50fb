//! Core data types: requests, raw extraction results, and canonical records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Placeholder emitted for any field that could not be extracted.
pub const SENTINEL: &str = "N/A";

/// Error marker returned in place of records when the site login fails.
pub const LOGIN_FAILED: &str = "login_failed";

/// Output column order shared by every site pipeline.
pub const CANONICAL_COLUMNS: [&str; 19] = [
    "product_category",
    "manufacturer",
    "manufacturer_id",
    "supplier",
    "url",
    "name",
    "description",
    "technical_ref",
    "unit_1",
    "price_per_unit_1",
    "unit_2",
    "price_per_unit_2",
    "unit_3",
    "price_per_unit_3",
    "is_available",
    "stock",
    "is_ok",
    "error",
    "created_at",
];

/// Portal login credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A single product reference supplied by the caller.
///
/// Everything except `url` is opaque pass-through metadata and is carried
/// into the outcome untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    pub url: String,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

impl ProductRef {
    /// Create a reference with no pass-through metadata.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            passthrough: Map::new(),
        }
    }

    /// Attach a pass-through field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.passthrough.insert(key.to_string(), value.into());
        self
    }

    /// Pass-through value for `key`, or the sentinel when the caller omitted it.
    pub fn passthrough_or_sentinel(&self, key: &str) -> Value {
        self.passthrough
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::String(SENTINEL.to_string()))
    }
}

/// One batch: credentials plus the products to visit, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub credentials: Credentials,
    #[serde(alias = "data")]
    pub items: Vec<ProductRef>,
}

/// A raw extracted value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldValue {
    /// Nothing could be extracted; serialized as the sentinel.
    #[default]
    Missing,
    Text(String),
    List(Vec<String>),
    Number(f64),
}

impl FieldValue {
    /// Wrap trimmed text, mapping empty strings to `Missing`.
    pub fn from_text(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(t) if !t.is_empty() => FieldValue::Text(t.to_string()),
            _ => FieldValue::Missing,
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Missing => serializer.serialize_str(SENTINEL),
            FieldValue::Text(t) => serializer.serialize_str(t),
            FieldValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            FieldValue::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

static MISSING: FieldValue = FieldValue::Missing;

/// Per-item mapping of field name to extracted value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawFieldSet(BTreeMap<String, FieldValue>);

impl RawFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A field set where every named field is missing.
    pub fn all_missing(names: &[&str]) -> Self {
        let mut set = Self::new();
        for name in names {
            set.insert(name, FieldValue::Missing);
        }
        set
    }

    pub fn insert(&mut self, name: &str, value: FieldValue) {
        self.0.insert(name.to_string(), value);
    }

    /// Value for `name`; unknown fields read as `Missing`.
    pub fn get(&self, name: &str) -> &FieldValue {
        self.0.get(name).unwrap_or(&MISSING)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Whether an outcome came from the adapter or was degraded by the batch runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Extracted,
    Failed,
}

/// Result of visiting one product page.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutcome {
    #[serde(flatten)]
    pub item: ProductRef,
    #[serde(flatten)]
    pub fields: RawFieldSet,
    pub is_ok: u8,
    pub error: Option<String>,
    pub status: OutcomeStatus,
}

impl ExtractionOutcome {
    /// Build an outcome from extracted fields and the field-level errors
    /// recorded while extracting them.
    pub fn from_fields(item: ProductRef, fields: RawFieldSet, errors: Vec<String>) -> Self {
        let error = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };
        Self {
            item,
            fields,
            is_ok: u8::from(error.is_none()),
            error,
            status: OutcomeStatus::Extracted,
        }
    }

    /// The product page never loaded; every site field is the sentinel.
    pub fn navigation_failed(item: ProductRef, field_names: &[&str], message: &str) -> Self {
        Self {
            item,
            fields: RawFieldSet::all_missing(field_names),
            is_ok: 0,
            error: Some(format!("page.goto failed: {message}")),
            status: OutcomeStatus::Extracted,
        }
    }

    /// Extraction blew up outside the adapter's own error handling.
    pub fn failed(item: ProductRef, message: impl Into<String>) -> Self {
        Self {
            item,
            fields: RawFieldSet::new(),
            is_ok: 0,
            error: Some(message.into()),
            status: OutcomeStatus::Failed,
        }
    }
}

/// A normalized output row. Field order is the canonical column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub product_category: Value,
    pub manufacturer: Value,
    pub manufacturer_id: Value,
    pub supplier: Value,
    pub url: String,
    pub name: FieldValue,
    pub description: FieldValue,
    pub technical_ref: FieldValue,
    pub unit_1: FieldValue,
    pub price_per_unit_1: FieldValue,
    pub unit_2: FieldValue,
    pub price_per_unit_2: FieldValue,
    pub unit_3: FieldValue,
    pub price_per_unit_3: FieldValue,
    pub is_available: u8,
    pub stock: FieldValue,
    pub is_ok: u8,
    pub error: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// What a batch returns to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutput {
    /// One record per requested item, in request order.
    Records(Vec<CanonicalRecord>),
    /// The portal login failed; no item was attempted.
    LoginFailed,
}

impl ScrapeOutput {
    pub fn is_login_failed(&self) -> bool {
        matches!(self, ScrapeOutput::LoginFailed)
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        match self {
            ScrapeOutput::Records(records) => records,
            ScrapeOutput::LoginFailed => &[],
        }
    }
}

/// Single-element marker row sent instead of records on login failure.
#[derive(Serialize)]
struct LoginFailedRow {
    error: &'static str,
}

impl Serialize for ScrapeOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScrapeOutput::Records(records) => records.serialize(serializer),
            ScrapeOutput::LoginFailed => [LoginFailedRow {
                error: LOGIN_FAILED,
            }]
            .serialize(serializer),
        }
    }
}

/// Errors that escape the scraping pipeline.
///
/// Field and item failures never show up here; they are folded into the
/// outcome rows. Only login and infrastructure problems do.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type ScrapeResult<T> = Result<T, ScrapeError>;
