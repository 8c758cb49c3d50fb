//! JavaScript snippets executed in the page for DOM queries and actions.
//!
//! Every script returns a JSON-encoded string so the Rust side always
//! receives a plain string, regardless of what the DOM yields.
//!
//! ## Security: JS encoding
//!
//! Selectors, text filters and form values are escaped with
//! [`sanitize_js_string`] and only ever placed inside string literals,
//! never into code positions.

use serde::Deserialize;

use super::Locator;

/// Reply of a text query.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TextProbe {
    pub found: bool,
    #[serde(default)]
    pub text: Option<String>,
}

/// Reply of an action (click, fill, check, submit).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ActionOutcome {
    pub success: bool,
}

/// Expression evaluating to the array of elements `locator` matches.
fn resolve(locator: &Locator) -> String {
    match locator {
        Locator::Css(selector) => format!(
            "Array.from(document.querySelectorAll('{}'))",
            sanitize_js_string(selector)
        ),
        // Containers match their descendants' text too; keep the innermost hits.
        Locator::Text { scope, text } => format!(
            "((all) => all.filter(e => !all.some(o => o !== e && e.contains(o))))\
             (Array.from(document.querySelectorAll('{}')).filter(e => \
             (e.textContent || '').replace(/\\s+/g, ' ').trim().toLowerCase().includes('{}')))",
            sanitize_js_string(scope),
            sanitize_js_string(&text.to_lowercase())
        ),
    }
}

fn with_elements(locator: &Locator, body: &str) -> String {
    format!(
        "(() => {{ const els = {}; {} }})()",
        resolve(locator),
        body
    )
}

pub fn ready_state() -> String {
    "JSON.stringify(document.readyState)".to_string()
}

pub fn text_content(locator: &Locator) -> String {
    with_elements(
        locator,
        "const el = els[0]; \
         return JSON.stringify(el ? { found: true, text: el.textContent || '' } : { found: false });",
    )
}

pub fn all_text_contents(locator: &Locator) -> String {
    with_elements(
        locator,
        "return JSON.stringify(els.map(e => e.textContent || ''));",
    )
}

pub fn count(locator: &Locator) -> String {
    with_elements(locator, "return JSON.stringify(els.length);")
}

pub fn is_visible(locator: &Locator, index: usize) -> String {
    with_elements(
        locator,
        &format!(
            "const el = els[{index}]; \
             if (!el) return JSON.stringify(false); \
             const style = window.getComputedStyle(el); \
             const rect = el.getBoundingClientRect(); \
             return JSON.stringify(style.visibility !== 'hidden' && style.display !== 'none' \
                 && rect.width > 0 && rect.height > 0);"
        ),
    )
}

pub fn text_content_within(locator: &Locator, index: usize, child: &str) -> String {
    with_elements(
        locator,
        &format!(
            "const el = els[{index}]; \
             const c = el ? el.querySelector('{}') : null; \
             return JSON.stringify(c ? {{ found: true, text: c.textContent || '' }} : {{ found: false }});",
            sanitize_js_string(child)
        ),
    )
}

pub fn click(locator: &Locator) -> String {
    with_elements(
        locator,
        "const el = els[0]; \
         if (!el) return JSON.stringify({ success: false }); \
         el.scrollIntoView({ block: 'center' }); \
         el.click(); \
         return JSON.stringify({ success: true });",
    )
}

/// Set an input's value through the native setter so framework-bound
/// inputs (React, Vue) see the change, then fire `input` and `change`.
pub fn fill(locator: &Locator, value: &str) -> String {
    with_elements(
        locator,
        &format!(
            "const el = els[0]; \
             if (!el) return JSON.stringify({{ success: false }}); \
             el.focus(); \
             const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
             const setter = Object.getOwnPropertyDescriptor(proto, 'value').set; \
             setter.call(el, '{}'); \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return JSON.stringify({{ success: true }});",
            sanitize_js_string(value)
        ),
    )
}

/// Tick a checkbox even when a styled overlay hides the real input.
pub fn check(locator: &Locator) -> String {
    with_elements(
        locator,
        "const el = els[0]; \
         if (!el) return JSON.stringify({ success: false }); \
         if (!el.checked) { el.click(); } \
         if (!el.checked) { \
             el.checked = true; \
             el.dispatchEvent(new Event('change', { bubbles: true })); \
         } \
         return JSON.stringify({ success: el.checked === true });",
    )
}

pub fn submit_form(form_selector: &str) -> String {
    format!(
        "(() => {{ \
             const form = document.querySelector('{}'); \
             if (form) {{ form.submit(); return JSON.stringify({{ success: true }}); }} \
             return JSON.stringify({{ success: false }}); \
         }})()",
        sanitize_js_string(form_selector)
    )
}

/// Sanitize a string for safe injection into a JavaScript string literal.
///
/// Escapes all characters that could break out of a JS string context:
/// - Backslashes, single/double quotes, backticks
/// - Newlines, carriage returns, tabs
/// - HTML script tags
/// - Null bytes
pub fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}
