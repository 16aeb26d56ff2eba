//! Masking of sensitive data in outgoing events.
//!
//! Runs over the canonical wire hash right before encoding. Values are
//! replaced with [`MASK`] when:
//!
//! - their key contains a sensitive field name (`password`, `secret`, ...),
//! - their key names cookies (`cookies`, a `Cookie` header),
//! - they are strings that look like a credit card number.
//!
//! URL query strings keep their shape, with only sensitive parameters masked.

use flare_core::WireHash;
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::error::{DeliveryError, Result};

/// Replacement for masked values.
pub const MASK: &str = "********";

/// Field names masked by default. Matched case-insensitively as substrings
/// of a key.
pub const DEFAULT_FIELDS: &[&str] =
    &["authorization", "password", "passwd", "secret", "api_key", "apikey", "ssn", "social.?sec"];

const CREDIT_CARD_PATTERN: &str = r"^(?:3[47]\d|(?:4\d|5[1-5]|65)\d{2}|6011)\d{12}$";

/// Masks sensitive values in a wire hash.
#[derive(Debug, Clone)]
pub struct Scrubber {
    fields: Regex,
    credit_card: Regex,
}

impl Scrubber {
    /// Builds a scrubber for the default fields plus `extra_fields`.
    ///
    /// Extra fields are matched literally and only as whole words, so `pin`
    /// masks `pin` and `x-pin` but not `spinner`.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if the combined pattern
    /// cannot be compiled.
    pub fn new(extra_fields: &[String]) -> Result<Self> {
        let alternatives: Vec<String> = DEFAULT_FIELDS
            .iter()
            .map(|field| (*field).to_string())
            .chain(
                extra_fields
                    .iter()
                    .filter(|f| !f.is_empty())
                    .map(|f| format!(r"\b{}\b", regex::escape(f))),
            )
            .collect();

        let fields = RegexBuilder::new(&alternatives.join("|"))
            .case_insensitive(true)
            .build()
            .map_err(|e| DeliveryError::configuration(format!("invalid sanitize field: {e}")))?;

        let credit_card = Regex::new(CREDIT_CARD_PATTERN)
            .map_err(|e| DeliveryError::configuration(e.to_string()))?;

        Ok(Self { fields, credit_card })
    }

    /// Masks sensitive values in place.
    pub fn scrub(&self, hash: &mut WireHash) {
        for (key, value) in hash.iter_mut() {
            self.scrub_entry(key, value);
        }
    }

    fn scrub_entry(&self, key: &str, value: &mut Value) {
        if value.is_null() {
            return;
        }

        if is_cookie_key(key) || self.fields.is_match(key) {
            *value = Value::String(MASK.to_string());
            return;
        }

        match value {
            Value::Object(map) => {
                for (key, value) in map.iter_mut() {
                    self.scrub_entry(key, value);
                }
            },
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.scrub_entry(key, item);
                }
            },
            Value::String(text) => {
                if key.eq_ignore_ascii_case("query_string") {
                    *text = self.scrub_query_string(text);
                } else if self.credit_card.is_match(text.trim()) {
                    *text = MASK.to_string();
                }
            },
            _ => {},
        }
    }

    fn scrub_query_string(&self, query: &str) -> String {
        query
            .split('&')
            .map(|pair| match pair.split_once('=') {
                Some((name, _)) if self.fields.is_match(name) => format!("{name}={MASK}"),
                _ => pair.to_string(),
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn is_cookie_key(key: &str) -> bool {
    key.eq_ignore_ascii_case("cookies") || key.eq_ignore_ascii_case("cookie")
}
