// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error codes, detail templates and the code → template map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Opaque key naming one failure variant of an [`ErrorMap`].
///
/// Codes are unique within a map, not across maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(String);

impl ErrorCode {
    /// Wrap a code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ErrorCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ErrorCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ErrorCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&ErrorCode> for ErrorCode {
    fn from(c: &ErrorCode) -> Self {
        c.clone()
    }
}

impl PartialEq<str> for ErrorCode {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ErrorCode {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ---------------------------------------------------------------------------
// DetailsTemplate
// ---------------------------------------------------------------------------

/// Fixed details of one error code: a mandatory `message` plus arbitrary
/// extra fields, serialized as one flat object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailsTemplate {
    message: String,
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

impl DetailsTemplate {
    /// Template with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add an extra field.
    ///
    /// `message` is reserved and ignored here; values that fail to
    /// serialize are skipped.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let key = key.into();
        if key == "message" {
            return self;
        }
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key, v);
        }
        self
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Extra fields, without `message`.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Look up a field; `"message"` returns the message.
    pub fn get(&self, key: &str) -> Option<Value> {
        if key == "message" {
            return Some(Value::String(self.message.clone()));
        }
        self.fields.get(key).cloned()
    }
}

// ---------------------------------------------------------------------------
// ErrorMap
// ---------------------------------------------------------------------------

/// Immutable mapping from [`ErrorCode`] to [`DetailsTemplate`].
///
/// Built once per error class and shared read-only by every instance.
///
/// ```
/// use errmap_core::{DetailsTemplate, ErrorMap};
///
/// let map = ErrorMap::new()
///     .entry("NOT_FOUND", DetailsTemplate::new("User not found").with("status", 404))
///     .entry("BANNED", DetailsTemplate::new("User is banned"));
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.get("NOT_FOUND").unwrap().message(), "User not found");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorMap {
    entries: BTreeMap<ErrorCode, DetailsTemplate>,
}

impl ErrorMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the template for `code`.
    pub fn entry(mut self, code: impl Into<ErrorCode>, details: DetailsTemplate) -> Self {
        self.entries.insert(code.into(), details);
        self
    }

    /// Template for `code`.
    pub fn get(&self, code: &str) -> Option<&DetailsTemplate> {
        self.entries.get(code)
    }

    /// Whether `code` has a template.
    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    /// All codes, in order.
    pub fn codes(&self) -> impl Iterator<Item = &ErrorCode> {
        self.entries.keys()
    }

    /// All entries, in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&ErrorCode, &DetailsTemplate)> {
        self.entries.iter()
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no codes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C: Into<ErrorCode>> FromIterator<(C, DetailsTemplate)> for ErrorMap {
    fn from_iter<I: IntoIterator<Item = (C, DetailsTemplate)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(c, d)| (c.into(), d)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn template_serializes_flat() {
        let t = DetailsTemplate::new("Invalid email").with("status", 400);
        assert_eq!(
            serde_json::to_value(&t).unwrap(),
            json!({"message": "Invalid email", "status": 400})
        );
    }

    #[test]
    fn template_ignores_message_field() {
        let t = DetailsTemplate::new("kept").with("message", "dropped");
        assert_eq!(t.message(), "kept");
        assert!(t.fields().is_empty());
        assert_eq!(t.get("message"), Some(json!("kept")));
    }

    #[test]
    fn template_requires_message_on_deserialize() {
        let err = serde_json::from_value::<DetailsTemplate>(json!({"status": 400})).unwrap_err();
        assert!(err.to_string().contains("message"));
    }

    #[test]
    fn map_deserializes_from_object() {
        let map: ErrorMap = serde_json::from_value(json!({
            "INVALID_EMAIL": {"message": "Invalid email", "field": "email"},
            "TOO_SHORT": {"message": "Too short"}
        }))
        .unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains("TOO_SHORT"));
        assert_eq!(
            map.get("INVALID_EMAIL").unwrap().get("field"),
            Some(json!("email"))
        );
    }

    #[test]
    fn map_codes_are_ordered() {
        let map: ErrorMap = [
            ("B", DetailsTemplate::new("b")),
            ("A", DetailsTemplate::new("a")),
        ]
        .into_iter()
        .collect();
        let codes: Vec<_> = map.codes().map(ErrorCode::as_str).collect();
        assert_eq!(codes, ["A", "B"]);
    }

    #[test]
    fn entry_replaces_existing_code() {
        let map = ErrorMap::new()
            .entry("X", DetailsTemplate::new("first"))
            .entry("X", DetailsTemplate::new("second"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("X").unwrap().message(), "second");
    }

    #[test]
    fn code_compares_with_str() {
        let code = ErrorCode::from("NOT_FOUND");
        assert_eq!(code, "NOT_FOUND");
        assert_eq!(code.to_string(), "NOT_FOUND");
        assert_eq!(serde_json::to_string(&code).unwrap(), r#""NOT_FOUND""#);
    }
}
