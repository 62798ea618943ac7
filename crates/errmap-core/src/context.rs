// SPDX-License-Identifier: MIT OR Apache-2.0
//! Caller-supplied context and the originating cause.

use crate::AppError;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Context key that is routed to the cause slot instead of the context.
pub const CAUSE_KEY: &str = "cause";

// ---------------------------------------------------------------------------
// Cause
// ---------------------------------------------------------------------------

/// The lower-level failure an error originated from.
pub enum Cause {
    /// A typed error value.
    Error(Box<dyn std::error::Error + Send + Sync + 'static>),
    /// An arbitrary structured value (e.g. a `cause` entry of a JSON context).
    Value(Value),
}

impl Cause {
    /// The cause as an error, if it is one.
    pub fn as_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Error(e) => Some(e.as_ref()),
            Self::Value(_) => None,
        }
    }

    /// Downcast an error cause to a concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.as_error().and_then(|e| e.downcast_ref::<E>())
    }

    /// JSON rendering used by [`AppError::to_json`].
    ///
    /// Nested [`AppError`]s render as their full snapshot, other errors as
    /// their display string, values as themselves.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Error(e) => match e.downcast_ref::<AppError>() {
                Some(app) => serde_json::to_value(app.to_json()).unwrap_or(Value::Null),
                None => Value::String(e.to_string()),
            },
            Self::Value(v) => v.clone(),
        }
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => f.debug_tuple("Error").field(&e.to_string()).finish(),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::Value(Value::String(s)) => f.write_str(s),
            Self::Value(v) => write!(f, "{v}"),
        }
    }
}

impl From<Value> for Cause {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

// ---------------------------------------------------------------------------
// ErrorContext
// ---------------------------------------------------------------------------

/// Structured context supplied where an error is raised.
///
/// A `cause` entry never stays in the context: on construction it is moved
/// to the error's dedicated cause slot.
///
/// ```
/// use errmap_core::ErrorContext;
///
/// let ctx = ErrorContext::new()
///     .with("field", "email")
///     .with_cause(std::io::Error::other("smtp down"));
/// let (fields, cause) = ctx.into_parts();
/// assert_eq!(fields["field"], "email");
/// assert_eq!(cause.unwrap().to_string(), "smtp down");
/// ```
#[derive(Debug, Default)]
pub struct ErrorContext {
    fields: BTreeMap<String, Value>,
    cause: Option<Cause>,
}

impl ErrorContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a key-value pair. Values that fail to serialize are skipped.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Attach the originating error.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Cause::Error(Box::new(cause)));
        self
    }

    /// Attach an already boxed originating error.
    pub fn with_boxed_cause(mut self, cause: Box<dyn std::error::Error + Send + Sync + 'static>) -> Self {
        self.cause = Some(Cause::Error(cause));
        self
    }

    /// Context fields as supplied (may still hold a `cause` key).
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Whether neither fields nor a cause were supplied.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.cause.is_none()
    }

    /// Split into cause-free fields and the cause.
    ///
    /// An explicit cause wins over a `cause` field; the field is dropped
    /// either way.
    pub fn into_parts(mut self) -> (BTreeMap<String, Value>, Option<Cause>) {
        let field_cause = self.fields.remove(CAUSE_KEY).map(Cause::Value);
        let cause = self.cause.or(field_cause);
        (self.fields, cause)
    }
}

impl FromIterator<(String, Value)> for ErrorContext {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
            cause: None,
        }
    }
}

impl From<BTreeMap<String, Value>> for ErrorContext {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self {
            fields,
            cause: None,
        }
    }
}

impl From<serde_json::Map<String, Value>> for ErrorContext {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
