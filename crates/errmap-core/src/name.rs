// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error-class name validation.
//!
//! Names look like the platform's own error types (`ValidationError`,
//! `BillingError`): an uppercase first letter, ASCII letters only, and the
//! literal `Error` suffix. Names of built-in error types are reserved.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Suffix every error-class name must end with.
pub const ERROR_NAME_SUFFIX: &str = "Error";

/// Names of built-in error types that produced classes may not take.
pub const RESERVED_ERROR_NAMES: &[&str] = &[
    // language core
    "Error",
    "ReferenceError",
    "TypeError",
    "SyntaxError",
    "RangeError",
    "URIError",
    "EvalError",
    "AggregateError",
    // runtime specific
    "SystemError",
    "AssertionError",
    "Warning",
    "UnhandledPromiseRejection",
    // DOM
    "DOMException",
    // errmap's own base type
    "AppError",
];

/// Reasons a proposed error-class name is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// The name was not a string at all.
    #[error("error name must be a string: {found}")]
    NotAString {
        /// Rendering of the rejected value.
        found: String,
    },

    /// The name collides with a built-in error type.
    #[error("error name \"{name}\" must not be a reserved error name")]
    Reserved {
        /// Rejected name.
        name: String,
    },

    /// The name does not end with `Error`, or is exactly `Error`.
    #[error("error name \"{name}\" must end with \"Error\"")]
    MissingSuffix {
        /// Rejected name.
        name: String,
    },

    /// The first character is not uppercase.
    #[error("error name \"{name}\" must start with an uppercase letter")]
    NotCapitalized {
        /// Rejected name.
        name: String,
    },

    /// The name contains something other than ASCII letters.
    #[error("error name \"{name}\" must only contain ASCII letters")]
    InvalidCharacters {
        /// Rejected name.
        name: String,
    },
}

/// Check `name` against every naming rule.
///
/// Rules are checked in a fixed order (reserved, suffix, capitalisation,
/// character set) and the first violated rule is reported.
pub fn validate_error_name(name: &str) -> Result<(), NameError> {
    if RESERVED_ERROR_NAMES.contains(&name) {
        return Err(NameError::Reserved { name: name.into() });
    }
    if !name.ends_with(ERROR_NAME_SUFFIX) || name == ERROR_NAME_SUFFIX {
        return Err(NameError::MissingSuffix { name: name.into() });
    }
    if !name.chars().next().is_some_and(char::is_uppercase) {
        return Err(NameError::NotCapitalized { name: name.into() });
    }
    if !matches_name_pattern(name) {
        return Err(NameError::InvalidCharacters { name: name.into() });
    }
    Ok(())
}

/// `^[A-Z][A-Za-z]*Error$`
fn matches_name_pattern(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() > ERROR_NAME_SUFFIX.len()
        && bytes[0].is_ascii_uppercase()
        && bytes.iter().all(u8::is_ascii_alphabetic)
        && name.ends_with(ERROR_NAME_SUFFIX)
}

// ---------------------------------------------------------------------------
// ErrorName
// ---------------------------------------------------------------------------

/// A validated error-class name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ErrorName(String);

impl ErrorName {
    /// Validate and wrap `name`.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        validate_error_name(&name)?;
        Ok(Self(name))
    }

    /// Validate a dynamically typed name, e.g. one read from a config file.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, NameError> {
        match value {
            serde_json::Value::String(s) => Self::new(s.as_str()),
            other => Err(NameError::NotAString {
                found: other.to_string(),
            }),
        }
    }

    /// Built-in names skip validation.
    pub(crate) fn builtin(name: &'static str) -> Self {
        Self(name.to_string())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ErrorName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ErrorName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ErrorName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl TryFrom<&str> for ErrorName {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for ErrorName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for ErrorName {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(de)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
