// SPDX-License-Identifier: MIT OR Apache-2.0
//! The base error type shared by every produced class.

use crate::class::ErrorClass;
use crate::context::{Cause, ErrorContext};
use crate::identity::{self, ErrorIdentity, IdentityError};
use crate::map::{DetailsTemplate, ErrorCode};
use crate::name::ErrorName;
use errmap_stack::StackOptions;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Symbol prefixes of errmap's own construction frames, dropped from traces.
const CONSTRUCTION_FRAMES: &[&str] = &["errmap_core::"];

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Structured error produced by an [`ErrorClass`].
///
/// Instances are immutable once built. They are only ever constructed by a
/// class, which resolves `details` from its error map; there is no public
/// constructor.
pub struct AppError {
    pub(crate) identity: Arc<ErrorIdentity>,
    pub(crate) name: ErrorName,
    code: ErrorCode,
    message: String,
    details: DetailsTemplate,
    context: BTreeMap<String, Value>,
    cause: Option<Cause>,
    stack: String,
}

impl AppError {
    /// Build an instance through the construction path of `base`, then
    /// re-point it to `requested`, the most-derived class.
    pub(crate) fn construct(
        base: &Arc<ErrorIdentity>,
        requested: Option<&Arc<ErrorIdentity>>,
        code: ErrorCode,
        details: &DetailsTemplate,
        context: Option<ErrorContext>,
        stack: &StackOptions,
    ) -> Result<Self, IdentityError> {
        let (context, cause) = context.map(ErrorContext::into_parts).unwrap_or_default();
        let name = requested.unwrap_or(base).name().clone();
        let message = details.message().to_string();
        let header = format!("{name}: {message}");

        let mut err = Self {
            identity: Arc::clone(base),
            name,
            code,
            message,
            details: details.clone(),
            context,
            cause,
            stack: errmap_stack::render_skipping(&header, stack, CONSTRUCTION_FRAMES),
        };
        identity::correct(&mut err, requested)?;
        Ok(err)
    }

    /// Declared name of the instance's class, e.g. `"ValidationError"`.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Code the instance was built from.
    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    /// Message resolved from the error map; always equals
    /// `details().message()`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Full template entry of the code.
    pub fn details(&self) -> &DetailsTemplate {
        &self.details
    }

    /// Caller context; never contains a `cause` key.
    pub fn context(&self) -> &BTreeMap<String, Value> {
        &self.context
    }

    /// Originating lower-level failure.
    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    /// Cleaned trace captured at construction, headed by
    /// `"{name}: {message}"`.
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Identity of the instance's class.
    pub fn identity(&self) -> &Arc<ErrorIdentity> {
        &self.identity
    }

    /// Whether this is an instance of `class` or of a class extending it.
    pub fn is_instance_of(&self, class: &ErrorClass) -> bool {
        self.identity.descends_from(class.identity())
    }

    /// Whether `class` is exactly the instance's class.
    pub fn is_exactly(&self, class: &ErrorClass) -> bool {
        *self.identity == **class.identity()
    }

    /// Plain structural snapshot for logging and API responses.
    pub fn to_json(&self) -> ErrorSnapshot {
        ErrorSnapshot {
            error_type: self.name.to_string(),
            code: self.code.clone(),
            message: self.message.clone(),
            details: self.details.clone(),
            context: self.context.clone(),
            cause: self.cause.as_ref().map(Cause::to_json),
            stack: self.stack.clone(),
        }
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("AppError");
        d.field("name", &self.name.as_str());
        d.field("code", &self.code.as_str());
        d.field("message", &self.message);
        if !self.details.fields().is_empty() {
            d.field("details", self.details.fields());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        if let Some(ref cause) = self.cause {
            d.field("cause", &cause.to_string());
        }
        d.finish()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .and_then(Cause::as_error)
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl Serialize for AppError {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(ser)
    }
}

// ---------------------------------------------------------------------------
// ErrorSnapshot
// ---------------------------------------------------------------------------

/// Serializable snapshot of an [`AppError`].
///
/// A missing cause is omitted from the JSON rather than written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSnapshot {
    /// Class name.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Template entry of the code, including `message`.
    pub details: DetailsTemplate,
    /// Cause-free caller context.
    pub context: BTreeMap<String, Value>,
    /// JSON rendering of the cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Value>,
    /// Cleaned trace.
    pub stack: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
