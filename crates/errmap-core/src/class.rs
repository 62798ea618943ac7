// SPDX-License-Identifier: MIT OR Apache-2.0
//! The error class factory.

use crate::context::ErrorContext;
use crate::error::AppError;
use crate::identity::{self, ErrorIdentity, IdentityError};
use crate::map::{DetailsTemplate, ErrorCode, ErrorMap};
use crate::name::{ErrorName, NameError};
use errmap_stack::StackOptions;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Errors raised while constructing an instance from a class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassError {
    /// The code is not in the class's error map (nor any parent's).
    #[error("{class} has no error code \"{code}\"")]
    UnknownCode {
        /// Class that was asked.
        class: String,
        /// Requested code.
        code: String,
    },

    /// Identity correction failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

// ---------------------------------------------------------------------------
// ErrorClass
// ---------------------------------------------------------------------------

/// A named error class produced from an [`ErrorMap`].
///
/// Cloning is cheap and clones are the same class. A class is `Send + Sync`
/// and can serve any number of concurrent constructions.
///
/// ```
/// use errmap_core::{DetailsTemplate, ErrorClass, ErrorMap};
///
/// let users = ErrorClass::new(
///     "UserError",
///     ErrorMap::new().entry("NOT_FOUND", DetailsTemplate::new("User not found")),
/// )?;
/// let err = users.error("NOT_FOUND")?;
/// assert_eq!(err.to_string(), "UserError: User not found");
/// assert!(users.error("MISSING").is_err());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct ErrorClass {
    identity: Arc<ErrorIdentity>,
    map: Arc<ErrorMap>,
    parent: Option<Arc<ErrorClass>>,
    stack: Arc<StackOptions>,
}

impl ErrorClass {
    /// Produce a class named `name` whose codes are the keys of `map`.
    ///
    /// Fails fast when `name` breaks a naming rule.
    pub fn new(name: impl Into<String>, map: ErrorMap) -> Result<Self, NameError> {
        Ok(Self::named(ErrorName::new(name)?, map))
    }

    /// Produce a class from an already validated name.
    pub fn named(name: ErrorName, map: ErrorMap) -> Self {
        let identity = identity::bind(name, &ErrorIdentity::base());
        debug!(target: "errmap.class", name = %identity.name(), codes = map.len(), "error class created");
        Self {
            identity,
            map: Arc::new(map),
            parent: None,
            stack: Arc::new(StackOptions::default()),
        }
    }

    /// Produce a class extending this one.
    ///
    /// Entries of `map` shadow the parent's; codes only the parent knows
    /// are built through the parent's construction path and then
    /// re-pointed to the child. Stack options are inherited.
    pub fn extend(&self, name: impl Into<String>, map: ErrorMap) -> Result<Self, NameError> {
        Ok(self.extend_named(ErrorName::new(name)?, map))
    }

    /// [`extend`](Self::extend) with an already validated name.
    pub fn extend_named(&self, name: ErrorName, map: ErrorMap) -> Self {
        let identity = identity::bind(name, &self.identity);
        debug!(
            target: "errmap.class",
            name = %identity.name(),
            parent = %self.identity.name(),
            codes = map.len(),
            "error class extended"
        );
        Self {
            identity,
            map: Arc::new(map),
            parent: Some(Arc::new(self.clone())),
            stack: Arc::clone(&self.stack),
        }
    }

    /// Replace the options used to capture instance traces.
    pub fn with_stack_options(mut self, opts: StackOptions) -> Self {
        self.stack = Arc::new(opts);
        self
    }

    /// Declared name.
    pub fn name(&self) -> &str {
        self.identity.name().as_str()
    }

    /// Class identity.
    pub fn identity(&self) -> &Arc<ErrorIdentity> {
        &self.identity
    }

    /// This class's own entries (not including inherited ones).
    pub fn map(&self) -> &ErrorMap {
        &self.map
    }

    /// Class this one extends, if any.
    pub fn parent(&self) -> Option<&ErrorClass> {
        self.parent.as_deref()
    }

    /// Options used to capture instance traces.
    pub fn stack_options(&self) -> &StackOptions {
        &self.stack
    }

    /// Template for `code`, looking through parents.
    pub fn resolve(&self, code: &str) -> Option<&DetailsTemplate> {
        self.map
            .get(code)
            .or_else(|| self.parent.as_ref().and_then(|p| p.resolve(code)))
    }

    /// Whether `code` resolves on this class.
    pub fn contains(&self, code: &str) -> bool {
        self.resolve(code).is_some()
    }

    /// Every code this class can build, inherited ones included.
    pub fn codes(&self) -> BTreeSet<&ErrorCode> {
        let mut codes: BTreeSet<&ErrorCode> = self.map.codes().collect();
        if let Some(parent) = &self.parent {
            codes.extend(parent.codes());
        }
        codes
    }

    /// Build an instance for `code`.
    pub fn error(&self, code: impl Into<ErrorCode>) -> Result<AppError, ClassError> {
        self.construct_as(&self.identity, &self.stack, code.into(), None)
    }

    /// Build an instance for `code` with caller context.
    pub fn error_with(
        &self,
        code: impl Into<ErrorCode>,
        context: ErrorContext,
    ) -> Result<AppError, ClassError> {
        self.construct_as(&self.identity, &self.stack, code.into(), Some(context))
    }

    /// Whether `err` is an instance of this class or of a class extending it.
    pub fn is_instance(&self, err: &AppError) -> bool {
        err.is_instance_of(self)
    }

    fn construct_as(
        &self,
        requested: &Arc<ErrorIdentity>,
        stack: &StackOptions,
        code: ErrorCode,
        context: Option<ErrorContext>,
    ) -> Result<AppError, ClassError> {
        if let Some(details) = self.map.get(code.as_str()) {
            return Ok(AppError::construct(
                &self.identity,
                Some(requested),
                code,
                details,
                context,
                stack,
            )?);
        }
        match &self.parent {
            Some(parent) => parent.construct_as(requested, stack, code, context),
            None => {
                warn!(target: "errmap.class", class = %requested.name(), %code, "unknown error code");
                Err(ClassError::UnknownCode {
                    class: requested.name().to_string(),
                    code: code.to_string(),
                })
            }
        }
    }
}

impl PartialEq for ErrorClass {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for ErrorClass {}

impl fmt::Debug for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ErrorClass");
        d.field("name", &self.name());
        d.field("codes", &self.codes());
        if let Some(parent) = &self.parent {
            d.field("parent", &parent.name());
        }
        d.finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
