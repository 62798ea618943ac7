// SPDX-License-Identifier: MIT OR Apache-2.0
//! Class identity: the explicit discriminant every produced error class and
//! every instance carries.
//!
//! Identities form a chain from a concrete class up to the abstract
//! [`ErrorIdentity::base`] (`AppError`). An instance "is an instance of" a
//! class when the class's identity appears on the instance's chain.

use crate::AppError;
use crate::name::ErrorName;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Name of the abstract root every class descends from.
pub const BASE_ERROR_NAME: &str = "AppError";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

static BASE: LazyLock<Arc<ErrorIdentity>> = LazyLock::new(|| {
    Arc::new(ErrorIdentity {
        id: 0,
        name: ErrorName::builtin(BASE_ERROR_NAME),
        parent: None,
    })
});

// ---------------------------------------------------------------------------
// ErrorIdentity
// ---------------------------------------------------------------------------

/// Identity of one produced error class.
///
/// Two classes are the same class only if they share an identity; two
/// factory calls with the same name produce two distinct identities.
pub struct ErrorIdentity {
    id: u64,
    name: ErrorName,
    parent: Option<Arc<ErrorIdentity>>,
}

impl ErrorIdentity {
    /// The abstract root identity.
    pub fn base() -> Arc<ErrorIdentity> {
        Arc::clone(&BASE)
    }

    /// Process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Declared class name.
    pub fn name(&self) -> &ErrorName {
        &self.name
    }

    /// Identity this one extends; `None` only for the root.
    pub fn parent(&self) -> Option<&Arc<ErrorIdentity>> {
        self.parent.as_ref()
    }

    /// Whether this is the abstract root, which is never constructed.
    pub fn is_abstract(&self) -> bool {
        self.parent.is_none()
    }

    /// This identity followed by every ancestor up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = &ErrorIdentity> {
        std::iter::successors(Some(self), |&id| id.parent.as_deref())
    }

    /// Whether `other` is this identity or one of its ancestors.
    pub fn descends_from(&self, other: &ErrorIdentity) -> bool {
        self.ancestors().any(|a| a.id == other.id)
    }
}

impl PartialEq for ErrorIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ErrorIdentity {}

impl fmt::Debug for ErrorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain: Vec<&str> = self.ancestors().map(|a| a.name.as_str()).collect();
        f.debug_struct("ErrorIdentity")
            .field("id", &self.id)
            .field("chain", &chain)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// Bind a validated name to a fresh identity extending `parent`.
///
/// The class reports the name through its identity, and every instance
/// reports it through the identity it carries.
pub fn bind(name: ErrorName, parent: &Arc<ErrorIdentity>) -> Arc<ErrorIdentity> {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    debug!(target: "errmap.identity", %name, id, parent = %parent.name, "identity bound");
    Arc::new(ErrorIdentity {
        id,
        name,
        parent: Some(Arc::clone(parent)),
    })
}

// ---------------------------------------------------------------------------
// Correction
// ---------------------------------------------------------------------------

/// Contract violations of [`correct`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// No requested class was given.
    #[error("identity must be corrected from inside a construction path")]
    MissingTarget,

    /// The requested class is the abstract root.
    #[error("\"{name}\" is abstract and cannot be constructed")]
    AbstractTarget {
        /// Name of the abstract class.
        name: String,
    },

    /// The requested class does not extend the constructing class.
    #[error("\"{target}\" does not extend \"{base}\"")]
    UnrelatedTarget {
        /// Requested class.
        target: String,
        /// Class whose construction path built the instance.
        base: String,
    },
}

/// Re-point `instance` to the class that was actually requested.
///
/// When a child class resolves a code through its parent, the instance is
/// built by the parent's construction path and starts out carrying the
/// parent's identity. This moves it to `requested`, the most-derived class,
/// and resets a stale display name. Calling it again is a no-op.
pub fn correct(
    instance: &mut AppError,
    requested: Option<&Arc<ErrorIdentity>>,
) -> Result<(), IdentityError> {
    let requested = requested.ok_or(IdentityError::MissingTarget)?;
    if requested.is_abstract() {
        return Err(IdentityError::AbstractTarget {
            name: requested.name.to_string(),
        });
    }
    if !requested.descends_from(&instance.identity) {
        return Err(IdentityError::UnrelatedTarget {
            target: requested.name.to_string(),
            base: instance.identity.name.to_string(),
        });
    }

    if instance.identity.id != requested.id {
        debug!(
            target: "errmap.identity",
            from = %instance.identity.name,
            to = %requested.name,
            "re-pointing instance identity"
        );
        instance.identity = Arc::clone(requested);
    }
    if instance.name != requested.name {
        instance.name = requested.name.clone();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DetailsTemplate, ErrorClass, ErrorMap};

    fn name(s: &str) -> ErrorName {
        ErrorName::new(s).unwrap()
    }

    #[test]
    fn base_is_abstract_and_shared() {
        let a = ErrorIdentity::base();
        let b = ErrorIdentity::base();
        assert!(a.is_abstract());
        assert_eq!(a, b);
        assert_eq!(a.name(), "AppError");
    }

    #[test]
    fn bind_allocates_distinct_ids() {
        let base = ErrorIdentity::base();
        let a = bind(name("QuotaError"), &base);
        let b = bind(name("QuotaError"), &base);
        assert_ne!(a, b);
        assert_eq!(a.name(), b.name());
        assert!(!a.is_abstract());
        assert!(a.descends_from(&base));
        assert!(!a.descends_from(&b));
    }

    #[test]
    fn ancestors_walk_to_root() {
        let base = ErrorIdentity::base();
        let parent = bind(name("HttpError"), &base);
        let child = bind(name("NotFoundError"), &parent);
        let names: Vec<&str> = child.ancestors().map(|a| a.name().as_str()).collect();
        assert_eq!(names, ["NotFoundError", "HttpError", "AppError"]);
        assert!(child.descends_from(&parent));
        assert!(!parent.descends_from(&child));
    }

    fn parent_and_child() -> (ErrorClass, ErrorClass) {
        let parent = ErrorClass::new(
            "HttpError",
            ErrorMap::new().entry("TIMEOUT", DetailsTemplate::new("timed out")),
        )
        .unwrap();
        let child = parent
            .extend(
                "GatewayError",
                ErrorMap::new().entry("BAD_GATEWAY", DetailsTemplate::new("bad gateway")),
            )
            .unwrap();
        (parent, child)
    }

    #[test]
    fn correct_requires_a_target() {
        let (parent, _) = parent_and_child();
        let mut err = parent.error("TIMEOUT").unwrap();
        assert_eq!(correct(&mut err, None), Err(IdentityError::MissingTarget));
    }

    #[test]
    fn correct_rejects_abstract_target() {
        let (parent, _) = parent_and_child();
        let mut err = parent.error("TIMEOUT").unwrap();
        let base = ErrorIdentity::base();
        assert!(matches!(
            correct(&mut err, Some(&base)),
            Err(IdentityError::AbstractTarget { .. })
        ));
    }

    #[test]
    fn correct_rejects_unrelated_target() {
        let (parent, child) = parent_and_child();
        let mut err = child.error("BAD_GATEWAY").unwrap();
        // the parent does not extend the child
        assert!(matches!(
            correct(&mut err, Some(parent.identity())),
            Err(IdentityError::UnrelatedTarget { .. })
        ));
    }

    #[test]
    fn correct_repoints_to_most_derived_and_is_idempotent() {
        let (parent, child) = parent_and_child();
        let mut err = parent.error("TIMEOUT").unwrap();
        assert_eq!(err.name(), "HttpError");

        correct(&mut err, Some(child.identity())).unwrap();
        assert_eq!(err.identity(), child.identity());
        assert_eq!(err.name(), "GatewayError");

        correct(&mut err, Some(child.identity())).unwrap();
        assert_eq!(err.identity(), child.identity());
        assert_eq!(err.name(), "GatewayError");
    }
}
