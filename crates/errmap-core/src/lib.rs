// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod class;
mod context;
mod error;
pub mod identity;
mod map;
mod name;

pub use class::{ClassError, ErrorClass};
pub use context::{CAUSE_KEY, Cause, ErrorContext};
pub use error::{AppError, ErrorSnapshot};
pub use identity::{ErrorIdentity, IdentityError};
pub use map::{DetailsTemplate, ErrorCode, ErrorMap};
pub use name::{ERROR_NAME_SUFFIX, ErrorName, NameError, RESERVED_ERROR_NAMES, validate_error_name};

/// Re-exported so callers can configure traces without a direct dependency.
pub use errmap_stack::{CaptureMode, StackOptions};
