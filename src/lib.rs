// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use errmap_core::{
    AppError, CAUSE_KEY, CaptureMode, Cause, ClassError, DetailsTemplate, ERROR_NAME_SUFFIX,
    ErrorClass, ErrorCode, ErrorContext, ErrorIdentity, ErrorMap, ErrorName, ErrorSnapshot,
    IdentityError, NameError, RESERVED_ERROR_NAMES, StackOptions, identity, validate_error_name,
};
pub use errmap_trycatch::{
    IntoPair, Outcome, PanicPayload, Task, Thrown, ThrownError, TryCatch, trycatch,
    trycatch_async, trycatch_future, trycatch_local, trycatch_sync, trycatch_sync_with,
    trycatch_with,
};

/// HTTP status table and lookups.
pub mod http {
    pub use errmap_http::*;
}

/// TOML configuration and the class registry.
pub mod config {
    pub use errmap_config::*;
}

/// Trace capture and cleaning.
pub mod stack {
    pub use errmap_stack::*;
}

/// Deferred result types of the try/catch adapter.
pub mod adapter {
    pub use errmap_trycatch::{Deferred, LocalDeferred, THROWN_ERROR_MESSAGE};
}
