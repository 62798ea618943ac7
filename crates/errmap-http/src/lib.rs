// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

use errmap_core::DetailsTemplate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// One row of the status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HttpEntry {
    /// `"<status>_<label>"`, e.g. `"404_not_found"`.
    pub code: &'static str,
    /// Numeric status.
    pub status: u16,
    /// Snake-case label, e.g. `"not_found"`.
    pub message: &'static str,
}

const fn entry(code: &'static str, status: u16, message: &'static str) -> HttpEntry {
    HttpEntry {
        code,
        status,
        message,
    }
}

const HTTP_STATUS_TABLE: &[HttpEntry] = &[
    entry("400_bad_request", 400, "bad_request"),
    entry("401_unauthorized", 401, "unauthorized"),
    entry("402_payment_required", 402, "payment_required"),
    entry("403_forbidden", 403, "forbidden"),
    entry("404_not_found", 404, "not_found"),
    entry("407_proxy_authentication_required", 407, "proxy_authentication_required"),
    entry("409_conflict", 409, "conflict"),
    entry("410_gone", 410, "gone"),
    entry("413_content_too_large", 413, "content_too_large"),
    entry("415_unsupported_media_type", 415, "unsupported_media_type"),
    entry("422_unprocessable_content", 422, "unprocessable_content"),
    entry("423_locked", 423, "locked"),
    entry("429_too_many_requests", 429, "too_many_requests"),
    entry("500_internal_server_error", 500, "internal_server_error"),
    entry("502_bad_gateway", 502, "bad_gateway"),
    entry("503_service_unavailable", 503, "service_unavailable"),
    entry("507_insufficient_storage", 507, "insufficient_storage"),
];

/// Entry returned when a lookup finds nothing.
pub const INTERNAL_SERVER_ERROR: HttpEntry =
    entry("500_internal_server_error", 500, "internal_server_error");

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Look up by combined code (`"404_not_found"`).
pub fn from_code(code: &str) -> HttpEntry {
    find(|e| e.code == code)
}

/// Look up by numeric status.
pub fn from_status(status: u16) -> HttpEntry {
    find(|e| e.status == status)
}

/// Look up by label (`"not_found"`).
pub fn from_message(message: &str) -> HttpEntry {
    find(|e| e.message == message)
}

fn find(pred: impl Fn(&HttpEntry) -> bool) -> HttpEntry {
    HTTP_STATUS_TABLE
        .iter()
        .copied()
        .find(|e| pred(e))
        .unwrap_or(INTERNAL_SERVER_ERROR)
}

impl HttpEntry {
    /// Every entry of the table, in status order.
    pub fn all() -> impl Iterator<Item = HttpEntry> {
        HTTP_STATUS_TABLE.iter().copied()
    }

    /// Whether the status is a 4xx client error.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Whether the status is a 5xx server error.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Details template carrying this status, for use in an error map.
    ///
    /// ```
    /// use errmap_core::ErrorMap;
    /// use errmap_http::from_status;
    ///
    /// let map = ErrorMap::new().entry("USER_NOT_FOUND", from_status(404).details("User not found"));
    /// let details = map.get("USER_NOT_FOUND").unwrap();
    /// assert_eq!(details.get("status"), Some(404.into()));
    /// assert_eq!(details.get("http_code"), Some("404_not_found".into()));
    /// ```
    pub fn details(&self, message: impl Into<String>) -> DetailsTemplate {
        DetailsTemplate::new(message)
            .with("status", self.status)
            .with("http_code", self.code)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
