// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared transient-error retry policy for provider clients.
//!
//! Up to three attempts with exponential backoff. 429, 5xx, and connect
//! failures are transient; everything else surfaces immediately.

use std::time::Duration;

/// Maximum attempts per completion call (1 initial + 2 retries).
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff before retry `attempt` (1-based): 500ms, 1s.
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    Duration::from_millis(500u64.saturating_mul(1 << (attempt.saturating_sub(1)).min(8)))
}

/// Whether an HTTP status is worth retrying.
pub fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff_for_attempt(1), Duration::from_millis(500));
        assert_eq!(backoff_for_attempt(2), Duration::from_millis(1000));
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_transient_status(reqwest::StatusCode::BAD_REQUEST));
        assert!(!is_transient_status(reqwest::StatusCode::UNAUTHORIZED));
    }
}
