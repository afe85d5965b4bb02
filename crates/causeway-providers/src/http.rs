// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared HTTP plumbing for provider adapters.
//!
//! Adapter failures are in-band data for the agent, so the mapping here is
//! the whole error story: credential rejections become
//! `ProviderUnauthorized` (which also marks the integration unhealthy),
//! everything else becomes a transient `Provider` error that the tool layer
//! renders as an `ERROR:` observation.

use std::time::Duration;

use causeway_core::{CausewayError, ProviderKind};

/// Build the reqwest client used by all adapters.
pub(crate) fn build_client() -> Result<reqwest::Client, CausewayError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("causeway-rca")
        .build()
        .map_err(|e| CausewayError::Provider {
            message: format!("failed to build HTTP client: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Map a request-level failure (connect, timeout).
pub(crate) fn request_error(provider: ProviderKind, e: reqwest::Error) -> CausewayError {
    CausewayError::Provider {
        message: format!("{provider} request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Check a response status, consuming error bodies into the message.
pub(crate) async fn check_status(
    provider: ProviderKind,
    response: reqwest::Response,
) -> Result<reqwest::Response, CausewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body = body.chars().take(300).collect::<String>();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(CausewayError::ProviderUnauthorized {
            provider: provider.to_string(),
            message: format!("{status}: {body}"),
        });
    }
    Err(CausewayError::Provider {
        message: format!("{provider} returned {status}: {body}"),
        source: None,
    })
}

/// Parse a JSON body, mapping failures to provider errors.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    provider: ProviderKind,
    response: reqwest::Response,
) -> Result<T, CausewayError> {
    let body = response
        .text()
        .await
        .map_err(|e| request_error(provider, e))?;
    serde_json::from_str(&body).map_err(|e| CausewayError::Provider {
        message: format!("{provider} returned unparseable body: {e}"),
        source: Some(Box::new(e)),
    })
}
