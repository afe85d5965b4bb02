// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP mapping of the error taxonomy.
//!
//! Every handler returns `Result<_, ApiError>`; the mapping here is the only
//! place status codes and response bodies are decided. Internal errors are
//! logged with detail and surfaced opaque.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use causeway_core::CausewayError;
use serde::Serialize;

/// Gateway-level error: the core taxonomy plus admission backpressure.
#[derive(Debug)]
pub enum ApiError {
    Core(CausewayError),
    /// Queue depth exceeded the admission threshold.
    Capacity { depth: u64 },
}

impl From<CausewayError> for ApiError {
    fn from(error: CausewayError) -> Self {
        Self::Core(error)
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl ErrorBody {
    fn new(error: impl Into<String>, kind: &'static str) -> Self {
        Self {
            error: error.into(),
            kind,
            limit: None,
            reset_at: None,
            reason: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Capacity { depth } => {
                tracing::warn!(depth, "admission refused: queue backpressure");
                let mut body =
                    ErrorBody::new("the system is at capacity, try again shortly", "quota_exceeded");
                body.reason = Some("capacity");
                (StatusCode::TOO_MANY_REQUESTS, body)
            }
            ApiError::Core(error) => match &error {
                CausewayError::Validation { field, message } => (
                    StatusCode::BAD_REQUEST,
                    ErrorBody::new(format!("{field}: {message}"), "validation_error"),
                ),
                CausewayError::Authn(message) => (
                    StatusCode::UNAUTHORIZED,
                    ErrorBody::new(message.clone(), "authn_error"),
                ),
                CausewayError::Authz(message) => (
                    StatusCode::FORBIDDEN,
                    ErrorBody::new(message.clone(), "authz_error"),
                ),
                CausewayError::NotFound { resource, id } => (
                    StatusCode::NOT_FOUND,
                    ErrorBody::new(format!("{resource} {id} not found"), "not_found"),
                ),
                CausewayError::PolicyViolation { .. } => (
                    // The caller gets a generic reason; the detail lives in
                    // the security event log.
                    StatusCode::BAD_REQUEST,
                    ErrorBody::new("message rejected by security policy", "policy_violation"),
                ),
                CausewayError::QuotaExceeded { limit, reset_at } => {
                    let mut body =
                        ErrorBody::new("daily analysis limit reached", "quota_exceeded");
                    body.limit = Some(*limit);
                    body.reset_at = Some(reset_at.to_rfc3339());
                    (StatusCode::TOO_MANY_REQUESTS, body)
                }
                CausewayError::TransportUnavailable { .. } => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody::new(
                        "could not queue the analysis, try again shortly",
                        "transport_unavailable",
                    ),
                ),
                CausewayError::Config(message) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorBody::new(message.clone(), "config_error"),
                ),
                other => {
                    tracing::error!(error = %other, kind = other.kind(), "internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorBody::new("internal error", "internal"),
                    )
                }
            },
        };
        (status, Json(body)).into_response()
    }
}
