// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared across the Causeway workspace.
//!
//! One enum carries the whole error taxonomy. Boundaries that need to
//! classify (the HTTP layer, the worker's retry decision) match on variants
//! or use [`CausewayError::kind`] / [`CausewayError::is_retryable`] instead
//! of re-wrapping.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The primary error type used across all Causeway crates.
#[derive(Debug, Error)]
pub enum CausewayError {
    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Input failed validation before any state was touched.
    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    /// Caller could not be authenticated.
    #[error("authentication failed: {0}")]
    Authn(String),

    /// Caller is authenticated but not allowed to touch this resource.
    #[error("not authorized: {0}")]
    Authz(String),

    /// A referenced record does not exist in the caller's workspace.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// The prompt guard rejected the message.
    #[error("message rejected by security policy: {reason}")]
    PolicyViolation { reason: String },

    /// The workspace exhausted its daily admission quota.
    #[error("quota exceeded: limit {limit}, resets at {reset_at}")]
    QuotaExceeded {
        limit: i64,
        reset_at: DateTime<Utc>,
    },

    /// The queue transport refused or dropped a message.
    #[error("transport unavailable: {message}")]
    TransportUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transient LLM provider failure (429, 5xx, connect errors).
    #[error("llm transient failure: {message}")]
    LlmTransient {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The LLM is reachable but misbehaving (repeated malformed output,
    /// rejected credentials). Not retryable.
    #[error("llm protocol failure: {0}")]
    LlmProtocol(String),

    /// Observability/code provider adapter failure. The tool layer converts
    /// these into in-band `ERROR:` observations; they never abort the loop.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The provider rejected our credentials. The integration is marked
    /// unhealthy on this path.
    #[error("provider rejected credentials for {provider}: {message}")]
    ProviderUnauthorized { provider: String, message: String },

    /// A bounded operation exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Credential sealing/unsealing failure.
    #[error("vault error: {0}")]
    Vault(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CausewayError {
    /// Stable kind string used in API error bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Storage { .. } => "internal",
            Self::Validation { .. } => "validation_error",
            Self::Authn(_) => "authn_error",
            Self::Authz(_) => "authz_error",
            Self::NotFound { .. } => "not_found",
            Self::PolicyViolation { .. } => "policy_violation",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::TransportUnavailable { .. } => "transport_unavailable",
            Self::LlmTransient { .. } => "llm_transient",
            Self::LlmProtocol(_) => "llm_protocol",
            Self::Provider { .. } => "tool_transient",
            Self::ProviderUnauthorized { .. } => "tool_unauthorized",
            Self::Timeout { .. } => "timeout",
            Self::Vault(_) => "internal",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether a job that terminated with this error should be requeued
    /// with backoff rather than failed permanently.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LlmTransient { .. }
                | Self::Timeout { .. }
                | Self::TransportUnavailable { .. }
                | Self::Storage { .. }
        )
    }

    /// Convenience constructor for validation failures.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
