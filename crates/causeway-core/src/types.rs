// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common identifiers and status enums used across the Causeway workspace.
//!
//! Identifiers are opaque UUID strings (36 characters). Status enums render
//! as lowercase snake_case both in the database and on the wire.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a workspace (the tenant boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceId(pub String);

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Unique identifier for a turn (one question/answer unit).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub String);

/// Unique identifier for a job (the durable unit of work).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a fresh opaque identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// ISO 8601 UTC timestamp with millisecond precision, as stored in SQLite.
pub fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Where a session originated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    /// Web chat UI.
    Web,
    /// Chat-platform bot (thread-keyed sessions).
    Chat,
    Other,
}

/// Lifecycle of a turn.
///
/// Legal transitions: pending → processing → {completed | failed}.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Kind of an observable step within a turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Status,
    ToolCall,
    Thinking,
}

/// Per-step completion state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Lifecycle of a job.
///
/// Legal transitions: queued → running → {completed | failed | queued (retry)};
/// queued → queued (backoff reset).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    WaitingInput,
    Completed,
    Failed,
}

/// LLM provider selection for a workspace.
///
/// `Platform` uses the process-configured default and is subject to quota;
/// any other value is a BYO configuration that bypasses the quota gate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum LlmProvider {
    Platform,
    Openai,
    AzureOpenai,
    Gemini,
}

/// Health of an integration or LLM configuration, as recorded by the last
/// health check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_enums_round_trip_as_lowercase() {
        assert_eq!(JobStatus::WaitingInput.to_string(), "waiting_input");
        assert_eq!(JobStatus::from_str("waiting_input").unwrap(), JobStatus::WaitingInput);
        assert_eq!(StepType::ToolCall.to_string(), "tool_call");
        assert_eq!(TurnStatus::from_str("processing").unwrap(), TurnStatus::Processing);
    }

    #[test]
    fn llm_provider_uses_kebab_case() {
        assert_eq!(LlmProvider::AzureOpenai.to_string(), "azure-openai");
        assert_eq!(
            serde_json::to_string(&LlmProvider::AzureOpenai).unwrap(),
            "\"azure-openai\""
        );
        assert_eq!(LlmProvider::from_str("gemini").unwrap(), LlmProvider::Gemini);
    }

    #[test]
    fn ids_render_opaque() {
        let id = new_id();
        assert_eq!(id.len(), 36);
        let turn = TurnId(id.clone());
        assert_eq!(turn.to_string(), id);
    }

    #[test]
    fn iso_timestamp_has_millis_and_zulu() {
        let ts = now_iso();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2026-01-01T00:00:00.000Z".len());
    }
}
