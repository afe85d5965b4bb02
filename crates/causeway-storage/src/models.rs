// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! These types represent rows in the SQLite database. Status columns are
//! typed with the enums from `causeway-core`; row mapping parses the TEXT
//! values and rejects anything outside the status machines.

use causeway_core::{
    HealthState, JobStatus, LlmProvider, ProviderKind, SessionOrigin, StepStatus, StepType,
    TurnStatus,
};
use serde::{Deserialize, Serialize};

/// A conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub workspace_id: String,
    pub origin: SessionOrigin,
    pub user_id: Option<String>,
    /// External channel coordinate for chat-platform sessions.
    pub external_channel_id: Option<String>,
    /// External thread coordinate; unique with the channel per workspace.
    pub external_thread_key: Option<String>,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One (question, answer) unit inside a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub session_id: String,
    pub user_message: String,
    pub final_response: Option<String>,
    pub status: TurnStatus,
    pub job_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One observable event within a turn. Sequences are gap-free from 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnStep {
    pub id: String,
    pub turn_id: String,
    pub step_type: StepType,
    pub tool_name: Option<String>,
    pub content: Option<String>,
    pub status: StepStatus,
    pub sequence: u32,
    pub created_at: String,
}

/// The durable unit of work behind a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub workspace_id: String,
    pub turn_id: String,
    pub status: JobStatus,
    pub retries: i32,
    pub max_retries: i32,
    pub backoff_until: Option<String>,
    pub priority: i32,
    /// Opaque bag: query, user id, integration hints.
    pub requested_context: serde_json::Value,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A claimed or waiting delivery-queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub receipt: Option<String>,
    pub available_at: String,
    pub locked_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Append-only record of a prompt-guard verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: String,
    pub workspace_id: String,
    pub event_type: String,
    pub classification: String,
    /// At most 300 characters of the offending message.
    pub message_prefix: String,
    pub reason: Option<String>,
    pub created_at: String,
}

/// A per-workspace integration with sealed credentials.
#[derive(Debug, Clone)]
pub struct IntegrationRecord {
    pub id: String,
    pub workspace_id: String,
    pub provider: ProviderKind,
    pub credentials_sealed: Vec<u8>,
    pub nonce: Vec<u8>,
    pub health_status: Option<HealthState>,
    pub last_checked_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-workspace LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfigRecord {
    pub workspace_id: String,
    pub provider: LlmProvider,
    pub model: String,
    pub credentials_sealed: Option<Vec<u8>>,
    pub nonce: Option<Vec<u8>>,
    pub health_status: Option<HealthState>,
    pub updated_at: String,
}

/// One user's thumbs-up/down on a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnFeedback {
    pub id: String,
    pub turn_id: String,
    pub user_id: String,
    /// -1 or +1.
    pub score: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// One free-text comment on a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnComment {
    pub id: String,
    pub turn_id: String,
    pub user_id: String,
    pub comment: String,
    pub created_at: String,
}

/// A session-search hit with the matched content excerpt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSearchHit {
    pub session_id: String,
    pub title: Option<String>,
    pub matched_content: String,
    pub match_type: String,
    pub updated_at: String,
}
