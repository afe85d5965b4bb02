// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The chat-completion seam between the ReAct engine and LLM providers.
//!
//! Providers differ in wire format but all reduce to: a conversation plus a
//! tool manifest in, at most one tool call or a final text out. The gateway
//! in `causeway-llm` owns construction, credential handling, and retries;
//! the engine only ever sees this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CausewayError;

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back with the observation.
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Set on assistant messages that requested a tool call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    /// Set on tool messages: the call this observation answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_call: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_call: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_call: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_tool_call(rationale: impl Into<String>, call: ToolCall) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: rationale.into(),
            tool_call: Some(call),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, observation: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: observation.into(),
            tool_call: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// Tool manifest entry presented to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's input object.
    pub input_schema: serde_json::Value,
}

/// A chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A chat-completion response.
///
/// At most one of `content`/`tool_call` is meaningful per step; a response
/// with neither is treated as malformed by the engine.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_call: Option<ToolCall>,
    pub usage: Option<TokenUsage>,
}

/// Uniform chat-completion interface over heterogeneous LLM providers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion. Implementations retry transient provider errors
    /// internally; a returned `LlmTransient` means retries were exhausted.
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, CausewayError>;

    /// The concrete model identifier, for logging and step records.
    fn model_name(&self) -> &str;
}

/// Per-workspace model selection: the seam between the admission path / the
/// worker and the LLM gateway. The production implementation owns BYO
/// credential handling; tests substitute scripted models.
#[async_trait]
pub trait ModelResolver: Send + Sync {
    /// Which provider the workspace will use. Anything other than
    /// `Platform` bypasses the quota gate.
    async fn provider_for(
        &self,
        workspace_id: &str,
    ) -> Result<crate::types::LlmProvider, CausewayError>;

    /// Health of the workspace's BYO config, if one exists. Admission fails
    /// early on an unhealthy BYO config.
    async fn config_health(
        &self,
        workspace_id: &str,
    ) -> Result<Option<crate::types::HealthState>, CausewayError>;

    /// The chat model to use for the workspace's turns.
    async fn resolve_model(
        &self,
        workspace_id: &str,
    ) -> Result<std::sync::Arc<dyn ChatModel>, CausewayError>;
}
