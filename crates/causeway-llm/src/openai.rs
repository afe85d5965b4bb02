// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat-completions client.
//!
//! Serves three roles: the platform default model, BYO OpenAI configs, and
//! Azure OpenAI deployments (same wire format, different URL and auth
//! header). Handles request construction, authentication, and transient
//! error retry.

use std::time::Duration;

use async_trait::async_trait;
use causeway_core::{
    CausewayError, ChatCompletion, ChatMessage, ChatModel, ChatRequest, ChatRole, TokenUsage,
    ToolCall,
};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::retry::{MAX_ATTEMPTS, backoff_for_attempt, is_transient_status};

/// How requests are authenticated and addressed.
#[derive(Debug, Clone)]
enum Endpoint {
    /// `{base}/chat/completions` with `Authorization: Bearer`.
    OpenAi { base_url: String },
    /// `{base}/openai/deployments/{deployment}/chat/completions` with
    /// an `api-key` header.
    Azure {
        base_url: String,
        deployment: String,
        api_version: String,
    },
}

/// Client for OpenAI-compatible chat-completions APIs.
#[derive(Debug, Clone)]
pub struct OpenAiModel {
    client: reqwest::Client,
    endpoint: Endpoint,
    model: String,
}

impl OpenAiModel {
    /// Build a client for OpenAI or any OpenAI-compatible endpoint.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, CausewayError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {api_key}");
        headers.insert(
            "authorization",
            HeaderValue::from_str(&bearer)
                .map_err(|e| CausewayError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        Ok(Self {
            client: build_http_client(headers)?,
            endpoint: Endpoint::OpenAi {
                base_url: base_url.trim_end_matches('/').to_string(),
            },
            model: model.to_string(),
        })
    }

    /// Build a client for an Azure OpenAI deployment.
    pub fn azure(
        base_url: &str,
        api_key: &str,
        deployment: &str,
        api_version: &str,
    ) -> Result<Self, CausewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| CausewayError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        Ok(Self {
            client: build_http_client(headers)?,
            endpoint: Endpoint::Azure {
                base_url: base_url.trim_end_matches('/').to_string(),
                deployment: deployment.to_string(),
                api_version: api_version.to_string(),
            },
            model: deployment.to_string(),
        })
    }

    fn url(&self) -> String {
        match &self.endpoint {
            Endpoint::OpenAi { base_url } => format!("{base_url}/chat/completions"),
            Endpoint::Azure {
                base_url,
                deployment,
                api_version,
            } => format!(
                "{base_url}/openai/deployments/{deployment}/chat/completions?api-version={api_version}"
            ),
        }
    }
}

fn build_http_client(headers: HeaderMap) -> Result<reqwest::Client, CausewayError> {
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| CausewayError::LlmTransient {
            message: format!("failed to build HTTP client: {e}"),
            source: Some(Box::new(e)),
        })
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object.
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionDef,
}

#[derive(Debug, Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    #[serde(default, rename = "type")]
    kind: String,
    message: String,
}

fn to_wire_message(message: &ChatMessage) -> WireMessage {
    match message.role {
        ChatRole::System => WireMessage {
            role: "system".into(),
            content: Some(message.content.clone()),
            tool_calls: None,
            tool_call_id: None,
        },
        ChatRole::User => WireMessage {
            role: "user".into(),
            content: Some(message.content.clone()),
            tool_calls: None,
            tool_call_id: None,
        },
        ChatRole::Assistant => WireMessage {
            role: "assistant".into(),
            content: if message.content.is_empty() {
                None
            } else {
                Some(message.content.clone())
            },
            tool_calls: message.tool_call.as_ref().map(|call| {
                vec![WireToolCall {
                    id: call.id.clone(),
                    kind: "function".into(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.input.to_string(),
                    },
                }]
            }),
            tool_call_id: None,
        },
        ChatRole::Tool => WireMessage {
            role: "tool".into(),
            content: Some(message.content.clone()),
            tool_calls: None,
            tool_call_id: message.tool_call_id.clone(),
        },
    }
}

fn parse_completion(response: WireResponse) -> ChatCompletion {
    let usage = response.usage.map(|u| TokenUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });
    let Some(choice) = response.choices.into_iter().next() else {
        return ChatCompletion {
            content: None,
            tool_call: None,
            usage,
        };
    };
    let tool_call = choice.message.tool_calls.and_then(|calls| {
        calls.into_iter().next().and_then(|call| {
            // Providers occasionally emit unparseable argument strings;
            // surfacing that as a malformed response lets the engine apply
            // its malformed-streak policy.
            serde_json::from_str(&call.function.arguments)
                .ok()
                .map(|input| ToolCall {
                    id: call.id,
                    name: call.function.name,
                    input,
                })
        })
    });
    ChatCompletion {
        content: choice.message.content.filter(|c| !c.is_empty()),
        tool_call,
        usage,
    }
}

#[async_trait]
impl ChatModel for OpenAiModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, CausewayError> {
        let wire = WireRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(to_wire_message).collect(),
            tools: request
                .tools
                .iter()
                .map(|t| WireTool {
                    kind: "function".into(),
                    function: WireFunctionDef {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    },
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut last_error = None;

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                warn!(attempt, model = %self.model, "retrying completion after transient error");
                tokio::time::sleep(backoff_for_attempt(attempt - 1)).await;
            }

            let response = match self.client.post(self.url()).json(&wire).send().await {
                Ok(response) => response,
                Err(e) => {
                    // Connect-level failures are transient.
                    last_error = Some(CausewayError::LlmTransient {
                        message: format!("HTTP request failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                    continue;
                }
            };

            let status = response.status();
            debug!(status = %status, attempt, model = %self.model, "completion response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| CausewayError::LlmTransient {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                let wire_response: WireResponse = serde_json::from_str(&body).map_err(|e| {
                    CausewayError::LlmProtocol(format!("unparseable completion response: {e}"))
                })?;
                return Ok(parse_completion(wire_response));
            }

            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<WireErrorBody>(&body)
                .map(|e| format!("{} ({})", e.error.message, e.error.kind))
                .unwrap_or_else(|_| body.clone());

            if is_transient_status(status) {
                last_error = Some(CausewayError::LlmTransient {
                    message: format!("provider returned {status}: {detail}"),
                    source: None,
                });
                continue;
            }

            // 401/403 and other non-transient responses end the turn.
            return Err(CausewayError::LlmProtocol(format!(
                "provider returned {status}: {detail}"
            )));
        }

        Err(last_error.unwrap_or_else(|| CausewayError::LlmTransient {
            message: "completion failed after retries".into(),
            source: None,
        }))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
