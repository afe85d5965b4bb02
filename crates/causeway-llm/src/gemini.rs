// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gemini generateContent client.
//!
//! Gemini has no tool-call ids; function responses are matched by function
//! name, so the conversion tracks the name of the pending call when it
//! serializes tool observations.

use std::time::Duration;

use async_trait::async_trait;
use causeway_core::{
    CausewayError, ChatCompletion, ChatModel, ChatRequest, ChatRole, TokenUsage, ToolCall,
    new_id,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::retry::{MAX_ATTEMPTS, backoff_for_attempt, is_transient_status};

/// Client for the Gemini generateContent API.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiModel {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, CausewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| CausewayError::LlmTransient {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireToolBlock>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireToolBlock {
    function_declarations: Vec<WireFunctionDecl>,
}

#[derive(Debug, Serialize)]
struct WireFunctionDecl {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    usage_metadata: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    content: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

fn to_wire_contents(request: &ChatRequest) -> (Option<WireContent>, Vec<WireContent>) {
    let mut system = None;
    let mut contents = Vec::new();
    // Gemini matches function responses by name, not id.
    let mut pending_call_name: Option<String> = None;

    for message in &request.messages {
        match message.role {
            ChatRole::System => {
                system = Some(WireContent {
                    role: None,
                    parts: vec![WirePart {
                        text: Some(message.content.clone()),
                        function_call: None,
                        function_response: None,
                    }],
                });
            }
            ChatRole::User => contents.push(WireContent {
                role: Some("user".into()),
                parts: vec![WirePart {
                    text: Some(message.content.clone()),
                    function_call: None,
                    function_response: None,
                }],
            }),
            ChatRole::Assistant => {
                let mut parts = Vec::new();
                if !message.content.is_empty() {
                    parts.push(WirePart {
                        text: Some(message.content.clone()),
                        function_call: None,
                        function_response: None,
                    });
                }
                if let Some(call) = &message.tool_call {
                    pending_call_name = Some(call.name.clone());
                    parts.push(WirePart {
                        text: None,
                        function_call: Some(WireFunctionCall {
                            name: call.name.clone(),
                            args: call.input.clone(),
                        }),
                        function_response: None,
                    });
                }
                contents.push(WireContent {
                    role: Some("model".into()),
                    parts,
                });
            }
            ChatRole::Tool => {
                let name = pending_call_name.take().unwrap_or_default();
                contents.push(WireContent {
                    role: Some("user".into()),
                    parts: vec![WirePart {
                        text: None,
                        function_call: None,
                        function_response: Some(WireFunctionResponse {
                            name,
                            response: serde_json::json!({"content": message.content}),
                        }),
                    }],
                });
            }
        }
    }
    (system, contents)
}

fn parse_completion(response: WireResponse) -> ChatCompletion {
    let usage = response.usage_metadata.map(|u| TokenUsage {
        input_tokens: u.prompt_token_count,
        output_tokens: u.candidates_token_count,
    });
    let mut content = None;
    let mut tool_call = None;
    if let Some(candidate) = response.candidates.into_iter().next()
        && let Some(body) = candidate.content
    {
        for part in body.parts {
            if let Some(text) = part.text
                && !text.is_empty()
                && content.is_none()
            {
                content = Some(text);
            }
            if let Some(call) = part.function_call
                && tool_call.is_none()
            {
                tool_call = Some(ToolCall {
                    id: new_id(),
                    name: call.name,
                    input: call.args,
                });
            }
        }
    }
    ChatCompletion {
        content,
        tool_call,
        usage,
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, CausewayError> {
        let (system_instruction, contents) = to_wire_contents(&request);
        let wire = WireRequest {
            system_instruction,
            contents,
            tools: if request.tools.is_empty() {
                Vec::new()
            } else {
                vec![WireToolBlock {
                    function_declarations: request
                        .tools
                        .iter()
                        .map(|t| WireFunctionDecl {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        })
                        .collect(),
                }]
            },
            generation_config: WireGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
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
            if is_transient_status(status) {
                last_error = Some(CausewayError::LlmTransient {
                    message: format!("provider returned {status}: {body}"),
                    source: None,
                });
                continue;
            }

            return Err(CausewayError::LlmProtocol(format!(
                "provider returned {status}: {body}"
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
