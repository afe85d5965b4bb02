// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted chat model and model resolver for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use causeway_core::{
    CausewayError, ChatCompletion, ChatModel, ChatRequest, HealthState, LlmProvider,
    ModelResolver, ToolCall,
};

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// The model requests a tool call, optionally with a short rationale.
    Action {
        tool: String,
        input: serde_json::Value,
        rationale: Option<String>,
    },
    /// The model produces the final answer.
    Final(String),
    /// The model responds with neither content nor a tool call.
    Malformed,
    /// The provider fails transiently.
    TransientError,
}

/// Chat model that pops scripted steps in order. Once the script is
/// exhausted it keeps producing a fallback final answer.
pub struct ScriptedModel {
    script: Mutex<Vec<ScriptedStep>>,
    /// Requests seen, for assertions on conversation shape.
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<ScriptedStep>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, CausewayError> {
        self.requests.lock().unwrap().push(request);
        let step = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                ScriptedStep::Final("Investigation finished with no further findings.".into())
            } else {
                script.remove(0)
            }
        };
        match step {
            ScriptedStep::Action {
                tool,
                input,
                rationale,
            } => Ok(ChatCompletion {
                content: rationale,
                tool_call: Some(ToolCall {
                    id: format!("call-{tool}"),
                    name: tool,
                    input,
                }),
                usage: None,
            }),
            ScriptedStep::Final(answer) => Ok(ChatCompletion {
                content: Some(answer),
                tool_call: None,
                usage: None,
            }),
            ScriptedStep::Malformed => Ok(ChatCompletion {
                content: None,
                tool_call: None,
                usage: None,
            }),
            ScriptedStep::TransientError => Err(CausewayError::LlmTransient {
                message: "scripted 503".into(),
                source: None,
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

/// Resolver handing every workspace the same scripted model.
pub struct ScriptedResolver {
    model: Arc<ScriptedModel>,
    provider: LlmProvider,
}

impl ScriptedResolver {
    pub fn new(model: Arc<ScriptedModel>) -> Arc<Self> {
        Arc::new(Self {
            model,
            provider: LlmProvider::Platform,
        })
    }

    pub fn with_provider(model: Arc<ScriptedModel>, provider: LlmProvider) -> Arc<Self> {
        Arc::new(Self { model, provider })
    }
}

#[async_trait]
impl ModelResolver for ScriptedResolver {
    async fn provider_for(&self, _workspace_id: &str) -> Result<LlmProvider, CausewayError> {
        Ok(self.provider)
    }

    async fn config_health(
        &self,
        _workspace_id: &str,
    ) -> Result<Option<HealthState>, CausewayError> {
        Ok(None)
    }

    async fn resolve_model(
        &self,
        _workspace_id: &str,
    ) -> Result<Arc<dyn ChatModel>, CausewayError> {
        Ok(self.model.clone())
    }
}
