// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ReAct engine: an explicit Thought → Action → Observation loop.
//!
//! The loop state (conversation history, step counter, deadline, malformed
//! streak) lives in one struct; each iteration is a function of that state
//! and one LLM response. Side effects happen at exactly one seam per
//! iteration -- the [`StepSink`] -- which persists before it publishes.
//!
//! Tool failures are observations and never abort the loop. The loop
//! terminates on a final answer, on a terminal LLM failure, or by forcing a
//! final answer once the step or wall-clock budget is spent.

use std::sync::Arc;
use std::time::Duration;

use causeway_core::{
    CausewayError, ChatCompletion, ChatMessage, ChatModel, ChatRequest, ToolCall,
};
use causeway_tools::ToolRegistry;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::prompt::FORCED_FINAL_DIRECTIVE;
use crate::sink::StepSink;

/// Consecutive malformed responses tolerated before the turn fails.
const MAX_MALFORMED_STREAK: u32 = 3;

/// Grace period for the forced final-answer call once the wall clock is
/// already spent.
const FORCED_FINAL_GRACE: Duration = Duration::from_secs(20);

/// Engine budgets for one turn.
#[derive(Debug, Clone, Copy)]
pub struct EngineBudgets {
    pub max_steps: u32,
    pub wall_time: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for EngineBudgets {
    fn default() -> Self {
        Self {
            max_steps: 10,
            wall_time: Duration::from_secs(120),
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

/// Loop state for one turn.
struct AgentState {
    messages: Vec<ChatMessage>,
    steps: u32,
    deadline: Instant,
    malformed_streak: u32,
}

/// What one LLM response meant.
enum Decision {
    Final(String),
    Action { rationale: String, call: ToolCall },
    Malformed,
}

fn classify(completion: ChatCompletion) -> Decision {
    match (completion.tool_call, completion.content) {
        (Some(call), rationale) => Decision::Action {
            rationale: rationale.unwrap_or_default(),
            call,
        },
        (None, Some(content)) if !content.trim().is_empty() => Decision::Final(content),
        _ => Decision::Malformed,
    }
}

/// Drives the reason/act loop for one turn.
pub struct ReactEngine {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    budgets: EngineBudgets,
}

impl ReactEngine {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>, budgets: EngineBudgets) -> Self {
        Self {
            model,
            tools,
            budgets,
        }
    }

    /// Run the investigation and return the final answer.
    ///
    /// Every observable event goes through `sink` before the loop continues,
    /// so a crash leaves a consistent persisted prefix.
    pub async fn run(
        &self,
        system_prompt: &str,
        user_message: &str,
        sink: &mut dyn StepSink,
    ) -> Result<String, CausewayError> {
        let mut state = AgentState {
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_message),
            ],
            steps: 0,
            deadline: Instant::now() + self.budgets.wall_time,
            malformed_streak: 0,
        };

        loop {
            if state.steps >= self.budgets.max_steps {
                info!(steps = state.steps, "step budget spent, forcing final answer");
                return self.force_final(&mut state).await;
            }
            if Instant::now() >= state.deadline {
                info!("wall clock spent, forcing final answer");
                return self.force_final(&mut state).await;
            }

            let completion = self
                .model
                .complete(ChatRequest {
                    messages: state.messages.clone(),
                    tools: self.tools.specs(),
                    temperature: self.budgets.temperature,
                    max_tokens: self.budgets.max_tokens,
                })
                .await?;

            match classify(completion) {
                Decision::Final(answer) => {
                    debug!(steps = state.steps, "final answer produced");
                    return Ok(answer);
                }
                Decision::Action { rationale, call } => {
                    state.malformed_streak = 0;
                    state.steps += 1;
                    self.act(&mut state, rationale, call, sink).await?;
                }
                Decision::Malformed => {
                    state.malformed_streak += 1;
                    state.steps += 1;
                    warn!(
                        streak = state.malformed_streak,
                        "malformed model response (no content, no tool call)"
                    );
                    if state.malformed_streak >= MAX_MALFORMED_STREAK {
                        return Err(CausewayError::LlmProtocol(format!(
                            "{MAX_MALFORMED_STREAK} consecutive malformed responses"
                        )));
                    }
                    state.messages.push(ChatMessage::user(
                        "Your last response was empty. Either call one of the available tools \
                         or produce the final answer.",
                    ));
                }
            }
        }
    }

    /// Execute one tool call and feed the observation back.
    async fn act(
        &self,
        state: &mut AgentState,
        rationale: String,
        call: ToolCall,
        sink: &mut dyn StepSink,
    ) -> Result<(), CausewayError> {
        if !rationale.trim().is_empty() {
            sink.on_thinking(rationale.trim()).await?;
        }

        let step_id = sink.on_tool_start(&call.name).await?;

        let observation = match self.tools.get(&call.name) {
            Some(tool) => tool.invoke(call.input.clone()).await?,
            None => causeway_tools::ToolOutput::error(format!(
                "unknown tool {:?}; use only the tools listed",
                call.name
            )),
        };

        sink.on_tool_end(step_id, &call.name, !observation.is_error, &observation.content)
            .await?;

        state
            .messages
            .push(ChatMessage::assistant_tool_call(rationale, call.clone()));
        state
            .messages
            .push(ChatMessage::tool_result(call.id, observation.content));
        Ok(())
    }

    /// One last LLM call that must produce the final answer.
    async fn force_final(&self, state: &mut AgentState) -> Result<String, CausewayError> {
        state.messages.push(ChatMessage::user(FORCED_FINAL_DIRECTIVE));

        let remaining = state
            .deadline
            .checked_duration_since(Instant::now())
            .filter(|d| *d > Duration::from_secs(1))
            .unwrap_or(FORCED_FINAL_GRACE);

        let request = ChatRequest {
            messages: state.messages.clone(),
            // No tools: the model cannot stall with another action.
            tools: Vec::new(),
            temperature: self.budgets.temperature,
            max_tokens: self.budgets.max_tokens,
        };

        let completion = tokio::time::timeout(remaining, self.model.complete(request))
            .await
            .map_err(|_| CausewayError::Timeout {
                duration: self.budgets.wall_time,
            })??;

        completion
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                CausewayError::LlmProtocol("forced final answer produced no content".into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{RecordedEvent, RecordingSink};
    use async_trait::async_trait;
    use causeway_tools::{Tool, ToolOutput};
    use std::sync::Mutex;

    /// Model that pops scripted completions in order.
    struct ScriptedModel {
        script: Mutex<Vec<ChatCompletion>>,
    }

    impl ScriptedModel {
        fn new(script: Vec<ChatCompletion>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatCompletion, CausewayError> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Ok(final_answer("fallback final answer"));
            }
            Ok(script.remove(0))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn final_answer(text: &str) -> ChatCompletion {
        ChatCompletion {
            content: Some(text.to_string()),
            tool_call: None,
            usage: None,
        }
    }

    fn action(name: &str, rationale: &str) -> ChatCompletion {
        ChatCompletion {
            content: if rationale.is_empty() {
                None
            } else {
                Some(rationale.to_string())
            },
            tool_call: Some(ToolCall {
                id: format!("call-{name}"),
                name: name.to_string(),
                input: serde_json::json!({"service": "api-gw"}),
            }),
            usage: None,
        }
    }

    fn malformed() -> ChatCompletion {
        ChatCompletion {
            content: None,
            tool_call: None,
            usage: None,
        }
    }

    struct CannedTool {
        name: String,
        output: ToolOutput,
    }

    #[async_trait]
    impl Tool for CannedTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "canned"
        }

        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn invoke(&self, _input: serde_json::Value) -> Result<ToolOutput, CausewayError> {
            Ok(self.output.clone())
        }
    }

    fn tools(entries: &[(&str, ToolOutput)]) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for (name, output) in entries {
            registry.register(Arc::new(CannedTool {
                name: name.to_string(),
                output: output.clone(),
            }));
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn happy_path_emits_ordered_events() {
        let model = ScriptedModel::new(vec![
            action("logs.errors.grafana", "checking recent errors"),
            action("metrics.latency.grafana", ""),
            final_answer("**Root cause**: upstream pool exhausted"),
        ]);
        let registry = tools(&[
            ("logs.errors.grafana", ToolOutput::ok("found 12 errors")),
            ("metrics.latency.grafana", ToolOutput::ok("p99=2.4s")),
        ]);
        let engine = ReactEngine::new(model, registry, EngineBudgets::default());
        let mut sink = RecordingSink::new();

        let answer = engine
            .run("system", "why is api-gw slow?", &mut sink)
            .await
            .unwrap();
        assert!(answer.contains("Root cause"));

        let kinds: Vec<&str> = sink
            .events
            .iter()
            .map(|e| match e {
                RecordedEvent::Status { .. } => "status",
                RecordedEvent::Thinking { .. } => "thinking",
                RecordedEvent::ToolStart { .. } => "tool_start",
                RecordedEvent::ToolEnd { .. } => "tool_end",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["thinking", "tool_start", "tool_end", "tool_start", "tool_end"]
        );

        // tool_end step_id pairs with its tool_start sequence.
        if let RecordedEvent::ToolEnd { step_id, ok, .. } = &sink.events[2] {
            assert_eq!(*step_id, 2);
            assert!(ok);
        } else {
            panic!("expected tool_end at index 2");
        }
    }

    #[tokio::test]
    async fn tool_failure_is_observed_and_loop_recovers() {
        let model = ScriptedModel::new(vec![
            action("logs.errors.grafana", ""),
            action("logs.search.grafana", ""),
            final_answer("answer after recovery"),
        ]);
        let registry = tools(&[
            (
                "logs.errors.grafana",
                ToolOutput::error("upstream unavailable"),
            ),
            ("logs.search.grafana", ToolOutput::ok("found the spike")),
        ]);
        let engine = ReactEngine::new(model, registry, EngineBudgets::default());
        let mut sink = RecordingSink::new();

        let answer = engine.run("system", "q", &mut sink).await.unwrap();
        assert_eq!(answer, "answer after recovery");

        let endings: Vec<bool> = sink
            .events
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::ToolEnd { ok, .. } => Some(*ok),
                _ => None,
            })
            .collect();
        assert_eq!(endings, vec![false, true]);
    }

    #[tokio::test]
    async fn unknown_tool_feeds_error_observation() {
        let model = ScriptedModel::new(vec![
            action("made.up.tool", ""),
            final_answer("done"),
        ]);
        let engine = ReactEngine::new(model, tools(&[]), EngineBudgets::default());
        let mut sink = RecordingSink::new();

        let answer = engine.run("system", "q", &mut sink).await.unwrap();
        assert_eq!(answer, "done");
        match &sink.events[1] {
            RecordedEvent::ToolEnd { ok, content, .. } => {
                assert!(!ok);
                assert!(content.contains("unknown tool"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn three_malformed_responses_fail_the_turn() {
        let model = ScriptedModel::new(vec![malformed(), malformed(), malformed()]);
        let engine = ReactEngine::new(model, tools(&[]), EngineBudgets::default());
        let mut sink = RecordingSink::new();

        let err = engine.run("system", "q", &mut sink).await.unwrap_err();
        assert!(matches!(err, CausewayError::LlmProtocol(_)));
    }

    #[tokio::test]
    async fn malformed_streak_resets_on_valid_action() {
        let model = ScriptedModel::new(vec![
            malformed(),
            malformed(),
            action("logs.errors.grafana", ""),
            malformed(),
            final_answer("ok"),
        ]);
        let registry = tools(&[("logs.errors.grafana", ToolOutput::ok("fine"))]);
        let engine = ReactEngine::new(model, registry, EngineBudgets::default());
        let mut sink = RecordingSink::new();

        let answer = engine.run("system", "q", &mut sink).await.unwrap();
        assert_eq!(answer, "ok");
    }

    #[tokio::test]
    async fn step_budget_forces_final_answer() {
        let script: Vec<ChatCompletion> = (0..4)
            .map(|_| action("logs.errors.grafana", ""))
            .chain(std::iter::once(final_answer("forced summary")))
            .collect();
        let model = ScriptedModel::new(script);
        let registry = tools(&[("logs.errors.grafana", ToolOutput::ok("noise"))]);
        let budgets = EngineBudgets {
            max_steps: 4,
            ..EngineBudgets::default()
        };
        let engine = ReactEngine::new(model, registry, budgets);
        let mut sink = RecordingSink::new();

        let answer = engine.run("system", "q", &mut sink).await.unwrap();
        assert_eq!(answer, "forced summary");
        // Exactly max_steps tool rounds happened.
        let starts = sink
            .events
            .iter()
            .filter(|e| matches!(e, RecordedEvent::ToolStart { .. }))
            .count();
        assert_eq!(starts, 4);
    }

    #[tokio::test]
    async fn forced_final_without_content_is_protocol_failure() {
        let script: Vec<ChatCompletion> = (0..2)
            .map(|_| action("logs.errors.grafana", ""))
            .chain(std::iter::once(malformed()))
            .collect();
        let model = ScriptedModel::new(script);
        let registry = tools(&[("logs.errors.grafana", ToolOutput::ok("x"))]);
        let budgets = EngineBudgets {
            max_steps: 2,
            ..EngineBudgets::default()
        };
        let engine = ReactEngine::new(model, registry, budgets);
        let mut sink = RecordingSink::new();

        let err = engine.run("system", "q", &mut sink).await.unwrap_err();
        assert!(matches!(err, CausewayError::LlmProtocol(_)));
    }
}
