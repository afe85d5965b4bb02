// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait and registry.
//!
//! The [`Tool`] trait is the uniform interface the ReAct engine calls: a
//! stable name, a one-paragraph description for the model, a JSON Schema for
//! inputs, and an async `invoke`. Tool failures are data, not errors: invoke
//! returns an observation with `is_error` set and the loop continues. Only
//! infrastructure-level problems (the registry itself failing) surface as
//! `Err`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use causeway_core::{CausewayError, ToolSpec};
use serde::{Deserialize, Serialize};

/// Output from a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Human-readable observation fed back to the model.
    pub content: String,
    /// Whether the invocation failed (content starts with `ERROR:`).
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            content: format!("ERROR: {}", reason.into()),
            is_error: true,
        }
    }
}

/// Uniform interface for all agent tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable identifier presented to the LLM (`<capability>.<provider>`).
    fn name(&self) -> &str;

    /// One paragraph telling the LLM when to use this tool.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input object.
    fn input_schema(&self) -> serde_json::Value;

    /// Invoke with parsed JSON input. The workspace is bound at construction
    /// time, never taken from the model.
    async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, CausewayError>;
}

/// Registry of available tools, indexed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its `name()`.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// The tool manifest for the LLM, sorted by name for stable prompts.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the input back"
        }

        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "Message to echo"}
                },
                "required": ["message"]
            })
        }

        async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, CausewayError> {
            match input["message"].as_str() {
                Some(message) => Ok(ToolOutput::ok(message)),
                None => Ok(ToolOutput::error("invalid arguments: message is required")),
            }
        }
    }

    #[test]
    fn registry_registers_and_retrieves() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn specs_are_sorted_and_carry_schema() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");
        assert_eq!(specs[0].input_schema["type"], "object");
    }

    #[tokio::test]
    async fn invoke_maps_bad_input_to_error_observation() {
        let tool = EchoTool;
        let output = tool.invoke(serde_json::json!({})).await.unwrap();
        assert!(output.is_error);
        assert!(output.content.starts_with("ERROR: invalid arguments"));
    }
}
