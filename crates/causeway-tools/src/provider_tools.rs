// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools wrapping provider adapters.
//!
//! One tool per `(capability, provider)` pair, named
//! `<capability>.<provider>`. The adapter is opened through the registry at
//! invocation time and dropped with the call, so decrypted credentials never
//! outlive one invocation. Every failure mode becomes an `ERROR:`
//! observation: timeouts, upstream errors, and invalid arguments all flow
//! back to the model instead of aborting the loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use causeway_core::{
    AdapterSource, Capability, CausewayError, ProviderKind, TimeRange,
};
use serde::Deserialize;
use tracing::warn;

use crate::observe::{
    bound_observation, format_commits, format_logs, format_matches, format_repos, format_series,
};
use crate::tool::{Tool, ToolOutput};

/// Per-call budgets shared by all provider tools.
#[derive(Debug, Clone, Copy)]
pub struct ToolBudgets {
    pub timeout: Duration,
    pub max_observation_bytes: usize,
}

impl Default for ToolBudgets {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            max_observation_bytes: 8 * 1024,
        }
    }
}

/// Everything a provider tool needs to run one call.
struct ToolContext {
    source: Arc<dyn AdapterSource>,
    workspace_id: String,
    provider: ProviderKind,
    capability: Capability,
    budgets: ToolBudgets,
    name: String,
    description: String,
}

impl ToolContext {
    fn new(
        source: Arc<dyn AdapterSource>,
        workspace_id: &str,
        provider: ProviderKind,
        capability: Capability,
        budgets: ToolBudgets,
    ) -> Self {
        Self {
            source,
            workspace_id: workspace_id.to_string(),
            provider,
            capability,
            budgets,
            name: format!("{}.{provider}", capability.as_str()),
            description: describe(capability, provider),
        }
    }

    /// Run the adapter call under the per-call deadline and fold every
    /// failure into an observation.
    async fn run<F>(&self, call: F) -> ToolOutput
    where
        F: Future<Output = Result<String, CausewayError>>,
    {
        match tokio::time::timeout(self.budgets.timeout, call).await {
            Err(_) => ToolOutput::error(format!(
                "timeout after {}s",
                self.budgets.timeout.as_secs()
            )),
            Ok(Err(e)) => self.observation_for(e).await,
            Ok(Ok(text)) => {
                ToolOutput::ok(bound_observation(&text, self.budgets.max_observation_bytes))
            }
        }
    }

    async fn observation_for(&self, error: CausewayError) -> ToolOutput {
        if let CausewayError::ProviderUnauthorized { .. } = &error {
            if let Err(e) = self
                .source
                .mark_unhealthy(self.provider, &self.workspace_id, &error.to_string())
                .await
            {
                warn!(error = %e, tool = %self.name, "failed to mark integration unhealthy");
            }
            return ToolOutput::error(format!(
                "{} rejected our credentials; the integration was disabled pending a health check",
                self.provider
            ));
        }
        warn!(tool = %self.name, error = %error, "tool call failed");
        ToolOutput::error(one_line(&error.to_string()))
    }
}

fn one_line(text: &str) -> String {
    text.lines().next().unwrap_or("upstream unavailable").to_string()
}

fn parse_input<T: serde::de::DeserializeOwned>(
    input: serde_json::Value,
) -> Result<T, ToolOutput> {
    serde_json::from_value(input)
        .map_err(|e| ToolOutput::error(format!("invalid arguments: {e}")))
}

fn default_hours() -> i64 {
    1
}

fn default_limit() -> u32 {
    50
}

fn default_step() -> u32 {
    60
}

fn default_commit_limit() -> u32 {
    20
}

fn describe(capability: Capability, provider: ProviderKind) -> String {
    match capability {
        Capability::LogsSearch => format!(
            "Search raw log lines in {provider} for a text fragment within a recent time \
             window. Use this to find specific error messages, request ids, or stack traces."
        ),
        Capability::LogsErrors => format!(
            "Fetch recent error-level log entries for one service from {provider}. Start here \
             when a service is reported broken or slow."
        ),
        Capability::MetricsQuery => format!(
            "Run a free-form metrics query against {provider} in its native query language \
             over a recent time window. Use when the canned cpu/memory/latency tools are not \
             specific enough."
        ),
        Capability::MetricsCpu => format!(
            "Fetch CPU usage for one service from {provider} over a recent time window."
        ),
        Capability::MetricsMemory => format!(
            "Fetch memory usage for one service from {provider} over a recent time window."
        ),
        Capability::MetricsLatency => format!(
            "Fetch p99 request latency for one service from {provider} over a recent time \
             window."
        ),
        Capability::CodeRead => format!(
            "Read one file from a repository via {provider}. Pass a commit SHA as ref to read \
             the code actually deployed."
        ),
        Capability::CodeSearch => format!(
            "Search code across the workspace's repositories via {provider} for a text \
             fragment, such as an endpoint path or error string."
        ),
        Capability::CodeListCommits => format!(
            "List recent commits of a repository via {provider}. Useful for correlating an \
             incident start time with a deploy."
        ),
        Capability::CodeListRepos => {
            format!("List the repositories available in the workspace via {provider}.")
        }
    }
}

fn schema_for(capability: Capability) -> serde_json::Value {
    match capability {
        Capability::LogsSearch => serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Text fragment to search for"},
                "hours": {"type": "integer", "description": "Window size in hours, default 1"},
                "limit": {"type": "integer", "description": "Max entries, default 50"}
            },
            "required": ["query"]
        }),
        Capability::LogsErrors => serde_json::json!({
            "type": "object",
            "properties": {
                "service": {"type": "string", "description": "Service name"},
                "hours": {"type": "integer", "description": "Window size in hours, default 1"}
            },
            "required": ["service"]
        }),
        Capability::MetricsQuery => serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Provider-native metrics query"},
                "hours": {"type": "integer", "description": "Window size in hours, default 1"},
                "step_secs": {"type": "integer", "description": "Resolution in seconds, default 60"}
            },
            "required": ["query"]
        }),
        Capability::MetricsCpu | Capability::MetricsMemory | Capability::MetricsLatency => {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "service": {"type": "string", "description": "Service name"},
                    "hours": {"type": "integer", "description": "Window size in hours, default 1"}
                },
                "required": ["service"]
            })
        }
        Capability::CodeRead => serde_json::json!({
            "type": "object",
            "properties": {
                "repo": {"type": "string", "description": "Repository name"},
                "path": {"type": "string", "description": "File path within the repository"},
                "ref": {"type": "string", "description": "Branch or commit SHA, default the default branch"}
            },
            "required": ["repo", "path"]
        }),
        Capability::CodeSearch => serde_json::json!({
            "type": "object",
            "properties": {
                "text": {"type": "string", "description": "Text fragment to search for"},
                "repo": {"type": "string", "description": "Restrict to one repository"}
            },
            "required": ["text"]
        }),
        Capability::CodeListCommits => serde_json::json!({
            "type": "object",
            "properties": {
                "repo": {"type": "string", "description": "Repository name"},
                "branch": {"type": "string", "description": "Branch, default the default branch"},
                "limit": {"type": "integer", "description": "Max commits, default 20"}
            },
            "required": ["repo"]
        }),
        Capability::CodeListRepos => serde_json::json!({
            "type": "object",
            "properties": {}
        }),
    }
}

// --- Input types ---

#[derive(Debug, Deserialize)]
struct LogsSearchInput {
    query: String,
    #[serde(default = "default_hours")]
    hours: i64,
    #[serde(default = "default_limit")]
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct ServiceWindowInput {
    service: String,
    #[serde(default = "default_hours")]
    hours: i64,
}

#[derive(Debug, Deserialize)]
struct MetricsQueryInput {
    query: String,
    #[serde(default = "default_hours")]
    hours: i64,
    #[serde(default = "default_step")]
    step_secs: u32,
}

#[derive(Debug, Deserialize)]
struct CodeReadInput {
    repo: String,
    path: String,
    #[serde(default, rename = "ref")]
    git_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CodeSearchInput {
    text: String,
    #[serde(default)]
    repo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CodeCommitsInput {
    repo: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default = "default_commit_limit")]
    limit: u32,
}

fn window(hours: i64) -> TimeRange {
    TimeRange::last_hours(hours.clamp(1, 72))
}

// --- Log tools ---

/// `logs.search.*` and `logs.errors.*`.
pub struct LogsTool {
    ctx: ToolContext,
}

impl LogsTool {
    pub fn new(
        source: Arc<dyn AdapterSource>,
        workspace_id: &str,
        provider: ProviderKind,
        capability: Capability,
        budgets: ToolBudgets,
    ) -> Self {
        Self {
            ctx: ToolContext::new(source, workspace_id, provider, capability, budgets),
        }
    }
}

#[async_trait]
impl Tool for LogsTool {
    fn name(&self) -> &str {
        &self.ctx.name
    }

    fn description(&self) -> &str {
        &self.ctx.description
    }

    fn input_schema(&self) -> serde_json::Value {
        schema_for(self.ctx.capability)
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, CausewayError> {
        let ctx = &self.ctx;
        let output = match ctx.capability {
            Capability::LogsSearch => {
                let input: LogsSearchInput = match parse_input(input) {
                    Ok(input) => input,
                    Err(output) => return Ok(output),
                };
                ctx.run(async {
                    let adapter = ctx.source.open_logs(ctx.provider, &ctx.workspace_id).await?;
                    let entries = adapter
                        .search(&input.query, &window(input.hours), input.limit.clamp(1, 500))
                        .await?;
                    Ok(format_logs(&entries))
                })
                .await
            }
            Capability::LogsErrors => {
                let input: ServiceWindowInput = match parse_input(input) {
                    Ok(input) => input,
                    Err(output) => return Ok(output),
                };
                ctx.run(async {
                    let adapter = ctx.source.open_logs(ctx.provider, &ctx.workspace_id).await?;
                    let entries = adapter.errors(&input.service, &window(input.hours)).await?;
                    Ok(format_logs(&entries))
                })
                .await
            }
            other => ToolOutput::error(format!("capability {other} is not a logs tool")),
        };
        Ok(output)
    }
}

// --- Metric tools ---

/// `metrics.query.*`, `metrics.cpu.*`, `metrics.memory.*`, `metrics.latency.*`.
pub struct MetricsTool {
    ctx: ToolContext,
}

impl MetricsTool {
    pub fn new(
        source: Arc<dyn AdapterSource>,
        workspace_id: &str,
        provider: ProviderKind,
        capability: Capability,
        budgets: ToolBudgets,
    ) -> Self {
        Self {
            ctx: ToolContext::new(source, workspace_id, provider, capability, budgets),
        }
    }
}

#[async_trait]
impl Tool for MetricsTool {
    fn name(&self) -> &str {
        &self.ctx.name
    }

    fn description(&self) -> &str {
        &self.ctx.description
    }

    fn input_schema(&self) -> serde_json::Value {
        schema_for(self.ctx.capability)
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, CausewayError> {
        let ctx = &self.ctx;
        let output = match ctx.capability {
            Capability::MetricsQuery => {
                let input: MetricsQueryInput = match parse_input(input) {
                    Ok(input) => input,
                    Err(output) => return Ok(output),
                };
                ctx.run(async {
                    let adapter = ctx
                        .source
                        .open_metrics(ctx.provider, &ctx.workspace_id)
                        .await?;
                    let series = adapter
                        .query(&input.query, &window(input.hours), input.step_secs.max(1))
                        .await?;
                    Ok(format_series(&series))
                })
                .await
            }
            Capability::MetricsCpu | Capability::MetricsMemory | Capability::MetricsLatency => {
                let input: ServiceWindowInput = match parse_input(input) {
                    Ok(input) => input,
                    Err(output) => return Ok(output),
                };
                let capability = ctx.capability;
                ctx.run(async {
                    let adapter = ctx
                        .source
                        .open_metrics(ctx.provider, &ctx.workspace_id)
                        .await?;
                    let range = window(input.hours);
                    let series = match capability {
                        Capability::MetricsCpu => adapter.cpu(&input.service, &range).await?,
                        Capability::MetricsMemory => {
                            adapter.memory(&input.service, &range).await?
                        }
                        _ => adapter.latency(&input.service, &range).await?,
                    };
                    Ok(format_series(&series))
                })
                .await
            }
            other => ToolOutput::error(format!("capability {other} is not a metrics tool")),
        };
        Ok(output)
    }
}

// --- Code tools ---

/// `code.read.*`, `code.search.*`, `code.list_commits.*`, `code.list_repos.*`.
pub struct CodeTool {
    ctx: ToolContext,
}

impl CodeTool {
    pub fn new(
        source: Arc<dyn AdapterSource>,
        workspace_id: &str,
        provider: ProviderKind,
        capability: Capability,
        budgets: ToolBudgets,
    ) -> Self {
        Self {
            ctx: ToolContext::new(source, workspace_id, provider, capability, budgets),
        }
    }
}

#[async_trait]
impl Tool for CodeTool {
    fn name(&self) -> &str {
        &self.ctx.name
    }

    fn description(&self) -> &str {
        &self.ctx.description
    }

    fn input_schema(&self) -> serde_json::Value {
        schema_for(self.ctx.capability)
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, CausewayError> {
        let ctx = &self.ctx;
        let output = match ctx.capability {
            Capability::CodeRead => {
                let input: CodeReadInput = match parse_input(input) {
                    Ok(input) => input,
                    Err(output) => return Ok(output),
                };
                ctx.run(async {
                    let adapter = ctx.source.open_code(ctx.provider, &ctx.workspace_id).await?;
                    adapter
                        .read_file(&input.repo, &input.path, input.git_ref.as_deref())
                        .await
                })
                .await
            }
            Capability::CodeSearch => {
                let input: CodeSearchInput = match parse_input(input) {
                    Ok(input) => input,
                    Err(output) => return Ok(output),
                };
                ctx.run(async {
                    let adapter = ctx.source.open_code(ctx.provider, &ctx.workspace_id).await?;
                    let matches = adapter.search(input.repo.as_deref(), &input.text).await?;
                    Ok(format_matches(&matches))
                })
                .await
            }
            Capability::CodeListCommits => {
                let input: CodeCommitsInput = match parse_input(input) {
                    Ok(input) => input,
                    Err(output) => return Ok(output),
                };
                ctx.run(async {
                    let adapter = ctx.source.open_code(ctx.provider, &ctx.workspace_id).await?;
                    let commits = adapter
                        .list_commits(
                            &input.repo,
                            input.branch.as_deref(),
                            input.limit.clamp(1, 100),
                        )
                        .await?;
                    Ok(format_commits(&commits))
                })
                .await
            }
            Capability::CodeListRepos => {
                ctx.run(async {
                    let adapter = ctx.source.open_code(ctx.provider, &ctx.workspace_id).await?;
                    let repos = adapter.list_repos().await?;
                    Ok(format_repos(&repos))
                })
                .await
            }
            other => ToolOutput::error(format!("capability {other} is not a code tool")),
        };
        Ok(output)
    }
}
