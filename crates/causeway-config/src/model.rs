// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Causeway platform.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Every section is optional and defaults to
//! sensible values; secrets normally arrive via `CAUSEWAY_*` environment
//! variables rather than files on disk.

use serde::{Deserialize, Serialize};

/// Top-level Causeway configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CausewayConfig {
    /// HTTP API server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Job queue transport settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Orchestrator worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// ReAct engine budgets.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Platform LLM settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Prompt-injection guard settings.
    #[serde(default)]
    pub guard: GuardConfig,

    /// Quota gate settings.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Credential vault settings.
    #[serde(default)]
    pub vault: VaultConfig,
}

/// HTTP API server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the API server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Static bearer token accepted by the API. `None` delegates entirely to
    /// the external identity provider.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "causeway.db".to_string()
}

/// Queue transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Default visibility timeout for claimed messages, in seconds. Must be
    /// at least the worker's `max_turn_secs`.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Maximum per-message send delay, in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Queue depth beyond which admission is refused with a capacity error.
    #[serde(default = "default_depth_limit")]
    pub depth_limit: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_delay_secs: default_max_delay_secs(),
            depth_limit: default_depth_limit(),
        }
    }
}

fn default_visibility_timeout_secs() -> u64 {
    180
}

fn default_max_delay_secs() -> u64 {
    900
}

fn default_depth_limit() -> u64 {
    500
}

/// Orchestrator worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of concurrent worker tasks in one process.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Wall-clock bound for one turn execution, in seconds.
    #[serde(default = "default_max_turn_secs")]
    pub max_turn_secs: u64,

    /// Interval between reconciler sweeps for stale jobs, in seconds.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// Base of the retry backoff (`base * 2^retries` seconds).
    #[serde(default = "default_retry_base_backoff_secs")]
    pub retry_base_backoff_secs: u64,

    /// Maximum retries before a job fails permanently.
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_turn_secs: default_max_turn_secs(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            retry_base_backoff_secs: default_retry_base_backoff_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_max_turn_secs() -> u64 {
    120
}

fn default_reconcile_interval_secs() -> u64 {
    60
}

fn default_retry_base_backoff_secs() -> u64 {
    60
}

fn default_max_retries() -> i32 {
    3
}

/// ReAct engine budgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Maximum reason/act iterations before forcing a final answer.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Per-tool-call deadline, in seconds.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Observation size cap fed back to the model, in bytes.
    #[serde(default = "default_max_observation_bytes")]
    pub max_observation_bytes: usize,

    /// Sampling temperature for investigation calls.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Response token cap per LLM call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_observation_bytes: default_max_observation_bytes(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_steps() -> u32 {
    10
}

fn default_tool_timeout_secs() -> u64 {
    20
}

fn default_max_observation_bytes() -> usize {
    8 * 1024
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    4096
}

/// Platform LLM configuration (used when a workspace has no BYO config).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL for the platform model.
    #[serde(default = "default_platform_base_url")]
    pub platform_base_url: String,

    /// Platform model identifier.
    #[serde(default = "default_platform_model")]
    pub platform_model: String,

    /// Platform API key. `None` requires the environment variable.
    #[serde(default)]
    pub platform_api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            platform_base_url: default_platform_base_url(),
            platform_model: default_platform_model(),
            platform_api_key: None,
        }
    }
}

fn default_platform_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_platform_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Prompt-injection guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Disable to skip classification entirely (high-trust deployments).
    #[serde(default = "default_guard_enabled")]
    pub enabled: bool,

    /// When the guard itself is unavailable: reject (`true`) or admit with a
    /// logged security event (`false`, the default).
    #[serde(default)]
    pub fail_closed: bool,

    /// Characters of the user message retained in security events.
    #[serde(default = "default_guard_prefix_chars")]
    pub max_prefix_chars: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: default_guard_enabled(),
            fail_closed: false,
            max_prefix_chars: default_guard_prefix_chars(),
        }
    }
}

fn default_guard_enabled() -> bool {
    true
}

fn default_guard_prefix_chars() -> usize {
    300
}

/// Quota gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Daily RCA admissions for workspaces without a plan record.
    #[serde(default = "default_daily_limit")]
    pub default_daily_limit: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_daily_limit: default_daily_limit(),
        }
    }
}

fn default_daily_limit() -> i64 {
    10
}

/// Credential vault configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Base64-encoded 32-byte master key. Normally supplied via
    /// `CAUSEWAY_VAULT_MASTER_KEY`.
    #[serde(default)]
    pub master_key: Option<String>,
}
