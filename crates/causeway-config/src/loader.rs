// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the hierarchy `./causeway.toml` > `~/.config/causeway/causeway.toml`
//! > `/etc/causeway/causeway.toml` with environment variable overrides via
//! the `CAUSEWAY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CausewayConfig;

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/causeway/causeway.toml` (system-wide)
/// 3. `~/.config/causeway/causeway.toml` (user XDG config)
/// 4. `./causeway.toml` (local directory)
/// 5. `CAUSEWAY_*` environment variables
pub fn load_config() -> Result<CausewayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CausewayConfig::default()))
        .merge(Toml::file("/etc/causeway/causeway.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("causeway/causeway.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("causeway.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<CausewayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CausewayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CausewayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CausewayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CAUSEWAY_LLM_PLATFORM_API_KEY` must map
/// to `llm.platform_api_key`, not `llm.platform.api.key`.
fn env_provider() -> Env {
    Env::prefixed("CAUSEWAY_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("queue_", "queue.", 1)
            .replacen("worker_", "worker.", 1)
            .replacen("agent_", "agent.", 1)
            .replacen("llm_", "llm.", 1)
            .replacen("guard_", "guard.", 1)
            .replacen("quota_", "quota.", 1)
            .replacen("vault_", "vault.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_any_file() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.agent.max_steps, 10);
        assert_eq!(config.worker.retry_base_backoff_secs, 60);
        assert_eq!(config.quota.default_daily_limit, 10);
        assert!(!config.guard.fail_closed);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [worker]
            max_turn_secs = 300
            concurrency = 8

            [guard]
            fail_closed = true
            "#,
        )
        .unwrap();
        assert_eq!(config.worker.max_turn_secs, 300);
        assert_eq!(config.worker.concurrency, 8);
        assert!(config.guard.fail_closed);
        // Untouched sections keep defaults.
        assert_eq!(config.agent.tool_timeout_secs, 20);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [worker]
            max_turn_seconds = 300
            "#,
        );
        assert!(result.is_err(), "typo'd key must fail fast");
    }

    #[test]
    fn observation_cap_defaults_to_8k() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.agent.max_observation_bytes, 8192);
    }
}
