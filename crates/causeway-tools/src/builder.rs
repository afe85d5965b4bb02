// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-workspace tool set construction.
//!
//! One tool per `(provider, capability)` the registry reports. A workspace
//! with both Grafana and Datadog gets `logs.search.grafana` and
//! `logs.search.datadog` as distinct tools and the agent chooses. A
//! workspace with no provider for a capability simply has no such tool.

use std::sync::Arc;

use causeway_core::{AdapterSource, CapabilityFamily, CausewayError};

use crate::provider_tools::{CodeTool, LogsTool, MetricsTool, ToolBudgets};
use crate::tool::{Tool, ToolRegistry};

/// Build the tool set for one workspace from its available capabilities.
pub async fn build_toolset(
    source: Arc<dyn AdapterSource>,
    workspace_id: &str,
    budgets: ToolBudgets,
) -> Result<ToolRegistry, CausewayError> {
    let mut registry = ToolRegistry::new();
    for (provider, capability) in source.capabilities(workspace_id).await? {
        let tool: Arc<dyn Tool> = match capability.family() {
            CapabilityFamily::Logs => Arc::new(LogsTool::new(
                source.clone(),
                workspace_id,
                provider,
                capability,
                budgets,
            )),
            CapabilityFamily::Metrics => Arc::new(MetricsTool::new(
                source.clone(),
                workspace_id,
                provider,
                capability,
                budgets,
            )),
            CapabilityFamily::Code => Arc::new(CodeTool::new(
                source.clone(),
                workspace_id,
                provider,
                capability,
                budgets,
            )),
        };
        registry.register(tool);
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use causeway_core::{
        Capability, CodeAdapter, LogEntry, LogsAdapter, MetricsAdapter, ProviderKind, TimeRange,
    };

    struct StaticSource {
        capabilities: Vec<(ProviderKind, Capability)>,
    }

    #[derive(Debug)]
    struct CannedLogs;

    #[async_trait]
    impl LogsAdapter for CannedLogs {
        async fn search(
            &self,
            _query: &str,
            _range: &TimeRange,
            _limit: u32,
        ) -> Result<Vec<LogEntry>, CausewayError> {
            Ok(vec![LogEntry {
                timestamp: "2026-08-02T10:00:00.000Z".into(),
                level: Some("error".into()),
                service: Some("api-gw".into()),
                message: "upstream timeout".into(),
            }])
        }

        async fn errors(
            &self,
            _service: &str,
            _range: &TimeRange,
        ) -> Result<Vec<LogEntry>, CausewayError> {
            self.search("", &TimeRange::last_hours(1), 10).await
        }
    }

    #[async_trait]
    impl AdapterSource for StaticSource {
        async fn capabilities(
            &self,
            _workspace_id: &str,
        ) -> Result<Vec<(ProviderKind, Capability)>, CausewayError> {
            Ok(self.capabilities.clone())
        }

        async fn open_logs(
            &self,
            _provider: ProviderKind,
            _workspace_id: &str,
        ) -> Result<Box<dyn LogsAdapter>, CausewayError> {
            Ok(Box::new(CannedLogs))
        }

        async fn open_metrics(
            &self,
            _provider: ProviderKind,
            _workspace_id: &str,
        ) -> Result<Box<dyn MetricsAdapter>, CausewayError> {
            Err(CausewayError::Provider {
                message: "upstream unavailable".into(),
                source: None,
            })
        }

        async fn open_code(
            &self,
            _provider: ProviderKind,
            _workspace_id: &str,
        ) -> Result<Box<dyn CodeAdapter>, CausewayError> {
            Err(CausewayError::Provider {
                message: "upstream unavailable".into(),
                source: None,
            })
        }

        async fn mark_unhealthy(
            &self,
            _provider: ProviderKind,
            _workspace_id: &str,
            _reason: &str,
        ) -> Result<(), CausewayError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn builds_one_tool_per_provider_capability_pair() {
        let source = Arc::new(StaticSource {
            capabilities: vec![
                (ProviderKind::Grafana, Capability::LogsSearch),
                (ProviderKind::Datadog, Capability::LogsSearch),
                (ProviderKind::Github, Capability::CodeListRepos),
            ],
        });
        let registry = build_toolset(source, "w-1", ToolBudgets::default())
            .await
            .unwrap();

        assert_eq!(registry.len(), 3);
        assert!(registry.get("logs.search.grafana").is_some());
        assert!(registry.get("logs.search.datadog").is_some());
        assert!(registry.get("code.list_repos.github").is_some());
    }

    #[tokio::test]
    async fn empty_capabilities_give_empty_toolset() {
        let source = Arc::new(StaticSource {
            capabilities: Vec::new(),
        });
        let registry = build_toolset(source, "w-1", ToolBudgets::default())
            .await
            .unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn tool_invocation_formats_logs() {
        let source = Arc::new(StaticSource {
            capabilities: vec![(ProviderKind::Grafana, Capability::LogsErrors)],
        });
        let registry = build_toolset(source, "w-1", ToolBudgets::default())
            .await
            .unwrap();

        let tool = registry.get("logs.errors.grafana").unwrap();
        let output = tool
            .invoke(serde_json::json!({"service": "api-gw"}))
            .await
            .unwrap();
        assert!(!output.is_error);
        assert!(output.content.contains("upstream timeout"));
    }

    #[tokio::test]
    async fn adapter_failure_becomes_error_observation() {
        let source = Arc::new(StaticSource {
            capabilities: vec![(ProviderKind::Grafana, Capability::MetricsCpu)],
        });
        let registry = build_toolset(source, "w-1", ToolBudgets::default())
            .await
            .unwrap();

        let tool = registry.get("metrics.cpu.grafana").unwrap();
        let output = tool
            .invoke(serde_json::json!({"service": "api-gw"}))
            .await
            .unwrap();
        assert!(output.is_error);
        assert!(output.content.starts_with("ERROR:"));
    }

    #[tokio::test]
    async fn missing_required_argument_is_an_observation() {
        let source = Arc::new(StaticSource {
            capabilities: vec![(ProviderKind::Grafana, Capability::LogsSearch)],
        });
        let registry = build_toolset(source, "w-1", ToolBudgets::default())
            .await
            .unwrap();

        let tool = registry.get("logs.search.grafana").unwrap();
        let output = tool.invoke(serde_json::json!({})).await.unwrap();
        assert!(output.is_error);
        assert!(output.content.starts_with("ERROR: invalid arguments"));
    }
}
