// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter seams: logs, metrics, and code hosts.
//!
//! Adapters are thin clients over one external service, constructed by the
//! provider registry with decrypted credentials that live no longer than a
//! single tool invocation. The tool layer never sees credentials and never
//! accepts a workspace id from the model.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CausewayError;

/// A concrete external service an adapter talks to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Grafana,
    Datadog,
    Newrelic,
    Github,
}

/// One capability a provider can expose.
///
/// Tool names are formed as `<capability>.<provider>`, so each capability of
/// each healthy integration shows up as a distinct tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    LogsSearch,
    LogsErrors,
    MetricsQuery,
    MetricsCpu,
    MetricsMemory,
    MetricsLatency,
    CodeRead,
    CodeSearch,
    CodeListCommits,
    CodeListRepos,
}

impl Capability {
    /// Dotted capability name used in tool identifiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LogsSearch => "logs.search",
            Self::LogsErrors => "logs.errors",
            Self::MetricsQuery => "metrics.query",
            Self::MetricsCpu => "metrics.cpu",
            Self::MetricsMemory => "metrics.memory",
            Self::MetricsLatency => "metrics.latency",
            Self::CodeRead => "code.read",
            Self::CodeSearch => "code.search",
            Self::CodeListCommits => "code.list_commits",
            Self::CodeListRepos => "code.list_repos",
        }
    }

    /// The adapter family a capability is served by.
    pub fn family(&self) -> CapabilityFamily {
        match self {
            Self::LogsSearch | Self::LogsErrors => CapabilityFamily::Logs,
            Self::MetricsQuery
            | Self::MetricsCpu
            | Self::MetricsMemory
            | Self::MetricsLatency => CapabilityFamily::Metrics,
            Self::CodeRead | Self::CodeSearch | Self::CodeListCommits | Self::CodeListRepos => {
                CapabilityFamily::Code
            }
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Groups of capabilities served by the same adapter trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityFamily {
    Logs,
    Metrics,
    Code,
}

impl ProviderKind {
    /// The capabilities a healthy integration of this kind contributes.
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Self::Grafana | Self::Datadog | Self::Newrelic => &[
                Capability::LogsSearch,
                Capability::LogsErrors,
                Capability::MetricsQuery,
                Capability::MetricsCpu,
                Capability::MetricsMemory,
                Capability::MetricsLatency,
            ],
            Self::Github => &[
                Capability::CodeRead,
                Capability::CodeSearch,
                Capability::CodeListCommits,
                Capability::CodeListRepos,
            ],
        }
    }
}

/// Half-open UTC time window for log and metric queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// The window ending now and starting `hours` ago.
    pub fn last_hours(hours: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::hours(hours),
            end,
        }
    }
}

/// One log line from a log store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: Option<String>,
    pub service: Option<String>,
    pub message: String,
}

/// One sample of a metric series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Unix seconds.
    pub timestamp: i64,
    pub value: f64,
}

/// One labelled series from a metric store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSeries {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub points: Vec<MetricPoint>,
}

/// Repository metadata from a code host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub default_branch: String,
    pub description: Option<String>,
}

/// One commit from a code host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub author: Option<String>,
    pub message: String,
    pub committed_at: String,
}

/// One code-search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeMatch {
    pub repo: String,
    pub path: String,
    pub snippet: String,
}

/// Log-store adapter.
#[async_trait]
pub trait LogsAdapter: Send + Sync + std::fmt::Debug {
    async fn search(
        &self,
        query: &str,
        range: &TimeRange,
        limit: u32,
    ) -> Result<Vec<LogEntry>, CausewayError>;

    /// Error-level entries for one service in the window.
    async fn errors(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<LogEntry>, CausewayError>;
}

/// Metric-store adapter.
#[async_trait]
pub trait MetricsAdapter: Send + Sync {
    /// Free-form query in the provider's native language (PromQL or
    /// equivalent).
    async fn query(
        &self,
        expr: &str,
        range: &TimeRange,
        step_secs: u32,
    ) -> Result<Vec<MetricSeries>, CausewayError>;

    async fn cpu(&self, service: &str, range: &TimeRange)
    -> Result<Vec<MetricSeries>, CausewayError>;

    async fn memory(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError>;

    async fn latency(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError>;
}

/// Code-host adapter.
#[async_trait]
pub trait CodeAdapter: Send + Sync {
    async fn list_repos(&self) -> Result<Vec<RepoInfo>, CausewayError>;

    async fn read_file(
        &self,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, CausewayError>;

    async fn search(
        &self,
        repo: Option<&str>,
        text: &str,
    ) -> Result<Vec<CodeMatch>, CausewayError>;

    async fn list_commits(
        &self,
        repo: &str,
        branch: Option<&str>,
        limit: u32,
    ) -> Result<Vec<CommitInfo>, CausewayError>;
}

/// Source of per-workspace adapters.
///
/// The production implementation is the provider registry; tests substitute
/// canned adapters. Workspace isolation is enforced here: adapters are bound
/// to one workspace at open time.
#[async_trait]
pub trait AdapterSource: Send + Sync {
    /// Every `(provider, capability)` pair available to the workspace,
    /// excluding unhealthy integrations.
    async fn capabilities(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<(ProviderKind, Capability)>, CausewayError>;

    async fn open_logs(
        &self,
        provider: ProviderKind,
        workspace_id: &str,
    ) -> Result<Box<dyn LogsAdapter>, CausewayError>;

    async fn open_metrics(
        &self,
        provider: ProviderKind,
        workspace_id: &str,
    ) -> Result<Box<dyn MetricsAdapter>, CausewayError>;

    async fn open_code(
        &self,
        provider: ProviderKind,
        workspace_id: &str,
    ) -> Result<Box<dyn CodeAdapter>, CausewayError>;

    /// Record a credential rejection so the integration stops contributing
    /// tools until it passes a health check again.
    async fn mark_unhealthy(
        &self,
        provider: ProviderKind,
        workspace_id: &str,
        reason: &str,
    ) -> Result<(), CausewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_names_are_dotted() {
        assert_eq!(Capability::LogsSearch.as_str(), "logs.search");
        assert_eq!(Capability::CodeListCommits.as_str(), "code.list_commits");
    }

    #[test]
    fn provider_capability_map_matches_families() {
        for cap in ProviderKind::Github.capabilities() {
            assert_eq!(cap.family(), CapabilityFamily::Code);
        }
        for cap in ProviderKind::Grafana.capabilities() {
            assert_ne!(cap.family(), CapabilityFamily::Code);
        }
    }

    #[test]
    fn time_range_last_hours_is_ordered() {
        let range = TimeRange::last_hours(2);
        assert!(range.start < range.end);
        assert_eq!((range.end - range.start).num_hours(), 2);
    }

    #[test]
    fn provider_kind_parses_lowercase() {
        use std::str::FromStr;
        assert_eq!(ProviderKind::from_str("newrelic").unwrap(), ProviderKind::Newrelic);
        assert_eq!(ProviderKind::Grafana.to_string(), "grafana");
    }
}
