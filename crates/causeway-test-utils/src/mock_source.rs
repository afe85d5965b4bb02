// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock adapter source with canned responses and scriptable failures.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use causeway_core::{
    AdapterSource, Capability, CausewayError, CodeAdapter, CodeMatch, CommitInfo, LogEntry,
    LogsAdapter, MetricPoint, MetricSeries, MetricsAdapter, ProviderKind, RepoInfo, TimeRange,
};

/// Mock adapter source: fixed capabilities, canned data, and an optional
/// list of one-shot failures consumed in order.
pub struct MockAdapterSource {
    capabilities: Vec<(ProviderKind, Capability)>,
    /// Tool-level failures to inject; each entry fails one adapter call.
    /// Shared with every adapter handed out.
    pending_failures: Arc<Mutex<Vec<CausewayError>>>,
    /// Providers marked unhealthy through the source.
    pub unhealthy: Mutex<HashSet<ProviderKind>>,
}

impl MockAdapterSource {
    pub fn new(capabilities: Vec<(ProviderKind, Capability)>) -> Arc<Self> {
        Arc::new(Self {
            capabilities,
            pending_failures: Arc::new(Mutex::new(Vec::new())),
            unhealthy: Mutex::new(HashSet::new()),
        })
    }

    /// A source exposing every Grafana and GitHub capability.
    pub fn full() -> Arc<Self> {
        let mut capabilities = Vec::new();
        for capability in ProviderKind::Grafana.capabilities() {
            capabilities.push((ProviderKind::Grafana, *capability));
        }
        for capability in ProviderKind::Github.capabilities() {
            capabilities.push((ProviderKind::Github, *capability));
        }
        Self::new(capabilities)
    }

    /// Queue a failure consumed by the next adapter call.
    pub fn inject_failure(&self, error: CausewayError) {
        self.pending_failures.lock().unwrap().push(error);
    }

    fn adapter(&self) -> CannedAdapter {
        CannedAdapter {
            failures: self.pending_failures.clone(),
        }
    }
}

#[derive(Debug)]
struct CannedAdapter {
    failures: Arc<Mutex<Vec<CausewayError>>>,
}

impl CannedAdapter {
    fn check(&self) -> Result<(), CausewayError> {
        let mut failures = self.failures.lock().unwrap();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.remove(0))
        }
    }
}

#[async_trait]
impl LogsAdapter for CannedAdapter {
    async fn search(
        &self,
        query: &str,
        _range: &TimeRange,
        _limit: u32,
    ) -> Result<Vec<LogEntry>, CausewayError> {
        self.check()?;
        Ok(vec![LogEntry {
            timestamp: "2026-08-02T10:00:01.000Z".into(),
            level: Some("error".into()),
            service: Some("api-gw".into()),
            message: format!("matched {query:?}: upstream connect timeout"),
        }])
    }

    async fn errors(
        &self,
        service: &str,
        _range: &TimeRange,
    ) -> Result<Vec<LogEntry>, CausewayError> {
        self.check()?;
        Ok(vec![
            LogEntry {
                timestamp: "2026-08-02T10:00:00.000Z".into(),
                level: Some("error".into()),
                service: Some(service.to_string()),
                message: "connection pool exhausted".into(),
            },
            LogEntry {
                timestamp: "2026-08-02T10:00:02.000Z".into(),
                level: Some("error".into()),
                service: Some(service.to_string()),
                message: "upstream 503 from billing".into(),
            },
        ])
    }
}

#[async_trait]
impl MetricsAdapter for CannedAdapter {
    async fn query(
        &self,
        expr: &str,
        _range: &TimeRange,
        _step_secs: u32,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        self.check()?;
        Ok(vec![MetricSeries {
            name: expr.to_string(),
            labels: Vec::new(),
            points: vec![MetricPoint {
                timestamp: 1722600000,
                value: 1.0,
            }],
        }])
    }

    async fn cpu(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        self.query(&format!("cpu:{service}"), range, 60).await
    }

    async fn memory(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        self.query(&format!("memory:{service}"), range, 60).await
    }

    async fn latency(
        &self,
        service: &str,
        _range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        self.check()?;
        Ok(vec![MetricSeries {
            name: format!("p99:{service}"),
            labels: Vec::new(),
            points: vec![
                MetricPoint {
                    timestamp: 1722600000,
                    value: 0.12,
                },
                MetricPoint {
                    timestamp: 1722600060,
                    value: 2.4,
                },
            ],
        }])
    }
}

#[async_trait]
impl CodeAdapter for CannedAdapter {
    async fn list_repos(&self) -> Result<Vec<RepoInfo>, CausewayError> {
        self.check()?;
        Ok(vec![RepoInfo {
            name: "api-gw".into(),
            default_branch: "main".into(),
            description: Some("edge gateway".into()),
        }])
    }

    async fn read_file(
        &self,
        repo: &str,
        path: &str,
        _git_ref: Option<&str>,
    ) -> Result<String, CausewayError> {
        self.check()?;
        Ok(format!("// {repo}/{path}\nfn handle() {{ /* ... */ }}\n"))
    }

    async fn search(
        &self,
        _repo: Option<&str>,
        text: &str,
    ) -> Result<Vec<CodeMatch>, CausewayError> {
        self.check()?;
        Ok(vec![CodeMatch {
            repo: "api-gw".into(),
            path: "src/upstream.rs".into(),
            snippet: format!("let pool = {text};"),
        }])
    }

    async fn list_commits(
        &self,
        _repo: &str,
        _branch: Option<&str>,
        _limit: u32,
    ) -> Result<Vec<CommitInfo>, CausewayError> {
        self.check()?;
        Ok(vec![CommitInfo {
            sha: "da3c6383".into(),
            author: Some("dev".into()),
            message: "reduce upstream pool size".into(),
            committed_at: "2026-08-01T12:00:00Z".into(),
        }])
    }
}

#[async_trait]
impl AdapterSource for MockAdapterSource {
    async fn capabilities(
        &self,
        _workspace_id: &str,
    ) -> Result<Vec<(ProviderKind, Capability)>, CausewayError> {
        let unhealthy = self.unhealthy.lock().unwrap();
        Ok(self
            .capabilities
            .iter()
            .filter(|(provider, _)| !unhealthy.contains(provider))
            .cloned()
            .collect())
    }

    async fn open_logs(
        &self,
        _provider: ProviderKind,
        _workspace_id: &str,
    ) -> Result<Box<dyn LogsAdapter>, CausewayError> {
        Ok(Box::new(self.adapter()))
    }

    async fn open_metrics(
        &self,
        _provider: ProviderKind,
        _workspace_id: &str,
    ) -> Result<Box<dyn MetricsAdapter>, CausewayError> {
        Ok(Box::new(self.adapter()))
    }

    async fn open_code(
        &self,
        _provider: ProviderKind,
        _workspace_id: &str,
    ) -> Result<Box<dyn CodeAdapter>, CausewayError> {
        Ok(Box::new(self.adapter()))
    }

    async fn mark_unhealthy(
        &self,
        provider: ProviderKind,
        _workspace_id: &str,
        _reason: &str,
    ) -> Result<(), CausewayError> {
        self.unhealthy.lock().unwrap().insert(provider);
        Ok(())
    }
}
