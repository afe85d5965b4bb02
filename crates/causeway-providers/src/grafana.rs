// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Grafana adapter: Loki for logs, Prometheus for metrics, both through the
//! Grafana datasource proxy so one API token covers everything.

use async_trait::async_trait;
use causeway_core::{
    CausewayError, LogEntry, LogsAdapter, MetricPoint, MetricSeries, MetricsAdapter, ProviderKind,
    TimeRange,
};
use serde::Deserialize;

use crate::http::{build_client, check_status, read_json, request_error};

const PROVIDER: ProviderKind = ProviderKind::Grafana;

/// Decrypted Grafana credential payload.
#[derive(Debug, Clone, Deserialize)]
pub struct GrafanaCredentials {
    pub base_url: String,
    pub api_token: String,
    #[serde(default = "default_loki_uid")]
    pub loki_datasource_uid: String,
    #[serde(default = "default_prometheus_uid")]
    pub prometheus_datasource_uid: String,
}

fn default_loki_uid() -> String {
    "loki".to_string()
}

fn default_prometheus_uid() -> String {
    "prometheus".to_string()
}

#[derive(Debug)]
pub struct GrafanaAdapter {
    client: reqwest::Client,
    credentials: GrafanaCredentials,
}

impl GrafanaAdapter {
    pub fn new(credentials: GrafanaCredentials) -> Result<Self, CausewayError> {
        Ok(Self {
            client: build_client()?,
            credentials,
        })
    }

    fn proxy_url(&self, datasource_uid: &str, tail: &str) -> String {
        format!(
            "{}/api/datasources/proxy/uid/{datasource_uid}/{tail}",
            self.credentials.base_url.trim_end_matches('/')
        )
    }

    async fn loki_query(
        &self,
        logql: &str,
        range: &TimeRange,
        limit: u32,
    ) -> Result<Vec<LogEntry>, CausewayError> {
        let url = self.proxy_url(&self.credentials.loki_datasource_uid, "loki/api/v1/query_range");
        let start_ns = range.start.timestamp_nanos_opt().unwrap_or(0).to_string();
        let end_ns = range.end.timestamp_nanos_opt().unwrap_or(0).to_string();
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.credentials.api_token)
            .query(&[
                ("query", logql),
                ("start", start_ns.as_str()),
                ("end", end_ns.as_str()),
                ("limit", &limit.to_string()),
                ("direction", "backward"),
            ])
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;
        let body: LokiResponse = read_json(PROVIDER, response).await?;

        let mut entries = Vec::new();
        for stream in body.data.result {
            let service = stream
                .stream
                .get("service")
                .or_else(|| stream.stream.get("app"))
                .or_else(|| stream.stream.get("job"))
                .cloned();
            let level = stream.stream.get("level").cloned();
            for value in stream.values {
                let [ts_ns, line] = value;
                entries.push(LogEntry {
                    timestamp: format_ns_timestamp(&ts_ns),
                    level: level.clone(),
                    service: service.clone(),
                    message: line,
                });
            }
        }
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn prometheus_query(
        &self,
        promql: &str,
        range: &TimeRange,
        step_secs: u32,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        let url = self.proxy_url(
            &self.credentials.prometheus_datasource_uid,
            "api/v1/query_range",
        );
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.credentials.api_token)
            .query(&[
                ("query", promql),
                ("start", &range.start.timestamp().to_string()),
                ("end", &range.end.timestamp().to_string()),
                ("step", &step_secs.max(1).to_string()),
            ])
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;
        let body: PromResponse = read_json(PROVIDER, response).await?;

        Ok(body
            .data
            .result
            .into_iter()
            .map(|series| {
                let name = series
                    .metric
                    .get("__name__")
                    .cloned()
                    .unwrap_or_else(|| promql.to_string());
                let mut labels: Vec<(String, String)> = series
                    .metric
                    .into_iter()
                    .filter(|(k, _)| k != "__name__")
                    .collect();
                labels.sort();
                let points = series
                    .values
                    .into_iter()
                    .filter_map(|(ts, value)| {
                        value.parse::<f64>().ok().map(|v| MetricPoint {
                            timestamp: ts as i64,
                            value: v,
                        })
                    })
                    .collect();
                MetricSeries {
                    name,
                    labels,
                    points,
                }
            })
            .collect())
    }
}

fn format_ns_timestamp(ns: &str) -> String {
    ns.parse::<i64>()
        .map(|n| {
            chrono::DateTime::from_timestamp_nanos(n)
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string()
        })
        .unwrap_or_else(|_| ns.to_string())
}

#[async_trait]
impl LogsAdapter for GrafanaAdapter {
    async fn search(
        &self,
        query: &str,
        range: &TimeRange,
        limit: u32,
    ) -> Result<Vec<LogEntry>, CausewayError> {
        let escaped = query.replace('"', "\\\"");
        let logql = format!("{{job=~\".+\"}} |= \"{escaped}\"");
        self.loki_query(&logql, range, limit).await
    }

    async fn errors(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<LogEntry>, CausewayError> {
        let escaped = service.replace('"', "\\\"");
        let logql = format!("{{service=~\"{escaped}\"}} |~ \"(?i)(error|exception|fatal|panic)\"");
        self.loki_query(&logql, range, 100).await
    }
}

#[async_trait]
impl MetricsAdapter for GrafanaAdapter {
    async fn query(
        &self,
        expr: &str,
        range: &TimeRange,
        step_secs: u32,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        self.prometheus_query(expr, range, step_secs).await
    }

    async fn cpu(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        let promql = format!(
            "sum(rate(container_cpu_usage_seconds_total{{pod=~\"{service}.*\"}}[5m]))"
        );
        self.prometheus_query(&promql, range, 60).await
    }

    async fn memory(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        let promql = format!("sum(container_memory_working_set_bytes{{pod=~\"{service}.*\"}})");
        self.prometheus_query(&promql, range, 60).await
    }

    async fn latency(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        let promql = format!(
            "histogram_quantile(0.99, sum(rate(http_request_duration_seconds_bucket{{service=~\"{service}\"}}[5m])) by (le))"
        );
        self.prometheus_query(&promql, range, 60).await
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct LokiResponse {
    data: LokiData,
}

#[derive(Debug, Deserialize)]
struct LokiData {
    #[serde(default)]
    result: Vec<LokiStream>,
}

#[derive(Debug, Deserialize)]
struct LokiStream {
    #[serde(default)]
    stream: std::collections::HashMap<String, String>,
    #[serde(default)]
    values: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
struct PromResponse {
    data: PromData,
}

#[derive(Debug, Deserialize)]
struct PromData {
    #[serde(default)]
    result: Vec<PromSeries>,
}

#[derive(Debug, Deserialize)]
struct PromSeries {
    #[serde(default)]
    metric: std::collections::HashMap<String, String>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}
