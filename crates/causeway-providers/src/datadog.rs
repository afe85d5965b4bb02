// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Datadog adapter: logs search (v2) and metrics query (v1).

use async_trait::async_trait;
use causeway_core::{
    CausewayError, LogEntry, LogsAdapter, MetricPoint, MetricSeries, MetricsAdapter, ProviderKind,
    TimeRange,
};
use serde::Deserialize;

use crate::http::{build_client, check_status, read_json, request_error};

const PROVIDER: ProviderKind = ProviderKind::Datadog;

/// Decrypted Datadog credential payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DatadogCredentials {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub api_key: String,
    pub app_key: String,
}

fn default_base_url() -> String {
    "https://api.datadoghq.com".to_string()
}

#[derive(Debug)]
pub struct DatadogAdapter {
    client: reqwest::Client,
    credentials: DatadogCredentials,
}

impl DatadogAdapter {
    pub fn new(credentials: DatadogCredentials) -> Result<Self, CausewayError> {
        Ok(Self {
            client: build_client()?,
            credentials,
        })
    }

    fn url(&self, tail: &str) -> String {
        format!("{}{tail}", self.credentials.base_url.trim_end_matches('/'))
    }

    async fn logs_search(
        &self,
        query: &str,
        range: &TimeRange,
        limit: u32,
    ) -> Result<Vec<LogEntry>, CausewayError> {
        let body = serde_json::json!({
            "filter": {
                "query": query,
                "from": range.start.to_rfc3339(),
                "to": range.end.to_rfc3339(),
            },
            "sort": "-timestamp",
            "page": {"limit": limit},
        });
        let response = self
            .client
            .post(self.url("/api/v2/logs/events/search"))
            .header("DD-API-KEY", &self.credentials.api_key)
            .header("DD-APPLICATION-KEY", &self.credentials.app_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;
        let body: LogsResponse = read_json(PROVIDER, response).await?;

        Ok(body
            .data
            .into_iter()
            .map(|event| LogEntry {
                timestamp: event.attributes.timestamp.unwrap_or_default(),
                level: event.attributes.status,
                service: event.attributes.service,
                message: event.attributes.message.unwrap_or_default(),
            })
            .collect())
    }

    async fn metrics_query(
        &self,
        query: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        let response = self
            .client
            .get(self.url("/api/v1/query"))
            .header("DD-API-KEY", &self.credentials.api_key)
            .header("DD-APPLICATION-KEY", &self.credentials.app_key)
            .query(&[
                ("from", range.start.timestamp().to_string()),
                ("to", range.end.timestamp().to_string()),
                ("query", query.to_string()),
            ])
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;
        let body: MetricsResponse = read_json(PROVIDER, response).await?;

        Ok(body
            .series
            .into_iter()
            .map(|series| MetricSeries {
                name: series.metric,
                labels: Vec::new(),
                points: series
                    .pointlist
                    .into_iter()
                    .filter_map(|point| match point {
                        [Some(ts_ms), Some(value)] => Some(MetricPoint {
                            timestamp: (ts_ms / 1000.0) as i64,
                            value,
                        }),
                        _ => None,
                    })
                    .collect(),
            })
            .collect())
    }
}

#[async_trait]
impl LogsAdapter for DatadogAdapter {
    async fn search(
        &self,
        query: &str,
        range: &TimeRange,
        limit: u32,
    ) -> Result<Vec<LogEntry>, CausewayError> {
        self.logs_search(query, range, limit).await
    }

    async fn errors(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<LogEntry>, CausewayError> {
        let query = format!("service:{service} status:error");
        self.logs_search(&query, range, 100).await
    }
}

#[async_trait]
impl MetricsAdapter for DatadogAdapter {
    async fn query(
        &self,
        expr: &str,
        range: &TimeRange,
        _step_secs: u32,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        self.metrics_query(expr, range).await
    }

    async fn cpu(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        self.metrics_query(&format!("avg:system.cpu.user{{service:{service}}}"), range)
            .await
    }

    async fn memory(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        self.metrics_query(
            &format!("avg:system.mem.used{{service:{service}}}"),
            range,
        )
        .await
    }

    async fn latency(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        self.metrics_query(
            &format!("p99:trace.http.request.duration{{service:{service}}}"),
            range,
        )
        .await
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct LogsResponse {
    #[serde(default)]
    data: Vec<LogEvent>,
}

#[derive(Debug, Deserialize)]
struct LogEvent {
    attributes: LogAttributes,
}

#[derive(Debug, Deserialize)]
struct LogAttributes {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    #[serde(default)]
    series: Vec<MetricsSeries>,
}

#[derive(Debug, Deserialize)]
struct MetricsSeries {
    metric: String,
    #[serde(default)]
    pointlist: Vec<[Option<f64>; 2]>,
}
