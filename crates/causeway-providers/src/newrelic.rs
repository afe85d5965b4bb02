// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! New Relic adapter: everything goes through NerdGraph NRQL.

use async_trait::async_trait;
use causeway_core::{
    CausewayError, LogEntry, LogsAdapter, MetricPoint, MetricSeries, MetricsAdapter, ProviderKind,
    TimeRange,
};
use serde::Deserialize;

use crate::http::{build_client, check_status, read_json, request_error};

const PROVIDER: ProviderKind = ProviderKind::Newrelic;

/// Decrypted New Relic credential payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRelicCredentials {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub api_key: String,
    pub account_id: i64,
}

fn default_base_url() -> String {
    "https://api.newrelic.com".to_string()
}

#[derive(Debug)]
pub struct NewRelicAdapter {
    client: reqwest::Client,
    credentials: NewRelicCredentials,
}

impl NewRelicAdapter {
    pub fn new(credentials: NewRelicCredentials) -> Result<Self, CausewayError> {
        Ok(Self {
            client: build_client()?,
            credentials,
        })
    }

    async fn nrql(&self, nrql: &str) -> Result<Vec<serde_json::Value>, CausewayError> {
        let graphql = format!(
            "{{ actor {{ account(id: {}) {{ nrql(query: \"{}\") {{ results }} }} }} }}",
            self.credentials.account_id,
            nrql.replace('"', "\\\"")
        );
        let response = self
            .client
            .post(format!(
                "{}/graphql",
                self.credentials.base_url.trim_end_matches('/')
            ))
            .header("API-Key", &self.credentials.api_key)
            .json(&serde_json::json!({"query": graphql}))
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;
        let body: GraphQlResponse = read_json(PROVIDER, response).await?;

        if let Some(errors) = body.errors
            && let Some(first) = errors.first()
        {
            return Err(CausewayError::Provider {
                message: format!("nerdgraph error: {}", first.message),
                source: None,
            });
        }
        Ok(body
            .data
            .and_then(|d| d.actor)
            .and_then(|a| a.account)
            .and_then(|a| a.nrql)
            .map(|n| n.results)
            .unwrap_or_default())
    }

    fn since_clause(range: &TimeRange) -> String {
        format!(
            "SINCE {} UNTIL {}",
            range.start.timestamp(),
            range.end.timestamp()
        )
    }

    fn rows_to_logs(rows: Vec<serde_json::Value>) -> Vec<LogEntry> {
        rows.into_iter()
            .map(|row| LogEntry {
                timestamp: row
                    .get("timestamp")
                    .and_then(|t| t.as_i64())
                    .map(|ms| {
                        chrono::DateTime::from_timestamp_millis(ms)
                            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
                            .unwrap_or_default()
                    })
                    .unwrap_or_default(),
                level: row
                    .get("level")
                    .and_then(|l| l.as_str())
                    .map(str::to_string),
                service: row
                    .get("service.name")
                    .or_else(|| row.get("entity.name"))
                    .and_then(|s| s.as_str())
                    .map(str::to_string),
                message: row
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect()
    }

    fn rows_to_series(name: &str, rows: Vec<serde_json::Value>) -> Vec<MetricSeries> {
        let points: Vec<MetricPoint> = rows
            .into_iter()
            .filter_map(|row| {
                let timestamp = row
                    .get("beginTimeSeconds")
                    .and_then(|t| t.as_f64())
                    .map(|t| t as i64)?;
                // The aggregate lands under its function name; take the first
                // numeric field that is not the window bound.
                let value = row
                    .as_object()?
                    .iter()
                    .filter(|(k, _)| !k.contains("TimeSeconds"))
                    .find_map(|(_, v)| v.as_f64())?;
                Some(MetricPoint { timestamp, value })
            })
            .collect();
        vec![MetricSeries {
            name: name.to_string(),
            labels: Vec::new(),
            points,
        }]
    }
}

#[async_trait]
impl LogsAdapter for NewRelicAdapter {
    async fn search(
        &self,
        query: &str,
        range: &TimeRange,
        limit: u32,
    ) -> Result<Vec<LogEntry>, CausewayError> {
        let escaped = query.replace('\'', "\\'");
        let nrql = format!(
            "SELECT timestamp, level, message, `service.name` FROM Log \
             WHERE message LIKE '%{escaped}%' {} LIMIT {limit}",
            Self::since_clause(range)
        );
        Ok(Self::rows_to_logs(self.nrql(&nrql).await?))
    }

    async fn errors(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<LogEntry>, CausewayError> {
        let escaped = service.replace('\'', "\\'");
        let nrql = format!(
            "SELECT timestamp, level, message, `service.name` FROM Log \
             WHERE `service.name` = '{escaped}' AND level IN ('error', 'fatal') {} LIMIT 100",
            Self::since_clause(range)
        );
        Ok(Self::rows_to_logs(self.nrql(&nrql).await?))
    }
}

#[async_trait]
impl MetricsAdapter for NewRelicAdapter {
    async fn query(
        &self,
        expr: &str,
        _range: &TimeRange,
        _step_secs: u32,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        // Free-form queries are raw NRQL.
        Ok(Self::rows_to_series(expr, self.nrql(expr).await?))
    }

    async fn cpu(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        let nrql = format!(
            "SELECT average(cpuPercent) FROM SystemSample \
             WHERE apmApplicationNames LIKE '%{service}%' {} TIMESERIES",
            Self::since_clause(range)
        );
        Ok(Self::rows_to_series("cpuPercent", self.nrql(&nrql).await?))
    }

    async fn memory(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        let nrql = format!(
            "SELECT average(memoryUsedPercent) FROM SystemSample \
             WHERE apmApplicationNames LIKE '%{service}%' {} TIMESERIES",
            Self::since_clause(range)
        );
        Ok(Self::rows_to_series(
            "memoryUsedPercent",
            self.nrql(&nrql).await?,
        ))
    }

    async fn latency(
        &self,
        service: &str,
        range: &TimeRange,
    ) -> Result<Vec<MetricSeries>, CausewayError> {
        let nrql = format!(
            "SELECT percentile(duration, 99) FROM Transaction \
             WHERE appName = '{service}' {} TIMESERIES",
            Self::since_clause(range)
        );
        Ok(Self::rows_to_series("duration.p99", self.nrql(&nrql).await?))
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<GraphQlData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlData {
    #[serde(default)]
    actor: Option<GraphQlActor>,
}

#[derive(Debug, Deserialize)]
struct GraphQlActor {
    #[serde(default)]
    account: Option<GraphQlAccount>,
}

#[derive(Debug, Deserialize)]
struct GraphQlAccount {
    #[serde(default)]
    nrql: Option<GraphQlNrql>,
}

#[derive(Debug, Deserialize)]
struct GraphQlNrql {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}
