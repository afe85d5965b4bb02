// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider registry and adapters for the Causeway platform.
//!
//! The registry resolves per-workspace integrations into typed adapter
//! handles (logs, metrics, code) with sealed-credential decryption, a short
//! TTL cache, and health filtering. Adapters are thin HTTP clients over
//! Grafana (Loki/Prometheus), Datadog, New Relic, and GitHub.

pub mod datadog;
pub mod github;
pub mod grafana;
mod http;
pub mod newrelic;
pub mod registry;

pub use datadog::{DatadogAdapter, DatadogCredentials};
pub use github::{GithubAdapter, GithubCredentials};
pub use grafana::{GrafanaAdapter, GrafanaCredentials};
pub use newrelic::{NewRelicAdapter, NewRelicCredentials};
pub use registry::ProviderRegistry;
