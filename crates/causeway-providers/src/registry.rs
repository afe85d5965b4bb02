// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The provider registry: capability discovery and adapter construction.
//!
//! The registry is the only component that decrypts integration credentials.
//! Decrypted payloads are cached per `(workspace, provider)` with a short
//! TTL and invalidated when an integration is updated; adapters built from
//! them live no longer than one tool invocation. Unhealthy integrations
//! contribute no capabilities until a health check brings them back.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use causeway_core::{
    AdapterSource, Capability, CapabilityFamily, CausewayError, CodeAdapter, HealthState,
    LogsAdapter, MetricsAdapter, ProviderKind,
};
use causeway_storage::{Database, queries::integrations};
use causeway_vault::{SecretValues, register_secret};
use dashmap::DashMap;

use crate::datadog::{DatadogAdapter, DatadogCredentials};
use crate::github::{GithubAdapter, GithubCredentials};
use crate::grafana::{GrafanaAdapter, GrafanaCredentials};
use crate::newrelic::{NewRelicAdapter, NewRelicCredentials};

/// Decrypted-credential cache TTL.
const CACHE_TTL: Duration = Duration::from_secs(60);

struct CachedPayload {
    plaintext: Vec<u8>,
    fetched_at: Instant,
}

/// Registry resolving per-workspace integrations to typed adapters.
pub struct ProviderRegistry {
    db: Database,
    master_key: Option<[u8; 32]>,
    secrets: SecretValues,
    cache: DashMap<(String, ProviderKind), CachedPayload>,
    cache_ttl: Duration,
}

impl ProviderRegistry {
    pub fn new(db: Database, master_key: Option<[u8; 32]>, secrets: SecretValues) -> Self {
        Self {
            db,
            master_key,
            secrets,
            cache: DashMap::new(),
            cache_ttl: CACHE_TTL,
        }
    }

    #[cfg(test)]
    fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Drop cached credentials for a workspace (integration update events).
    pub fn invalidate(&self, workspace_id: &str) {
        self.cache.retain(|(ws, _), _| ws != workspace_id);
    }

    async fn credential_payload(
        &self,
        workspace_id: &str,
        provider: ProviderKind,
    ) -> Result<Vec<u8>, CausewayError> {
        let cache_key = (workspace_id.to_string(), provider);
        if let Some(cached) = self.cache.get(&cache_key)
            && cached.fetched_at.elapsed() < self.cache_ttl
        {
            return Ok(cached.plaintext.clone());
        }

        let record = integrations::get_integration(&self.db, workspace_id, provider)
            .await?
            .ok_or_else(|| CausewayError::NotFound {
                resource: "integration",
                id: format!("{workspace_id}/{provider}"),
            })?;
        if record.health_status == Some(HealthState::Failed) {
            return Err(CausewayError::Provider {
                message: format!("integration {provider} is unhealthy"),
                source: None,
            });
        }

        let key = self
            .master_key
            .as_ref()
            .ok_or_else(|| CausewayError::Vault("vault master key is not configured".into()))?;
        let nonce: &[u8; 12] = record
            .nonce
            .as_slice()
            .try_into()
            .map_err(|_| CausewayError::Vault("credential nonce must be 12 bytes".into()))?;
        let plaintext = causeway_vault::open(key, nonce, &record.credentials_sealed)?;

        register_payload_secrets(&self.secrets, &plaintext);
        self.cache.insert(
            cache_key,
            CachedPayload {
                plaintext: plaintext.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(plaintext)
    }

    fn parse<T: serde::de::DeserializeOwned>(
        provider: ProviderKind,
        payload: &[u8],
    ) -> Result<T, CausewayError> {
        serde_json::from_slice(payload).map_err(|e| CausewayError::Config(format!(
            "malformed {provider} credential payload: {e}"
        )))
    }

    fn ensure_family(
        provider: ProviderKind,
        family: CapabilityFamily,
    ) -> Result<(), CausewayError> {
        let supported = provider
            .capabilities()
            .iter()
            .any(|c| c.family() == family);
        if supported {
            Ok(())
        } else {
            Err(CausewayError::Provider {
                message: format!("{provider} does not serve this capability"),
                source: None,
            })
        }
    }
}

/// Register token-ish string fields of a decrypted payload for log redaction.
fn register_payload_secrets(secrets: &SecretValues, plaintext: &[u8]) {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(plaintext) else {
        return;
    };
    let Some(object) = value.as_object() else {
        return;
    };
    for (key, value) in object {
        let sensitive = key.contains("key") || key.contains("token") || key.contains("secret");
        if sensitive && let Some(s) = value.as_str() {
            register_secret(secrets, s.to_string());
        }
    }
}

#[async_trait]
impl AdapterSource for ProviderRegistry {
    async fn capabilities(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<(ProviderKind, Capability)>, CausewayError> {
        let records = integrations::list_integrations(&self.db, workspace_id).await?;
        let mut capabilities = Vec::new();
        for record in records {
            if record.health_status == Some(HealthState::Failed) {
                continue;
            }
            for capability in record.provider.capabilities() {
                capabilities.push((record.provider, *capability));
            }
        }
        Ok(capabilities)
    }

    async fn open_logs(
        &self,
        provider: ProviderKind,
        workspace_id: &str,
    ) -> Result<Box<dyn LogsAdapter>, CausewayError> {
        Self::ensure_family(provider, CapabilityFamily::Logs)?;
        let payload = self.credential_payload(workspace_id, provider).await?;
        let adapter: Box<dyn LogsAdapter> = match provider {
            ProviderKind::Grafana => Box::new(GrafanaAdapter::new(Self::parse::<
                GrafanaCredentials,
            >(provider, &payload)?)?),
            ProviderKind::Datadog => Box::new(DatadogAdapter::new(Self::parse::<
                DatadogCredentials,
            >(provider, &payload)?)?),
            ProviderKind::Newrelic => Box::new(NewRelicAdapter::new(Self::parse::<
                NewRelicCredentials,
            >(provider, &payload)?)?),
            ProviderKind::Github => unreachable!("family checked above"),
        };
        Ok(adapter)
    }

    async fn open_metrics(
        &self,
        provider: ProviderKind,
        workspace_id: &str,
    ) -> Result<Box<dyn MetricsAdapter>, CausewayError> {
        Self::ensure_family(provider, CapabilityFamily::Metrics)?;
        let payload = self.credential_payload(workspace_id, provider).await?;
        let adapter: Box<dyn MetricsAdapter> = match provider {
            ProviderKind::Grafana => Box::new(GrafanaAdapter::new(Self::parse::<
                GrafanaCredentials,
            >(provider, &payload)?)?),
            ProviderKind::Datadog => Box::new(DatadogAdapter::new(Self::parse::<
                DatadogCredentials,
            >(provider, &payload)?)?),
            ProviderKind::Newrelic => Box::new(NewRelicAdapter::new(Self::parse::<
                NewRelicCredentials,
            >(provider, &payload)?)?),
            ProviderKind::Github => unreachable!("family checked above"),
        };
        Ok(adapter)
    }

    async fn open_code(
        &self,
        provider: ProviderKind,
        workspace_id: &str,
    ) -> Result<Box<dyn CodeAdapter>, CausewayError> {
        Self::ensure_family(provider, CapabilityFamily::Code)?;
        let payload = self.credential_payload(workspace_id, provider).await?;
        match provider {
            ProviderKind::Github => Ok(Box::new(GithubAdapter::new(Self::parse::<
                GithubCredentials,
            >(provider, &payload)?)?)),
            _ => unreachable!("family checked above"),
        }
    }

    async fn mark_unhealthy(
        &self,
        provider: ProviderKind,
        workspace_id: &str,
        reason: &str,
    ) -> Result<(), CausewayError> {
        tracing::warn!(%provider, workspace_id, reason, "marking integration unhealthy");
        integrations::set_health(&self.db, workspace_id, provider, HealthState::Failed).await?;
        self.invalidate(workspace_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_storage::queries::integrations::upsert_integration;
    use std::sync::{Arc, RwLock};
    use tempfile::tempdir;

    fn secrets() -> SecretValues {
        Arc::new(RwLock::new(Vec::new()))
    }

    async fn seed_integration(
        db: &Database,
        key: &[u8; 32],
        provider: ProviderKind,
        payload: serde_json::Value,
    ) {
        let (sealed, nonce) = causeway_vault::seal(key, payload.to_string().as_bytes()).unwrap();
        upsert_integration(db, "w-1", provider, sealed, nonce.to_vec())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn capabilities_reflect_healthy_integrations() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        let key = causeway_vault::generate_random_key().unwrap();

        seed_integration(
            &db,
            &key,
            ProviderKind::Grafana,
            serde_json::json!({"base_url": "http://g", "api_token": "t"}),
        )
        .await;
        seed_integration(
            &db,
            &key,
            ProviderKind::Github,
            serde_json::json!({"token": "ghp_x", "owner": "acme"}),
        )
        .await;

        let registry = ProviderRegistry::new(db.clone(), Some(key), secrets());
        let caps = registry.capabilities("w-1").await.unwrap();
        assert!(caps.contains(&(ProviderKind::Grafana, Capability::LogsErrors)));
        assert!(caps.contains(&(ProviderKind::Github, Capability::CodeListRepos)));
        assert_eq!(caps.len(), 10);

        // Failing grafana removes its six capabilities.
        registry
            .mark_unhealthy(ProviderKind::Grafana, "w-1", "401")
            .await
            .unwrap();
        let caps = registry.capabilities("w-1").await.unwrap();
        assert_eq!(caps.len(), 4);
        assert!(caps.iter().all(|(p, _)| *p == ProviderKind::Github));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_logs_decrypts_and_registers_secrets() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        let key = causeway_vault::generate_random_key().unwrap();
        seed_integration(
            &db,
            &key,
            ProviderKind::Datadog,
            serde_json::json!({"api_key": "dd-secret-key", "app_key": "dd-secret-app"}),
        )
        .await;

        let secret_list = secrets();
        let registry = ProviderRegistry::new(db.clone(), Some(key), secret_list.clone());
        registry
            .open_logs(ProviderKind::Datadog, "w-1")
            .await
            .unwrap();

        let registered = secret_list.read().unwrap().clone();
        assert!(registered.contains(&"dd-secret-key".to_string()));
        assert!(registered.contains(&"dd-secret-app".to_string()));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unhealthy_integration_refuses_to_open() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        let key = causeway_vault::generate_random_key().unwrap();
        seed_integration(
            &db,
            &key,
            ProviderKind::Grafana,
            serde_json::json!({"base_url": "http://g", "api_token": "t"}),
        )
        .await;

        let registry = ProviderRegistry::new(db.clone(), Some(key), secrets())
            .with_cache_ttl(Duration::from_secs(0));
        registry.open_logs(ProviderKind::Grafana, "w-1").await.unwrap();
        registry
            .mark_unhealthy(ProviderKind::Grafana, "w-1", "401")
            .await
            .unwrap();
        assert!(registry.open_logs(ProviderKind::Grafana, "w-1").await.is_err());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn github_does_not_serve_logs() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        let registry = ProviderRegistry::new(db.clone(), None, secrets());
        let err = registry
            .open_logs(ProviderKind::Github, "w-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "tool_transient");
        db.close().await.unwrap();
    }
}
