// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The LLM gateway: per-workspace model selection and construction.
//!
//! Platform-default credentials come from process configuration; BYO
//! configurations are unsealed here and nowhere else. Every decrypted key is
//! registered with the redaction list before a client is built, so it cannot
//! reach log output.

use std::sync::Arc;

use causeway_core::{CausewayError, ChatModel, HealthState, LlmProvider};
use causeway_storage::{Database, queries::llm_configs};
use causeway_vault::{SecretValues, register_secret};
use serde::Deserialize;

use crate::gemini::GeminiModel;
use crate::openai::OpenAiModel;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

/// Model-name allow-lists per provider. Azure deployments are free-form
/// names, so only emptiness is rejected there.
const OPENAI_MODEL_PREFIXES: &[&str] = &["gpt-4o", "gpt-4.1", "o3", "o4"];
const GEMINI_MODEL_PREFIXES: &[&str] = &["gemini-1.5", "gemini-2.0", "gemini-2.5"];

/// Process-level platform model settings.
#[derive(Debug, Clone)]
pub struct PlatformLlm {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Decrypted BYO credential payload.
#[derive(Debug, Deserialize)]
struct ByoCredentials {
    api_key: String,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    api_version: Option<String>,
}

/// A model resolved for one workspace.
pub struct ResolvedModel {
    pub model: Arc<dyn ChatModel>,
    pub provider: LlmProvider,
}

/// Uniform chat-completion gateway over platform and BYO providers.
pub struct LlmGateway {
    db: Database,
    master_key: Option<[u8; 32]>,
    platform: PlatformLlm,
    secrets: SecretValues,
}

impl LlmGateway {
    pub fn new(
        db: Database,
        master_key: Option<[u8; 32]>,
        platform: PlatformLlm,
        secrets: SecretValues,
    ) -> Self {
        Self {
            db,
            master_key,
            platform,
            secrets,
        }
    }

    /// Which provider the workspace will use. The quota gate consults this:
    /// anything other than `Platform` bypasses the daily counter.
    pub async fn provider_for(&self, workspace_id: &str) -> Result<LlmProvider, CausewayError> {
        Ok(llm_configs::get_llm_config(&self.db, workspace_id)
            .await?
            .map(|c| c.provider)
            .unwrap_or(LlmProvider::Platform))
    }

    /// Health of the workspace's BYO config, if one exists. Admission fails
    /// early on an unhealthy BYO config; the worker then assumes a healthy
    /// handle.
    pub async fn config_health(
        &self,
        workspace_id: &str,
    ) -> Result<Option<HealthState>, CausewayError> {
        Ok(llm_configs::get_llm_config(&self.db, workspace_id)
            .await?
            .filter(|c| c.provider != LlmProvider::Platform)
            .and_then(|c| c.health_status))
    }

    /// Resolve the chat model for a workspace.
    pub async fn resolve(&self, workspace_id: &str) -> Result<ResolvedModel, CausewayError> {
        let config = llm_configs::get_llm_config(&self.db, workspace_id).await?;
        let Some(config) = config.filter(|c| c.provider != LlmProvider::Platform) else {
            return Ok(ResolvedModel {
                model: self.platform_model()?,
                provider: LlmProvider::Platform,
            });
        };

        if !model_allowed(config.provider, &config.model) {
            return Err(CausewayError::Config(format!(
                "model {:?} is not allowed for provider {}",
                config.model, config.provider
            )));
        }

        let credentials = self.unseal(
            config.credentials_sealed.as_deref(),
            config.nonce.as_deref(),
        )?;
        register_secret(&self.secrets, credentials.api_key.clone());

        let model: Arc<dyn ChatModel> = match config.provider {
            LlmProvider::Openai => {
                let base_url = credentials
                    .base_url
                    .as_deref()
                    .unwrap_or("https://api.openai.com/v1");
                Arc::new(OpenAiModel::new(base_url, &credentials.api_key, &config.model)?)
            }
            LlmProvider::AzureOpenai => {
                let base_url = credentials.base_url.as_deref().ok_or_else(|| {
                    CausewayError::Config("azure-openai config requires base_url".into())
                })?;
                let api_version = credentials
                    .api_version
                    .as_deref()
                    .unwrap_or(DEFAULT_AZURE_API_VERSION);
                Arc::new(OpenAiModel::azure(
                    base_url,
                    &credentials.api_key,
                    &config.model,
                    api_version,
                )?)
            }
            LlmProvider::Gemini => {
                let base_url = credentials
                    .base_url
                    .as_deref()
                    .unwrap_or(DEFAULT_GEMINI_BASE_URL);
                Arc::new(GeminiModel::new(base_url, &credentials.api_key, &config.model)?)
            }
            LlmProvider::Platform => unreachable!("filtered above"),
        };

        Ok(ResolvedModel {
            model,
            provider: config.provider,
        })
    }

    /// The platform default model, used for workspaces without BYO config
    /// and for the prompt guard's independent classification calls.
    pub fn platform_model(&self) -> Result<Arc<dyn ChatModel>, CausewayError> {
        let api_key = self.platform.api_key.as_deref().ok_or_else(|| {
            CausewayError::Config("platform LLM API key is not configured".into())
        })?;
        Ok(Arc::new(OpenAiModel::new(
            &self.platform.base_url,
            api_key,
            &self.platform.model,
        )?))
    }

    fn unseal(
        &self,
        sealed: Option<&[u8]>,
        nonce: Option<&[u8]>,
    ) -> Result<ByoCredentials, CausewayError> {
        let key = self
            .master_key
            .as_ref()
            .ok_or_else(|| CausewayError::Vault("vault master key is not configured".into()))?;
        let sealed = sealed
            .ok_or_else(|| CausewayError::Config("BYO LLM config has no credentials".into()))?;
        let nonce: &[u8; 12] = nonce
            .and_then(|n| n.try_into().ok())
            .ok_or_else(|| CausewayError::Vault("credential nonce must be 12 bytes".into()))?;
        let plaintext = causeway_vault::open(key, nonce, sealed)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| CausewayError::Config(format!("malformed BYO credential payload: {e}")))
    }
}

#[async_trait::async_trait]
impl causeway_core::ModelResolver for LlmGateway {
    async fn provider_for(&self, workspace_id: &str) -> Result<LlmProvider, CausewayError> {
        LlmGateway::provider_for(self, workspace_id).await
    }

    async fn config_health(
        &self,
        workspace_id: &str,
    ) -> Result<Option<HealthState>, CausewayError> {
        LlmGateway::config_health(self, workspace_id).await
    }

    async fn resolve_model(
        &self,
        workspace_id: &str,
    ) -> Result<Arc<dyn ChatModel>, CausewayError> {
        Ok(LlmGateway::resolve(self, workspace_id).await?.model)
    }
}

/// Check a model name against the provider's allow-list.
pub fn model_allowed(provider: LlmProvider, model: &str) -> bool {
    match provider {
        LlmProvider::Platform => true,
        LlmProvider::Openai => OPENAI_MODEL_PREFIXES.iter().any(|p| model.starts_with(p)),
        LlmProvider::AzureOpenai => !model.trim().is_empty(),
        LlmProvider::Gemini => GEMINI_MODEL_PREFIXES.iter().any(|p| model.starts_with(p)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_storage::queries::llm_configs::upsert_llm_config;
    use std::sync::RwLock;
    use tempfile::tempdir;

    fn secrets() -> SecretValues {
        Arc::new(RwLock::new(Vec::new()))
    }

    fn platform() -> PlatformLlm {
        PlatformLlm {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: Some("sk-platform".into()),
        }
    }

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[test]
    fn allow_lists_accept_known_prefixes() {
        assert!(model_allowed(LlmProvider::Openai, "gpt-4o-mini"));
        assert!(model_allowed(LlmProvider::Gemini, "gemini-2.0-flash"));
        assert!(model_allowed(LlmProvider::AzureOpenai, "prod-gpt4o"));
        assert!(!model_allowed(LlmProvider::Openai, "mystery-model"));
        assert!(!model_allowed(LlmProvider::Gemini, "gpt-4o"));
        assert!(!model_allowed(LlmProvider::AzureOpenai, "  "));
    }

    #[tokio::test]
    async fn workspace_without_config_uses_platform() {
        let (db, _dir) = setup_db().await;
        let gateway = LlmGateway::new(db.clone(), None, platform(), secrets());

        assert_eq!(
            gateway.provider_for("w-1").await.unwrap(),
            LlmProvider::Platform
        );
        let resolved = gateway.resolve("w-1").await.unwrap();
        assert_eq!(resolved.provider, LlmProvider::Platform);
        assert_eq!(resolved.model.model_name(), "gpt-4o-mini");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn byo_config_resolves_and_registers_secret() {
        let (db, _dir) = setup_db().await;
        let master_key = causeway_vault::generate_random_key().unwrap();
        let payload = serde_json::json!({"api_key": "byo-gemini-key"}).to_string();
        let (sealed, nonce) = causeway_vault::seal(&master_key, payload.as_bytes()).unwrap();
        upsert_llm_config(
            &db,
            "w-1",
            LlmProvider::Gemini,
            "gemini-2.0-flash",
            Some(sealed),
            Some(nonce.to_vec()),
        )
        .await
        .unwrap();

        let secret_list = secrets();
        let gateway = LlmGateway::new(db.clone(), Some(master_key), platform(), secret_list.clone());
        let resolved = gateway.resolve("w-1").await.unwrap();
        assert_eq!(resolved.provider, LlmProvider::Gemini);
        assert_eq!(resolved.model.model_name(), "gemini-2.0-flash");
        assert!(
            secret_list.read().unwrap().contains(&"byo-gemini-key".to_string()),
            "decrypted key must be registered for redaction"
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn disallowed_byo_model_is_rejected() {
        let (db, _dir) = setup_db().await;
        let master_key = causeway_vault::generate_random_key().unwrap();
        let payload = serde_json::json!({"api_key": "k"}).to_string();
        let (sealed, nonce) = causeway_vault::seal(&master_key, payload.as_bytes()).unwrap();
        upsert_llm_config(
            &db,
            "w-1",
            LlmProvider::Openai,
            "made-up-model",
            Some(sealed),
            Some(nonce.to_vec()),
        )
        .await
        .unwrap();

        let gateway = LlmGateway::new(db.clone(), Some(master_key), platform(), secrets());
        assert!(gateway.resolve("w-1").await.is_err());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_platform_key_fails_construction() {
        let (db, _dir) = setup_db().await;
        let mut platform = platform();
        platform.api_key = None;
        let gateway = LlmGateway::new(db.clone(), None, platform, secrets());
        assert!(gateway.resolve("w-1").await.is_err());
        db.close().await.unwrap();
    }
}
