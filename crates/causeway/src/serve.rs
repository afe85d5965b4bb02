// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process assembly: build the application context once and run the chosen
//! combination of API server, worker pool, and reconciler.

use std::sync::{Arc, RwLock};

use causeway_bus::InProcessBus;
use causeway_core::CausewayError;
use causeway_gateway::{GatewayState, StaticIdentity, start_server};
use causeway_guard::{PromptGuard, QuotaGate};
use causeway_llm::{LlmGateway, PlatformLlm};
use causeway_providers::ProviderRegistry;
use causeway_storage::{Database, RCA_JOB_QUEUE, SqliteQueue};
use causeway_vault::{RedactingWriter, SecretValues, register_secret};
use causeway_worker::{AppContext, Reconciler, Worker};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ApiAndWorkers,
    WorkersOnly,
}

pub async fn run(mode: Mode) -> Result<(), CausewayError> {
    let config = causeway_config::load_config()
        .map_err(|e| CausewayError::Config(format!("failed to load configuration: {e}")))?;

    // Everything decrypted at runtime registers here so the logging
    // pipeline can elide it.
    let secrets: SecretValues = Arc::new(RwLock::new(Vec::new()));
    init_tracing(secrets.clone());

    let master_key = config
        .vault
        .master_key
        .as_deref()
        .map(causeway_vault::master_key_from_base64)
        .transpose()?;
    if master_key.is_none() {
        warn!("no vault master key configured; BYO credentials cannot be unsealed");
    }
    if let Some(key) = &config.llm.platform_api_key {
        register_secret(&secrets, key.clone());
    }

    let db = Database::open(&config.storage.database_path).await?;
    let bus = Arc::new(InProcessBus::new());
    let queue = Arc::new(SqliteQueue::new(
        db.clone(),
        RCA_JOB_QUEUE,
        config.queue.max_delay_secs,
    ));
    let registry = Arc::new(ProviderRegistry::new(
        db.clone(),
        master_key,
        secrets.clone(),
    ));
    let llm = Arc::new(LlmGateway::new(
        db.clone(),
        master_key,
        PlatformLlm {
            base_url: config.llm.platform_base_url.clone(),
            model: config.llm.platform_model.clone(),
            api_key: config.llm.platform_api_key.clone(),
        },
        secrets.clone(),
    ));

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| CausewayError::Internal(format!("failed to install metrics recorder: {e}")))?;

    let config = Arc::new(config);
    let ctx = AppContext {
        db: db.clone(),
        queue,
        bus,
        adapters: registry,
        llm: llm.clone(),
        config: config.clone(),
    };

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    // Worker pool and reconciler run in both modes.
    for _ in 0..config.worker.concurrency.max(1) {
        let worker = Worker::new(ctx.clone());
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move { worker.run(cancel).await }));
    }
    {
        let reconciler = Reconciler::new(ctx.clone());
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move { reconciler.run(cancel).await }));
    }

    if mode == Mode::ApiAndWorkers {
        // The guard classifies with the platform model; without a key it
        // degrades and policy decides (fail-open by default, audited).
        let guard_model = match llm.platform_model() {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(error = %e, "guard model unavailable; guard will report degraded");
                None
            }
        };
        let bearer = config.server.bearer_token.clone().unwrap_or_else(|| {
            warn!("no server bearer token configured; using development default");
            "causeway-dev".to_string()
        });

        let state = GatewayState {
            ctx: ctx.clone(),
            guard: Arc::new(PromptGuard::new(guard_model, config.guard.enabled)),
            quota: Arc::new(QuotaGate::new(
                db.clone(),
                None,
                config.quota.default_daily_limit,
            )),
            identity: Arc::new(StaticIdentity::new(bearer)),
            prometheus_render: Some(Arc::new(move || prometheus.render())),
        };

        let server = start_server(&config.server.host, config.server.port, state);
        tokio::select! {
            result = server => result?,
            _ = shutdown_signal() => {}
        }
    } else {
        info!("worker process running, press ctrl-c to stop");
        shutdown_signal().await;
    }

    info!("shutting down");
    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }
    db.close().await?;
    Ok(())
}

fn init_tracing(secrets: SecretValues) {
    use tracing_subscriber::EnvFilter;

    let writer_secrets = secrets;
    let make_writer = move || RedactingWriter::new(std::io::stderr(), writer_secrets.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(make_writer)
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
