// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end test harness.
//!
//! Assembles the full stack -- temp SQLite database, in-process bus, the
//! bundled queue transport, a scripted model, and a mock adapter source --
//! and exposes the admission path and a single-shot worker so tests can
//! drive one turn from message to terminal frame.

use std::sync::Arc;

use causeway_bus::InProcessBus;
use causeway_config::CausewayConfig;
use causeway_core::{EventBus, Frame, turn_channel};
use causeway_gateway::{Admitted, ApiError, GatewayState, StaticIdentity};
use causeway_guard::{PromptGuard, QuotaGate};
use causeway_storage::{Database, RCA_JOB_QUEUE, SqliteQueue};
use causeway_worker::{AppContext, Reconciler, Worker};
use futures::StreamExt;

use crate::mock_model::{ScriptedModel, ScriptedResolver, ScriptedStep};
use crate::mock_source::MockAdapterSource;

/// Builder for the test environment.
pub struct TestHarnessBuilder {
    script: Vec<ScriptedStep>,
    config: CausewayConfig,
    source: Option<Arc<MockAdapterSource>>,
}

impl TestHarnessBuilder {
    pub fn with_script(mut self, script: Vec<ScriptedStep>) -> Self {
        self.script = script;
        self
    }

    pub fn with_config(mut self, mutate: impl FnOnce(&mut CausewayConfig)) -> Self {
        mutate(&mut self.config);
        self
    }

    pub fn with_source(mut self, source: Arc<MockAdapterSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub async fn build(self) -> TestHarness {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::open(dir.path().join("causeway.db").to_str().unwrap())
            .await
            .expect("open database");

        let bus = Arc::new(InProcessBus::new());
        let queue = Arc::new(SqliteQueue::new(
            db.clone(),
            RCA_JOB_QUEUE,
            self.config.queue.max_delay_secs,
        ));
        let model = ScriptedModel::new(self.script);
        let source = self.source.unwrap_or_else(MockAdapterSource::full);
        let config = Arc::new(self.config);

        let ctx = AppContext {
            db: db.clone(),
            queue: queue.clone(),
            bus: bus.clone(),
            adapters: source.clone(),
            llm: ScriptedResolver::new(model.clone()),
            config: config.clone(),
        };

        let state = GatewayState {
            ctx: ctx.clone(),
            // The guard runs against its own scripted model only when a
            // test enables it; admission is exercised with it disabled by
            // default.
            guard: Arc::new(PromptGuard::new(None, config.guard.enabled)),
            quota: Arc::new(QuotaGate::new(db.clone(), None, config.quota.default_daily_limit)),
            identity: Arc::new(StaticIdentity::new("test-token")),
            prometheus_render: None,
        };

        TestHarness {
            _dir: dir,
            db,
            bus,
            model,
            source,
            ctx,
            state,
        }
    }
}

/// A fully wired single-process Causeway stack over temp storage.
pub struct TestHarness {
    _dir: tempfile::TempDir,
    pub db: Database,
    pub bus: Arc<InProcessBus>,
    pub model: Arc<ScriptedModel>,
    pub source: Arc<MockAdapterSource>,
    pub ctx: AppContext,
    pub state: GatewayState,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        let mut config = CausewayConfig::default();
        // Keep tests fast and deterministic.
        config.guard.enabled = false;
        config.worker.retry_base_backoff_secs = 0;
        TestHarnessBuilder {
            script: Vec::new(),
            config,
            source: None,
        }
    }

    /// Run the admission path for one message.
    pub async fn send_message(
        &self,
        workspace_id: &str,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<Admitted, ApiError> {
        causeway_gateway::send_message(&self.state, workspace_id, "user-1", message, session_id)
            .await
    }

    /// Subscribe to a turn's live frames (before driving the worker).
    pub async fn subscribe(&self, turn_id: &str) -> causeway_core::FrameStream {
        self.bus
            .subscribe(&turn_channel(turn_id))
            .await
            .expect("subscribe")
    }

    /// Drive one worker iteration.
    pub async fn run_worker_once(&self) -> bool {
        Worker::new(self.ctx.clone())
            .run_once()
            .await
            .expect("worker iteration")
    }

    /// Drive worker iterations until the queue is drained.
    pub async fn drain_queue(&self) {
        while self.run_worker_once().await {}
    }

    /// One reconciler sweep.
    pub async fn reconcile_once(&self) -> usize {
        Reconciler::new(self.ctx.clone())
            .sweep_once()
            .await
            .expect("reconciler sweep")
    }

    /// Collect all frames from a subscription until it ends.
    pub async fn collect_frames(mut stream: causeway_core::FrameStream) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = stream.next().await {
            let terminal = frame.is_terminal();
            frames.push(frame);
            if terminal {
                break;
            }
        }
        frames
    }
}
