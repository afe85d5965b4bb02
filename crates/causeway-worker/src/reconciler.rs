// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stale-job reconciler.
//!
//! A worker that dies mid-turn leaves its job `running` with a lapsed
//! visibility window. The reconciler sweeps periodically: running jobs older
//! than the turn deadline go back to `queued` with `retries + 1` (there is
//! no mid-turn resume; the next attempt starts from scratch and its steps
//! append after the orphaned ones), or fail outright once the retry budget
//! is spent.

use std::time::Duration;

use causeway_core::{CausewayError, EventBus, Frame, TurnStatus, turn_channel};
use causeway_storage::queries::{jobs, jobs::RetryDecision, turns};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::sink::TurnSink;
use crate::worker::JobMessage;
use causeway_agent::StepSink;

/// Periodic reconciliation loop.
pub struct Reconciler {
    ctx: AppContext,
}

impl Reconciler {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Run sweeps until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = Duration::from_secs(self.ctx.config.worker.reconcile_interval_secs.max(1));
        info!(interval_secs = interval.as_secs(), "reconciler running");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping reconciler");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "reconciler sweep failed");
                    }
                }
            }
        }
    }

    /// One sweep over stale running jobs.
    pub async fn sweep_once(&self) -> Result<usize, CausewayError> {
        let cutoff = (Utc::now()
            - chrono::Duration::seconds(self.ctx.config.worker.max_turn_secs as i64))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();

        let stale = jobs::list_stale_running(&self.ctx.db, &cutoff).await?;
        let mut touched = 0;
        for job in stale {
            warn!(job_id = %job.id, started_at = ?job.started_at, "reclaiming stale running job");
            let decision = jobs::requeue_stale(
                &self.ctx.db,
                &job.id,
                "worker lost mid-turn; retrying after internal error",
            )
            .await?;
            match decision {
                RetryDecision::Retry { .. } => {
                    let mut sink =
                        TurnSink::new(self.ctx.db.clone(), self.ctx.bus.clone(), &job.turn_id);
                    sink.on_status("Retrying after internal error").await?;
                    self.ctx
                        .queue
                        .send(&JobMessage::encode(&job.id), None)
                        .await?;
                    metrics::counter!("causeway_jobs_reclaimed_total").increment(1);
                    touched += 1;
                }
                RetryDecision::Exhausted => {
                    // requeue_stale already failed the job (or it finished
                    // in the meantime); settle the turn if it is still open.
                    if let Some(turn) = turns::get_turn(&self.ctx.db, &job.turn_id).await?
                        && turn.status == TurnStatus::Processing
                    {
                        turns::update_turn_status(
                            &self.ctx.db,
                            &job.turn_id,
                            TurnStatus::Failed,
                            None,
                        )
                        .await?;
                        let steps = turns::list_steps(&self.ctx.db, &job.turn_id).await?;
                        let next_seq = steps.last().map(|s| s.sequence + 1).unwrap_or(1);
                        let channel = turn_channel(&job.turn_id);
                        self.ctx
                            .bus
                            .publish(
                                &channel,
                                Frame::error(
                                    next_seq,
                                    "the analysis failed after repeated worker losses",
                                ),
                            )
                            .await?;
                        self.ctx.bus.close(&channel).await;
                        touched += 1;
                    }
                }
            }
        }
        Ok(touched)
    }
}
