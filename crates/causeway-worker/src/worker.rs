// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The orchestrator worker: claims jobs, drives turns to completion,
//! publishes progress, and accounts retries.
//!
//! Safe under at-least-once delivery: a duplicate claim loses the
//! conditional `queued → running` update and acks as a no-op. The transport
//! message is acknowledged only after the terminal state (or the retry
//! record) is durably persisted.

use std::sync::Arc;
use std::time::Duration;

use causeway_agent::{EngineBudgets, ReactEngine, StepSink, build_system_prompt};
use causeway_core::{
    CausewayError, EventBus, Frame, JobStatus, QueueMessage, TurnStatus, new_id, turn_channel,
};
use causeway_storage::{
    Job,
    queries::{heartbeats, jobs, jobs::RetryDecision, turns},
};
use causeway_tools::{ToolBudgets, build_toolset};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::AppContext;
use crate::sink::TurnSink;

/// Wire payload of one queue message.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: String,
}

impl JobMessage {
    pub fn encode(job_id: &str) -> String {
        serde_json::json!({ "job_id": job_id }).to_string()
    }
}

/// One worker task: a sequential claim/execute loop.
pub struct Worker {
    ctx: AppContext,
    worker_id: String,
}

impl Worker {
    pub fn new(ctx: AppContext) -> Self {
        let worker_id = format!("worker-{}", &new_id()[..8]);
        Self { ctx, worker_id }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run until the cancellation token fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(worker_id = %self.worker_id, "worker running");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(worker_id = %self.worker_id, "shutdown signal received, stopping worker");
                    break;
                }
                processed = self.run_once() => {
                    match processed {
                        Ok(true) => {}
                        Ok(false) => {
                            // Idle queue; back off briefly before polling again.
                            tokio::time::sleep(Duration::from_millis(500)).await;
                        }
                        Err(e) => {
                            error!(worker_id = %self.worker_id, error = %e, "worker iteration failed");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            }
        }
    }

    /// Claim and fully handle one message. Returns `false` when the queue
    /// was empty.
    pub async fn run_once(&self) -> Result<bool, CausewayError> {
        heartbeats::beat(&self.ctx.db, &self.worker_id).await?;

        let visibility = Duration::from_secs(
            self.ctx
                .config
                .queue
                .visibility_timeout_secs
                .max(self.ctx.config.worker.max_turn_secs + 60),
        );
        let Some(message) = self.ctx.queue.receive(visibility).await? else {
            return Ok(false);
        };

        let job_id = match serde_json::from_str::<JobMessage>(&message.payload) {
            Ok(parsed) => parsed.job_id,
            Err(e) => {
                error!(error = %e, payload = %message.payload, "dropping unparseable queue message");
                self.ctx.queue.delete(&message.receipt).await?;
                return Ok(true);
            }
        };

        let Some(job) = jobs::get_job(&self.ctx.db, &job_id).await? else {
            error!(job_id, "job not found for queue message, dropping");
            self.ctx.queue.delete(&message.receipt).await?;
            return Ok(true);
        };

        // Duplicate delivery of an already-handled job: ack as a no-op.
        if job.status != JobStatus::Queued {
            debug!(job_id, status = %job.status, "job not queued, acking duplicate delivery");
            self.ctx.queue.delete(&message.receipt).await?;
            return Ok(true);
        }

        // Still backing off: release the message until the backoff lapses.
        if let Some(backoff_until) = parse_iso(&job.backoff_until) {
            let now = Utc::now();
            if backoff_until > now {
                let remaining = (backoff_until - now)
                    .to_std()
                    .unwrap_or_default()
                    .min(Duration::from_secs(self.ctx.config.queue.max_delay_secs));
                debug!(job_id, ?remaining, "job in backoff, releasing message");
                self.ctx
                    .queue
                    .change_visibility(&message.receipt, remaining)
                    .await?;
                return Ok(true);
            }
        }

        // Single-writer guard: whoever wins this update owns the job.
        if !jobs::try_mark_running(&self.ctx.db, &job_id).await? {
            debug!(job_id, "lost the running transition, acking");
            self.ctx.queue.delete(&message.receipt).await?;
            return Ok(true);
        }

        metrics::counter!("causeway_jobs_claimed_total").increment(1);
        info!(job_id, turn_id = %job.turn_id, worker_id = %self.worker_id, "job claimed");

        turns::update_turn_status(&self.ctx.db, &job.turn_id, TurnStatus::Processing, None).await?;

        let started = std::time::Instant::now();
        let outcome = self.execute(&job).await;
        self.finalize(&job, outcome, &message).await?;
        metrics::histogram!("causeway_turn_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(true)
    }

    /// Run the investigation for one claimed job.
    async fn execute(&self, job: &Job) -> Result<String, CausewayError> {
        let mut sink = TurnSink::new(self.ctx.db.clone(), self.ctx.bus.clone(), &job.turn_id);
        sink.on_status("Starting analysis").await?;

        let query = job.requested_context["query"]
            .as_str()
            .ok_or_else(|| CausewayError::Internal("job context has no query".into()))?
            .to_string();
        let hints = job.requested_context["hints"].as_str().map(str::to_string);

        let model = self.ctx.llm.resolve_model(&job.workspace_id).await?;
        let tools = build_toolset(
            self.ctx.adapters.clone(),
            &job.workspace_id,
            ToolBudgets {
                timeout: Duration::from_secs(self.ctx.config.agent.tool_timeout_secs),
                max_observation_bytes: self.ctx.config.agent.max_observation_bytes,
            },
        )
        .await?;
        if tools.is_empty() {
            warn!(
                workspace_id = %job.workspace_id,
                "no healthy integrations; the agent will answer without tools"
            );
        }

        let engine = ReactEngine::new(
            model,
            Arc::new(tools),
            EngineBudgets {
                max_steps: self.ctx.config.agent.max_steps,
                wall_time: Duration::from_secs(self.ctx.config.worker.max_turn_secs),
                temperature: self.ctx.config.agent.temperature,
                max_tokens: self.ctx.config.agent.max_tokens,
            },
        );

        // Hard stop above the engine's own wall clock, so a wedged provider
        // call cannot pin the worker past its visibility window.
        let hard_stop = Duration::from_secs(self.ctx.config.worker.max_turn_secs + 30);
        let system_prompt = build_system_prompt(hints.as_deref());
        match tokio::time::timeout(hard_stop, engine.run(&system_prompt, &query, &mut sink)).await
        {
            Err(_) => Err(CausewayError::Timeout {
                duration: hard_stop,
            }),
            Ok(result) => result,
        }
    }

    /// Persist the terminal state (or the retry) and ack the message.
    async fn finalize(
        &self,
        job: &Job,
        outcome: Result<String, CausewayError>,
        message: &QueueMessage,
    ) -> Result<(), CausewayError> {
        let channel = turn_channel(&job.turn_id);
        match outcome {
            Ok(final_response) => {
                let mut sink =
                    TurnSink::new(self.ctx.db.clone(), self.ctx.bus.clone(), &job.turn_id);
                let last_seq = sink.on_status("Analysis complete").await?;
                turns::update_turn_status(
                    &self.ctx.db,
                    &job.turn_id,
                    TurnStatus::Completed,
                    Some(&final_response),
                )
                .await?;
                jobs::mark_completed(&self.ctx.db, &job.id).await?;
                self.ctx
                    .bus
                    .publish(&channel, Frame::complete(last_seq + 1, final_response))
                    .await?;
                self.ctx.bus.close(&channel).await;
                self.ctx.queue.delete(&message.receipt).await?;
                metrics::counter!("causeway_jobs_completed_total").increment(1);
                info!(job_id = %job.id, "job completed");
                Ok(())
            }
            Err(e) if e.is_retryable() => {
                warn!(job_id = %job.id, error = %e, "retryable failure");
                let decision = jobs::schedule_retry(
                    &self.ctx.db,
                    &job.id,
                    &e.to_string(),
                    self.ctx.config.worker.retry_base_backoff_secs,
                )
                .await?;
                match decision {
                    RetryDecision::Retry { backoff_secs } => {
                        // Nothing terminal is published; subscribers keep
                        // waiting across the retry.
                        self.ctx
                            .queue
                            .send(
                                &JobMessage::encode(&job.id),
                                Some(Duration::from_secs(backoff_secs)),
                            )
                            .await?;
                        self.ctx.queue.delete(&message.receipt).await?;
                        metrics::counter!("causeway_jobs_retried_total").increment(1);
                        info!(job_id = %job.id, backoff_secs, "job requeued with backoff");
                        Ok(())
                    }
                    RetryDecision::Exhausted => {
                        self.fail_terminally(job, &e, message).await
                    }
                }
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "non-retryable failure");
                jobs::mark_failed(&self.ctx.db, &job.id, &e.to_string()).await?;
                self.fail_terminally(job, &e, message).await
            }
        }
    }

    async fn fail_terminally(
        &self,
        job: &Job,
        error: &CausewayError,
        message: &QueueMessage,
    ) -> Result<(), CausewayError> {
        let channel = turn_channel(&job.turn_id);
        let public = user_facing_error(error);
        let mut sink = TurnSink::new(self.ctx.db.clone(), self.ctx.bus.clone(), &job.turn_id);
        let last_seq = sink
            .on_status(&format!("Analysis failed: {public}"))
            .await?;
        turns::update_turn_status(&self.ctx.db, &job.turn_id, TurnStatus::Failed, None).await?;
        self.ctx
            .bus
            .publish(&channel, Frame::error(last_seq + 1, public))
            .await?;
        self.ctx.bus.close(&channel).await;
        self.ctx.queue.delete(&message.receipt).await?;
        metrics::counter!("causeway_jobs_failed_total").increment(1);
        Ok(())
    }
}

/// Message shown to the user when a turn fails permanently.
fn user_facing_error(error: &CausewayError) -> String {
    match error {
        CausewayError::Timeout { .. } | CausewayError::LlmTransient { .. } => {
            "the analysis timed out after several attempts; please try again".to_string()
        }
        CausewayError::LlmProtocol(_) => {
            "the language model did not produce a usable answer".to_string()
        }
        CausewayError::Config(message) => message.clone(),
        _ => "the analysis failed unexpectedly".to_string(),
    }
}

fn parse_iso(value: &Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_message_round_trips() {
        let encoded = JobMessage::encode("j-1");
        let decoded: JobMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.job_id, "j-1");
    }

    #[test]
    fn iso_parsing_tolerates_absence_and_garbage() {
        assert!(parse_iso(&None).is_none());
        assert!(parse_iso(&Some("not a date".into())).is_none());
        let parsed = parse_iso(&Some("2026-08-02T10:00:00.000Z".into())).unwrap();
        assert_eq!(parsed.format("%H").to_string(), "10");
    }

    #[test]
    fn user_facing_errors_hide_internals() {
        let internal = CausewayError::Internal("sqlite row missing".into());
        assert_eq!(user_facing_error(&internal), "the analysis failed unexpectedly");
        let timeout = CausewayError::Timeout {
            duration: Duration::from_secs(150),
        };
        assert!(user_facing_error(&timeout).contains("timed out"));
    }
}
