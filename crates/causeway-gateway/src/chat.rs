// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The admission path: one user message becomes a durable turn and job.
//!
//! Order matters and is fixed: guard, quota, backpressure, session, turn
//! (with its `Queued` step), job, enqueue. Nothing durable exists until the
//! gates have passed; an enqueue failure after the writes marks the turn
//! failed rather than leaving it stranded.

use std::time::Duration;

use causeway_core::{CausewayError, LlmProvider, TurnStatus};
use causeway_guard::Verdict;
use causeway_storage::queries::{jobs, security, sessions, turns};
use causeway_worker::JobMessage;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Maximum user message length, in characters.
const MAX_MESSAGE_CHARS: usize = 10_000;

/// Result of a successful admission.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub turn_id: String,
    pub session_id: String,
}

/// Admit one user message: gates, durable records, enqueue.
pub async fn send_message(
    state: &GatewayState,
    workspace_id: &str,
    user_id: &str,
    message: &str,
    session_id: Option<&str>,
) -> Result<Admitted, ApiError> {
    let char_count = message.chars().count();
    if char_count == 0 {
        return Err(CausewayError::validation("message", "must not be empty").into());
    }
    if char_count > MAX_MESSAGE_CHARS {
        return Err(CausewayError::validation(
            "message",
            format!("must be at most {MAX_MESSAGE_CHARS} characters"),
        )
        .into());
    }

    // A provided session must already belong to this workspace and user.
    let existing_session = match session_id {
        Some(session_id) => {
            let session = sessions::get_session(&state.ctx.db, workspace_id, session_id)
                .await?
                .filter(|s| s.user_id.as_deref() == Some(user_id))
                .ok_or(CausewayError::NotFound {
                    resource: "session",
                    id: session_id.to_string(),
                })?;
            Some(session)
        }
        None => None,
    };

    // Gate 1: prompt guard. Fail-open on degraded is explicit and audited.
    let verdict = state.guard.classify(message).await;
    match &verdict {
        Verdict::Allow => {}
        Verdict::Block { reason } => {
            security::record_event(
                &state.ctx.db,
                workspace_id,
                "prompt_guard",
                verdict.classification(),
                message,
                Some(reason),
                state.ctx.config.guard.max_prefix_chars,
            )
            .await?;
            metrics::counter!("causeway_guard_blocked_total").increment(1);
            return Err(CausewayError::PolicyViolation {
                reason: reason.clone(),
            }
            .into());
        }
        Verdict::Degraded { reason } => {
            security::record_event(
                &state.ctx.db,
                workspace_id,
                "prompt_guard",
                verdict.classification(),
                message,
                Some(reason),
                state.ctx.config.guard.max_prefix_chars,
            )
            .await?;
            if state.ctx.config.guard.fail_closed {
                warn!(workspace_id, reason, "guard degraded, failing closed");
                return Err(CausewayError::PolicyViolation {
                    reason: "security guard unavailable".into(),
                }
                .into());
            }
            warn!(workspace_id, reason, "guard degraded, admitting (fail-open)");
        }
    }

    // Gate 2: quota, skipped for BYO LLM workspaces -- but a BYO config
    // whose last health check failed fails admission here, before any
    // durable state exists.
    let provider = state.ctx.llm.provider_for(workspace_id).await?;
    if provider == LlmProvider::Platform {
        state.quota.admit(workspace_id).await?;
    } else if state.ctx.llm.config_health(workspace_id).await?
        == Some(causeway_core::HealthState::Failed)
    {
        return Err(CausewayError::Config(
            "the workspace LLM configuration is unhealthy; fix it and retry".into(),
        )
        .into());
    }

    // Gate 3: backpressure on queue depth.
    let depth = state.ctx.queue.depth().await?;
    if depth > state.ctx.config.queue.depth_limit {
        return Err(ApiError::Capacity { depth });
    }

    // Create or reuse the session.
    let session = match existing_session {
        Some(session) => {
            sessions::touch_session(&state.ctx.db, &session.id).await?;
            session
        }
        None => {
            let session = sessions::new_web_session(workspace_id, user_id, message);
            sessions::create_session(&state.ctx.db, &session).await?;
            session
        }
    };

    // Durable turn with its first step, then the job, then the link.
    let turn = turns::new_turn(&session.id, message);
    turns::create_turn_with_first_step(&state.ctx.db, &turn, "Queued").await?;

    let job = jobs::new_job(
        workspace_id,
        &turn.id,
        serde_json::json!({
            "query": message,
            "user": user_id,
            "hints": serde_json::Value::Null,
        }),
        state.ctx.config.worker.max_retries,
    );
    jobs::create_job(&state.ctx.db, &job).await?;
    turns::link_job(&state.ctx.db, &turn.id, &job.id).await?;

    // Enqueue, retrying once before giving up on the turn.
    let payload = JobMessage::encode(&job.id);
    let mut enqueued = state.ctx.queue.send(&payload, None).await;
    if enqueued.is_err() {
        tokio::time::sleep(Duration::from_millis(200)).await;
        enqueued = state.ctx.queue.send(&payload, None).await;
    }
    if let Err(e) = enqueued {
        warn!(job_id = %job.id, error = %e, "enqueue failed twice, failing the turn");
        turns::update_turn_status(&state.ctx.db, &turn.id, TurnStatus::Failed, None).await?;
        jobs::mark_failed(&state.ctx.db, &job.id, "enqueue failed").await?;
        return Err(CausewayError::TransportUnavailable {
            message: "enqueue failed".into(),
            source: Some(Box::new(e)),
        }
        .into());
    }

    metrics::counter!("causeway_admissions_total").increment(1);
    info!(
        workspace_id,
        turn_id = %turn.id,
        session_id = %session.id,
        job_id = %job.id,
        "message admitted"
    );

    Ok(Admitted {
        turn_id: turn.id,
        session_id: session.id,
    })
}
