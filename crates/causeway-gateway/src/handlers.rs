// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use causeway_core::CausewayError;
use causeway_storage::queries::{feedback, heartbeats, queue, sessions, turns};
use causeway_storage::{Session, SessionSearchHit, Turn, TurnComment, TurnFeedback, TurnStep};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auth::AuthContext;
use crate::chat;
use crate::error::ApiError;
use crate::server::GatewayState;
use crate::stream::turn_frame_stream;

const MAX_SESSION_PAGE: u32 = 250;
const MAX_COMMENT_CHARS: usize = 1000;

// --- Chat ---

/// Request body for POST /chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response body for POST /chat: the ids, not the answer.
#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    pub turn_id: String,
    pub session_id: String,
}

/// POST /chat
pub async fn post_chat(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    let admitted = chat::send_message(
        &state,
        &auth.workspace_id,
        &auth.user_id,
        &body.message,
        body.session_id.as_deref(),
    )
    .await?;
    Ok(Json(ChatResponseBody {
        turn_id: admitted.turn_id,
        session_id: admitted.session_id,
    }))
}

// --- Streaming ---

/// GET /turns/{id}/stream
///
/// Long-lived SSE response: full ordered replay of persisted steps fused
/// with live frames, exactly one terminal frame, keep-alive every 15s.
pub async fn stream_turn(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthContext>,
    Path(turn_id): Path<String>,
) -> Result<Response, ApiError> {
    let frames = turn_frame_stream(&state, &auth.workspace_id, &turn_id).await?;
    let events = frames.map(|frame| {
        let data = serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string());
        Ok::<Event, std::convert::Infallible>(Event::default().event(frame.event_name()).data(data))
    });
    Ok(Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response())
}

// --- Turns ---

/// Response body for GET /turns/{id}.
#[derive(Debug, Serialize)]
pub struct TurnView {
    #[serde(flatten)]
    pub turn: Turn,
    pub steps: Vec<TurnStep>,
}

/// GET /turns/{id}
pub async fn get_turn(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthContext>,
    Path(turn_id): Path<String>,
) -> Result<Json<TurnView>, ApiError> {
    let turn = turns::get_turn_in_workspace(&state.ctx.db, &auth.workspace_id, &turn_id)
        .await?
        .ok_or(CausewayError::NotFound {
            resource: "turn",
            id: turn_id.clone(),
        })?;
    let steps = turns::list_steps(&state.ctx.db, &turn_id).await?;
    Ok(Json(TurnView { turn, steps }))
}

/// Request body for POST /turns/{id}/feedback.
#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    pub score: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

/// POST /turns/{id}/feedback
pub async fn post_feedback(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthContext>,
    Path(turn_id): Path<String>,
    Json(body): Json<FeedbackBody>,
) -> Result<Json<TurnFeedback>, ApiError> {
    if body.score != 1 && body.score != -1 {
        return Err(CausewayError::validation("score", "must be -1 or +1").into());
    }
    if let Some(comment) = &body.comment
        && comment.chars().count() > MAX_COMMENT_CHARS
    {
        return Err(CausewayError::validation(
            "comment",
            format!("must be at most {MAX_COMMENT_CHARS} characters"),
        )
        .into());
    }

    // The turn must exist in the caller's workspace.
    turns::get_turn_in_workspace(&state.ctx.db, &auth.workspace_id, &turn_id)
        .await?
        .ok_or(CausewayError::NotFound {
            resource: "turn",
            id: turn_id.clone(),
        })?;

    let record =
        feedback::upsert_feedback(&state.ctx.db, &turn_id, &auth.user_id, body.score).await?;
    if let Some(comment) = body.comment.filter(|c| !c.trim().is_empty()) {
        feedback::add_comment(&state.ctx.db, &turn_id, &auth.user_id, comment.trim()).await?;
    }
    Ok(Json(record))
}

/// Request body for POST /turns/{id}/comments.
#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub comment: String,
}

/// POST /turns/{id}/comments
pub async fn post_comment(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthContext>,
    Path(turn_id): Path<String>,
    Json(body): Json<CommentBody>,
) -> Result<Json<TurnComment>, ApiError> {
    let comment = body.comment.trim();
    if comment.is_empty() || comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(CausewayError::validation(
            "comment",
            format!("must be 1..{MAX_COMMENT_CHARS} characters"),
        )
        .into());
    }
    turns::get_turn_in_workspace(&state.ctx.db, &auth.workspace_id, &turn_id)
        .await?
        .ok_or(CausewayError::NotFound {
            resource: "turn",
            id: turn_id.clone(),
        })?;
    let record = feedback::add_comment(&state.ctx.db, &turn_id, &auth.user_id, comment).await?;
    Ok(Json(record))
}

// --- Sessions ---

/// Query parameters for GET /sessions.
#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

/// GET /sessions
pub async fn list_sessions(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let limit = query.limit.clamp(1, MAX_SESSION_PAGE);
    let records = sessions::list_sessions(
        &state.ctx.db,
        &auth.workspace_id,
        &auth.user_id,
        limit,
        query.offset,
    )
    .await?;
    Ok(Json(records))
}

/// Query parameters for GET /sessions/search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

fn default_search_limit() -> u32 {
    20
}

/// GET /sessions/search
pub async fn search_sessions(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SessionSearchHit>>, ApiError> {
    let hits = sessions::search_sessions(
        &state.ctx.db,
        &auth.workspace_id,
        &auth.user_id,
        &query.q,
        query.limit.clamp(1, 100),
    )
    .await?;
    Ok(Json(hits))
}

/// Response body for GET /sessions/{id}.
#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    pub turns: Vec<Turn>,
}

/// GET /sessions/{id}
pub async fn get_session(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthContext>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let session = sessions::get_session(&state.ctx.db, &auth.workspace_id, &session_id)
        .await?
        .ok_or(CausewayError::NotFound {
            resource: "session",
            id: session_id.clone(),
        })?;
    let turns = turns::list_turns(&state.ctx.db, &session_id).await?;
    Ok(Json(SessionView { session, turns }))
}

/// Request body for PATCH /sessions/{id}.
#[derive(Debug, Deserialize)]
pub struct UpdateSessionBody {
    pub title: String,
}

/// PATCH /sessions/{id}
pub async fn update_session(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthContext>,
    Path(session_id): Path<String>,
    Json(body): Json<UpdateSessionBody>,
) -> Result<StatusCode, ApiError> {
    let title = body.title.trim();
    if title.is_empty() || title.chars().count() > 200 {
        return Err(CausewayError::validation("title", "must be 1..200 characters").into());
    }
    let updated =
        sessions::update_title(&state.ctx.db, &auth.workspace_id, &session_id, title).await?;
    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CausewayError::NotFound {
            resource: "session",
            id: session_id,
        }
        .into())
    }
}

/// DELETE /sessions/{id}
pub async fn delete_session(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthContext>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted =
        sessions::delete_session(&state.ctx.db, &auth.workspace_id, &session_id).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CausewayError::NotFound {
            resource: "session",
            id: session_id,
        }
        .into())
    }
}

// --- Operational surface (unauthenticated) ---

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub db: &'static str,
    pub queue: &'static str,
    pub bus: &'static str,
    pub workers_seen_last_60s: u64,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let db_ok = queue::depth(&state.ctx.db, causeway_storage::RCA_JOB_QUEUE)
        .await
        .is_ok();
    let queue_ok = state.ctx.queue.depth().await.is_ok();
    let workers = heartbeats::workers_seen_since(&state.ctx.db, 60)
        .await
        .unwrap_or(0);

    let body = HealthBody {
        db: if db_ok { "ok" } else { "fail" },
        queue: if queue_ok { "ok" } else { "fail" },
        // The in-process bus has no failure mode beyond the process itself.
        bus: "ok",
        workers_seen_last_60s: workers,
    };
    let status = if db_ok && queue_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.prometheus_render {
        Some(render) => (StatusCode::OK, render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_body_deserializes() {
        let body: ChatRequestBody =
            serde_json::from_str(r#"{"message": "why is api-gw slow?"}"#).unwrap();
        assert_eq!(body.message, "why is api-gw slow?");
        assert!(body.session_id.is_none());
    }

    #[test]
    fn list_query_defaults() {
        let query: ListSessionsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn health_body_serializes() {
        let body = HealthBody {
            db: "ok",
            queue: "ok",
            bus: "ok",
            workers_seen_last_60s: 3,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"workers_seen_last_60s\":3"));
    }
}
