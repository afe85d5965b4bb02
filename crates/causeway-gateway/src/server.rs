// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Public routes (/health, /metrics) are unauthenticated for probes and
//! scrapers; everything else sits behind the bearer middleware.

use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
};
use causeway_core::{CausewayError, Identity};
use causeway_guard::{PromptGuard, QuotaGate};
use causeway_worker::AppContext;
use tower_http::cors::CorsLayer;

use crate::auth::{AuthState, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub ctx: AppContext,
    pub guard: Arc<PromptGuard>,
    pub quota: Arc<QuotaGate>,
    pub identity: Arc<dyn Identity>,
    /// Optional Prometheus render function for /metrics.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Build the gateway router.
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = AuthState {
        identity: state.identity.clone(),
    };

    // Unauthenticated routes for probes and Prometheus.
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/chat", post(handlers::post_chat))
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/search", get(handlers::search_sessions))
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/sessions/{id}", patch(handlers::update_session))
        .route("/sessions/{id}", delete(handlers::delete_session))
        .route("/turns/{id}", get(handlers::get_turn))
        .route("/turns/{id}/stream", get(handlers::stream_turn))
        .route("/turns/{id}/feedback", post(handlers::post_feedback))
        .route("/turns/{id}/comments", post(handlers::post_comment))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the process ends.
pub async fn start_server(
    host: &str,
    port: u16,
    state: GatewayState,
) -> Result<(), CausewayError> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| CausewayError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| CausewayError::Internal(format!("gateway server error: {e}")))
}
