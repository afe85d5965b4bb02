// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer authentication middleware.
//!
//! Identity issuance is external; the gateway verifies the bearer token
//! through the [`Identity`] seam on every request and binds the caller to
//! exactly one workspace via the `x-workspace-id` header, checked against
//! the verified access set.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use causeway_core::{AccessClaims, CausewayError, Identity};

use crate::error::ApiError;

/// Authenticated request context, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub workspace_id: String,
}

/// Shared auth state for the middleware.
#[derive(Clone)]
pub struct AuthState {
    pub identity: Arc<dyn Identity>,
}

/// Verify the bearer token and workspace binding.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| CausewayError::Authn("missing bearer token".into()))?
        .to_string();

    let claims = state.identity.verify_token(&bearer).await?;

    let workspace_id = request
        .headers()
        .get("x-workspace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CausewayError::validation("x-workspace-id", "header is required"))?
        .to_string();

    // An empty access set means the identity provider granted unrestricted
    // access (the bundled static-token deployment); otherwise the workspace
    // must be in the set.
    if !claims.workspace_ids.is_empty() && !claims.can_access(&workspace_id) {
        return Err(CausewayError::Authz(format!(
            "no access to workspace {workspace_id}"
        ))
        .into());
    }

    request.extensions_mut().insert(AuthContext {
        user_id: claims.user_id,
        workspace_id,
    });
    Ok(next.run(request).await)
}

/// Static-token identity for single-tenant deployments and tests. Grants
/// unrestricted workspace access when the token matches.
pub struct StaticIdentity {
    token: String,
}

impl StaticIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Identity for StaticIdentity {
    async fn verify_token(&self, bearer: &str) -> Result<AccessClaims, CausewayError> {
        if bearer == self.token {
            Ok(AccessClaims {
                user_id: "local-admin".into(),
                workspace_ids: Vec::new(),
            })
        } else {
            Err(CausewayError::Authn("invalid token".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_identity_accepts_matching_token() {
        let identity = StaticIdentity::new("sesame");
        let claims = identity.verify_token("sesame").await.unwrap();
        assert_eq!(claims.user_id, "local-admin");
        assert!(claims.workspace_ids.is_empty());
    }

    #[tokio::test]
    async fn static_identity_rejects_wrong_token() {
        let identity = StaticIdentity::new("sesame");
        assert!(identity.verify_token("open").await.is_err());
    }
}
