// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External collaborator seams: identity verification and plan limits.
//!
//! Identity (token issuance, OAuth) and billing live outside this system;
//! the core consults them through these traits on every request.

use async_trait::async_trait;

use crate::error::CausewayError;

/// Verified caller identity and workspace access set.
#[derive(Debug, Clone)]
pub struct AccessClaims {
    pub user_id: String,
    pub workspace_ids: Vec<String>,
}

impl AccessClaims {
    pub fn can_access(&self, workspace_id: &str) -> bool {
        self.workspace_ids.iter().any(|w| w == workspace_id)
    }
}

/// Identity provider seam.
#[async_trait]
pub trait Identity: Send + Sync {
    /// Verify a bearer token. `Err(Authn)` for anything not positively
    /// verified.
    async fn verify_token(&self, bearer: &str) -> Result<AccessClaims, CausewayError>;
}

/// Plan limits for a workspace, as decided by billing.
#[derive(Debug, Clone, Copy)]
pub struct PlanLimits {
    /// Daily RCA admissions when the workspace uses the platform LLM.
    pub daily_rca_limit: i64,
    /// Additional services allowed beyond the base plan.
    pub additional_service_limit: i64,
}

/// Billing/plan seam consulted by the quota gate.
#[async_trait]
pub trait PlanSource: Send + Sync {
    async fn limits(&self, workspace_id: &str) -> Result<PlanLimits, CausewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_check_workspace_membership() {
        let claims = AccessClaims {
            user_id: "u-1".into(),
            workspace_ids: vec!["w-1".into(), "w-2".into()],
        };
        assert!(claims.can_access("w-2"));
        assert!(!claims.can_access("w-9"));
    }
}
