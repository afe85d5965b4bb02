// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The quota gate: per-workspace daily admission counting.
//!
//! Counting is an atomic bounded upsert in storage; this module adds the
//! plan lookup, the BYO bypass decision, and the `reset_at` arithmetic.

use std::sync::Arc;

use causeway_core::{CausewayError, PlanSource};
use causeway_storage::{Database, queries::quota};
use chrono::{DateTime, Duration, Utc};

/// Next UTC midnight, when daily windows roll over.
pub fn next_utc_midnight() -> DateTime<Utc> {
    let tomorrow = Utc::now().date_naive() + Duration::days(1);
    DateTime::from_naive_utc_and_offset(
        tomorrow.and_hms_opt(0, 0, 0).expect("midnight is a valid time"),
        Utc,
    )
}

/// Per-workspace daily counter for RCA admissions.
pub struct QuotaGate {
    db: Database,
    plans: Option<Arc<dyn PlanSource>>,
    default_daily_limit: i64,
}

impl QuotaGate {
    pub fn new(
        db: Database,
        plans: Option<Arc<dyn PlanSource>>,
        default_daily_limit: i64,
    ) -> Self {
        Self {
            db,
            plans,
            default_daily_limit,
        }
    }

    async fn daily_limit(&self, workspace_id: &str) -> i64 {
        match &self.plans {
            Some(plans) => match plans.limits(workspace_id).await {
                Ok(limits) => limits.daily_rca_limit,
                Err(e) => {
                    tracing::warn!(error = %e, workspace_id, "plan lookup failed, using default limit");
                    self.default_daily_limit
                }
            },
            None => self.default_daily_limit,
        }
    }

    /// Atomically consume one admission from today's window.
    ///
    /// Returns `QuotaExceeded {limit, reset_at}` when the window is full;
    /// nothing is counted in that case. Callers skip this entirely for BYO
    /// LLM workspaces.
    pub async fn admit(&self, workspace_id: &str) -> Result<(), CausewayError> {
        let limit = self.daily_limit(workspace_id).await;
        let window_key = quota::today_window_key();
        let admitted = quota::check_and_increment(
            &self.db,
            workspace_id,
            quota::RESOURCE_RCA_REQUEST,
            &window_key,
            limit,
        )
        .await?;
        match admitted {
            Some(count) => {
                tracing::debug!(workspace_id, count, limit, "rca admission counted");
                Ok(())
            }
            None => Err(CausewayError::QuotaExceeded {
                limit,
                reset_at: next_utc_midnight(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use causeway_core::PlanLimits;
    use tempfile::tempdir;

    struct FixedPlan(i64);

    #[async_trait]
    impl PlanSource for FixedPlan {
        async fn limits(&self, _workspace_id: &str) -> Result<PlanLimits, CausewayError> {
            Ok(PlanLimits {
                daily_rca_limit: self.0,
                additional_service_limit: 0,
            })
        }
    }

    #[tokio::test]
    async fn admits_until_plan_limit_then_rejects() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        let gate = QuotaGate::new(db.clone(), Some(Arc::new(FixedPlan(2))), 10);

        gate.admit("w-1").await.unwrap();
        gate.admit("w-1").await.unwrap();

        let err = gate.admit("w-1").await.unwrap_err();
        match err {
            CausewayError::QuotaExceeded { limit, reset_at } => {
                assert_eq!(limit, 2);
                assert!(reset_at > Utc::now());
            }
            other => panic!("expected quota error, got {other}"),
        }

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn default_limit_applies_without_plan_source() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        let gate = QuotaGate::new(db.clone(), None, 1);

        gate.admit("w-1").await.unwrap();
        assert!(gate.admit("w-1").await.is_err());
        // Other workspaces are unaffected.
        gate.admit("w-2").await.unwrap();

        db.close().await.unwrap();
    }

    #[test]
    fn reset_is_at_midnight_utc() {
        let reset = next_utc_midnight();
        assert!(reset > Utc::now());
        assert_eq!(reset.format("%H:%M:%S").to_string(), "00:00:00");
        assert!(reset - Utc::now() <= Duration::days(1));
    }
}
