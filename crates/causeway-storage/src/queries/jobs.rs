// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job lifecycle operations.
//!
//! The conditional `queued → running` update is the single-writer guard
//! against double execution under at-least-once delivery: whichever worker
//! wins the update owns the job, duplicates see zero affected rows and ack
//! their message as a no-op.

use causeway_core::{CausewayError, JobStatus, new_id, now_iso};
use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use crate::database::{Database, map_tr_err, parse_enum};
use crate::models::Job;

const JOB_COLUMNS: &str = "id, workspace_id, turn_id, status, retries, max_retries,
     backoff_until, priority, requested_context, started_at, finished_at, error,
     created_at, updated_at";

fn row_to_job(row: &rusqlite::Row<'_>) -> Result<Job, rusqlite::Error> {
    let context_raw: String = row.get(8)?;
    let requested_context = serde_json::from_str(&context_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Job {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        turn_id: row.get(2)?,
        status: parse_enum(3, row.get::<_, String>(3)?)?,
        retries: row.get(4)?,
        max_retries: row.get(5)?,
        backoff_until: row.get(6)?,
        priority: row.get(7)?,
        requested_context,
        started_at: row.get(9)?,
        finished_at: row.get(10)?,
        error: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// What the retry accounting decided for a failed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeued with this backoff; the caller re-enqueues the job id with a
    /// matching delivery delay.
    Retry { backoff_secs: u64 },
    /// Retry budget exhausted; the job is now failed.
    Exhausted,
}

/// Create a new job.
pub async fn create_job(db: &Database, job: &Job) -> Result<(), CausewayError> {
    let job = job.clone();
    let context = job.requested_context.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO jobs (id, workspace_id, turn_id, status, retries, max_retries,
                     backoff_until, priority, requested_context, started_at, finished_at,
                     error, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    job.id,
                    job.workspace_id,
                    job.turn_id,
                    job.status.to_string(),
                    job.retries,
                    job.max_retries,
                    job.backoff_until,
                    job.priority,
                    context,
                    job.started_at,
                    job.finished_at,
                    job.error,
                    job.created_at,
                    job.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a job by id.
pub async fn get_job(db: &Database, id: &str) -> Result<Option<Job>, CausewayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))?;
            let result = stmt.query_row(params![id], row_to_job);
            match result {
                Ok(job) => Ok(Some(job)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Atomic `queued → running` transition. Returns `false` when another worker
/// already owns the job (or it reached a terminal state).
pub async fn try_mark_running(db: &Database, id: &str) -> Result<bool, CausewayError> {
    let id = id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE jobs SET status = ?1, started_at = ?2, backoff_until = NULL,
                     updated_at = ?2
                 WHERE id = ?3 AND status = ?4",
                params![
                    JobStatus::Running.to_string(),
                    now,
                    id,
                    JobStatus::Queued.to_string()
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a running job completed.
pub async fn mark_completed(db: &Database, id: &str) -> Result<(), CausewayError> {
    let id = id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = ?1, finished_at = ?2, error = NULL, updated_at = ?2
                 WHERE id = ?3",
                params![JobStatus::Completed.to_string(), now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a job permanently failed.
pub async fn mark_failed(db: &Database, id: &str, error: &str) -> Result<(), CausewayError> {
    let id = id.to_string();
    let error = error.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = ?1, finished_at = ?2, error = ?3, updated_at = ?2
                 WHERE id = ?4",
                params![JobStatus::Failed.to_string(), now, error, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Retry accounting after a retryable failure.
///
/// Backoff is `base · 2^retries` seconds evaluated before the increment, so
/// successive retries wait 1m, 2m, 4m with the default base. At the ceiling
/// the job is failed instead.
pub async fn schedule_retry(
    db: &Database,
    id: &str,
    error: &str,
    base_backoff_secs: u64,
) -> Result<RetryDecision, CausewayError> {
    let id = id.to_string();
    let error = error.to_string();
    let now = Utc::now();
    let now_s = now_iso();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let (retries, max_retries): (i32, i32) = tx.query_row(
                "SELECT retries, max_retries FROM jobs WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            if retries >= max_retries {
                tx.execute(
                    "UPDATE jobs SET status = ?1, finished_at = ?2, error = ?3, updated_at = ?2
                     WHERE id = ?4",
                    params![JobStatus::Failed.to_string(), now_s, error, id],
                )?;
                tx.commit()?;
                return Ok(RetryDecision::Exhausted);
            }

            let backoff_secs = base_backoff_secs.saturating_mul(1u64 << retries.min(30));
            let backoff_until: DateTime<Utc> = now + Duration::seconds(backoff_secs as i64);
            let backoff_until_s = backoff_until
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string();
            let attempt_error = format!("attempt {}/{}: {error}", retries + 1, max_retries);
            tx.execute(
                "UPDATE jobs SET status = ?1, retries = retries + 1, backoff_until = ?2,
                     error = ?3, started_at = NULL, updated_at = ?4
                 WHERE id = ?5",
                params![
                    JobStatus::Queued.to_string(),
                    backoff_until_s,
                    attempt_error,
                    now_s,
                    id
                ],
            )?;
            tx.commit()?;
            Ok(RetryDecision::Retry { backoff_secs })
        })
        .await
        .map_err(map_tr_err)
}

/// Jobs stuck in `running` whose started_at is older than the cutoff.
/// The reconciler requeues or fails these.
pub async fn list_stale_running(
    db: &Database,
    started_before: &str,
) -> Result<Vec<Job>, CausewayError> {
    let cutoff = started_before.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs
                 WHERE status = ?1 AND started_at IS NOT NULL AND started_at < ?2"
            ))?;
            let rows = stmt.query_map(params![JobStatus::Running.to_string(), cutoff], row_to_job)?;
            let mut jobs = Vec::new();
            for row in rows {
                jobs.push(row?);
            }
            Ok(jobs)
        })
        .await
        .map_err(map_tr_err)
}

/// Reset a stale running job back to queued with `retries + 1`, or fail it if
/// the retry budget is spent. Conditional on the job still being `running` so
/// a worker that finishes late does not get clobbered.
pub async fn requeue_stale(db: &Database, id: &str, reason: &str) -> Result<RetryDecision, CausewayError> {
    let id = id.to_string();
    let reason = reason.to_string();
    let now_s = now_iso();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let row: Result<(i32, i32), rusqlite::Error> = tx.query_row(
                "SELECT retries, max_retries FROM jobs WHERE id = ?1 AND status = ?2",
                params![id, JobStatus::Running.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            );
            let (retries, max_retries) = match row {
                Ok(pair) => pair,
                // The job finished (or was retried) while we looked; nothing to do.
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    return Ok(RetryDecision::Exhausted);
                }
                Err(e) => return Err(e.into()),
            };

            if retries >= max_retries {
                tx.execute(
                    "UPDATE jobs SET status = ?1, finished_at = ?2, error = ?3, updated_at = ?2
                     WHERE id = ?4",
                    params![JobStatus::Failed.to_string(), now_s, reason, id],
                )?;
                tx.commit()?;
                return Ok(RetryDecision::Exhausted);
            }

            tx.execute(
                "UPDATE jobs SET status = ?1, retries = retries + 1, backoff_until = NULL,
                     started_at = NULL, error = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![JobStatus::Queued.to_string(), reason, now_s, id],
            )?;
            tx.commit()?;
            Ok(RetryDecision::Retry { backoff_secs: 0 })
        })
        .await
        .map_err(map_tr_err)
}

/// Build a fresh queued job record.
pub fn new_job(
    workspace_id: &str,
    turn_id: &str,
    requested_context: serde_json::Value,
    max_retries: i32,
) -> Job {
    let now = now_iso();
    Job {
        id: new_id(),
        workspace_id: workspace_id.to_string(),
        turn_id: turn_id.to_string(),
        status: JobStatus::Queued,
        retries: 0,
        max_retries,
        backoff_until: None,
        priority: 0,
        requested_context,
        started_at: None,
        finished_at: None,
        error: None,
        created_at: now.clone(),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_job(id: &str) -> Job {
        let mut job = new_job(
            "w-1",
            &format!("turn-{id}"),
            serde_json::json!({"query": "why is api-gw slow?", "user": "user-1"}),
            3,
        );
        job.id = id.to_string();
        job
    }

    #[tokio::test]
    async fn create_and_get_job_roundtrips() {
        let (db, _dir) = setup_db().await;
        create_job(&db, &make_job("j-1")).await.unwrap();

        let job = get_job(&db, "j-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.retries, 0);
        assert_eq!(job.requested_context["query"], "why is api-gw slow?");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn only_one_worker_wins_the_running_transition() {
        let (db, _dir) = setup_db().await;
        create_job(&db, &make_job("j-1")).await.unwrap();

        assert!(try_mark_running(&db, "j-1").await.unwrap());
        // Duplicate delivery: second claim must lose.
        assert!(!try_mark_running(&db, "j-1").await.unwrap());

        let job = get_job(&db, "j-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn completion_sets_finished_at() {
        let (db, _dir) = setup_db().await;
        create_job(&db, &make_job("j-1")).await.unwrap();
        try_mark_running(&db, "j-1").await.unwrap();
        mark_completed(&db, "j-1").await.unwrap();

        let job = get_job(&db, "j-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.finished_at.is_some());
        assert!(job.finished_at >= job.started_at);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn retry_backoff_doubles_then_exhausts() {
        let (db, _dir) = setup_db().await;
        create_job(&db, &make_job("j-1")).await.unwrap();

        let mut backoffs = Vec::new();
        for _ in 0..3 {
            try_mark_running(&db, "j-1").await.unwrap();
            match schedule_retry(&db, "j-1", "llm transient", 60).await.unwrap() {
                RetryDecision::Retry { backoff_secs } => backoffs.push(backoff_secs),
                RetryDecision::Exhausted => panic!("retry budget should not be spent yet"),
            }
        }
        assert_eq!(backoffs, vec![60, 120, 240]);

        let job = get_job(&db, "j-1").await.unwrap().unwrap();
        assert_eq!(job.retries, 3);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.backoff_until.is_some());

        // Fourth failure exceeds max_retries.
        try_mark_running(&db, "j-1").await.unwrap();
        let decision = schedule_retry(&db, "j-1", "llm transient", 60).await.unwrap();
        assert_eq!(decision, RetryDecision::Exhausted);

        let job = get_job(&db, "j-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.finished_at.is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stale_running_jobs_are_found_and_requeued() {
        let (db, _dir) = setup_db().await;
        create_job(&db, &make_job("j-1")).await.unwrap();
        try_mark_running(&db, "j-1").await.unwrap();

        // Everything started before a future cutoff is stale.
        let stale = list_stale_running(&db, "2999-01-01T00:00:00.000Z").await.unwrap();
        assert_eq!(stale.len(), 1);

        let decision = requeue_stale(&db, "j-1", "worker lost").await.unwrap();
        assert_eq!(decision, RetryDecision::Retry { backoff_secs: 0 });

        let job = get_job(&db, "j-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.retries, 1);
        assert!(job.started_at.is_none());

        // A job that is no longer running is left alone.
        mark_completed(&db, "j-1").await.unwrap();
        let decision = requeue_stale(&db, "j-1", "worker lost").await.unwrap();
        assert_eq!(decision, RetryDecision::Exhausted);
        let job = get_job(&db, "j-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn turn_id_is_unique_per_job() {
        let (db, _dir) = setup_db().await;
        create_job(&db, &make_job("j-1")).await.unwrap();
        let mut dup = make_job("j-2");
        dup.turn_id = "turn-j-1".to_string();
        assert!(create_job(&db, &dup).await.is_err(), "1:1 turn/job");
        db.close().await.unwrap();
    }
}
