// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for crash-safe job delivery.
//!
//! Entries become visible at `available_at` (send delay) and are hidden for
//! the visibility window once claimed (`locked_until`). A claim assigns a
//! fresh receipt; acknowledgement and visibility changes require the current
//! receipt, so a message redelivered after a lapsed lock cannot be acked by
//! the worker that lost it.

use causeway_core::{CausewayError, new_id, now_iso};
use chrono::{Duration, Utc};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::QueueEntry;

/// ISO timestamp `secs` seconds from now.
pub(crate) fn iso_in(secs: u64) -> String {
    (Utc::now() + Duration::seconds(secs as i64))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Enqueue a payload, optionally delayed. Returns the entry id.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: &str,
    delay_secs: Option<u64>,
) -> Result<i64, CausewayError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    let available_at = iso_in(delay_secs.unwrap_or(0));
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, payload, available_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![queue_name, payload, available_at, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the next visible entry from the named queue.
///
/// Atomically selects the oldest entry that is available and unlocked (or
/// whose lock lapsed) and hides it for `visibility_secs`, assigning a fresh
/// receipt. Returns `None` when nothing is deliverable.
pub async fn receive(
    db: &Database,
    queue_name: &str,
    visibility_secs: u64,
) -> Result<Option<QueueEntry>, CausewayError> {
    let queue_name = queue_name.to_string();
    let now = now_iso();
    let locked_until = iso_in(visibility_secs);
    let receipt = new_id();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(
                    "SELECT id, queue_name, payload, receipt, available_at, locked_until,
                            created_at, updated_at
                     FROM queue
                     WHERE queue_name = ?1
                       AND available_at <= ?2
                       AND (locked_until IS NULL OR locked_until <= ?2)
                     ORDER BY id ASC
                     LIMIT 1",
                )?;
                stmt.query_row(params![queue_name, now], |row| {
                    Ok(QueueEntry {
                        id: row.get(0)?,
                        queue_name: row.get(1)?,
                        payload: row.get(2)?,
                        receipt: row.get(3)?,
                        available_at: row.get(4)?,
                        locked_until: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                })
            };

            match result {
                Ok(entry) => {
                    tx.execute(
                        "UPDATE queue SET receipt = ?1, locked_until = ?2, updated_at = ?3
                         WHERE id = ?4",
                        params![receipt, locked_until, now, entry.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(QueueEntry {
                        receipt: Some(receipt),
                        locked_until: Some(locked_until),
                        ..entry
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Acknowledge a claimed entry by receipt. Stale receipts are a no-op.
pub async fn ack(db: &Database, receipt: &str) -> Result<bool, CausewayError> {
    let receipt = receipt.to_string();
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute("DELETE FROM queue WHERE receipt = ?1", params![receipt])?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Reset the remaining visibility of a claimed entry.
pub async fn extend_visibility(
    db: &Database,
    receipt: &str,
    remaining_secs: u64,
) -> Result<bool, CausewayError> {
    let receipt = receipt.to_string();
    let locked_until = iso_in(remaining_secs);
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE queue SET locked_until = ?1, updated_at = ?2 WHERE receipt = ?3",
                params![locked_until, now, receipt],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of entries not currently claimed (visible or delayed).
pub async fn depth(db: &Database, queue_name: &str) -> Result<u64, CausewayError> {
    let queue_name = queue_name.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM queue
                 WHERE queue_name = ?1 AND (locked_until IS NULL OR locked_until <= ?2)",
                params![queue_name, now],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
        .map_err(map_tr_err)
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

    #[tokio::test]
    async fn enqueue_receive_ack_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "rca_jobs", r#"{"job_id":"j-1"}"#, None).await.unwrap();
        assert!(id > 0);

        let entry = receive(&db, "rca_jobs", 180).await.unwrap().unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.payload, r#"{"job_id":"j-1"}"#);
        let receipt = entry.receipt.clone().unwrap();

        // Claimed entry is hidden.
        assert!(receive(&db, "rca_jobs", 180).await.unwrap().is_none());

        assert!(ack(&db, &receipt).await.unwrap());
        // Second ack with the same receipt is a no-op.
        assert!(!ack(&db, &receipt).await.unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delivery_is_fifo() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, "rca_jobs", "first", None).await.unwrap();
        enqueue(&db, "rca_jobs", "second", None).await.unwrap();

        let a = receive(&db, "rca_jobs", 60).await.unwrap().unwrap();
        let b = receive(&db, "rca_jobs", 60).await.unwrap().unwrap();
        assert_eq!(a.payload, "first");
        assert_eq!(b.payload, "second");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delayed_entries_are_invisible_until_due() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, "rca_jobs", "later", Some(3600)).await.unwrap();

        assert!(receive(&db, "rca_jobs", 60).await.unwrap().is_none());
        assert_eq!(depth(&db, "rca_jobs").await.unwrap(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn lapsed_lock_allows_redelivery_with_new_receipt() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, "rca_jobs", "crashy", None).await.unwrap();

        // Claim with zero visibility: lock lapses immediately.
        let first = receive(&db, "rca_jobs", 0).await.unwrap().unwrap();
        let stale_receipt = first.receipt.unwrap();

        let second = receive(&db, "rca_jobs", 60).await.unwrap().unwrap();
        let fresh_receipt = second.receipt.unwrap();
        assert_ne!(stale_receipt, fresh_receipt);

        // The crashed worker's receipt no longer acks anything.
        assert!(!ack(&db, &stale_receipt).await.unwrap());
        assert!(ack(&db, &fresh_receipt).await.unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn extend_visibility_requires_live_receipt() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, "rca_jobs", "x", None).await.unwrap();
        let entry = receive(&db, "rca_jobs", 60).await.unwrap().unwrap();
        let receipt = entry.receipt.unwrap();

        assert!(extend_visibility(&db, &receipt, 300).await.unwrap());
        assert!(!extend_visibility(&db, "bogus-receipt", 300).await.unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn depth_excludes_claimed_entries() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, "rca_jobs", "a", None).await.unwrap();
        enqueue(&db, "rca_jobs", "b", None).await.unwrap();
        assert_eq!(depth(&db, "rca_jobs").await.unwrap(), 2);

        receive(&db, "rca_jobs", 60).await.unwrap().unwrap();
        assert_eq!(depth(&db, "rca_jobs").await.unwrap(), 1);

        db.close().await.unwrap();
    }
}
