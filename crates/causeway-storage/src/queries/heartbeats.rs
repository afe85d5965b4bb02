// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker heartbeats behind the health report.

use causeway_core::{CausewayError, now_iso};
use chrono::{Duration, Utc};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Record that a worker is alive.
pub async fn beat(db: &Database, worker_id: &str) -> Result<(), CausewayError> {
    let worker_id = worker_id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO worker_heartbeats (worker_id, seen_at) VALUES (?1, ?2)
                 ON CONFLICT (worker_id) DO UPDATE SET seen_at = excluded.seen_at",
                params![worker_id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Number of distinct workers seen within the last `window_secs`.
pub async fn workers_seen_since(db: &Database, window_secs: u64) -> Result<u64, CausewayError> {
    let cutoff = (Utc::now() - Duration::seconds(window_secs as i64))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM worker_heartbeats WHERE seen_at >= ?1",
                params![cutoff],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
        .map_err(map_tr_err)
}
