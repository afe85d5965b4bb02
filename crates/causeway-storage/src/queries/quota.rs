// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quota counter operations.
//!
//! The bounded upsert-increment is the whole concurrency story: the single
//! writer serializes all attempts, and the conditional `DO UPDATE ... WHERE
//! count < limit` makes check-and-increment one atomic statement. Windows
//! reset implicitly as the window key rolls over; old rows are inert.

use causeway_core::CausewayError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Resource name for RCA admissions.
pub const RESOURCE_RCA_REQUEST: &str = "rca_request";

/// UTC day stamp used as the quota window key.
pub fn today_window_key() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Atomically increment the counter iff it is below `limit`.
///
/// Returns the new count on success, or `None` when the window is already at
/// the limit (nothing is modified in that case).
pub async fn check_and_increment(
    db: &Database,
    workspace_id: &str,
    resource: &str,
    window_key: &str,
    limit: i64,
) -> Result<Option<i64>, CausewayError> {
    if limit <= 0 {
        return Ok(None);
    }
    let workspace_id = workspace_id.to_string();
    let resource = resource.to_string();
    let window_key = window_key.to_string();
    db.connection()
        .call(move |conn| {
            let result: Result<i64, rusqlite::Error> = conn.query_row(
                "INSERT INTO quota_counters (workspace_id, resource, window_key, count)
                 VALUES (?1, ?2, ?3, 1)
                 ON CONFLICT (workspace_id, resource, window_key)
                     DO UPDATE SET count = count + 1 WHERE count < ?4
                 RETURNING count",
                params![workspace_id, resource, window_key, limit],
                |row| row.get(0),
            );
            match result {
                Ok(count) => Ok(Some(count)),
                // The conditional update matched nothing: window is full.
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Current count for a window (0 when no row exists).
pub async fn current_count(
    db: &Database,
    workspace_id: &str,
    resource: &str,
    window_key: &str,
) -> Result<i64, CausewayError> {
    let workspace_id = workspace_id.to_string();
    let resource = resource.to_string();
    let window_key = window_key.to_string();
    db.connection()
        .call(move |conn| {
            let result: Result<i64, rusqlite::Error> = conn.query_row(
                "SELECT count FROM quota_counters
                 WHERE workspace_id = ?1 AND resource = ?2 AND window_key = ?3",
                params![workspace_id, resource, window_key],
                |row| row.get(0),
            );
            match result {
                Ok(count) => Ok(count),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Seed a counter to an absolute value (test and admin use).
pub async fn set_count(
    db: &Database,
    workspace_id: &str,
    resource: &str,
    window_key: &str,
    count: i64,
) -> Result<(), CausewayError> {
    let workspace_id = workspace_id.to_string();
    let resource = resource.to_string();
    let window_key = window_key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO quota_counters (workspace_id, resource, window_key, count)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (workspace_id, resource, window_key) DO UPDATE SET count = ?4",
                params![workspace_id, resource, window_key, count],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
