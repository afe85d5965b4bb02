// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only security event log for prompt-guard verdicts.

use causeway_core::{CausewayError, new_id, now_iso};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::SecurityEvent;

/// Record a guard verdict. The message prefix is clipped to `max_prefix`
/// characters before it touches the database.
pub async fn record_event(
    db: &Database,
    workspace_id: &str,
    event_type: &str,
    classification: &str,
    message: &str,
    reason: Option<&str>,
    max_prefix: usize,
) -> Result<SecurityEvent, CausewayError> {
    let event = SecurityEvent {
        id: new_id(),
        workspace_id: workspace_id.to_string(),
        event_type: event_type.to_string(),
        classification: classification.to_string(),
        message_prefix: message.chars().take(max_prefix).collect(),
        reason: reason.map(|r| r.to_string()),
        created_at: now_iso(),
    };
    let row = event.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO security_events (id, workspace_id, event_type, classification,
                     message_prefix, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.id,
                    row.workspace_id,
                    row.event_type,
                    row.classification,
                    row.message_prefix,
                    row.reason,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(event)
}

/// Recent events for a workspace, newest first.
pub async fn list_events(
    db: &Database,
    workspace_id: &str,
    limit: u32,
) -> Result<Vec<SecurityEvent>, CausewayError> {
    let workspace_id = workspace_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, workspace_id, event_type, classification, message_prefix, reason,
                        created_at
                 FROM security_events
                 WHERE workspace_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![workspace_id, limit], |row| {
                Ok(SecurityEvent {
                    id: row.get(0)?,
                    workspace_id: row.get(1)?,
                    event_type: row.get(2)?,
                    classification: row.get(3)?,
                    message_prefix: row.get(4)?,
                    reason: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?;
            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
        .await
        .map_err(map_tr_err)
}
