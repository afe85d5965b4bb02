// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD, chat-thread resolution, and search.

use causeway_core::{CausewayError, SessionOrigin, new_id, now_iso};
use rusqlite::params;

use crate::database::{Database, map_tr_err, parse_enum};
use crate::models::{Session, SessionSearchHit};

const SESSION_COLUMNS: &str = "id, workspace_id, origin, user_id, external_channel_id,
     external_thread_key, title, created_at, updated_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, rusqlite::Error> {
    Ok(Session {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        origin: parse_enum(2, row.get::<_, String>(2)?)?,
        user_id: row.get(3)?,
        external_channel_id: row.get(4)?,
        external_thread_key: row.get(5)?,
        title: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Create a new session.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), CausewayError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, workspace_id, origin, user_id, external_channel_id,
                     external_thread_key, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    session.id,
                    session.workspace_id,
                    session.origin.to_string(),
                    session.user_id,
                    session.external_channel_id,
                    session.external_thread_key,
                    session.title,
                    session.created_at,
                    session.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a session by id within a workspace.
pub async fn get_session(
    db: &Database,
    workspace_id: &str,
    id: &str,
) -> Result<Option<Session>, CausewayError> {
    let workspace_id = workspace_id.to_string();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1 AND workspace_id = ?2"
            ))?;
            let result = stmt.query_row(params![id, workspace_id], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List a user's sessions in a workspace, most recently updated first.
pub async fn list_sessions(
    db: &Database,
    workspace_id: &str,
    user_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<Session>, CausewayError> {
    let workspace_id = workspace_id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE workspace_id = ?1 AND user_id = ?2
                 ORDER BY updated_at DESC, created_at DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt.query_map(params![workspace_id, user_id, limit, offset], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(map_tr_err)
}

/// Find the session bound to an external chat thread, if any.
pub async fn find_chat_session(
    db: &Database,
    workspace_id: &str,
    channel_id: &str,
    thread_key: &str,
) -> Result<Option<Session>, CausewayError> {
    let workspace_id = workspace_id.to_string();
    let channel_id = channel_id.to_string();
    let thread_key = thread_key.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE workspace_id = ?1 AND origin = ?2
                   AND external_channel_id = ?3 AND external_thread_key = ?4"
            ))?;
            let result = stmt.query_row(
                params![
                    workspace_id,
                    SessionOrigin::Chat.to_string(),
                    channel_id,
                    thread_key
                ],
                row_to_session,
            );
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Update a session's title and bump updated_at.
pub async fn update_title(
    db: &Database,
    workspace_id: &str,
    id: &str,
    title: &str,
) -> Result<bool, CausewayError> {
    let workspace_id = workspace_id.to_string();
    let id = id.to_string();
    let title = title.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET title = ?1, updated_at = ?2
                 WHERE id = ?3 AND workspace_id = ?4",
                params![title, now, id, workspace_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Bump a session's updated_at (called when a new turn arrives).
pub async fn touch_session(db: &Database, id: &str) -> Result<(), CausewayError> {
    let id = id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a session (cascades to turns, steps, feedback, comments).
pub async fn delete_session(
    db: &Database,
    workspace_id: &str,
    id: &str,
) -> Result<bool, CausewayError> {
    let workspace_id = workspace_id.to_string();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM sessions WHERE id = ?1 AND workspace_id = ?2",
                params![id, workspace_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Search a user's sessions by title and turn content.
///
/// Title matches win over message matches; one hit per session.
pub async fn search_sessions(
    db: &Database,
    workspace_id: &str,
    user_id: &str,
    query: &str,
    limit: u32,
) -> Result<Vec<SessionSearchHit>, CausewayError> {
    let trimmed = query.trim();
    if trimmed.len() < 2 {
        return Ok(Vec::new());
    }
    let pattern = format!("%{trimmed}%");
    let workspace_id = workspace_id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "WITH title_matches AS (
                     SELECT s.id AS session_id, s.title, s.title AS matched_content,
                            'title' AS match_type, s.updated_at
                     FROM sessions s
                     WHERE s.workspace_id = ?1 AND s.user_id = ?2
                       AND s.title LIKE ?3
                 ),
                 message_matches AS (
                     SELECT s.id AS session_id, s.title,
                            COALESCE(
                                CASE WHEN t.user_message LIKE ?3 THEN t.user_message END,
                                t.final_response
                            ) AS matched_content,
                            'message' AS match_type, s.updated_at
                     FROM sessions s
                     JOIN turns t ON t.session_id = s.id
                     WHERE s.workspace_id = ?1 AND s.user_id = ?2
                       AND (t.user_message LIKE ?3 OR t.final_response LIKE ?3)
                       AND s.id NOT IN (SELECT session_id FROM title_matches)
                 )
                 SELECT * FROM title_matches
                 UNION ALL
                 SELECT * FROM message_matches
                 ORDER BY updated_at DESC
                 LIMIT ?4",
            )?;
            let rows = stmt.query_map(params![workspace_id, user_id, pattern, limit], |row| {
                Ok(SessionSearchHit {
                    session_id: row.get(0)?,
                    title: row.get(1)?,
                    matched_content: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    match_type: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })?;
            let mut hits = Vec::new();
            let mut seen = std::collections::HashSet::new();
            for row in rows {
                let hit = row?;
                if seen.insert(hit.session_id.clone()) {
                    hits.push(hit);
                }
            }
            Ok(hits)
        })
        .await
        .map_err(map_tr_err)
}

/// Generate a session title from the first message.
///
/// Strips characters that could cause rendering issues downstream; the
/// frontend still sanitizes before display.
pub fn generate_title(message: &str) -> String {
    const MAX_LEN: usize = 50;
    let title: String = message
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '&'))
        .collect();
    let title = title.trim().to_string();
    if title.is_empty() {
        return "Untitled Chat".to_string();
    }
    if title.chars().count() > MAX_LEN {
        let prefix: String = title.chars().take(MAX_LEN - 3).collect();
        format!("{prefix}...")
    } else {
        title
    }
}

/// Build a fresh web session record.
pub fn new_web_session(workspace_id: &str, user_id: &str, first_message: &str) -> Session {
    let now = now_iso();
    Session {
        id: new_id(),
        workspace_id: workspace_id.to_string(),
        origin: SessionOrigin::Web,
        user_id: Some(user_id.to_string()),
        external_channel_id: None,
        external_thread_key: None,
        title: Some(generate_title(first_message)),
        created_at: now.clone(),
        updated_at: now,
    }
}
