// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn and turn-step operations.
//!
//! Step sequences are assigned as `max(sequence) + 1` inside a transaction on
//! the single writer thread, which keeps them gap-free per turn regardless of
//! how many workers or API processes are running.

use causeway_core::{CausewayError, StepStatus, StepType, TurnStatus, new_id, now_iso};
use rusqlite::params;

use crate::database::{Database, map_tr_err, parse_enum};
use crate::models::{Turn, TurnStep};

const TURN_COLUMNS: &str =
    "id, session_id, user_message, final_response, status, job_id, created_at, updated_at";

fn row_to_turn(row: &rusqlite::Row<'_>) -> Result<Turn, rusqlite::Error> {
    Ok(Turn {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_message: row.get(2)?,
        final_response: row.get(3)?,
        status: parse_enum(4, row.get::<_, String>(4)?)?,
        job_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn row_to_step(row: &rusqlite::Row<'_>) -> Result<TurnStep, rusqlite::Error> {
    Ok(TurnStep {
        id: row.get(0)?,
        turn_id: row.get(1)?,
        step_type: parse_enum(2, row.get::<_, String>(2)?)?,
        tool_name: row.get(3)?,
        content: row.get(4)?,
        status: parse_enum(5, row.get::<_, String>(5)?)?,
        sequence: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Create a turn together with its first step (`status("Queued")`, sequence 1)
/// in one transaction.
pub async fn create_turn_with_first_step(
    db: &Database,
    turn: &Turn,
    first_step_content: &str,
) -> Result<(), CausewayError> {
    let turn = turn.clone();
    let content = first_step_content.to_string();
    let step_id = new_id();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO turns (id, session_id, user_message, final_response, status,
                     job_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    turn.id,
                    turn.session_id,
                    turn.user_message,
                    turn.final_response,
                    turn.status.to_string(),
                    turn.job_id,
                    turn.created_at,
                    turn.updated_at,
                ],
            )?;
            tx.execute(
                "INSERT INTO turn_steps (id, turn_id, step_type, tool_name, content, status,
                     sequence, created_at)
                 VALUES (?1, ?2, ?3, NULL, ?4, ?5, 1, ?6)",
                params![
                    step_id,
                    turn.id,
                    StepType::Status.to_string(),
                    content,
                    StepStatus::Completed.to_string(),
                    now,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a turn by id, unscoped (worker-internal use).
pub async fn get_turn(db: &Database, id: &str) -> Result<Option<Turn>, CausewayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {TURN_COLUMNS} FROM turns WHERE id = ?1"))?;
            let result = stmt.query_row(params![id], row_to_turn);
            match result {
                Ok(turn) => Ok(Some(turn)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Get a turn by id, constrained to a workspace through its session.
pub async fn get_turn_in_workspace(
    db: &Database,
    workspace_id: &str,
    id: &str,
) -> Result<Option<Turn>, CausewayError> {
    let workspace_id = workspace_id.to_string();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.session_id, t.user_message, t.final_response, t.status,
                        t.job_id, t.created_at, t.updated_at
                 FROM turns t
                 JOIN sessions s ON s.id = t.session_id
                 WHERE t.id = ?1 AND s.workspace_id = ?2",
            )?;
            let result = stmt.query_row(params![id, workspace_id], row_to_turn);
            match result {
                Ok(turn) => Ok(Some(turn)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List the turns of a session in creation order.
pub async fn list_turns(db: &Database, session_id: &str) -> Result<Vec<Turn>, CausewayError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TURN_COLUMNS} FROM turns WHERE session_id = ?1 ORDER BY created_at, id"
            ))?;
            let rows = stmt.query_map(params![session_id], row_to_turn)?;
            let mut turns = Vec::new();
            for row in rows {
                turns.push(row?);
            }
            Ok(turns)
        })
        .await
        .map_err(map_tr_err)
}

/// Link the job to its turn.
pub async fn link_job(db: &Database, turn_id: &str, job_id: &str) -> Result<(), CausewayError> {
    let turn_id = turn_id.to_string();
    let job_id = job_id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE turns SET job_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![job_id, now, turn_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Update a turn's status, optionally setting the final response.
pub async fn update_turn_status(
    db: &Database,
    turn_id: &str,
    status: TurnStatus,
    final_response: Option<&str>,
) -> Result<(), CausewayError> {
    let turn_id = turn_id.to_string();
    let final_response = final_response.map(|s| s.to_string());
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            match final_response {
                Some(response) => conn.execute(
                    "UPDATE turns SET status = ?1, final_response = ?2, updated_at = ?3
                     WHERE id = ?4",
                    params![status.to_string(), response, now, turn_id],
                )?,
                None => conn.execute(
                    "UPDATE turns SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status.to_string(), now, turn_id],
                )?,
            };
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Append a step to a turn, assigning the next sequence number.
pub async fn add_step(
    db: &Database,
    turn_id: &str,
    step_type: StepType,
    tool_name: Option<&str>,
    content: Option<&str>,
    status: StepStatus,
) -> Result<TurnStep, CausewayError> {
    let turn_id = turn_id.to_string();
    let tool_name = tool_name.map(|s| s.to_string());
    let content = content.map(|s| s.to_string());
    let id = new_id();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let sequence: u32 = tx.query_row(
                "SELECT COALESCE(MAX(sequence), 0) + 1 FROM turn_steps WHERE turn_id = ?1",
                params![turn_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO turn_steps (id, turn_id, step_type, tool_name, content, status,
                     sequence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    turn_id,
                    step_type.to_string(),
                    tool_name,
                    content,
                    status.to_string(),
                    sequence,
                    now,
                ],
            )?;
            tx.commit()?;
            Ok(TurnStep {
                id,
                turn_id,
                step_type,
                tool_name,
                content,
                status,
                sequence,
                created_at: now,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Update a step's status and optionally its content.
pub async fn update_step(
    db: &Database,
    step_id: &str,
    status: StepStatus,
    content: Option<&str>,
) -> Result<(), CausewayError> {
    let step_id = step_id.to_string();
    let content = content.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            match content {
                Some(content) => conn.execute(
                    "UPDATE turn_steps SET status = ?1, content = ?2 WHERE id = ?3",
                    params![status.to_string(), content, step_id],
                )?,
                None => conn.execute(
                    "UPDATE turn_steps SET status = ?1 WHERE id = ?2",
                    params![status.to_string(), step_id],
                )?,
            };
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All steps of a turn, ordered by sequence.
pub async fn list_steps(db: &Database, turn_id: &str) -> Result<Vec<TurnStep>, CausewayError> {
    let turn_id = turn_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, turn_id, step_type, tool_name, content, status, sequence, created_at
                 FROM turn_steps WHERE turn_id = ?1 ORDER BY sequence",
            )?;
            let rows = stmt.query_map(params![turn_id], row_to_step)?;
            let mut steps = Vec::new();
            for row in rows {
                steps.push(row?);
            }
            Ok(steps)
        })
        .await
        .map_err(map_tr_err)
}

/// Build a fresh pending turn record.
pub fn new_turn(session_id: &str, user_message: &str) -> Turn {
    let now = now_iso();
    Turn {
        id: new_id(),
        session_id: session_id.to_string(),
        user_message: user_message.to_string(),
        final_response: None,
        status: TurnStatus::Pending,
        job_id: None,
        created_at: now.clone(),
        updated_at: now,
    }
}
