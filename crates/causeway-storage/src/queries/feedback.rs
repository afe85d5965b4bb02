// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn feedback and comments. Feedback is unique per (turn, user) and
//! upserts; comments accumulate.

use causeway_core::{CausewayError, new_id, now_iso};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{TurnComment, TurnFeedback};

/// Submit or update a user's feedback on a turn.
pub async fn upsert_feedback(
    db: &Database,
    turn_id: &str,
    user_id: &str,
    score: i32,
) -> Result<TurnFeedback, CausewayError> {
    let turn_id = turn_id.to_string();
    let user_id = user_id.to_string();
    let id = new_id();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "INSERT INTO turn_feedback (id, turn_id, user_id, score, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT (turn_id, user_id) DO UPDATE SET
                     score = excluded.score,
                     updated_at = excluded.updated_at
                 RETURNING id, turn_id, user_id, score, created_at, updated_at",
            )?;
            let feedback = stmt.query_row(params![id, turn_id, user_id, score, now], |row| {
                Ok(TurnFeedback {
                    id: row.get(0)?,
                    turn_id: row.get(1)?,
                    user_id: row.get(2)?,
                    score: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?;
            Ok(feedback)
        })
        .await
        .map_err(map_tr_err)
}

/// All feedback on a turn, oldest first.
pub async fn list_feedback(
    db: &Database,
    turn_id: &str,
) -> Result<Vec<TurnFeedback>, CausewayError> {
    let turn_id = turn_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, turn_id, user_id, score, created_at, updated_at
                 FROM turn_feedback WHERE turn_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt.query_map(params![turn_id], |row| {
                Ok(TurnFeedback {
                    id: row.get(0)?,
                    turn_id: row.get(1)?,
                    user_id: row.get(2)?,
                    score: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?;
            let mut feedback = Vec::new();
            for row in rows {
                feedback.push(row?);
            }
            Ok(feedback)
        })
        .await
        .map_err(map_tr_err)
}

/// Add a comment to a turn.
pub async fn add_comment(
    db: &Database,
    turn_id: &str,
    user_id: &str,
    comment: &str,
) -> Result<TurnComment, CausewayError> {
    let record = TurnComment {
        id: new_id(),
        turn_id: turn_id.to_string(),
        user_id: user_id.to_string(),
        comment: comment.to_string(),
        created_at: now_iso(),
    };
    let row = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO turn_comments (id, turn_id, user_id, comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.id, row.turn_id, row.user_id, row.comment, row.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(record)
}

/// All comments on a turn, oldest first.
pub async fn list_comments(
    db: &Database,
    turn_id: &str,
) -> Result<Vec<TurnComment>, CausewayError> {
    let turn_id = turn_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, turn_id, user_id, comment, created_at
                 FROM turn_comments WHERE turn_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt.query_map(params![turn_id], |row| {
                Ok(TurnComment {
                    id: row.get(0)?,
                    turn_id: row.get(1)?,
                    user_id: row.get(2)?,
                    comment: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            let mut comments = Vec::new();
            for row in rows {
                comments.push(row?);
            }
            Ok(comments)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::sessions::{create_session, new_web_session};
    use crate::queries::turns::{create_turn_with_first_step, new_turn};
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir, String) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        let session = new_web_session("w-1", "user-1", "hello");
        create_session(&db, &session).await.unwrap();
        let turn = new_turn(&session.id, "hello");
        create_turn_with_first_step(&db, &turn, "Queued").await.unwrap();
        (db, dir, turn.id)
    }

    #[tokio::test]
    async fn feedback_upserts_per_user() {
        let (db, _dir, turn_id) = setup().await;

        let first = upsert_feedback(&db, &turn_id, "user-1", 1).await.unwrap();
        assert_eq!(first.score, 1);

        // Same user flips their vote: still one row.
        let flipped = upsert_feedback(&db, &turn_id, "user-1", -1).await.unwrap();
        assert_eq!(flipped.score, -1);
        assert_eq!(flipped.id, first.id);

        // A second user adds theirs.
        upsert_feedback(&db, &turn_id, "user-2", 1).await.unwrap();
        assert_eq!(list_feedback(&db, &turn_id).await.unwrap().len(), 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn comments_accumulate() {
        let (db, _dir, turn_id) = setup().await;
        add_comment(&db, &turn_id, "user-1", "great analysis").await.unwrap();
        add_comment(&db, &turn_id, "user-1", "root cause confirmed").await.unwrap();
        assert_eq!(list_comments(&db, &turn_id).await.unwrap().len(), 2);
        db.close().await.unwrap();
    }
}
