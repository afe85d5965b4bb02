// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; the [`Database`] struct IS the single writer. Query modules accept
//! `&Database` and call through `connection().call()`. Do NOT create
//! additional Connection instances for writes.

use causeway_core::CausewayError;
use tokio_rusqlite::Connection;

/// Handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run all
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, CausewayError> {
        let conn = Connection::open(path.to_owned()).await.map_err(map_tr_err)?;

        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            crate::migrations::run_migrations(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        tracing::debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Close the background connection thread.
    pub async fn close(&self) -> Result<(), CausewayError> {
        self.conn
            .clone()
            .close()
            .await
            .map_err(|e| CausewayError::Storage {
                source: Box::new(e),
            })
    }
}

/// Map a tokio-rusqlite error into the workspace error type.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> CausewayError {
    CausewayError::Storage {
        source: Box::new(e),
    }
}

/// Parse a TEXT enum column, surfacing bad values as conversion failures.
pub(crate) fn parse_enum<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
{
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid enum value: {value}").into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_core::JobStatus;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_runs_migrations() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        // All tables from the initial migration must exist.
        let count: i64 = db
            .connection()
            .call(|conn| {
                let n = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('sessions', 'turns', 'turn_steps', 'jobs', 'queue',
                                  'quota_counters', 'security_events', 'integrations',
                                  'llm_configs', 'turn_feedback', 'turn_comments',
                                  'worker_heartbeats')",
                    [],
                    |row| row.get(0),
                )?;
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(count, 12);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db1 = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db1.close().await.unwrap();
        // Re-opening must not re-run applied migrations.
        let db2 = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db2.close().await.unwrap();
    }

    #[test]
    fn parse_enum_rejects_garbage() {
        let ok: Result<JobStatus, _> = parse_enum(0, "queued".to_string());
        assert!(ok.is_ok());
        let bad: Result<JobStatus, _> = parse_enum(0, "exploded".to_string());
        assert!(bad.is_err());
    }
}
