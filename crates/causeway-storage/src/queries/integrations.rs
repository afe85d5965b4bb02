// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration credential records.
//!
//! Credential blobs are stored sealed; this module never sees plaintext.
//! The provider registry owns decryption and caching.

use causeway_core::{CausewayError, HealthState, ProviderKind, new_id, now_iso};
use rusqlite::params;

use crate::database::{Database, map_tr_err, parse_enum};
use crate::models::IntegrationRecord;

const INTEGRATION_COLUMNS: &str = "id, workspace_id, provider, credentials_sealed, nonce,
     health_status, last_checked_at, created_at, updated_at";

fn row_to_integration(row: &rusqlite::Row<'_>) -> Result<IntegrationRecord, rusqlite::Error> {
    let health: Option<String> = row.get(5)?;
    Ok(IntegrationRecord {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        provider: parse_enum(2, row.get::<_, String>(2)?)?,
        credentials_sealed: row.get(3)?,
        nonce: row.get(4)?,
        health_status: health.map(|h| parse_enum(5, h)).transpose()?,
        last_checked_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Create or replace the integration for `(workspace, provider)`.
pub async fn upsert_integration(
    db: &Database,
    workspace_id: &str,
    provider: ProviderKind,
    credentials_sealed: Vec<u8>,
    nonce: Vec<u8>,
) -> Result<IntegrationRecord, CausewayError> {
    let now = now_iso();
    let record = IntegrationRecord {
        id: new_id(),
        workspace_id: workspace_id.to_string(),
        provider,
        credentials_sealed,
        nonce,
        health_status: Some(HealthState::Healthy),
        last_checked_at: None,
        created_at: now.clone(),
        updated_at: now,
    };
    let row = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO integrations (id, workspace_id, provider, credentials_sealed,
                     nonce, health_status, last_checked_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?7)
                 ON CONFLICT (workspace_id, provider) DO UPDATE SET
                     credentials_sealed = excluded.credentials_sealed,
                     nonce = excluded.nonce,
                     health_status = excluded.health_status,
                     updated_at = excluded.updated_at",
                params![
                    row.id,
                    row.workspace_id,
                    row.provider.to_string(),
                    row.credentials_sealed,
                    row.nonce,
                    HealthState::Healthy.to_string(),
                    row.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(record)
}

/// All integrations of a workspace.
pub async fn list_integrations(
    db: &Database,
    workspace_id: &str,
) -> Result<Vec<IntegrationRecord>, CausewayError> {
    let workspace_id = workspace_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INTEGRATION_COLUMNS} FROM integrations
                 WHERE workspace_id = ?1 ORDER BY provider"
            ))?;
            let rows = stmt.query_map(params![workspace_id], row_to_integration)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// One integration by provider.
pub async fn get_integration(
    db: &Database,
    workspace_id: &str,
    provider: ProviderKind,
) -> Result<Option<IntegrationRecord>, CausewayError> {
    let workspace_id = workspace_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INTEGRATION_COLUMNS} FROM integrations
                 WHERE workspace_id = ?1 AND provider = ?2"
            ))?;
            let result = stmt.query_row(
                params![workspace_id, provider.to_string()],
                row_to_integration,
            );
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Update an integration's health after a check or a credential rejection.
pub async fn set_health(
    db: &Database,
    workspace_id: &str,
    provider: ProviderKind,
    health: HealthState,
) -> Result<(), CausewayError> {
    let workspace_id = workspace_id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE integrations SET health_status = ?1, last_checked_at = ?2, updated_at = ?2
                 WHERE workspace_id = ?3 AND provider = ?4",
                params![health.to_string(), now, workspace_id, provider.to_string()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn upsert_and_health_lifecycle() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();

        upsert_integration(&db, "w-1", ProviderKind::Grafana, vec![1, 2, 3], vec![0; 12])
            .await
            .unwrap();
        upsert_integration(&db, "w-1", ProviderKind::Github, vec![4, 5], vec![0; 12])
            .await
            .unwrap();

        let all = list_integrations(&db, "w-1").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].health_status, Some(HealthState::Healthy));

        set_health(&db, "w-1", ProviderKind::Grafana, HealthState::Failed)
            .await
            .unwrap();
        let grafana = get_integration(&db, "w-1", ProviderKind::Grafana)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grafana.health_status, Some(HealthState::Failed));
        assert!(grafana.last_checked_at.is_some());

        // Replacing credentials resets health.
        upsert_integration(&db, "w-1", ProviderKind::Grafana, vec![9], vec![1; 12])
            .await
            .unwrap();
        let grafana = get_integration(&db, "w-1", ProviderKind::Grafana)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grafana.health_status, Some(HealthState::Healthy));
        assert_eq!(grafana.credentials_sealed, vec![9]);

        db.close().await.unwrap();
    }
}
