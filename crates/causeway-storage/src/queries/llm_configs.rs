// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-workspace LLM configuration records.

use causeway_core::{CausewayError, HealthState, LlmProvider, now_iso};
use rusqlite::params;

use crate::database::{Database, map_tr_err, parse_enum};
use crate::models::LlmConfigRecord;

fn row_to_config(row: &rusqlite::Row<'_>) -> Result<LlmConfigRecord, rusqlite::Error> {
    let health: Option<String> = row.get(5)?;
    Ok(LlmConfigRecord {
        workspace_id: row.get(0)?,
        provider: parse_enum(1, row.get::<_, String>(1)?)?,
        model: row.get(2)?,
        credentials_sealed: row.get(3)?,
        nonce: row.get(4)?,
        health_status: health.map(|h| parse_enum(5, h)).transpose()?,
        updated_at: row.get(6)?,
    })
}

/// The workspace's LLM configuration, if one was saved.
///
/// Absence means the platform default applies.
pub async fn get_llm_config(
    db: &Database,
    workspace_id: &str,
) -> Result<Option<LlmConfigRecord>, CausewayError> {
    let workspace_id = workspace_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT workspace_id, provider, model, credentials_sealed, nonce,
                        health_status, updated_at
                 FROM llm_configs WHERE workspace_id = ?1",
            )?;
            let result = stmt.query_row(params![workspace_id], row_to_config);
            match result {
                Ok(config) => Ok(Some(config)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Create or replace the workspace's LLM configuration.
pub async fn upsert_llm_config(
    db: &Database,
    workspace_id: &str,
    provider: LlmProvider,
    model: &str,
    credentials_sealed: Option<Vec<u8>>,
    nonce: Option<Vec<u8>>,
) -> Result<(), CausewayError> {
    let workspace_id = workspace_id.to_string();
    let model = model.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO llm_configs (workspace_id, provider, model, credentials_sealed,
                     nonce, health_status, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (workspace_id) DO UPDATE SET
                     provider = excluded.provider,
                     model = excluded.model,
                     credentials_sealed = excluded.credentials_sealed,
                     nonce = excluded.nonce,
                     health_status = excluded.health_status,
                     updated_at = excluded.updated_at",
                params![
                    workspace_id,
                    provider.to_string(),
                    model,
                    credentials_sealed,
                    nonce,
                    HealthState::Healthy.to_string(),
                    now,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record the outcome of the latest config health check.
pub async fn set_llm_health(
    db: &Database,
    workspace_id: &str,
    health: HealthState,
) -> Result<(), CausewayError> {
    let workspace_id = workspace_id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE llm_configs SET health_status = ?1, updated_at = ?2
                 WHERE workspace_id = ?3",
                params![health.to_string(), now, workspace_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
