// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bundled queue transport: the SQLite-backed delivery queue exposed
//! through the [`QueueTransport`] trait.
//!
//! Gives at-least-once delivery with per-queue FIFO order. Deployments with
//! a managed queue swap this out behind the same trait.

use std::time::Duration;

use async_trait::async_trait;
use causeway_core::{CausewayError, QueueMessage, QueueTransport};

use crate::database::Database;
use crate::queries::queue;

/// Default queue name for RCA jobs.
pub const RCA_JOB_QUEUE: &str = "rca_jobs";

/// SQLite-backed queue transport.
#[derive(Clone)]
pub struct SqliteQueue {
    db: Database,
    queue_name: String,
    max_delay_secs: u64,
}

impl SqliteQueue {
    pub fn new(db: Database, queue_name: impl Into<String>, max_delay_secs: u64) -> Self {
        Self {
            db,
            queue_name: queue_name.into(),
            max_delay_secs,
        }
    }
}

#[async_trait]
impl QueueTransport for SqliteQueue {
    async fn send(&self, payload: &str, delay: Option<Duration>) -> Result<(), CausewayError> {
        let delay_secs = delay.map(|d| d.as_secs().min(self.max_delay_secs));
        queue::enqueue(&self.db, &self.queue_name, payload, delay_secs)
            .await
            .map_err(|e| CausewayError::TransportUnavailable {
                message: format!("enqueue failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(())
    }

    async fn receive(&self, visibility: Duration) -> Result<Option<QueueMessage>, CausewayError> {
        let entry = queue::receive(&self.db, &self.queue_name, visibility.as_secs()).await?;
        Ok(entry.map(|e| QueueMessage {
            payload: e.payload,
            // receive() always assigns a receipt on claim.
            receipt: e.receipt.unwrap_or_default(),
        }))
    }

    async fn delete(&self, receipt: &str) -> Result<(), CausewayError> {
        queue::ack(&self.db, receipt).await?;
        Ok(())
    }

    async fn change_visibility(
        &self,
        receipt: &str,
        remaining: Duration,
    ) -> Result<(), CausewayError> {
        queue::extend_visibility(&self.db, receipt, remaining.as_secs()).await?;
        Ok(())
    }

    async fn depth(&self) -> Result<u64, CausewayError> {
        queue::depth(&self.db, &self.queue_name).await
    }
}
