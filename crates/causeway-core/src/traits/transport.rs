// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue transport seam between the admission path and the worker pool.
//!
//! Semantics required of any implementation: at-least-once delivery, FIFO
//! within one queue, visibility timeout on receive, and per-message delay on
//! send. Duplicate delivery is tolerated downstream by the conditional
//! queued→running job transition, so a standard (non-FIFO) external queue
//! also satisfies the contract.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CausewayError;

/// An in-flight message claimed from the queue.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Opaque payload, JSON in practice (`{"job_id": ...}`).
    pub payload: String,
    /// Claim receipt; required to delete or extend visibility.
    pub receipt: String,
}

/// FIFO queue with visibility timeouts.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Enqueue a payload, optionally delayed. Implementations cap the delay
    /// (the bundled transport caps at 900 seconds, matching common managed
    /// queues); the worker re-releases if the backoff outlives the cap.
    async fn send(&self, payload: &str, delay: Option<Duration>) -> Result<(), CausewayError>;

    /// Claim the next visible message, hiding it from other consumers for
    /// `visibility`. Returns `None` when the queue is empty.
    async fn receive(&self, visibility: Duration) -> Result<Option<QueueMessage>, CausewayError>;

    /// Acknowledge a claimed message. A stale receipt (the message was
    /// redelivered after the visibility window lapsed) is a no-op.
    async fn delete(&self, receipt: &str) -> Result<(), CausewayError>;

    /// Extend or shorten the remaining visibility of a claimed message.
    async fn change_visibility(
        &self,
        receipt: &str,
        remaining: Duration,
    ) -> Result<(), CausewayError>;

    /// Number of messages waiting (visible or delayed). Drives admission
    /// backpressure.
    async fn depth(&self) -> Result<u64, CausewayError>;
}
