// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event bus seam: ephemeral pub/sub for live progress frames.
//!
//! The bus is best-effort and never the source of truth; the turn store is.
//! Delivery is in-order per channel. A subscriber that falls behind the
//! channel buffer is lagged out with a terminal backpressure frame rather
//! than growing memory.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::CausewayError;
use crate::frame::Frame;

/// Stream of frames for one subscription.
pub type FrameStream = Pin<Box<dyn Stream<Item = Frame> + Send>>;

/// Channel name for a turn's progress frames.
pub fn turn_channel(turn_id: &str) -> String {
    format!("turn:{turn_id}")
}

/// Ephemeral pub/sub keyed by channel name.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a frame. Publishing with no subscribers is not an error.
    async fn publish(&self, channel: &str, frame: Frame) -> Result<(), CausewayError>;

    /// Subscribe to a channel. Frames published before the subscription are
    /// not replayed here; late joiners replay from the turn store.
    async fn subscribe(&self, channel: &str) -> Result<FrameStream, CausewayError>;

    /// Drop the channel after its terminal frame; active subscriber streams
    /// end once they drain.
    async fn close(&self, channel: &str);
}
