// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process event bus keyed by channel name.
//!
//! One broadcast channel per turn carries ordered progress frames from the
//! worker to any number of stream subscribers. The bus holds nothing durable:
//! frames published with no subscribers vanish, and late joiners replay from
//! the turn store instead. A subscriber that falls more than the channel
//! buffer behind is lagged out with a terminal backpressure frame.

use async_trait::async_trait;
use causeway_core::{CausewayError, EventBus, Frame, FrameStream};
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// Per-channel buffer; slow consumers beyond this are closed.
const CHANNEL_CAPACITY: usize = 256;

/// Sequence used for synthetic backpressure frames so sequence-based
/// deduplication never drops them.
const BACKPRESSURE_SEQUENCE: u32 = u32::MAX;

/// In-process broadcast bus.
#[derive(Default)]
pub struct InProcessBus {
    channels: DashMap<String, broadcast::Sender<Frame>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<Frame> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Number of live channels (health reporting).
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[async_trait]
impl EventBus for InProcessBus {
    async fn publish(&self, channel: &str, frame: Frame) -> Result<(), CausewayError> {
        // A send error only means nobody is subscribed right now; the frame
        // is already persisted, so that is fine.
        let _ = self.sender(channel).send(frame);
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<FrameStream, CausewayError> {
        let rx = self.sender(channel).subscribe();
        let stream = BroadcastStream::new(rx).scan(false, |closed, item| {
            if *closed {
                return futures::future::ready(None);
            }
            let next = match item {
                Ok(frame) => Some(frame),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "bus subscriber lagged, closing");
                    *closed = true;
                    Some(Frame::error(BACKPRESSURE_SEQUENCE, "stream backpressure"))
                }
            };
            futures::future::ready(next)
        });
        Ok(Box::pin(stream))
    }

    async fn close(&self, channel: &str) {
        // Dropping the sender ends subscriber streams once they drain.
        self.channels.remove(channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_core::{FrameKind, turn_channel};

    #[tokio::test]
    async fn subscribers_see_frames_in_order() {
        let bus = InProcessBus::new();
        let channel = turn_channel("t-1");

        let mut stream = bus.subscribe(&channel).await.unwrap();
        for seq in 1..=3 {
            bus.publish(&channel, Frame::status(seq, format!("step {seq}")))
                .await
                .unwrap();
        }
        bus.close(&channel).await;

        let mut seen = Vec::new();
        while let Some(frame) = stream.next().await {
            seen.push(frame.sequence);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = InProcessBus::new();
        bus.publish("turn:t-2", Frame::status(1, "Queued")).await.unwrap();
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let bus = InProcessBus::new();
        let mut a = bus.subscribe("turn:a").await.unwrap();

        bus.publish("turn:b", Frame::status(1, "other turn")).await.unwrap();
        bus.publish("turn:a", Frame::status(1, "mine")).await.unwrap();
        bus.close("turn:a").await;
        bus.close("turn:b").await;

        let frame = a.next().await.unwrap();
        match frame.kind {
            FrameKind::Status { ref content } => assert_eq!(content, "mine"),
            ref other => panic!("unexpected frame: {other:?}"),
        }
        assert!(a.next().await.is_none());
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_frames() {
        let bus = InProcessBus::new();
        let channel = turn_channel("t-3");

        bus.publish(&channel, Frame::status(1, "before subscribe")).await.unwrap();
        let mut stream = bus.subscribe(&channel).await.unwrap();
        bus.publish(&channel, Frame::status(2, "after subscribe")).await.unwrap();
        bus.close(&channel).await;

        let frame = stream.next().await.unwrap();
        assert_eq!(frame.sequence, 2, "bus does not replay; the store does");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn lagged_subscriber_gets_backpressure_error() {
        let bus = InProcessBus::new();
        let channel = turn_channel("t-4");

        let mut stream = bus.subscribe(&channel).await.unwrap();
        // Overflow the channel buffer without draining.
        for seq in 0..(CHANNEL_CAPACITY as u32 + 50) {
            bus.publish(&channel, Frame::status(seq + 1, "spam")).await.unwrap();
        }
        bus.close(&channel).await;

        let mut last = None;
        while let Some(frame) = stream.next().await {
            last = Some(frame);
        }
        let last = last.expect("stream should yield something");
        assert!(last.is_terminal());
        match last.kind {
            FrameKind::Error { ref message } => assert_eq!(message, "stream backpressure"),
            ref other => panic!("unexpected terminal: {other:?}"),
        }
    }
}
