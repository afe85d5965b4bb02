// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The turn sink: persists each engine event as the next turn step, then
//! publishes its frame on the event bus.
//!
//! Persistence strictly precedes publication, so any subscriber always sees
//! a prefix of the persisted order. Tool invocations persist two steps: a
//! `running` tool_call step (the start) and a `completed`/`failed` tool_call
//! step (the end) whose frame carries the start's sequence as `step_id`.

use async_trait::async_trait;
use causeway_core::{
    CausewayError, EventBus, Frame, StepStatus, StepType, frame::clip_frame_text, turn_channel,
};
use causeway_storage::{Database, queries::turns};
use std::sync::Arc;

/// Characters of step content kept in the database.
const PERSIST_CONTENT_CHARS: usize = 2000;
/// Characters of frame content pushed to subscribers.
const FRAME_CONTENT_CHARS: usize = 500;

/// Persist-then-publish sink bound to one turn.
pub struct TurnSink {
    db: Database,
    bus: Arc<dyn EventBus>,
    turn_id: String,
    channel: String,
}

impl TurnSink {
    pub fn new(db: Database, bus: Arc<dyn EventBus>, turn_id: &str) -> Self {
        Self {
            db,
            bus,
            turn_id: turn_id.to_string(),
            channel: turn_channel(turn_id),
        }
    }

    fn persisted(content: &str) -> String {
        clip_frame_text(content, PERSIST_CONTENT_CHARS)
    }

    fn framed(content: &str) -> String {
        clip_frame_text(content, FRAME_CONTENT_CHARS)
    }
}

#[async_trait]
impl crate::StepSink for TurnSink {
    async fn on_status(&mut self, content: &str) -> Result<u32, CausewayError> {
        let step = turns::add_step(
            &self.db,
            &self.turn_id,
            StepType::Status,
            None,
            Some(&Self::persisted(content)),
            StepStatus::Completed,
        )
        .await?;
        self.bus
            .publish(&self.channel, Frame::status(step.sequence, content))
            .await?;
        Ok(step.sequence)
    }

    async fn on_thinking(&mut self, content: &str) -> Result<u32, CausewayError> {
        let step = turns::add_step(
            &self.db,
            &self.turn_id,
            StepType::Thinking,
            None,
            Some(&Self::persisted(content)),
            StepStatus::Completed,
        )
        .await?;
        self.bus
            .publish(
                &self.channel,
                Frame::thinking(step.sequence, Self::framed(content)),
            )
            .await?;
        Ok(step.sequence)
    }

    async fn on_tool_start(&mut self, tool_name: &str) -> Result<u32, CausewayError> {
        let step = turns::add_step(
            &self.db,
            &self.turn_id,
            StepType::ToolCall,
            Some(tool_name),
            None,
            StepStatus::Running,
        )
        .await?;
        self.bus
            .publish(&self.channel, Frame::tool_start(step.sequence, tool_name))
            .await?;
        Ok(step.sequence)
    }

    async fn on_tool_end(
        &mut self,
        step_id: u32,
        tool_name: &str,
        ok: bool,
        content: &str,
    ) -> Result<u32, CausewayError> {
        let status = if ok {
            StepStatus::Completed
        } else {
            StepStatus::Failed
        };
        let step = turns::add_step(
            &self.db,
            &self.turn_id,
            StepType::ToolCall,
            Some(tool_name),
            Some(&Self::persisted(content)),
            status,
        )
        .await?;
        self.bus
            .publish(
                &self.channel,
                Frame::tool_end(
                    step.sequence,
                    step_id,
                    tool_name,
                    status,
                    Some(Self::framed(content)),
                ),
            )
            .await?;
        Ok(step.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StepSink;
    use causeway_bus::InProcessBus;
    use causeway_core::FrameKind;
    use causeway_storage::queries::sessions::{create_session, new_web_session};
    use causeway_storage::queries::turns::{create_turn_with_first_step, list_steps, new_turn};
    use futures::StreamExt;
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir, String, Arc<InProcessBus>) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        let session = new_web_session("w-1", "user-1", "why slow?");
        create_session(&db, &session).await.unwrap();
        let turn = new_turn(&session.id, "why slow?");
        create_turn_with_first_step(&db, &turn, "Queued").await.unwrap();
        (db, dir, turn.id, Arc::new(InProcessBus::new()))
    }

    #[tokio::test]
    async fn events_persist_before_publishing_with_matching_sequences() {
        let (db, _dir, turn_id, bus) = setup().await;
        let mut stream = bus.subscribe(&turn_channel(&turn_id)).await.unwrap();
        let mut sink = TurnSink::new(db.clone(), bus.clone(), &turn_id);

        let status_seq = sink.on_status("Starting analysis").await.unwrap();
        let start_seq = sink.on_tool_start("logs.errors.grafana").await.unwrap();
        let end_seq = sink
            .on_tool_end(start_seq, "logs.errors.grafana", true, "found 3 errors")
            .await
            .unwrap();
        bus.close(&turn_channel(&turn_id)).await;

        assert_eq!((status_seq, start_seq, end_seq), (2, 3, 4));

        // Persisted: Queued + status + tool start + tool end.
        let steps = list_steps(&db, &turn_id).await.unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[2].status, StepStatus::Running);
        assert_eq!(steps[3].status, StepStatus::Completed);
        assert_eq!(steps[3].content.as_deref(), Some("found 3 errors"));

        // Published frames mirror the persisted order.
        let mut frames = Vec::new();
        while let Some(frame) = stream.next().await {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].sequence, 2);
        match &frames[2].kind {
            FrameKind::ToolEnd { step_id, status, .. } => {
                assert_eq!(*step_id, 3);
                assert_eq!(*status, StepStatus::Completed);
            }
            other => panic!("unexpected frame: {other:?}"),
        }

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn long_content_is_clipped_for_frames_but_kept_longer_in_store() {
        let (db, _dir, turn_id, bus) = setup().await;
        let mut stream = bus.subscribe(&turn_channel(&turn_id)).await.unwrap();
        let mut sink = TurnSink::new(db.clone(), bus.clone(), &turn_id);

        let long = "x".repeat(3000);
        let start = sink.on_tool_start("logs.search.grafana").await.unwrap();
        sink.on_tool_end(start, "logs.search.grafana", true, &long)
            .await
            .unwrap();
        bus.close(&turn_channel(&turn_id)).await;

        let steps = list_steps(&db, &turn_id).await.unwrap();
        let stored = steps.last().unwrap().content.as_ref().unwrap();
        assert_eq!(stored.chars().count(), 2000);

        let frames: Vec<_> = stream.collect().await;
        match &frames[1].kind {
            FrameKind::ToolEnd { content, .. } => {
                assert_eq!(content.as_ref().unwrap().chars().count(), 500);
            }
            other => panic!("unexpected frame: {other:?}"),
        }

        db.close().await.unwrap();
    }
}
