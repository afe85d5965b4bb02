// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The step sink: the one seam where engine events become durable state.
//!
//! The engine emits events; the sink persists each as the next turn step and
//! only then publishes its frame. Keeping persistence and publication behind
//! one trait preserves the ordering invariant (persist precedes publish) and
//! lets tests record events without a database.

use async_trait::async_trait;
use causeway_core::CausewayError;

/// Receiver for ordered engine events.
///
/// Each method returns the sequence number assigned to the persisted step;
/// `on_tool_start`'s return value is the `step_id` passed back to
/// `on_tool_end` so subscribers can pair the two frames.
#[async_trait]
pub trait StepSink: Send {
    async fn on_status(&mut self, content: &str) -> Result<u32, CausewayError>;

    async fn on_thinking(&mut self, content: &str) -> Result<u32, CausewayError>;

    async fn on_tool_start(&mut self, tool_name: &str) -> Result<u32, CausewayError>;

    async fn on_tool_end(
        &mut self,
        step_id: u32,
        tool_name: &str,
        ok: bool,
        content: &str,
    ) -> Result<u32, CausewayError>;
}

/// In-memory sink for engine tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<RecordedEvent>,
    next_sequence: u32,
}

/// One recorded engine event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Status { sequence: u32, content: String },
    Thinking { sequence: u32, content: String },
    ToolStart { sequence: u32, tool_name: String },
    ToolEnd {
        sequence: u32,
        step_id: u32,
        tool_name: String,
        ok: bool,
        content: String,
    },
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

#[async_trait]
impl StepSink for RecordingSink {
    async fn on_status(&mut self, content: &str) -> Result<u32, CausewayError> {
        let sequence = self.next();
        self.events.push(RecordedEvent::Status {
            sequence,
            content: content.to_string(),
        });
        Ok(sequence)
    }

    async fn on_thinking(&mut self, content: &str) -> Result<u32, CausewayError> {
        let sequence = self.next();
        self.events.push(RecordedEvent::Thinking {
            sequence,
            content: content.to_string(),
        });
        Ok(sequence)
    }

    async fn on_tool_start(&mut self, tool_name: &str) -> Result<u32, CausewayError> {
        let sequence = self.next();
        self.events.push(RecordedEvent::ToolStart {
            sequence,
            tool_name: tool_name.to_string(),
        });
        Ok(sequence)
    }

    async fn on_tool_end(
        &mut self,
        step_id: u32,
        tool_name: &str,
        ok: bool,
        content: &str,
    ) -> Result<u32, CausewayError> {
        let sequence = self.next();
        self.events.push(RecordedEvent::ToolEnd {
            sequence,
            step_id,
            tool_name: tool_name.to_string(),
            ok,
            content: content.to_string(),
        });
        Ok(sequence)
    }
}
