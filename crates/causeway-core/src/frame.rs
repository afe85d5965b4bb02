// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress frames published on the event bus and replayed to stream
//! subscribers.
//!
//! Every frame carries the sequence number of the persisted step it mirrors.
//! Persistence always precedes publication, so subscribers can deduplicate
//! replay overlap purely by sequence. Terminal frames (`complete`, `error`)
//! arrive exactly once per stream connection and close the channel.

use serde::{Deserialize, Serialize};

use crate::types::StepStatus;

/// One ordered progress event for a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Sequence of the persisted step this frame mirrors.
    pub sequence: u32,
    #[serde(flatten)]
    pub kind: FrameKind,
}

/// Frame payloads, tagged by `event` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FrameKind {
    /// Coarse progress message ("Queued", "Starting analysis", ...).
    Status { content: String },
    /// A tool invocation began. `step_id` matches the later `tool_end`.
    ToolStart { tool_name: String, step_id: u32 },
    /// A tool invocation finished.
    ToolEnd {
        tool_name: String,
        status: StepStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        step_id: u32,
    },
    /// Short model rationale emitted before an action.
    Thinking { content: String },
    /// Terminal: the final RCA answer (Markdown allowed).
    Complete { final_response: String },
    /// Terminal: the turn failed.
    Error { message: String },
}

impl Frame {
    pub fn status(sequence: u32, content: impl Into<String>) -> Self {
        Self {
            sequence,
            kind: FrameKind::Status {
                content: content.into(),
            },
        }
    }

    pub fn thinking(sequence: u32, content: impl Into<String>) -> Self {
        Self {
            sequence,
            kind: FrameKind::Thinking {
                content: content.into(),
            },
        }
    }

    pub fn tool_start(sequence: u32, tool_name: impl Into<String>) -> Self {
        Self {
            sequence,
            kind: FrameKind::ToolStart {
                tool_name: tool_name.into(),
                step_id: sequence,
            },
        }
    }

    pub fn tool_end(
        sequence: u32,
        step_id: u32,
        tool_name: impl Into<String>,
        status: StepStatus,
        content: Option<String>,
    ) -> Self {
        Self {
            sequence,
            kind: FrameKind::ToolEnd {
                tool_name: tool_name.into(),
                status,
                content,
                step_id,
            },
        }
    }

    pub fn complete(sequence: u32, final_response: impl Into<String>) -> Self {
        Self {
            sequence,
            kind: FrameKind::Complete {
                final_response: final_response.into(),
            },
        }
    }

    pub fn error(sequence: u32, message: impl Into<String>) -> Self {
        Self {
            sequence,
            kind: FrameKind::Error {
                message: message.into(),
            },
        }
    }

    /// Terminal frames end the stream; subscribers close after the first one.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, FrameKind::Complete { .. } | FrameKind::Error { .. })
    }

    /// The SSE event name for this frame.
    pub fn event_name(&self) -> &'static str {
        match self.kind {
            FrameKind::Status { .. } => "status",
            FrameKind::ToolStart { .. } => "tool_start",
            FrameKind::ToolEnd { .. } => "tool_end",
            FrameKind::Thinking { .. } => "thinking",
            FrameKind::Complete { .. } => "complete",
            FrameKind::Error { .. } => "error",
        }
    }
}

/// Cap user-visible frame text (thinking, tool output summaries) at the wire
/// limit, preserving the full text in the persisted step.
pub fn clip_frame_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_serializes_with_event_tag() {
        let frame = Frame::status(1, "Queued");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["event"], "status");
        assert_eq!(json["content"], "Queued");
        assert_eq!(json["sequence"], 1);
    }

    #[test]
    fn tool_end_omits_empty_content() {
        let frame = Frame::tool_end(3, 2, "logs.search.grafana", StepStatus::Completed, None);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(!json.contains("\"content\""));
        assert!(json.contains("\"step_id\":2"));
    }

    #[test]
    fn frame_round_trips() {
        let frame = Frame::complete(9, "**Root cause**: pod OOM");
        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
        assert!(back.is_terminal());
    }

    #[test]
    fn only_complete_and_error_are_terminal() {
        assert!(Frame::error(4, "boom").is_terminal());
        assert!(!Frame::thinking(2, "checking logs").is_terminal());
        assert!(!Frame::tool_start(2, "logs.errors.datadog").is_terminal());
    }

    #[test]
    fn clip_respects_char_boundaries() {
        let text = "αβγδε";
        assert_eq!(clip_frame_text(text, 3), "αβγ");
        assert_eq!(clip_frame_text("short", 500), "short");
    }
}
