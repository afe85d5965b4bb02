// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The stream endpoint: persisted replay fused with live bus frames.
//!
//! The order is mandatory: subscribe to the bus FIRST, then read the
//! persisted steps. Anything published between the read and an after-the-
//! fact subscription would be lost; the inverse overlap (frames both
//! replayed and received live) is harmless because live non-terminal frames
//! with a sequence at or below the last replayed one are dropped.

use causeway_core::{Frame, FrameStream, StepStatus, StepType, TurnStatus, turn_channel};
use causeway_storage::{Turn, TurnStep, queries::turns};
use futures::{StreamExt, stream};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Convert persisted steps into replay frames.
///
/// A tool invocation is stored as two steps: the `running` tool_call step
/// becomes `tool_start`, and the later `completed`/`failed` tool_call step
/// becomes `tool_end` carrying the start's sequence as `step_id`. The engine
/// runs one tool at a time, so pairing with the most recent unmatched start
/// of the same tool is exact.
pub fn replay_frames(steps: &[TurnStep]) -> Vec<Frame> {
    let mut frames = Vec::with_capacity(steps.len());
    let mut open_starts: Vec<(String, u32)> = Vec::new();

    for step in steps {
        match step.step_type {
            StepType::Status => {
                frames.push(Frame::status(
                    step.sequence,
                    step.content.clone().unwrap_or_default(),
                ));
            }
            StepType::Thinking => {
                frames.push(Frame::thinking(
                    step.sequence,
                    step.content.clone().unwrap_or_default(),
                ));
            }
            StepType::ToolCall => {
                let tool_name = step.tool_name.clone().unwrap_or_default();
                match step.status {
                    StepStatus::Running | StepStatus::Pending => {
                        open_starts.push((tool_name.clone(), step.sequence));
                        frames.push(Frame::tool_start(step.sequence, tool_name));
                    }
                    StepStatus::Completed | StepStatus::Failed => {
                        let step_id = open_starts
                            .iter()
                            .rposition(|(name, _)| *name == tool_name)
                            .map(|idx| open_starts.remove(idx).1)
                            .unwrap_or(step.sequence);
                        frames.push(Frame::tool_end(
                            step.sequence,
                            step_id,
                            tool_name,
                            step.status,
                            step.content.clone(),
                        ));
                    }
                }
            }
        }
    }
    frames
}

/// The terminal frame for a finished turn, synthesized from the turn record.
fn terminal_frame(turn: &Turn, last_sequence: u32) -> Frame {
    match turn.status {
        TurnStatus::Completed => Frame::complete(
            last_sequence + 1,
            turn.final_response.clone().unwrap_or_default(),
        ),
        _ => Frame::error(last_sequence + 1, "the analysis failed"),
    }
}

/// Build the full ordered frame stream for one turn.
///
/// Late joiners on a terminal turn get the whole replay plus the terminal
/// frame and the stream closes. In-flight turns get the replay followed by
/// deduplicated live frames until exactly one terminal frame arrives.
pub async fn turn_frame_stream(
    state: &GatewayState,
    workspace_id: &str,
    turn_id: &str,
) -> Result<FrameStream, ApiError> {
    let turn = turns::get_turn_in_workspace(&state.ctx.db, workspace_id, turn_id)
        .await?
        .ok_or(causeway_core::CausewayError::NotFound {
            resource: "turn",
            id: turn_id.to_string(),
        })?;

    // Subscribe before reading so no frame can fall between the two.
    let live = state.ctx.bus.subscribe(&turn_channel(turn_id)).await?;

    let steps = turns::list_steps(&state.ctx.db, turn_id).await?;
    let replay = replay_frames(&steps);
    let last_replayed = replay.last().map(|f| f.sequence).unwrap_or(0);

    // Re-read after subscribing: if the turn went terminal while we were
    // reading, the terminal frame may already be gone from the bus.
    let turn = turns::get_turn(&state.ctx.db, turn_id)
        .await?
        .unwrap_or(turn);

    if matches!(turn.status, TurnStatus::Completed | TurnStatus::Failed) {
        let terminal = terminal_frame(&turn, last_replayed);
        let frames: Vec<Frame> = replay.into_iter().chain(std::iter::once(terminal)).collect();
        return Ok(Box::pin(stream::iter(frames)));
    }

    // Drain live frames after the replay: drop non-terminal overlap by
    // sequence, stop after the first terminal frame.
    let live_tail = live
        .scan(false, move |done, frame| {
            if *done {
                return futures::future::ready(None);
            }
            if frame.is_terminal() {
                *done = true;
                return futures::future::ready(Some(Some(frame)));
            }
            if frame.sequence <= last_replayed {
                return futures::future::ready(Some(None));
            }
            futures::future::ready(Some(Some(frame)))
        })
        .filter_map(futures::future::ready);

    Ok(Box::pin(stream::iter(replay).chain(live_tail)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_core::FrameKind;

    fn step(
        sequence: u32,
        step_type: StepType,
        tool_name: Option<&str>,
        status: StepStatus,
        content: Option<&str>,
    ) -> TurnStep {
        TurnStep {
            id: format!("step-{sequence}"),
            turn_id: "t-1".into(),
            step_type,
            tool_name: tool_name.map(str::to_string),
            content: content.map(str::to_string),
            status,
            sequence,
            created_at: "2026-08-02T10:00:00.000Z".into(),
        }
    }

    #[test]
    fn replay_pairs_tool_starts_with_ends() {
        let steps = vec![
            step(1, StepType::Status, None, StepStatus::Completed, Some("Queued")),
            step(2, StepType::Status, None, StepStatus::Completed, Some("Starting analysis")),
            step(
                3,
                StepType::ToolCall,
                Some("logs.errors.grafana"),
                StepStatus::Running,
                None,
            ),
            step(
                4,
                StepType::ToolCall,
                Some("logs.errors.grafana"),
                StepStatus::Failed,
                Some("ERROR: upstream unavailable"),
            ),
            step(
                5,
                StepType::ToolCall,
                Some("logs.search.grafana"),
                StepStatus::Running,
                None,
            ),
            step(
                6,
                StepType::ToolCall,
                Some("logs.search.grafana"),
                StepStatus::Completed,
                Some("found 3 errors"),
            ),
        ];

        let frames = replay_frames(&steps);
        assert_eq!(frames.len(), 6);

        match &frames[3].kind {
            FrameKind::ToolEnd {
                step_id,
                status,
                tool_name,
                ..
            } => {
                assert_eq!(*step_id, 3);
                assert_eq!(*status, StepStatus::Failed);
                assert_eq!(tool_name, "logs.errors.grafana");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
        match &frames[5].kind {
            FrameKind::ToolEnd { step_id, status, .. } => {
                assert_eq!(*step_id, 5);
                assert_eq!(*status, StepStatus::Completed);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn replay_handles_orphaned_running_step() {
        // Worker died between start and end: the start replays alone.
        let steps = vec![step(
            1,
            StepType::ToolCall,
            Some("metrics.cpu.datadog"),
            StepStatus::Running,
            None,
        )];
        let frames = replay_frames(&steps);
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0].kind, FrameKind::ToolStart { .. }));
    }

    #[test]
    fn terminal_frame_reflects_turn_outcome() {
        let turn = Turn {
            id: "t-1".into(),
            session_id: "s-1".into(),
            user_message: "q".into(),
            final_response: Some("**Root cause**: bad deploy".into()),
            status: TurnStatus::Completed,
            job_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let frame = terminal_frame(&turn, 7);
        assert_eq!(frame.sequence, 8);
        assert!(matches!(frame.kind, FrameKind::Complete { .. }));

        let mut failed = turn;
        failed.status = TurnStatus::Failed;
        failed.final_response = None;
        assert!(matches!(terminal_frame(&failed, 7).kind, FrameKind::Error { .. }));
    }
}
