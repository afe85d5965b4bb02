// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Causeway RCA orchestration platform.
//!
//! This crate provides the foundational error taxonomy, identifiers, status
//! machines, stream frame model, and the trait seams between subsystems
//! (chat models, provider adapters, queue transport, event bus, identity).
//! Every other crate in the workspace builds on these definitions.

pub mod error;
pub mod frame;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CausewayError;
pub use frame::{Frame, FrameKind};
pub use types::{
    HealthState, JobId, JobStatus, LlmProvider, SessionId, SessionOrigin, StepStatus, StepType,
    TurnId, TurnStatus, WorkspaceId, new_id, now_iso,
};

pub use traits::bus::{EventBus, FrameStream, turn_channel};
pub use traits::identity::{AccessClaims, Identity, PlanLimits, PlanSource};
pub use traits::model::{
    ChatCompletion, ChatMessage, ChatModel, ChatRequest, ChatRole, ModelResolver, TokenUsage,
    ToolCall, ToolSpec,
};
pub use traits::provider::{
    AdapterSource, Capability, CapabilityFamily, CodeAdapter, CodeMatch, CommitInfo, LogEntry,
    LogsAdapter, MetricPoint, MetricSeries, MetricsAdapter, ProviderKind, RepoInfo, TimeRange,
};
pub use traits::transport::{QueueMessage, QueueTransport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_cover_the_spec_taxonomy() {
        // The worker and the HTTP layer both rely on these strings.
        let kinds = [
            CausewayError::validation("message", "empty").kind(),
            CausewayError::Authn("bad token".into()).kind(),
            CausewayError::PolicyViolation {
                reason: "injection".into(),
            }
            .kind(),
            CausewayError::LlmProtocol("3 malformed responses".into()).kind(),
        ];
        assert_eq!(
            kinds,
            [
                "validation_error",
                "authn_error",
                "policy_violation",
                "llm_protocol"
            ]
        );
    }

    #[test]
    fn trait_objects_are_usable() {
        fn _assert_chat_model(_: &dyn ChatModel) {}
        fn _assert_bus(_: &dyn EventBus) {}
        fn _assert_transport(_: &dyn QueueTransport) {}
        fn _assert_source(_: &dyn AdapterSource) {}
        fn _assert_identity(_: &dyn Identity) {}
    }
}
