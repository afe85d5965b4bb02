// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orchestrator worker pool for the Causeway platform.
//!
//! Workers claim job ids from the queue transport, resolve the workspace's
//! LLM and tool set, drive the ReAct engine with persist-then-publish step
//! handling, and finalize turns with retry/backoff accounting. A separate
//! reconciler reclaims jobs orphaned by dead workers.

pub mod context;
pub mod reconciler;
pub mod sink;
pub mod worker;

pub use causeway_agent::StepSink;
pub use context::AppContext;
pub use reconciler::Reconciler;
pub use sink::TurnSink;
pub use worker::{JobMessage, Worker};
