// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ReAct investigation engine for the Causeway platform.
//!
//! [`ReactEngine`] drives the Thought → Action → Observation loop against a
//! chat model and a per-workspace tool set, under step and wall-clock
//! budgets. Observable events flow through the [`StepSink`] seam, where the
//! worker persists each step before publishing its frame.

pub mod engine;
pub mod prompt;
pub mod sink;

pub use engine::{EngineBudgets, ReactEngine};
pub use prompt::{RCA_SYSTEM_PROMPT, build_system_prompt};
pub use sink::{RecordedEvent, RecordingSink, StepSink};
