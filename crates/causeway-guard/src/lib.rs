// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission gating: the prompt-injection guard and the quota gate.
//!
//! Both run before any durable state is created for a message. Every
//! non-allow guard verdict is recorded as a security event by the admission
//! path; fail-open on a degraded guard is explicit and logged, never silent.

pub mod prompt;
pub mod quota;

pub use prompt::{PromptGuard, Verdict};
pub use quota::{QuotaGate, next_utc_midnight};
