// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM gateway for the Causeway platform.
//!
//! One [`causeway_core::ChatModel`] interface over the platform default and
//! per-workspace BYO providers (OpenAI, Azure OpenAI, Gemini), with
//! transient-error retry and model allow-lists. Credentials are unsealed
//! inside this crate only and registered for log redaction before use.

pub mod gateway;
pub mod gemini;
pub mod openai;
mod retry;

pub use gateway::{LlmGateway, PlatformLlm, ResolvedModel, model_allowed};
pub use gemini::GeminiModel;
pub use openai::OpenAiModel;
