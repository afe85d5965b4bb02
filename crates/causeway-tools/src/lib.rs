// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tool layer: uniform callables over provider adapters.
//!
//! Each tool carries a stable name, a description for the model, a JSON
//! Schema, and an async `invoke` whose failures are in-band `ERROR:`
//! observations. Workspace binding happens at construction; observation size
//! is bounded before anything reaches the model.

pub mod builder;
pub mod observe;
pub mod provider_tools;
pub mod tool;

pub use builder::build_toolset;
pub use observe::{TRUNCATION_MARKER, bound_observation};
pub use provider_tools::{CodeTool, LogsTool, MetricsTool, ToolBudgets};
pub use tool::{Tool, ToolOutput, ToolRegistry};
