// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted mocks and an end-to-end harness for Causeway tests.

pub mod harness;
pub mod mock_model;
pub mod mock_source;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_model::{ScriptedModel, ScriptedResolver, ScriptedStep};
pub use mock_source::MockAdapterSource;
