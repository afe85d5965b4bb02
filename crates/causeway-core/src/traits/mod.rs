// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the seams between Causeway subsystems.

pub mod bus;
pub mod identity;
pub mod model;
pub mod provider;
pub mod transport;
