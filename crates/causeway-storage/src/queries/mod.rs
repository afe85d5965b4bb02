// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.

pub mod feedback;
pub mod heartbeats;
pub mod integrations;
pub mod jobs;
pub mod llm_configs;
pub mod queue;
pub mod quota;
pub mod security;
pub mod sessions;
pub mod turns;
