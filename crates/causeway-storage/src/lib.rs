// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Causeway platform.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed CRUD operations for
//! sessions, turns, steps, jobs, the delivery queue, quota counters, security
//! events, integration credentials, LLM configs, feedback, and worker
//! heartbeats. The database is the only durable source of truth in the
//! system; the event bus is ephemeral and the queue is recoverable.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod transport;

pub use database::Database;
pub use models::*;
pub use transport::{RCA_JOB_QUEUE, SqliteQueue};
