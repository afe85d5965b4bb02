// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The application context: every shared handle the API and workers need.
//!
//! Built once at process startup and passed down explicitly; nothing in the
//! workspace reaches for process-global state.

use std::sync::Arc;

use causeway_config::CausewayConfig;
use causeway_core::{AdapterSource, EventBus, ModelResolver, QueueTransport};
use causeway_storage::Database;

/// Shared handles for request handlers and workers.
#[derive(Clone)]
pub struct AppContext {
    pub db: Database,
    pub queue: Arc<dyn QueueTransport>,
    pub bus: Arc<dyn EventBus>,
    pub adapters: Arc<dyn AdapterSource>,
    pub llm: Arc<dyn ModelResolver>,
    pub config: Arc<CausewayConfig>,
}
