// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API gateway for the Causeway platform.
//!
//! Routes: `POST /chat` (admission), `GET /turns/{id}/stream` (SSE replay +
//! live frames), session/turn/feedback CRUD, and the unauthenticated
//! operational surface (`/health`, `/metrics`). The admission order --
//! guard, quota, backpressure, durable records, enqueue -- lives in
//! [`chat`]; the subscribe-before-replay stream contract lives in
//! [`stream`].

pub mod auth;
pub mod chat;
pub mod error;
pub mod handlers;
pub mod server;
pub mod stream;

pub use auth::{AuthContext, StaticIdentity};
pub use chat::{Admitted, send_message};
pub use error::ApiError;
pub use server::{GatewayState, build_router, start_server};
pub use stream::{replay_frames, turn_frame_stream};
