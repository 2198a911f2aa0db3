// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The public HTTP interface (spec §4.6): agents, events, queue, and health
//! routes over the shared [`AppState`].

mod agents;
mod error;
mod events;
mod health;
mod queue;
mod state;

pub use error::{ApiError, ErrorBody};
pub use state::AppState;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Assembles the full router: every sub-router merged and layered with
/// tracing and a permissive CORS policy (spec §4.6 is consumed by the
/// upstream web app across origins).
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(agents::router())
        .merge(events::router())
        .merge(queue::router())
        .merge(health::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
