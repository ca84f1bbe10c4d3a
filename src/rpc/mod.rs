//! Config request handler.
//!
//! # Data Flow
//! ```text
//! POST /config/{command}  { "parameters": { ... } }
//!     → handlers.rs dispatch
//!         readers:  ArcSwap<App> snapshot (no lock)
//!         writers:  writer lock → copy app → validate & apply
//!                   → write app file → swap snapshot
//!     → { "status": "OK" | "fail", "message": "...", "parameters": { ... } }
//!
//! GET /status → version and counts
//! ```
//!
//! # Design Decisions
//! - Failures are replies, not HTTP errors; the body always has a status
//! - One writer at a time; an invalid change never reaches the file

pub mod handlers;
pub mod message;

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use self::handlers::AppState;
use self::handlers::{get_status, handle_command};

pub use message::{Reply, ReplyStatus, Request, RpcError};

/// Builds the handler router.
#[allow(deprecated)]
pub fn setup_router(state: AppState) -> Router {
    Router::new()
        .route("/config/{command}", post(handle_command))
        .route("/status", get(get_status))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
}
