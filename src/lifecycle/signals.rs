//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) and, on Unix, SIGTERM
//! - Translate them into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)

use super::shutdown::Shutdown;

/// Triggers `shutdown` on the first SIGINT/SIGTERM, or returns as soon as
/// something else triggers it.
pub async fn forward_signals(shutdown: Shutdown) {
    tokio::select! {
        _ = os_signal() => {
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        }
        _ = shutdown.wait() => {}
    }
}

#[cfg(unix)]
async fn os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Failed to install SIGTERM handler: {}", e);
            let _ = ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn os_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
