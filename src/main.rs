//! Proxy-chain config daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!     config-cli / services
//!            │ POST /config/{command}
//!            ▼
//!     ┌──────────────┐   snapshot   ┌────────────────────────────┐
//!     │ rpc handlers │◀────────────▶│ ArcSwap<App>               │
//!     └──────┬───────┘              │  services + proxy_chains   │
//!            │ writer lock          └─────────────▲──────────────┘
//!            ▼                                    │ reload
//!     ┌──────────────┐  lint-service  ┌───────────┴──┐
//!     │ topology ops │───────────────▶│ config       │
//!     │ set-service  │  pipeline      │ watcher      │
//!     │ set-chain    │  lint +        └──────────────┘
//!     └──────┬───────┘  ConfigStore
//!            ▼
//!       app file (YAML)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use chain_config::config::loader::{load_or_create_app, load_settings, resolve_app_path};
use chain_config::config::watcher::ConfigWatcher;
use chain_config::config::{EngineConfig, Params};
use chain_config::lifecycle::{signals::forward_signals, Shutdown};
use chain_config::net::LocalPorts;
use chain_config::observability::{logging, metrics};
use chain_config::rpc::{setup_router, AppState};

#[derive(Parser)]
#[command(name = "chain-config")]
#[command(about = "Serves and lints proxy-chain configuration", long_about = None)]
struct Args {
    /// App file to use. Must exist.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Daemon settings (TOML). Defaults apply when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// App file name, without extension.
    #[arg(long, env = "CONFIG_NAME")]
    config_name: Option<String>,

    /// Directory of the app file.
    #[arg(long, env = "CONFIG_PATH")]
    config_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.settings {
        Some(path) => load_settings(path)?,
        None => EngineConfig::default(),
    };

    logging::init(&config.observability.log_level, config.observability.json_logs)?;

    tracing::info!("chain-config v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!("Failed to start metrics exporter: {}", e);
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let app_path = resolve_app_path(
        args.config.as_deref(),
        args.config_name.as_deref(),
        args.config_path.as_deref(),
        &config.app,
    )?;
    let app = load_or_create_app(&app_path)?;

    tracing::info!(
        path = ?app_path,
        services = app.services.len(),
        proxy_chains = app.proxy_chains.len(),
        "App configuration loaded"
    );

    let shutdown = Shutdown::new();
    let state = AppState::new(
        app,
        app_path.clone(),
        Arc::new(Params::new()),
        Arc::new(LocalPorts),
        config.store.dir.clone(),
        shutdown.clone(),
    );

    // Keep the watcher alive until exit.
    let _watcher = if config.watch.enabled {
        let (watcher, mut updates) =
            ConfigWatcher::new(&app_path, Duration::from_secs(config.watch.poll_interval_secs));
        let watcher = watcher.run()?;

        let state = state.clone();
        tokio::spawn(async move {
            while let Some(app) = updates.recv().await {
                state.reload(app);
            }
        });
        Some(watcher)
    } else {
        None
    };

    tokio::spawn(forward_signals(shutdown.clone()));

    let listener = TcpListener::bind(&config.handler.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Config handler listening");

    axum::serve(listener, setup_router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
