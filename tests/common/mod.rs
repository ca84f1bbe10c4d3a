//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chain_config::config::Params;
use chain_config::net::SequentialPorts;
use chain_config::pipeline::{ConfigStore, StoreError};
use chain_config::rpc::AppState;
use chain_config::topology::handler::{DESTINATION_CATEGORY, SOURCE_CATEGORY};
use chain_config::topology::{App, Handler, HandlerType, Proxy, Service, ServiceType};
use chain_config::Shutdown;

/// Independent service `web` with a `main` replier on port 4000.
pub fn web() -> Service {
    let mut service = Service::new("web", "web-url", ServiceType::Independent);
    service.set_handler(Handler::new("main", "main", HandlerType::Replier, 4000));
    service
}

/// Proxy service `<name>` with one source and one destination replier.
pub fn proxy_service(name: &str, source_port: u16, destination_port: u16) -> Service {
    let mut service = Service::new(name, format!("{name}-url"), ServiceType::Proxy);
    service.set_handler(Handler::new(
        format!("{name}-in"),
        SOURCE_CATEGORY,
        HandlerType::Replier,
        source_port,
    ));
    service.set_handler(Handler::new(
        format!("{name}-out"),
        DESTINATION_CATEGORY,
        HandlerType::Replier,
        destination_port,
    ));
    service
}

pub fn proxy(name: &str) -> Proxy {
    Proxy::new(name, format!("{name}-url"), "proxy")
}

pub fn app_with(services: Vec<Service>) -> App {
    App {
        services,
        proxy_chains: Vec::new(),
    }
}

/// Handler state over an empty app stored at `<dir>/app.yml`.
pub fn state(dir: &Path) -> AppState {
    state_with_store(dir, None)
}

/// Like [`state`], linting through per-service files under `store_dir`.
pub fn state_with_store(dir: &Path, store_dir: Option<PathBuf>) -> AppState {
    AppState::new(
        App::default(),
        dir.join("app.yml"),
        Arc::new(Params::new()),
        Arc::new(SequentialPorts::starting_at(7000)),
        store_dir,
        Shutdown::new(),
    )
}

/// App-backed store that refuses writes for one url.
pub struct FailingStore {
    pub app: App,
    pub fail_url: String,
}

impl ConfigStore for FailingStore {
    fn get_config(&self, url: &str) -> Result<Service, StoreError> {
        self.app.get_config(url)
    }

    fn set_config(&mut self, url: &str, service: Service) -> Result<(), StoreError> {
        if url == self.fail_url {
            return Err(StoreError::NotFound(url.to_string()));
        }
        self.app.set_config(url, service)
    }
}
