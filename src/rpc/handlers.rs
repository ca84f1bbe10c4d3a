use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tokio::sync::Mutex;

use super::message::*;
use crate::config::loader::write_app;
use crate::config::Params;
use crate::lifecycle::Shutdown;
use crate::net::PortAllocator;
use crate::observability::metrics;
use crate::pipeline::{
    lint_pipelines, prepare_adding_pipeline, service_pipelines, FileStore, MirrorStore, Pipeline,
};
use crate::topology::app::App;
use crate::topology::chain::ProxyChain;
use crate::topology::handler::{Handler, HandlerType, UnknownHandlerType};
use crate::topology::service::{Service, ServiceError, ServiceType};

/// Shared state of the config handler.
#[derive(Clone)]
pub struct AppState {
    /// Current app snapshot for readers.
    pub inner: Arc<ArcSwap<App>>,
    /// Serialises writers; guards the app file path.
    pub writer: Arc<Mutex<PathBuf>>,
    pub params: Arc<Params>,
    pub ports: Arc<dyn PortAllocator>,
    /// Per-service config directory; `None` lints against the app itself.
    pub store_dir: Option<PathBuf>,
    pub shutdown: Shutdown,
}

impl AppState {
    pub fn new(
        app: App,
        app_path: PathBuf,
        params: Arc<Params>,
        ports: Arc<dyn PortAllocator>,
        store_dir: Option<PathBuf>,
        shutdown: Shutdown,
    ) -> Self {
        metrics::record_services(app.services.len());
        Self {
            inner: Arc::new(ArcSwap::from_pointee(app)),
            writer: Arc::new(Mutex::new(app_path)),
            params,
            ports,
            store_dir,
            shutdown,
        }
    }

    /// Replaces the snapshot with an app re-read from disk.
    pub fn reload(&self, app: App) {
        metrics::record_services(app.services.len());
        self.inner.store(Arc::new(app));
        tracing::info!("App configuration reloaded");
    }

    /// Applies `change` to a copy of the app. When it reports a change, the
    /// copy is written to the app file and published.
    async fn mutate<T, F>(&self, change: F) -> Result<T, RpcError>
    where
        F: FnOnce(&mut App) -> Result<(T, bool), RpcError> + Send + 'static,
        T: Send + 'static,
    {
        self.commit(move |app| match change(app) {
            Ok((out, changed)) => (Ok(out), changed),
            Err(e) => (Err(e), false),
        })
        .await
    }

    /// Like [`mutate`](Self::mutate), but a change can be kept even when the
    /// command fails: whatever `change` flags as changed is persisted and
    /// published before its result is returned.
    ///
    /// The change and the file write run on the blocking pool.
    async fn commit<T, F>(&self, change: F) -> Result<T, RpcError>
    where
        F: FnOnce(&mut App) -> (Result<T, RpcError>, bool) + Send + 'static,
        T: Send + 'static,
    {
        let path = self.writer.lock().await;
        let mut app = App::clone(&self.inner.load());
        let target = path.clone();

        let (app, result, written) = tokio::task::spawn_blocking(move || {
            let (result, changed) = change(&mut app);
            let written = if changed {
                write_app(&target, &app).map(|()| true)
            } else {
                Ok(false)
            };
            (app, result, written)
        })
        .await?;

        if written? {
            metrics::record_config_write("app");
            metrics::record_services(app.services.len());
            self.inner.store(Arc::new(app));
        }
        result
    }
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub services: usize,
    pub proxy_chains: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let app = state.inner.load();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        services: app.services.len(),
        proxy_chains: app.proxy_chains.len(),
    })
}

/// Entry point of `POST /config/{command}`.
pub async fn handle_command(
    State(state): State<AppState>,
    Path(command): Path<String>,
    Json(request): Json<Request>,
) -> Json<Reply> {
    let result = dispatch(&state, &command, &request).await;
    metrics::record_command(&command, result.is_ok());

    match result {
        Ok(parameters) => Json(Reply::ok(parameters)),
        Err(e) => {
            tracing::warn!(command = %command, error = %e, "Command failed");
            Json(Reply::fail(e.to_string()))
        }
    }
}

async fn dispatch(state: &AppState, command: &str, req: &Request) -> Result<Parameters, RpcError> {
    match command {
        SERVICE_BY_ID => on_service(state, req),
        SERVICE_BY_URL => on_service_by_url(state, req),
        SERVICE_EXIST => on_service_exist(state, req),
        SET_SERVICE => on_set_service(state, req).await,
        GENERATE_SERVICE => on_generate_service(state, req),
        GENERATE_HANDLER => on_generate_handler(state, req),
        PARAM_EXIST => {
            let name = req.string("name")?;
            Ok(single("exist", state.params.exist(&name)))
        }
        STRING_PARAM => {
            let name = req.string("name")?;
            Ok(single("value", state.params.string(&name)))
        }
        UINT64_PARAM => {
            let name = req.string("name")?;
            Ok(single("value", state.params.uint64(&name)))
        }
        BOOL_PARAM => {
            let name = req.string("name")?;
            Ok(single("value", state.params.bool(&name)))
        }
        SET_DEFAULT_PARAM => {
            let name = req.string("name")?;
            state.params.set_default(name, req.value("value")?);
            Ok(Parameters::new())
        }
        SET_PROXY_CHAIN => on_set_proxy_chain(state, req).await,
        PROXY_CHAINS_BY_URL => on_proxy_chains_by_url(state, req),
        LINT_SERVICE => on_lint_service(state, req).await,
        CLOSE => {
            state.shutdown.trigger();
            Ok(Parameters::new())
        }
        other => Err(RpcError::UnknownCommand(other.to_string())),
    }
}

fn on_service(state: &AppState, req: &Request) -> Result<Parameters, RpcError> {
    let id = req.string("id")?;
    let app = state.inner.load();
    let service = app.service(&id).ok_or(ServiceError::NotFound(id))?;
    Ok(single("service", service))
}

fn on_service_by_url(state: &AppState, req: &Request) -> Result<Parameters, RpcError> {
    let url = req.string("url")?;
    let app = state.inner.load();
    let service = app.service_by_url(&url).ok_or(ServiceError::NotFound(url))?;
    Ok(single("service", service))
}

/// Checks by `id`, falling back to `url`.
fn on_service_exist(state: &AppState, req: &Request) -> Result<Parameters, RpcError> {
    let app = state.inner.load();
    if let Ok(id) = req.string("id") {
        return Ok(single("exist", app.service(&id).is_some()));
    }
    if let Ok(url) = req.string("url") {
        return Ok(single("exist", app.service_by_url(&url).is_some()));
    }
    Err(RpcError::InvalidParameter {
        name: "id",
        reason: "need 'id' or 'url' parameter".to_string(),
    })
}

async fn on_set_service(state: &AppState, req: &Request) -> Result<Parameters, RpcError> {
    let service: Service = req.nested("service")?;
    let id = service.id.clone();

    state
        .mutate(|app| {
            app.set_service(service)?;
            Ok(((), true))
        })
        .await?;

    tracing::info!(service = %id, "Service stored");
    Ok(Parameters::new())
}

/// Generates a service with a manager client. Nothing is stored.
fn on_generate_service(state: &AppState, req: &Request) -> Result<Parameters, RpcError> {
    let id = req.string("id")?;
    if state.inner.load().service(&id).is_some() {
        return Err(ServiceError::AlreadyExists(id).into());
    }

    let url = req.string("url")?;
    let service_type: ServiceType = req.string("type")?.parse()?;

    let service = Service::empty(&id, &url, service_type, state.ports.as_ref())?;
    Ok(single("service", service))
}

fn on_generate_handler(state: &AppState, req: &Request) -> Result<Parameters, RpcError> {
    let internal = req.bool("internal")?;
    let handler_type: HandlerType =
        req.string("handler_type")?
            .parse()
            .map_err(|e: UnknownHandlerType| RpcError::InvalidParameter {
                name: "handler_type",
                reason: e.to_string(),
            })?;

    let category = req.string("category")?;
    if category.is_empty() {
        return Err(ServiceError::EmptyCategory.into());
    }

    let handler = if internal {
        Handler::internal(handler_type, category)
    } else {
        Handler::external(handler_type, category, state.ports.as_ref())
            .map_err(ServiceError::Port)?
    };
    Ok(single("handler", handler))
}

async fn on_set_proxy_chain(state: &AppState, req: &Request) -> Result<Parameters, RpcError> {
    let chain: ProxyChain = req.nested("proxy_chain")?;

    let changed = state
        .mutate(|app| {
            let changed = app.set_proxy_chain(chain)?;
            Ok((changed, changed))
        })
        .await?;

    if changed {
        tracing::info!("Proxy chain registered");
    }
    Ok(single("changed", changed))
}

fn on_proxy_chains_by_url(state: &AppState, req: &Request) -> Result<Parameters, RpcError> {
    let url = req.string("url")?;
    let app = state.inner.load();
    Ok(single("proxy_chains", app.proxy_chains_by_url(&url)))
}

/// Lints the pipelines of the service at `url` and stores the result.
///
/// Proxy configs written before a lint failure stay written.
async fn on_lint_service(state: &AppState, req: &Request) -> Result<Parameters, RpcError> {
    let url = req.string("url")?;
    let ports = Arc::clone(&state.ports);
    let store_dir = state.store_dir.clone();

    let changed = state
        .commit(move |app| {
            let before = app.clone();
            let result = lint_service(app, &url, store_dir, ports.as_ref());
            let app_changed = *app != before;
            (result, app_changed)
        })
        .await?;

    Ok(single("changed", changed))
}

fn lint_service(
    app: &mut App,
    url: &str,
    store_dir: Option<PathBuf>,
    ports: &dyn PortAllocator,
) -> Result<bool, RpcError> {
    let mut service = app
        .service_by_url(url)
        .cloned()
        .ok_or_else(|| ServiceError::NotFound(url.to_string()))?;

    let proxy_urls: Vec<String> = app
        .services
        .iter()
        .filter(|s| s.service_type == ServiceType::Proxy)
        .map(|s| s.url.clone())
        .collect();

    let mut pipelines: Vec<Pipeline> = Vec::new();
    for pipeline in service_pipelines(&app.proxy_chains, url) {
        prepare_adding_pipeline(&pipelines, &proxy_urls, &service, &pipeline)?;
        pipelines.push(pipeline);
    }

    let changed = match store_dir {
        Some(dir) => {
            let mut store = MirrorStore::new(FileStore::new(dir), app);
            lint_pipelines(&mut store, &mut service, &pipelines, ports)?
        }
        None => lint_pipelines(app, &mut service, &pipelines, ports)?,
    };
    if changed {
        app.set_service(service)?;
    }
    Ok(changed)
}
