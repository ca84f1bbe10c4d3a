//! Pipeline linting.
//!
//! # Responsibilities
//! - Keep each proxy's destination handlers in step with what it forwards to:
//!   the handlers of the service, or the source handlers of the next proxy
//! - Persist every changed proxy through the config store
//! - Register each pipeline's last proxy as a source of the service
//!
//! # Design Decisions
//! - Handlers are compared by position: destination #i mirrors handler #i
//! - A destination set of the wrong size is regenerated, not patched; the
//!   previous source ports are discarded
//! - The first store or structural error aborts the pass; configs already
//!   written stay written

use thiserror::Error;

use super::pipeline::{find_handler_ends, find_service_end, Pipeline, PipeEnd};
use super::store::{ConfigStore, StoreError};
use crate::net::PortAllocator;
use crate::observability::metrics;
use crate::topology::handler::{Handler, DESTINATION_CATEGORY, SOURCE_CATEGORY};
use crate::topology::service::{Service, ServiceError, ServiceType};
use crate::topology::source::SourceService;

/// Errors raised while linting.
#[derive(Debug, Error)]
pub enum LintError {
    #[error("config store failed for '{url}': {source}")]
    Store {
        url: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("service '{0}' is not a proxy")]
    NotProxy(String),

    #[error("destination '{0}' is a proxy, lint it as proxy to proxy")]
    DestinationIsProxy(String),

    #[error("destination '{0}' is not a proxy, lint it as proxy to service")]
    DestinationNotProxy(String),

    #[error("no destination handlers")]
    NoDestinationHandlers,

    #[error("proxy has {found} destination handlers, expecting {expected}")]
    HandlerCount { found: usize, expected: usize },

    #[error("proxy destination #{index} type {found} mismatches service handler type {expected}")]
    TypeMismatch {
        index: usize,
        found: String,
        expected: String,
    },

    #[error("pipeline has no proxy")]
    EmptyPipeline,

    #[error("failed to allocate port: {0}")]
    Port(#[from] std::io::Error),
}

fn get_config(store: &dyn ConfigStore, url: &str) -> Result<Service, LintError> {
    store.get_config(url).map_err(|source| LintError::Store {
        url: url.to_string(),
        source,
    })
}

fn set_config(store: &mut dyn ConfigStore, url: &str, service: Service) -> Result<(), LintError> {
    store.set_config(url, service).map_err(|source| LintError::Store {
        url: url.to_string(),
        source,
    })?;
    tracing::info!(url, "Linted proxy config updated");
    Ok(())
}

/// Copies ports of `expected` onto the destination handlers of `proxy_handlers`.
///
/// Returns true if a port changed. A count or type mismatch is an error.
pub fn lint_handlers(proxy_handlers: &mut [Handler], expected: &[&Handler]) -> Result<bool, LintError> {
    let mut destinations: Vec<&mut Handler> = proxy_handlers
        .iter_mut()
        .filter(|handler| handler.category == DESTINATION_CATEGORY)
        .collect();

    if destinations.len() != expected.len() {
        return Err(LintError::HandlerCount {
            found: destinations.len(),
            expected: expected.len(),
        });
    }

    for (index, (destination, handler)) in destinations.iter().zip(expected).enumerate() {
        if destination.handler_type != handler.handler_type {
            return Err(LintError::TypeMismatch {
                index,
                found: destination.handler_type.to_string(),
                expected: handler.handler_type.to_string(),
            });
        }
    }

    let mut updated = false;
    for (destination, handler) in destinations.iter_mut().zip(expected) {
        if destination.port != handler.port {
            destination.port = handler.port;
            updated = true;
        }
    }

    Ok(updated)
}

/// Replaces the handlers of `proxy` with a source and a destination handler
/// per expected handler.
///
/// Source handlers get fresh ports; destination handlers mirror `expected`.
pub fn rewrite_handlers(
    proxy: &mut Service,
    expected: &[&Handler],
    ports: &dyn PortAllocator,
) -> Result<(), LintError> {
    if expected.is_empty() {
        return Err(LintError::NoDestinationHandlers);
    }

    let mut handlers = Vec::with_capacity(expected.len() * 2);
    for handler in expected {
        handlers.push(Handler::new(
            format!("{}-source", handler.id),
            SOURCE_CATEGORY,
            handler.handler_type,
            ports.free_port()?,
        ));
        handlers.push(Handler::new(
            format!("{}-destination", handler.id),
            DESTINATION_CATEGORY,
            handler.handler_type,
            handler.port,
        ));
    }

    tracing::info!(
        proxy = %proxy.url,
        handlers = handlers.len(),
        "Rewrote proxy handlers"
    );
    proxy.handlers = handlers;
    Ok(())
}

fn lint_destinations_to_handlers(
    proxy: &mut Service,
    expected: &[&Handler],
    ports: &dyn PortAllocator,
) -> Result<bool, LintError> {
    let destinations = proxy
        .handlers
        .iter()
        .filter(|handler| handler.category == DESTINATION_CATEGORY)
        .count();
    if destinations == 0 {
        return Err(LintError::NoDestinationHandlers);
    }

    if destinations != expected.len() {
        rewrite_handlers(proxy, expected, ports)?;
        return Ok(true);
    }

    lint_handlers(&mut proxy.handlers, expected)
}

/// Lints a proxy against the non-proxy service it forwards to.
pub fn lint_proxy_to_service(
    proxy: &mut Service,
    destination: &Service,
    ports: &dyn PortAllocator,
) -> Result<bool, LintError> {
    if proxy.service_type != ServiceType::Proxy {
        return Err(LintError::NotProxy(proxy.url.clone()));
    }
    if destination.service_type == ServiceType::Proxy {
        return Err(LintError::DestinationIsProxy(destination.url.clone()));
    }

    let expected: Vec<&Handler> = destination.handlers.iter().collect();
    lint_destinations_to_handlers(proxy, &expected, ports)
}

/// Lints a proxy against the source handlers of the next proxy.
pub fn lint_proxy_to_proxy(
    proxy: &mut Service,
    destination: &Service,
    ports: &dyn PortAllocator,
) -> Result<bool, LintError> {
    if proxy.service_type != ServiceType::Proxy {
        return Err(LintError::NotProxy(proxy.url.clone()));
    }
    if destination.service_type != ServiceType::Proxy {
        return Err(LintError::DestinationNotProxy(destination.url.clone()));
    }

    let expected = destination.handlers_by_category(SOURCE_CATEGORY)?;
    lint_destinations_to_handlers(proxy, &expected, ports)
}

fn last_url(pipeline: &Pipeline) -> Result<&str, LintError> {
    pipeline
        .head_last()
        .map(|proxy| proxy.url.as_str())
        .ok_or(LintError::EmptyPipeline)
}

/// Lints the last proxy of a handler pipeline to the handlers it ends at.
fn lint_last_to_handler(
    store: &mut dyn ConfigStore,
    service: &Service,
    pipeline: &Pipeline,
    category: &str,
    ports: &dyn PortAllocator,
) -> Result<(), LintError> {
    let url = last_url(pipeline)?;
    let mut last = get_config(store, url)?;
    let expected = service.handlers_by_category(category)?;

    let updated = lint_destinations_to_handlers(&mut last, &expected, ports)?;
    metrics::record_lint("last_to_handler", updated);
    if updated {
        set_config(store, url, last)?;
    }
    Ok(())
}

/// Lints the last proxy of a handler pipeline to the proxy in front of the
/// service.
fn lint_last_to_proxy(
    store: &mut dyn ConfigStore,
    service_proxy: &Service,
    pipeline: &Pipeline,
    ports: &dyn PortAllocator,
) -> Result<(), LintError> {
    let url = last_url(pipeline)?;
    let mut last = get_config(store, url)?;

    let updated = lint_proxy_to_proxy(&mut last, service_proxy, ports)?;
    metrics::record_lint("last_to_proxy", updated);
    if updated {
        set_config(store, url, last)?;
    }
    Ok(())
}

/// Walks the proxies before the last one, from the far end inward, linting
/// each to the proxy after it.
fn lint_front(
    store: &mut dyn ConfigStore,
    pipeline: &Pipeline,
    ports: &dyn PortAllocator,
) -> Result<(), LintError> {
    let mut next = get_config(store, last_url(pipeline)?)?;

    for proxy in pipeline.head_front().iter().rev() {
        let mut config = get_config(store, &proxy.url)?;

        let updated = lint_proxy_to_proxy(&mut config, &next, ports)?;
        metrics::record_lint("proxy_to_proxy", updated);
        if updated {
            set_config(store, &proxy.url, config.clone())?;
        }
        next = config;
    }

    Ok(())
}

/// Lints every handler pipeline of `service`.
///
/// With a service pipeline present, handler pipelines end at its first proxy;
/// otherwise they end at the service's handlers directly.
pub fn lint_to_handlers(
    store: &mut dyn ConfigStore,
    service: &Service,
    pipelines: &[Pipeline],
    ports: &dyn PortAllocator,
) -> Result<(), LintError> {
    let service_proxy = match find_service_end(pipelines).and_then(Pipeline::beginning) {
        Some(beginning) => Some(get_config(store, &beginning.url)?),
        None => None,
    };

    for pipeline in find_handler_ends(pipelines) {
        let PipeEnd::Handler { category } = &pipeline.end else {
            continue;
        };

        match &service_proxy {
            Some(service_proxy) => lint_last_to_proxy(store, service_proxy, pipeline, ports)?,
            None => lint_last_to_handler(store, service, pipeline, category, ports)?,
        }
        lint_front(store, pipeline, ports)?;
    }

    Ok(())
}

/// Lints the pipeline that ends at `service` itself.
pub fn lint_to_service(
    store: &mut dyn ConfigStore,
    service: &Service,
    pipeline: &Pipeline,
    ports: &dyn PortAllocator,
) -> Result<(), LintError> {
    if !pipeline.has_length() {
        return Ok(());
    }

    let url = last_url(pipeline)?;
    let mut last = get_config(store, url)?;

    let updated = lint_proxy_to_service(&mut last, service, ports)?;
    metrics::record_lint("proxy_to_service", updated);
    if updated {
        set_config(store, url, last)?;
    }

    lint_front(store, pipeline, ports)
}

/// Full lint pass for `service`.
///
/// Lints the service pipeline, then the handler pipelines, then records each
/// pipeline's last proxy as a source of the service. Returns true if the
/// service's sources changed.
///
/// The service pipeline goes first: a rewrite of its proxy hands out new
/// source ports, and handler pipelines ending there must see them.
pub fn lint_pipelines(
    store: &mut dyn ConfigStore,
    service: &mut Service,
    pipelines: &[Pipeline],
    ports: &dyn PortAllocator,
) -> Result<bool, LintError> {
    if let Some(pipeline) = find_service_end(pipelines) {
        lint_to_service(store, service, pipeline, ports)?;
    }
    lint_to_handlers(store, service, pipelines, ports)?;

    let mut changed = false;
    for pipeline in pipelines {
        let Some(last) = pipeline.head_last() else {
            continue;
        };
        let config = get_config(store, &last.url)?;
        let source = SourceService::from_proxy_service(&config, last.clone())?;
        changed |= service.set_service_source(&pipeline.rule(&service.url), source);
    }

    tracing::info!(
        service = %service.url,
        pipelines = pipelines.len(),
        changed,
        "Lint pass finished"
    );
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::SequentialPorts;
    use crate::topology::app::App;
    use crate::topology::handler::HandlerType;
    use crate::topology::proxy::Proxy;

    fn proxy_service(name: &str, source_port: u16, destination_port: u16) -> Service {
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

    fn web() -> Service {
        let mut service = Service::new("web", "web-url", ServiceType::Independent);
        service.set_handler(Handler::new("main", "main", HandlerType::Replier, 4000));
        service
    }

    fn proxy(name: &str) -> Proxy {
        Proxy::new(name, format!("{name}-url"), "proxy")
    }

    #[test]
    fn test_lint_handlers_updates_ports() {
        let mut proxy = proxy_service("auth", 5000, 1);
        let main = Handler::new("main", "main", HandlerType::Replier, 4000);

        assert!(lint_handlers(&mut proxy.handlers, &[&main]).unwrap());
        assert_eq!(proxy.handlers[1].port, 4000);
        assert_eq!(proxy.handlers[0].port, 5000);
        assert!(!lint_handlers(&mut proxy.handlers, &[&main]).unwrap());
    }

    #[test]
    fn test_lint_handlers_mismatches() {
        let mut proxy = proxy_service("auth", 5000, 1);
        let main = Handler::new("main", "main", HandlerType::Replier, 4000);
        assert!(matches!(
            lint_handlers(&mut proxy.handlers, &[&main, &main]),
            Err(LintError::HandlerCount { found: 1, expected: 2 })
        ));

        let publisher = Handler::new("main", "main", HandlerType::Publisher, 4000);
        assert!(matches!(
            lint_handlers(&mut proxy.handlers, &[&publisher]),
            Err(LintError::TypeMismatch { index: 0, .. })
        ));
        assert_eq!(proxy.handlers[1].port, 1);
    }

    #[test]
    fn test_rewrite_handlers() {
        let mut proxy = proxy_service("auth", 5000, 1);
        let ports = SequentialPorts::starting_at(6000);
        let main = Handler::new("main", "main", HandlerType::Replier, 4000);
        let db = Handler::new("db", "db", HandlerType::Pair, 4001);

        rewrite_handlers(&mut proxy, &[&main, &db], &ports).unwrap();
        assert_eq!(proxy.handlers.len(), 4);
        assert_eq!(proxy.handlers[0].id, "main-source");
        assert_eq!(proxy.handlers[0].port, 6000);
        assert_eq!(proxy.handlers[1].id, "main-destination");
        assert_eq!(proxy.handlers[1].port, 4000);
        assert_eq!(proxy.handlers[3].handler_type, HandlerType::Pair);

        assert!(matches!(
            rewrite_handlers(&mut proxy, &[], &ports),
            Err(LintError::NoDestinationHandlers)
        ));
    }

    #[test]
    fn test_proxy_to_service_rewrites_on_count_mismatch() {
        let mut proxy = proxy_service("auth", 5000, 1);
        let mut service = web();
        service.set_handler(Handler::new("db", "db", HandlerType::Pair, 4001));
        let ports = SequentialPorts::starting_at(6000);

        assert!(lint_proxy_to_service(&mut proxy, &service, &ports).unwrap());
        assert_eq!(proxy.handlers.len(), 4);
        assert!(!lint_proxy_to_service(&mut proxy, &service, &ports).unwrap());
    }

    #[test]
    fn test_type_checks() {
        let ports = SequentialPorts::starting_at(6000);
        let mut not_proxy = web();
        let auth = proxy_service("auth", 5000, 1);
        assert!(matches!(
            lint_proxy_to_service(&mut not_proxy, &web(), &ports),
            Err(LintError::NotProxy(_))
        ));

        let mut proxy = proxy_service("log", 5100, 5000);
        assert!(matches!(
            lint_proxy_to_service(&mut proxy, &auth, &ports),
            Err(LintError::DestinationIsProxy(_))
        ));
        assert!(matches!(
            lint_proxy_to_proxy(&mut proxy, &web(), &ports),
            Err(LintError::DestinationNotProxy(_))
        ));
        assert!(!lint_proxy_to_proxy(&mut proxy, &auth, &ports).unwrap());
    }

    #[test]
    fn test_no_destination_handlers() {
        let ports = SequentialPorts::starting_at(6000);
        let mut proxy = Service::new("auth", "auth-url", ServiceType::Proxy);
        assert!(matches!(
            lint_proxy_to_service(&mut proxy, &web(), &ports),
            Err(LintError::NoDestinationHandlers)
        ));
    }

    #[test]
    fn test_lint_to_handlers_walks_the_chain() {
        let mut app = App::default();
        app.set_service(web()).unwrap();
        app.set_service(proxy_service("log", 5100, 9)).unwrap();
        app.set_service(proxy_service("auth", 5000, 1)).unwrap();
        let ports = SequentialPorts::starting_at(6000);

        let pipelines = vec![PipeEnd::handler("main").pipeline(vec![proxy("log"), proxy("auth")])];
        let service = web();
        lint_to_handlers(&mut app, &service, &pipelines, &ports).unwrap();

        let auth = app.service_by_url("auth-url").unwrap();
        assert_eq!(auth.handlers[1].port, 4000);
        let log = app.service_by_url("log-url").unwrap();
        assert_eq!(log.handlers[1].port, 5000);
    }

    #[test]
    fn test_lint_to_handlers_through_service_proxy() {
        let mut app = App::default();
        app.set_service(web()).unwrap();
        app.set_service(proxy_service("gate", 7000, 4000)).unwrap();
        app.set_service(proxy_service("auth", 5000, 1)).unwrap();
        let ports = SequentialPorts::starting_at(6000);

        let pipelines = vec![
            PipeEnd::Service.pipeline(vec![proxy("gate")]),
            PipeEnd::handler("main").pipeline(vec![proxy("auth")]),
        ];
        lint_to_handlers(&mut app, &web(), &pipelines, &ports).unwrap();

        let auth = app.service_by_url("auth-url").unwrap();
        assert_eq!(auth.handlers[1].port, 7000);
    }

    #[test]
    fn test_lint_to_service() {
        let mut app = App::default();
        app.set_service(web()).unwrap();
        app.set_service(proxy_service("gate", 7000, 1)).unwrap();
        let ports = SequentialPorts::starting_at(6000);

        let pipeline = PipeEnd::Service.pipeline(vec![proxy("gate")]);
        lint_to_service(&mut app, &web(), &pipeline, &ports).unwrap();
        assert_eq!(app.service_by_url("gate-url").unwrap().handlers[1].port, 4000);

        let empty = PipeEnd::Service.pipeline(Vec::new());
        assert!(lint_to_service(&mut app, &web(), &empty, &ports).is_ok());
    }

    #[test]
    fn test_missing_config_aborts() {
        let mut app = App::default();
        app.set_service(web()).unwrap();
        let ports = SequentialPorts::starting_at(6000);

        let pipelines = vec![PipeEnd::handler("main").pipeline(vec![proxy("auth")])];
        let err = lint_to_handlers(&mut app, &web(), &pipelines, &ports).unwrap_err();
        assert!(matches!(err, LintError::Store { ref url, .. } if url == "auth-url"));
    }

    #[test]
    fn test_lint_pipelines_registers_sources() {
        let mut app = App::default();
        app.set_service(web()).unwrap();
        app.set_service(proxy_service("auth", 5000, 1)).unwrap();
        let ports = SequentialPorts::starting_at(6000);

        let pipelines = vec![PipeEnd::handler("main").pipeline(vec![proxy("auth")])];
        let mut service = web();
        assert!(lint_pipelines(&mut app, &mut service, &pipelines, &ports).unwrap());
        assert_eq!(service.sources.len(), 1);
        assert_eq!(service.source_by_id("auth").unwrap().clients[0].port, 5000);

        assert!(!lint_pipelines(&mut app, &mut service, &pipelines, &ports).unwrap());
    }
}
