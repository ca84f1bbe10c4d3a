//! Service descriptors.
//!
//! # Responsibilities
//! - Hold a service's identity, manager client, handlers, extensions and
//!   registered sources
//! - Handler and extension lookups
//! - Source registration (`set_service_source`) with change detection
//!
//! # Design Decisions
//! - Handlers are keyed by category but not unique by it; several handlers
//!   of one category are told apart by id
//! - Existing entries are overwritten by index, never through aliases

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::handler::{Client, Handler, HandlerType};
use super::rule::{is_equal_rule, Rule};
use super::source::{is_equal_source_service, Source, SourceService};
use crate::net::PortAllocator;

/// Errors raised by service and app lookups and registration.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service id is empty")]
    EmptyId,

    #[error("service url is empty")]
    EmptyUrl,

    #[error("handler category is empty")]
    EmptyCategory,

    #[error("unknown service type '{0}'")]
    UnknownType(String),

    #[error("'{category}' handler was not found in '{url}' service")]
    HandlerNotFound { url: String, category: String },

    #[error("service '{0}' has no handlers")]
    NoHandlers(String),

    #[error("service '{url}' has duplicate handler id '{id}'")]
    DuplicateHandler { url: String, id: String },

    #[error("service '{0}' is not a proxy")]
    NotProxy(String),

    #[error("service '{0}' not found")]
    NotFound(String),

    #[error("service '{0}' already exists")]
    AlreadyExists(String),

    #[error("proxy chain is invalid")]
    InvalidChain,

    #[error("destination service '{url}' has no '{category}' handler")]
    MissingCategory { url: String, category: String },

    #[error("failed to allocate port: {0}")]
    Port(#[from] std::io::Error),
}

/// Role of a service in the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Independent,
    Proxy,
    Extension,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Independent => "independent",
            ServiceType::Proxy => "proxy",
            ServiceType::Extension => "extension",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "independent" => Ok(ServiceType::Independent),
            "proxy" => Ok(ServiceType::Proxy),
            "extension" => Ok(ServiceType::Extension),
            other => Err(ServiceError::UnknownType(other.to_string())),
        }
    }
}

/// A service of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    #[serde(default)]
    pub manager: Client,
    #[serde(default)]
    pub handlers: Vec<Handler>,
    #[serde(default)]
    pub extensions: Vec<Client>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

/// Id of the manager client of service `id`. Empty for an empty id.
pub fn manager_id(id: &str) -> String {
    if id.is_empty() {
        return String::new();
    }
    format!("{id}_manager")
}

/// Manager client of a service on a fresh port.
pub fn new_manager(id: &str, url: &str, ports: &dyn PortAllocator) -> Result<Client, ServiceError> {
    if id.is_empty() {
        return Err(ServiceError::EmptyId);
    }
    if url.is_empty() {
        return Err(ServiceError::EmptyUrl);
    }

    let port = ports.free_port()?;
    Ok(Client::new(manager_id(id), url, port).with_target(HandlerType::SyncReplier))
}

impl Service {
    pub fn new(id: impl Into<String>, url: impl Into<String>, service_type: ServiceType) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            service_type,
            manager: Client::default(),
            handlers: Vec::new(),
            extensions: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// A service with no handlers and a generated manager client.
    pub fn empty(
        id: &str,
        url: &str,
        service_type: ServiceType,
        ports: &dyn PortAllocator,
    ) -> Result<Self, ServiceError> {
        let manager = new_manager(id, url, ports)?;
        let mut service = Self::new(id, url, service_type);
        service.manager = manager;
        Ok(service)
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.id.is_empty() {
            return Err(ServiceError::EmptyId);
        }
        if self.url.is_empty() {
            return Err(ServiceError::EmptyUrl);
        }

        for (i, handler) in self.handlers.iter().enumerate() {
            if handler.category.is_empty() {
                return Err(ServiceError::EmptyCategory);
            }
            if self.handlers[i + 1..].iter().any(|other| other.id == handler.id) {
                return Err(ServiceError::DuplicateHandler {
                    url: self.url.clone(),
                    id: handler.id.clone(),
                });
            }
        }

        Ok(())
    }

    /// First handler of `category`.
    pub fn handler_by_category(&self, category: &str) -> Result<&Handler, ServiceError> {
        if category.is_empty() {
            return Err(ServiceError::EmptyCategory);
        }

        self.handlers
            .iter()
            .find(|handler| handler.category == category)
            .ok_or_else(|| self.handler_not_found(category))
    }

    /// Every handler of `category`, in declaration order. At least one.
    pub fn handlers_by_category(&self, category: &str) -> Result<Vec<&Handler>, ServiceError> {
        if category.is_empty() {
            return Err(ServiceError::EmptyCategory);
        }

        let handlers: Vec<&Handler> = self
            .handlers
            .iter()
            .filter(|handler| handler.category == category)
            .collect();

        if handlers.is_empty() {
            return Err(self.handler_not_found(category));
        }
        Ok(handlers)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.handlers.iter().any(|handler| handler.category == category)
    }

    pub fn first_handler(&self) -> Result<&Handler, ServiceError> {
        self.handlers
            .first()
            .ok_or_else(|| ServiceError::NoHandlers(self.url.clone()))
    }

    /// Appends a handler. Same-category handlers accumulate.
    pub fn set_handler(&mut self, handler: Handler) {
        self.handlers.push(handler);
    }

    pub fn extension_by_url(&self, url: &str) -> Option<&Client> {
        self.extensions.iter().find(|extension| extension.service_url == url)
    }

    /// Adds an extension or replaces the one with the same url.
    pub fn set_extension(&mut self, extension: Client) {
        match self
            .extensions
            .iter()
            .position(|existing| existing.service_url == extension.service_url)
        {
            Some(i) => self.extensions[i] = extension,
            None => self.extensions.push(extension),
        }
    }

    /// Registers `source_service` as a caller of this service through `rule`.
    ///
    /// Returns true if the sources changed.
    pub fn set_service_source(&mut self, rule: &Rule, source_service: SourceService) -> bool {
        let Some(source) = self
            .sources
            .iter_mut()
            .find(|source| is_equal_rule(Some(&source.rule), Some(rule)))
        else {
            tracing::debug!(
                service = %self.url,
                proxy = %source_service.id(),
                "Registered new source rule"
            );
            self.sources.push(Source::new(rule.clone(), source_service));
            return true;
        };

        let Some(i) = source.proxy_index(source_service.id()) else {
            source.proxies.push(source_service);
            return true;
        };

        if is_equal_source_service(Some(&source.proxies[i]), Some(&source_service)) {
            return false;
        }

        source.proxies[i] = source_service;
        true
    }

    /// First registered source proxy with `id`, across all rules.
    pub fn source_by_id(&self, id: &str) -> Option<&SourceService> {
        self.sources
            .iter()
            .flat_map(|source| source.proxies.iter())
            .find(|proxy| proxy.id() == id)
    }

    fn handler_not_found(&self, category: &str) -> ServiceError {
        ServiceError::HandlerNotFound {
            url: self.url.clone(),
            category: category.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::SequentialPorts;
    use crate::topology::proxy::Proxy;

    fn source_service(id: &str, port: u16) -> SourceService {
        SourceService {
            proxy: Proxy::new(id, format!("{id}-url"), "proxy"),
            manager: Client::new(manager_id(id), format!("{id}-url"), 9000),
            clients: vec![Client::new("source", format!("{id}-url"), port)],
        }
    }

    #[test]
    fn test_manager_id() {
        assert_eq!(manager_id("web"), "web_manager");
        assert_eq!(manager_id(""), "");
    }

    #[test]
    fn test_new_manager() {
        let ports = SequentialPorts::starting_at(8100);
        let manager = new_manager("web", "web-url", &ports).unwrap();
        assert_eq!(manager.id, "web_manager");
        assert_eq!(manager.port, 8100);

        assert!(matches!(new_manager("", "web-url", &ports), Err(ServiceError::EmptyId)));
        assert!(matches!(new_manager("web", "", &ports), Err(ServiceError::EmptyUrl)));
    }

    #[test]
    fn test_empty_service() {
        let ports = SequentialPorts::starting_at(8200);
        let service = Service::empty("web", "web-url", ServiceType::Independent, &ports).unwrap();
        assert!(service.handlers.is_empty());
        assert_eq!(service.manager.port, 8200);
        assert!(service.validate().is_ok());
    }

    #[test]
    fn test_service_type_parsing() {
        assert_eq!("proxy".parse::<ServiceType>().unwrap(), ServiceType::Proxy);
        assert!(matches!(
            "gateway".parse::<ServiceType>(),
            Err(ServiceError::UnknownType(_))
        ));
    }

    #[test]
    fn test_handler_lookups() {
        let mut service = Service::new("web", "web-url", ServiceType::Independent);
        assert!(service.first_handler().is_err());

        service.set_handler(Handler::new("main_1", "main", HandlerType::Replier, 4001));
        service.set_handler(Handler::new("main_2", "main", HandlerType::Replier, 4002));
        service.set_handler(Handler::new("db", "db", HandlerType::Pair, 4003));

        assert_eq!(service.handler_by_category("main").unwrap().id, "main_1");
        assert_eq!(service.handlers_by_category("main").unwrap().len(), 2);
        assert_eq!(service.first_handler().unwrap().id, "main_1");
        assert!(matches!(
            service.handler_by_category(""),
            Err(ServiceError::EmptyCategory)
        ));
        assert!(matches!(
            service.handlers_by_category("cache"),
            Err(ServiceError::HandlerNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_duplicate_handler() {
        let mut service = Service::new("web", "web-url", ServiceType::Independent);
        service.set_handler(Handler::new("main", "main", HandlerType::Replier, 4001));
        service.set_handler(Handler::new("main", "main", HandlerType::Replier, 4002));
        assert!(matches!(
            service.validate(),
            Err(ServiceError::DuplicateHandler { .. })
        ));
    }

    #[test]
    fn test_set_extension_upserts_by_url() {
        let mut service = Service::new("web", "web-url", ServiceType::Independent);
        service.set_extension(Client::new("db", "db-url", 5000));
        service.set_extension(Client::new("db", "db-url", 5001));
        service.set_extension(Client::new("cache", "cache-url", 5002));

        assert_eq!(service.extensions.len(), 2);
        assert_eq!(service.extension_by_url("db-url").unwrap().port, 5001);
        assert!(service.extension_by_url("mq-url").is_none());
    }

    #[test]
    fn test_set_service_source() {
        let mut service = Service::new("web", "web-url", ServiceType::Independent);
        let rule = Rule::handler(["web-url"], ["main"]);

        // new rule
        assert!(service.set_service_source(&rule, source_service("auth", 5000)));
        assert_eq!(service.sources.len(), 1);
        assert_eq!(service.sources[0].proxies.len(), 1);

        // new proxy under the same rule
        assert!(service.set_service_source(&rule, source_service("log", 5100)));
        assert_eq!(service.sources.len(), 1);
        assert_eq!(service.sources[0].proxies.len(), 2);

        // unchanged proxy
        let before = service.clone();
        assert!(!service.set_service_source(&rule, source_service("auth", 5000)));
        assert_eq!(service, before);

        // changed proxy is overwritten in place
        assert!(service.set_service_source(&rule, source_service("auth", 5001)));
        assert_eq!(service.sources.len(), 1);
        assert_eq!(service.sources[0].proxies.len(), 2);
        assert_eq!(service.sources[0].proxies[0].clients[0].port, 5001);
    }

    #[test]
    fn test_source_by_id() {
        let mut service = Service::new("web", "web-url", ServiceType::Independent);
        service.set_service_source(&Rule::service(["web-url"]), source_service("auth", 5000));
        service.set_service_source(&Rule::handler(["web-url"], ["main"]), source_service("log", 5100));

        assert_eq!(service.source_by_id("log").unwrap().clients[0].port, 5100);
        assert!(service.source_by_id("cache").is_none());
    }
}
