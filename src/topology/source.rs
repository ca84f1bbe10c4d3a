//! Source registry entries.
//!
//! A service records which proxies may call it and through which rule. Each
//! entry is a [`Source`]: a rule plus the proxies registered under it.

use serde::{Deserialize, Serialize};

use super::handler::{Client, SOURCE_CATEGORY};
use super::proxy::Proxy;
use super::rule::Rule;
use super::service::{Service, ServiceError, ServiceType};

/// A proxy registered as a caller of a service, with the clients the
/// service uses to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceService {
    #[serde(flatten)]
    pub proxy: Proxy,
    #[serde(default)]
    pub manager: Client,
    #[serde(default)]
    pub clients: Vec<Client>,
}

impl SourceService {
    pub fn id(&self) -> &str {
        &self.proxy.id
    }

    /// Describes a proxy service as a source of another service.
    ///
    /// Only proxy services qualify, and they need at least one source handler.
    pub fn from_proxy_service(service: &Service, proxy: Proxy) -> Result<Self, ServiceError> {
        if service.service_type != ServiceType::Proxy {
            return Err(ServiceError::NotProxy(service.url.clone()));
        }

        let clients = service
            .handlers_by_category(SOURCE_CATEGORY)?
            .into_iter()
            .map(|handler| Client::for_handler(service.url.clone(), handler))
            .collect();

        Ok(Self {
            proxy,
            manager: service.manager.clone(),
            clients,
        })
    }
}

/// Proxies allowed to reach a service through `rule`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub rule: Rule,
    #[serde(default)]
    pub proxies: Vec<SourceService>,
}

impl Source {
    pub fn new(rule: Rule, proxy: SourceService) -> Self {
        Self {
            rule,
            proxies: vec![proxy],
        }
    }

    pub fn proxy_index(&self, id: &str) -> Option<usize> {
        self.proxies.iter().position(|proxy| proxy.id() == id)
    }
}

/// Same proxy, same manager and the same clients in any order. False if
/// either side is missing.
pub fn is_equal_source_service(first: Option<&SourceService>, second: Option<&SourceService>) -> bool {
    let (Some(first), Some(second)) = (first, second) else {
        return false;
    };

    first.clients.len() == second.clients.len()
        && first
            .clients
            .iter()
            .all(|client| second.clients.contains(client))
        && first.manager == second.manager
        && first.proxy == second.proxy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::handler::{Handler, HandlerType};

    fn source_service(id: &str, port: u16) -> SourceService {
        SourceService {
            proxy: Proxy::new(id, format!("{id}-url"), "proxy"),
            manager: Client::new(format!("{id}_manager"), format!("{id}-url"), 9000),
            clients: vec![Client::new("c1", format!("{id}-url"), port)],
        }
    }

    #[test]
    fn test_source_service_equality() {
        let first = source_service("auth", 5000);
        let second = first.clone();
        assert!(is_equal_source_service(Some(&first), Some(&second)));
        assert!(!is_equal_source_service(Some(&first), None));
        assert!(!is_equal_source_service(None, None));

        let changed = source_service("auth", 5001);
        assert!(!is_equal_source_service(Some(&first), Some(&changed)));
    }

    #[test]
    fn test_source_service_clients_any_order() {
        let mut first = source_service("auth", 5000);
        first.clients.push(Client::new("c2", "auth-url", 5002));
        let mut second = first.clone();
        second.clients.reverse();
        assert!(is_equal_source_service(Some(&first), Some(&second)));

        second.clients.pop();
        assert!(!is_equal_source_service(Some(&first), Some(&second)));
    }

    #[test]
    fn test_from_proxy_service() {
        let mut service = Service::new("auth", "auth-url", ServiceType::Proxy);
        service.set_handler(Handler::new("in", SOURCE_CATEGORY, HandlerType::Replier, 5000));
        let proxy = Proxy::new("auth", "auth-url", "proxy");

        let converted = SourceService::from_proxy_service(&service, proxy.clone()).unwrap();
        assert_eq!(converted.clients.len(), 1);
        assert_eq!(converted.clients[0].port, 5000);
        assert_eq!(converted.clients[0].service_url, "auth-url");

        let plain = Service::new("web", "web-url", ServiceType::Independent);
        assert!(SourceService::from_proxy_service(&plain, proxy.clone()).is_err());

        let no_sources = Service::new("auth", "auth-url", ServiceType::Proxy);
        assert!(SourceService::from_proxy_service(&no_sources, proxy).is_err());
    }

    #[test]
    fn test_flattened_yaml() {
        let text = serde_yaml::to_string(&source_service("auth", 5000)).unwrap();
        assert!(text.contains("id: auth"));
        assert!(text.contains("category: proxy"));
        assert!(text.contains("clients:"));
    }
}
