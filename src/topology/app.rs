//! Application aggregate: every service plus the proxy chains between them.

use serde::{Deserialize, Serialize};

use super::chain::{proxy_chain_index, proxy_chains_by_rule_url, ProxyChain};
use super::service::{Service, ServiceError};

/// Root of the application config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct App {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub proxy_chains: Vec<ProxyChain>,
}

impl App {
    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|service| service.id == id)
    }

    /// First service with `url`.
    pub fn service_by_url(&self, url: &str) -> Option<&Service> {
        self.services.iter().find(|service| service.url == url)
    }

    pub fn service_by_url_mut(&mut self, url: &str) -> Option<&mut Service> {
        self.services.iter_mut().find(|service| service.url == url)
    }

    /// Validates and stores `service`, replacing the one with the same id.
    pub fn set_service(&mut self, service: Service) -> Result<(), ServiceError> {
        service.validate()?;

        match self.services.iter().position(|existing| existing.id == service.id) {
            Some(i) => self.services[i] = service,
            None => self.services.push(service),
        }
        Ok(())
    }

    /// Validates and stores a proxy chain.
    ///
    /// Destination services already known to the app must own every
    /// destination category. A chain with an equal rule is replaced in place.
    /// Returns true if the chains changed.
    pub fn set_proxy_chain(&mut self, chain: ProxyChain) -> Result<bool, ServiceError> {
        if !chain.is_valid() {
            return Err(ServiceError::InvalidChain);
        }

        for url in chain.destination.urls() {
            let Some(service) = self.service_by_url(url) else {
                continue;
            };
            for category in chain.destination.categories() {
                if !service.has_category(category) {
                    return Err(ServiceError::MissingCategory {
                        url: url.clone(),
                        category: category.clone(),
                    });
                }
            }
        }

        match proxy_chain_index(&self.proxy_chains, &chain.destination) {
            Some(i) if self.proxy_chains[i] == chain => Ok(false),
            Some(i) => {
                self.proxy_chains[i] = chain;
                Ok(true)
            }
            None => {
                self.proxy_chains.push(chain);
                Ok(true)
            }
        }
    }

    /// Chains whose destination lists `url`.
    pub fn proxy_chains_by_url(&self, url: &str) -> Vec<&ProxyChain> {
        proxy_chains_by_rule_url(&self.proxy_chains, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::handler::{Handler, HandlerType};
    use crate::topology::proxy::Proxy;
    use crate::topology::rule::Rule;
    use crate::topology::service::ServiceType;

    fn web() -> Service {
        let mut service = Service::new("web", "web-url", ServiceType::Independent);
        service.set_handler(Handler::new("main", "main", HandlerType::Replier, 4000));
        service
    }

    fn chain(rule: Rule, proxy_id: &str) -> ProxyChain {
        ProxyChain::new(Vec::new(), vec![Proxy::new(proxy_id, format!("{proxy_id}-url"), "proxy")], rule)
    }

    #[test]
    fn test_set_service_upserts_by_id() {
        let mut app = App::default();
        app.set_service(web()).unwrap();

        let mut moved = web();
        moved.url = "web-url-2".to_string();
        app.set_service(moved).unwrap();

        assert_eq!(app.services.len(), 1);
        assert!(app.service_by_url("web-url-2").is_some());
        assert!(app.service("web").is_some());
        assert!(app.service("api").is_none());
    }

    #[test]
    fn test_set_service_rejects_invalid() {
        let mut app = App::default();
        let invalid = Service::new("", "web-url", ServiceType::Independent);
        assert!(app.set_service(invalid).is_err());
        assert!(app.services.is_empty());
    }

    #[test]
    fn test_set_proxy_chain() {
        let mut app = App::default();
        app.set_service(web()).unwrap();

        let rule = Rule::handler(["web-url"], ["main"]);
        assert!(app.set_proxy_chain(chain(rule.clone(), "auth")).unwrap());
        assert!(!app.set_proxy_chain(chain(rule.clone(), "auth")).unwrap());

        assert!(app.set_proxy_chain(chain(rule, "log")).unwrap());
        assert_eq!(app.proxy_chains.len(), 1);
        assert_eq!(app.proxy_chains[0].proxies[0].id, "log");

        assert!(app.set_proxy_chain(chain(Rule::service(["web-url"]), "auth")).unwrap());
        assert_eq!(app.proxy_chains_by_url("web-url").len(), 2);
    }

    #[test]
    fn test_set_proxy_chain_rejects_missing_category() {
        let mut app = App::default();
        app.set_service(web()).unwrap();

        let rule = Rule::handler(["web-url"], ["db"]);
        assert!(matches!(
            app.set_proxy_chain(chain(rule, "auth")),
            Err(ServiceError::MissingCategory { .. })
        ));

        // unknown services are not checked
        let rule = Rule::handler(["api-url"], ["db"]);
        assert!(app.set_proxy_chain(chain(rule, "auth")).unwrap());
    }

    #[test]
    fn test_set_proxy_chain_rejects_invalid() {
        let mut app = App::default();
        let invalid = ProxyChain::new(Vec::new(), Vec::new(), Rule::service(["web-url"]));
        assert!(matches!(
            app.set_proxy_chain(invalid),
            Err(ServiceError::InvalidChain)
        ));
    }
}
