//! Handler and client descriptors.
//!
//! A handler is an endpoint of a service, grouped by category. A client is
//! the descriptor another service uses to reach a handler.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::PortAllocator;

/// Category of the handlers a proxy receives requests on.
pub const SOURCE_CATEGORY: &str = "source";

/// Category of the handlers a proxy forwards requests through.
pub const DESTINATION_CATEGORY: &str = "destination";

/// Messaging pattern of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerType {
    SyncReplier,
    Replier,
    Publisher,
    Pair,
}

impl HandlerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerType::SyncReplier => "sync-replier",
            HandlerType::Replier => "replier",
            HandlerType::Publisher => "publisher",
            HandlerType::Pair => "pair",
        }
    }
}

impl fmt::Display for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown handler type '{0}'")]
pub struct UnknownHandlerType(pub String);

impl FromStr for HandlerType {
    type Err = UnknownHandlerType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync-replier" => Ok(HandlerType::SyncReplier),
            "replier" => Ok(HandlerType::Replier),
            "publisher" => Ok(HandlerType::Publisher),
            "pair" => Ok(HandlerType::Pair),
            other => Err(UnknownHandlerType(other.to_string())),
        }
    }
}

/// One handler instance of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handler {
    pub id: String,
    pub category: String,
    #[serde(rename = "type")]
    pub handler_type: HandlerType,
    /// Zero for handlers only reachable inside the process.
    #[serde(default)]
    pub port: u16,
}

impl Handler {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        handler_type: HandlerType,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            handler_type,
            port,
        }
    }

    /// In-process handler: no port, id is the category.
    pub fn internal(handler_type: HandlerType, category: impl Into<String>) -> Self {
        let category = category.into();
        Self::new(category.clone(), category, handler_type, 0)
    }

    /// Network handler on a freshly allocated port.
    pub fn external(
        handler_type: HandlerType,
        category: impl Into<String>,
        ports: &dyn PortAllocator,
    ) -> std::io::Result<Self> {
        let category = category.into();
        let port = ports.free_port()?;
        Ok(Self::new(format!("{category}_{port}"), category, handler_type, port))
    }

    pub fn is_internal(&self) -> bool {
        self.port == 0
    }
}

/// How a service reaches a handler of another service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_url: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<HandlerType>,
}

impl Client {
    pub fn new(id: impl Into<String>, service_url: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            service_url: service_url.into(),
            port,
            target_type: None,
        }
    }

    pub fn with_target(mut self, target_type: HandlerType) -> Self {
        self.target_type = Some(target_type);
        self
    }

    /// Client pointing at `handler` of the service at `service_url`.
    pub fn for_handler(service_url: impl Into<String>, handler: &Handler) -> Self {
        Self::new(handler.id.clone(), service_url, handler.port).with_target(handler.handler_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::SequentialPorts;

    #[test]
    fn test_handler_type_parsing() {
        assert_eq!("replier".parse::<HandlerType>(), Ok(HandlerType::Replier));
        assert_eq!("sync-replier".parse::<HandlerType>(), Ok(HandlerType::SyncReplier));
        assert!("router".parse::<HandlerType>().is_err());
        assert_eq!(HandlerType::Publisher.to_string(), "publisher");
    }

    #[test]
    fn test_internal_handler() {
        let handler = Handler::internal(HandlerType::Replier, "main");
        assert_eq!(handler.id, "main");
        assert_eq!(handler.category, "main");
        assert!(handler.is_internal());
    }

    #[test]
    fn test_external_handler() {
        let ports = SequentialPorts::starting_at(7000);
        let handler = Handler::external(HandlerType::Pair, "db", &ports).unwrap();
        assert_eq!(handler.port, 7000);
        assert_eq!(handler.id, "db_7000");
        assert!(!handler.is_internal());
    }

    #[test]
    fn test_handler_yaml_field_names() {
        let handler = Handler::new("main_1", "main", HandlerType::SyncReplier, 4000);
        let text = serde_yaml::to_string(&handler).unwrap();
        assert!(text.contains("type: sync-replier"));

        let parsed: Handler = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed, handler);
    }

    #[test]
    fn test_client_for_handler() {
        let handler = Handler::new("src-1", SOURCE_CATEGORY, HandlerType::Replier, 5000);
        let client = Client::for_handler("proxy-url", &handler);
        assert_eq!(client.id, "src-1");
        assert_eq!(client.port, 5000);
        assert_eq!(client.target_type, Some(HandlerType::Replier));
    }
}
