//! Service topology: rules, proxies, chains and the services they connect.
//!
//! # Data Flow
//! ```text
//! app file
//!     → App { services, proxy_chains }
//!     → ProxyChain { sources, proxies, destination: Rule }
//!           Rule::Service  → every handler of the urls
//!           Rule::Handler  → handler categories of the urls
//!           Rule::Route    → commands of those categories
//!     → Service { handlers, extensions, sources }
//!           sources: Rule → [SourceService] registered by linting
//! ```
//!
//! # Design Decisions
//! - Everything here is plain data with synchronous operations
//! - Validation predicates return `bool`; registration returns `ServiceError`
//! - Rules compare as sets; `None` never equals anything

pub mod app;
pub mod chain;
pub mod handler;
pub mod proxy;
pub mod rule;
pub mod service;
pub mod source;

pub use app::App;
pub use chain::ProxyChain;
pub use handler::{Client, Handler, HandlerType};
pub use proxy::Proxy;
pub use rule::Rule;
pub use service::{Service, ServiceError, ServiceType};
pub use source::{Source, SourceService};
