//! Proxy-chain configuration engine.
//!
//! Loads an application's services and proxy chains, serves them over a
//! request handler, and lints the chains so proxy handlers stay in step with
//! the services they front.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod rpc;
pub mod topology;

pub use config::schema::EngineConfig;
pub use lifecycle::Shutdown;
pub use topology::{App, ProxyChain, Rule, Service};
