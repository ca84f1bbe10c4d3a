//! Pipeline registration and linting.
//!
//! # Data Flow
//! ```text
//! App.proxy_chains
//!     → pipeline.rs (service_pipelines: chains ending at one service)
//!     → prepare.rs  (prepare_adding_pipeline: head, proxies, ends)
//!     → lint.rs     (lint_pipelines)
//!           handler pipelines:  last proxy → handlers / service proxy
//!           service pipeline:   last proxy → service handlers
//!           every pipeline:     front proxies → next proxy, far end first
//!     → store.rs    (ConfigStore::set_config for each changed proxy)
//! ```
//!
//! # Design Decisions
//! - Other services are only reached through `ConfigStore`
//! - Ports come from a `PortAllocator` passed in by the caller
//! - Linting is synchronous; the caller serialises passes

#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod lint;
pub mod prepare;
pub mod store;

pub use lint::{lint_pipelines, LintError};
pub use pipeline::{service_pipelines, PipeEnd, Pipeline, PipelineError};
pub use prepare::prepare_adding_pipeline;
pub use store::{ConfigStore, FileStore, MirrorStore, StoreError};
