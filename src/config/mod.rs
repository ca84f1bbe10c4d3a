//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!
//! app file (YAML), located by --config / CONFIG_NAME + CONFIG_PATH
//!     → loader.rs (read_app, or write an empty App when missing)
//!     → App shared through ArcSwap
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs re-reads the app
//!     → atomic swap of Arc<App>
//!
//! params.rs: environment first, runtime defaults second
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod params;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use params::Params;
pub use schema::EngineConfig;
