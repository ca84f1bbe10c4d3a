//! Configuration loading from disk.
//!
//! Settings come from TOML; the app file (services and proxy chains) is YAML.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{AppFileConfig, EngineConfig};
use crate::config::validation::{validate_settings, ValidationError};
use crate::topology::app::App;
use crate::topology::service::ServiceError;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(toml::de::Error),
    Yaml(PathBuf, serde_yaml::Error),
    Validation(Vec<ValidationError>),
    MissingFile(PathBuf),
    InvalidService(String, ServiceError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "IO error on '{}': {}", path.display(), e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Yaml(path, e) => write!(f, "YAML error in '{}': {}", path.display(), e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::MissingFile(path) => {
                write!(f, "Config file '{}' does not exist", path.display())
            }
            ConfigError::InvalidService(id, e) => write!(f, "Service '{}' is invalid: {}", id, e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate daemon settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    let config: EngineConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_settings(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Location of the app file.
///
/// An explicit `flag` path (relative to the working directory) must exist.
/// Otherwise the file is `<path>/<name>.yml`, where `env_name`/`env_path`
/// override the settings defaults.
pub fn resolve_app_path(
    flag: Option<&Path>,
    env_name: Option<&str>,
    env_path: Option<&Path>,
    defaults: &AppFileConfig,
) -> Result<PathBuf, ConfigError> {
    if let Some(flag) = flag {
        let path = if flag.is_absolute() {
            flag.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| ConfigError::Io(flag.to_path_buf(), e))?
                .join(flag)
        };
        if !path.exists() {
            return Err(ConfigError::MissingFile(path));
        }
        return Ok(path);
    }

    let name = env_name
        .filter(|name| !name.is_empty())
        .unwrap_or(defaults.name.as_str());
    let dir = env_path.unwrap_or(defaults.path.as_path());

    Ok(dir.join(format!("{name}.yml")))
}

/// Read and validate the app file.
pub fn read_app(path: &Path) -> Result<App, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    let app: App =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Yaml(path.to_path_buf(), e))?;

    for service in &app.services {
        service
            .validate()
            .map_err(|e| ConfigError::InvalidService(service.id.clone(), e))?;
    }

    Ok(app)
}

/// Write the app file, creating parent directories.
pub fn write_app(path: &Path, app: &App) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ConfigError::Io(parent.to_path_buf(), e))?;
    }

    let content =
        serde_yaml::to_string(app).map_err(|e| ConfigError::Yaml(path.to_path_buf(), e))?;
    fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

    tracing::debug!(path = ?path, services = app.services.len(), "App file written");
    Ok(())
}

/// Read the app file, writing an empty one first if it does not exist.
pub fn load_or_create_app(path: &Path) -> Result<App, ConfigError> {
    if path.exists() {
        return read_app(path);
    }

    tracing::info!(path = ?path, "App file not found, writing an empty one");
    let app = App::default();
    write_app(path, &app)?;
    Ok(app)
}
