//! Config store: where linting reads and writes other services' configs.
//!
//! # Responsibilities
//! - `ConfigStore` trait consumed by the linting pass
//! - `App` as an in-memory store keyed by service url
//! - `FileStore`: one YAML file per service under a directory
//! - `MirrorStore`: a `FileStore` seeded from, and mirrored into, the app

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::topology::app::App;
use crate::topology::service::{Service, ServiceError};

/// Errors raised by a config store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no config for service '{0}'")]
    NotFound(String),

    #[error("config of '{url}' rejected: {source}")]
    Invalid {
        url: String,
        #[source]
        source: ServiceError,
    },

    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error on '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Read/write access to service configs by url.
pub trait ConfigStore {
    fn get_config(&self, url: &str) -> Result<Service, StoreError>;
    fn set_config(&mut self, url: &str, service: Service) -> Result<(), StoreError>;
}

impl ConfigStore for App {
    fn get_config(&self, url: &str) -> Result<Service, StoreError> {
        self.service_by_url(url)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(url.to_string()))
    }

    fn set_config(&mut self, url: &str, service: Service) -> Result<(), StoreError> {
        service.validate().map_err(|source| StoreError::Invalid {
            url: url.to_string(),
            source,
        })?;

        match self.service_by_url_mut(url) {
            Some(existing) => *existing = service,
            None => self.services.push(service),
        }
        tracing::debug!(url, "Stored service config in app");
        Ok(())
    }
}

/// Stores each service as `<dir>/<url>.yml`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the config file of `url`. Path separators become dots.
    pub fn path_for(&self, url: &str) -> PathBuf {
        let name: String = url
            .chars()
            .map(|c| if c == '/' || c == '\\' { '.' } else { c })
            .collect();
        self.dir.join(format!("{name}.yml"))
    }
}

impl ConfigStore for FileStore {
    fn get_config(&self, url: &str) -> Result<Service, StoreError> {
        let path = self.path_for(url);
        if !path.exists() {
            return Err(StoreError::NotFound(url.to_string()));
        }

        let content = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let service: Service =
            serde_yaml::from_str(&content).map_err(|source| StoreError::Yaml {
                path: path.clone(),
                source,
            })?;

        service.validate().map_err(|source| StoreError::Invalid {
            url: url.to_string(),
            source,
        })?;
        Ok(service)
    }

    fn set_config(&mut self, url: &str, service: Service) -> Result<(), StoreError> {
        service.validate().map_err(|source| StoreError::Invalid {
            url: url.to_string(),
            source,
        })?;

        let path = self.path_for(url);
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let content = serde_yaml::to_string(&service).map_err(|source| StoreError::Yaml {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, content).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(url, path = ?path, "Wrote service config");
        Ok(())
    }
}

/// A [`FileStore`] backed by the app.
///
/// Reads prefer the service file and fall back to the app's copy, so files
/// that were never written still resolve. Writes go to the file and to the
/// app, keeping both in step.
pub struct MirrorStore<'a> {
    files: FileStore,
    app: &'a mut App,
}

impl<'a> MirrorStore<'a> {
    pub fn new(files: FileStore, app: &'a mut App) -> Self {
        Self { files, app }
    }
}

impl ConfigStore for MirrorStore<'_> {
    fn get_config(&self, url: &str) -> Result<Service, StoreError> {
        match self.files.get_config(url) {
            Err(StoreError::NotFound(_)) => self.app.get_config(url),
            other => other,
        }
    }

    fn set_config(&mut self, url: &str, service: Service) -> Result<(), StoreError> {
        self.files.set_config(url, service.clone())?;
        self.app.set_config(url, service)
    }
}
