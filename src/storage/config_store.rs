use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::CONFIG_FILE_NAME;
use crate::error::PersistenceError;
use crate::grid::Configuration;

/// Shapes the configuration document has had on disk. The bare URL array is
/// what the first releases wrote.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDocument {
    UrlsOnly(Vec<String>),
    Current(Configuration),
}

/// JSON file holding the grid configuration.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: data_dir.into().join(CONFIG_FILE_NAME),
        }
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no document has been written yet.
    pub fn try_load(&self) -> Result<Option<Configuration>, PersistenceError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let config = match serde_json::from_slice::<StoredDocument>(&data)? {
            StoredDocument::Current(config) => config,
            StoredDocument::UrlsOnly(urls) => {
                log::info!("Upgrading URL-only configuration ({} URLs)", urls.len());
                Configuration::from_urls(urls)
            }
        };
        Ok(Some(config))
    }

    /// Best effort: a missing file or a broken document yields the defaults.
    pub fn load(&self) -> Configuration {
        match self.try_load() {
            Ok(Some(config)) => {
                log::info!("Configuration loaded from {}", self.path.display());
                config
            }
            Ok(None) => {
                log::info!("No configuration at {}, using defaults", self.path.display());
                Configuration::default()
            }
            Err(e) => {
                log::warn!("Ignoring unreadable configuration: {}", e);
                Configuration::default()
            }
        }
    }

    /// Write through a temporary file so a crash never leaves half a
    /// document behind.
    pub fn save(&self, config: &Configuration) -> Result<(), PersistenceError> {
        let io_err = |source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let data = serde_json::to_vec_pretty(config)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data).map_err(io_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }
}
