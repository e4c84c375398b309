//! Config and catalog files.
//!
//! Documents are YAML unless the file extension is `.json`.

use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use sift::{CatalogProvider, Record};

/// A config or catalog file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read \"{}\": {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON parse error in \"{}\": {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("YAML parse error in \"{}\": {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Parse document text; `path` picks the format and labels errors.
pub fn parse_document<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T, LoadError> {
    if is_json(path) {
        serde_json::from_str(content).map_err(|source| LoadError::Json {
            path: path.to_owned(),
            source,
        })
    } else {
        // .yaml, .yml and anything else
        serde_yaml::from_str(content).map_err(|source| LoadError::Yaml {
            path: path.to_owned(),
            source,
        })
    }
}

/// Read and parse a document.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_owned(),
        source,
    })?;
    parse_document(path, &content)
}

/// Catalog file contents.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub devices: Vec<Record>,
    #[serde(default)]
    pub agents: Vec<Record>,
}

/// A catalog read from a file on every fetch.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<CatalogDocument, LoadError> {
        let document: CatalogDocument = load_document(&self.path)?;
        tracing::debug!(
            path = %self.path.display(),
            devices = document.devices.len(),
            agents = document.agents.len(),
            "catalog loaded"
        );
        Ok(document)
    }
}

impl CatalogProvider for FileCatalog {
    type Error = LoadError;

    fn fetch_devices(&self) -> Result<Vec<Record>, LoadError> {
        self.read().map(|d| d.devices)
    }

    fn fetch_agents(&self) -> Result<Vec<Record>, LoadError> {
        self.read().map(|d| d.agents)
    }
}
