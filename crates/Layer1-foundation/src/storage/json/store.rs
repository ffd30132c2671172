//! JSON file store
//!
//! A store is one directory of JSON settings. Files are read as raw
//! documents so callers can overlay partial layers key by key.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Directory name used for both the global and the project store
const STORE_DIR: &str = "warden";

/// Directory holding one layer of JSON settings
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `<config dir>/warden/`
    pub fn global() -> Result<Self> {
        dirs::config_dir()
            .map(|dir| Self::new(dir.join(STORE_DIR)))
            .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))
    }

    /// `<root>/.warden/`
    pub fn project(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(format!(".{}", STORE_DIR)))
    }

    pub fn current_project() -> Result<Self> {
        std::env::current_dir()
            .map(Self::project)
            .map_err(|e| Error::Config(format!("Cannot get current directory: {}", e)))
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(filename)
    }

    /// Raw document of `filename`; `None` when the file does not exist
    pub fn read_layer(&self, filename: &str) -> Result<Option<Value>> {
        let path = self.file_path(filename);
        match std::fs::read_to_string(&path) {
            Ok(content) => parse(&path, &content).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(read_error(&path, e)),
        }
    }
}

/// Load a typed JSON file by path (task definition files)
pub fn load_path<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| read_error(path, e))?;
    parse(path, &content)
}

fn parse<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    serde_json::from_str(content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

fn read_error(path: &Path, e: std::io::Error) -> Error {
    Error::Config(format!("Failed to read {}: {}", path.display(), e))
}
