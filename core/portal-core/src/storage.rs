//! Storage configuration and path management for the portal tools.
//!
//! Production code uses `StorageConfig::default()` which points to `~/.portal/`.
//! Tests use `StorageConfig::with_root(temp_dir)` for isolation.

use std::path::{Path, PathBuf};

const ROOT_DIR_NAME: &str = ".portal";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = dirs::home_dir()
            .map(|home| home.join(ROOT_DIR_NAME))
            .unwrap_or_else(|| std::env::temp_dir().join(ROOT_DIR_NAME));
        Self { root }
    }
}

impl StorageConfig {
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to backend.json (local stand-in for the hosted backend tables).
    pub fn backend_file(&self) -> PathBuf {
        self.root.join("backend.json")
    }

    /// Path to config.json (route names, admin setup secret).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
