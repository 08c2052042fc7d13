use portal_core::{load_portal_config, LocalBackend, PortalConfig, StorageConfig};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::CliError;

/// Everything a command needs: paths, config and the file-backed backend.
pub struct Context {
    pub storage: StorageConfig,
    pub config: PortalConfig,
    pub backend: Arc<LocalBackend>,
}

impl Context {
    pub fn storage(root: Option<PathBuf>) -> StorageConfig {
        root.map(StorageConfig::with_root).unwrap_or_default()
    }

    pub fn open(storage: StorageConfig) -> Result<Self, CliError> {
        let config = load_portal_config(&storage);
        let backend = LocalBackend::open(&storage.backend_file())?;
        tracing::debug!(root = %storage.root().display(), "Opened portal storage");
        Ok(Self {
            storage,
            config,
            backend: Arc::new(backend),
        })
    }
}
