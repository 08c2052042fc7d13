//! Configuration loading and saving.
//!
//! Missing or malformed config files fall back to defaults; the portal must
//! still gate correctly with no config on disk.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{GateError, Result};
use crate::storage::StorageConfig;

pub const ADMIN_SECRET_ENV: &str = "PORTAL_ADMIN_SETUP_SECRET";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub profile_setup: String,
    pub auth: String,
    pub landing: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            profile_setup: "/profile-setup".to_string(),
            auth: "/auth".to_string(),
            landing: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub routes: RouteConfig,
    /// Shared secret for the one-shot admin bootstrap. `None` disables it.
    pub admin_setup_secret: Option<String>,
}

impl PortalConfig {
    /// Applies environment overrides. The lookup is injected so tests never touch process env.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secret) = lookup(ADMIN_SECRET_ENV) {
            if !secret.trim().is_empty() {
                self.admin_setup_secret = Some(secret);
            }
        }
        self
    }
}

/// Loads the portal configuration, returning defaults if the file is missing or unreadable.
pub fn load_portal_config(storage: &StorageConfig) -> PortalConfig {
    let path = storage.config_file();
    let config = match fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<PortalConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Malformed portal config; using defaults");
                PortalConfig::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => PortalConfig::default(),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Failed to read portal config; using defaults");
            PortalConfig::default()
        }
    };
    config.with_overrides(|key| env::var(key).ok())
}

/// Saves the portal configuration to disk.
pub fn save_portal_config(storage: &StorageConfig, config: &PortalConfig) -> Result<()> {
    let path = storage.config_file();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| GateError::Io {
            context: "create config directory".to_string(),
            source,
        })?;
    }
    let content = serde_json::to_string_pretty(config).map_err(|source| GateError::Json {
        context: "serialize portal config".to_string(),
        source,
    })?;
    fs::write(&path, content).map_err(|source| GateError::Io {
        context: format!("write {}", path.display()),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let config = load_portal_config(&storage).with_overrides(|_| None);
        assert_eq!(config.routes, RouteConfig::default());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::write(storage.config_file(), "{ not json").unwrap();
        let config = load_portal_config(&storage);
        assert_eq!(config.routes, RouteConfig::default());
    }

    #[test]
    fn save_then_load_keeps_custom_routes() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().join("nested"));
        let config = PortalConfig {
            routes: RouteConfig {
                profile_setup: "/onboarding".to_string(),
                ..RouteConfig::default()
            },
            admin_setup_secret: None,
        };
        save_portal_config(&storage, &config).unwrap();

        let loaded = load_portal_config(&storage);
        assert_eq!(loaded.routes.profile_setup, "/onboarding");
        assert_eq!(loaded.routes.auth, "/auth");
    }

    #[test]
    fn partial_routes_fill_defaults() {
        let config: PortalConfig =
            serde_json::from_str(r#"{ "routes": { "auth": "/login" } }"#).unwrap();
        assert_eq!(config.routes.auth, "/login");
        assert_eq!(config.routes.landing, "/");
    }

    #[test]
    fn env_override_sets_secret() {
        let config = PortalConfig::default().with_overrides(|key| {
            (key == ADMIN_SECRET_ENV).then(|| "s3cret".to_string())
        });
        assert_eq!(config.admin_setup_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn blank_env_override_is_ignored() {
        let config = PortalConfig {
            admin_setup_secret: Some("from-file".to_string()),
            ..PortalConfig::default()
        }
        .with_overrides(|_| Some("  ".to_string()));
        assert_eq!(config.admin_setup_secret.as_deref(), Some("from-file"));
    }
}
