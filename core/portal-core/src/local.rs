//! Local stand-in for the hosted backend, kept in memory or in a JSON file.
//!
//! Used by the CLI and by tests. Every committed row change is published on
//! the in-process change feed exactly like the hosted service would.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "profiles": { "U1": { "user_id": "U1", "company_name": "Acme", ... } },
//!   "subscriptions": { "U1": { "user_id": "U1", "plan_tier": "advanced", ... } },
//!   "bearer_tokens": { "token-abc": "U1" },
//!   "roles": { "U1": ["admin"] }
//! }
//! ```
//!
//! Writes go through a temp file + rename so a crash never leaves a partial file.

use async_trait::async_trait;
use fs_err as fs;
use portal_backend_protocol::{
    AppMode, ProfileRow, SubscriptionRow, Table, UserId, SCHEMA_VERSION,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

use crate::accessor::lock;
use crate::admin::AdminDirectory;
use crate::backend::{change_notification, Backend, ChangeHub, ChangeStream};
use crate::error::{GateError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BackendFile {
    version: u32,
    #[serde(default)]
    profiles: BTreeMap<UserId, ProfileRow>,
    #[serde(default)]
    subscriptions: BTreeMap<UserId, SubscriptionRow>,
    #[serde(default)]
    bearer_tokens: BTreeMap<String, UserId>,
    #[serde(default)]
    roles: BTreeMap<UserId, BTreeSet<String>>,
}

impl Default for BackendFile {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            profiles: BTreeMap::new(),
            subscriptions: BTreeMap::new(),
            bearer_tokens: BTreeMap::new(),
            roles: BTreeMap::new(),
        }
    }
}

pub struct LocalBackend {
    data: Mutex<BackendFile>,
    file_path: Option<PathBuf>,
    hub: ChangeHub,
}

impl LocalBackend {
    pub fn new_in_memory() -> Self {
        Self {
            data: Mutex::new(BackendFile::default()),
            file_path: None,
            hub: ChangeHub::new(),
        }
    }

    /// Opens a file-backed backend. A missing or empty file starts empty.
    pub fn open(file_path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(file_path) {
            Ok(content) if content.trim().is_empty() => {
                tracing::warn!(path = %file_path.display(), "Empty backend file, starting empty");
                BackendFile::default()
            }
            Ok(content) => {
                let parsed: BackendFile =
                    serde_json::from_str(&content).map_err(|source| GateError::Json {
                        context: format!("parse {}", file_path.display()),
                        source,
                    })?;
                if parsed.version != SCHEMA_VERSION {
                    return Err(GateError::UnsupportedVersion {
                        path: file_path.to_path_buf(),
                        found: parsed.version,
                        expected: SCHEMA_VERSION,
                    });
                }
                parsed
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BackendFile::default(),
            Err(source) => {
                return Err(GateError::Io {
                    context: format!("read {}", file_path.display()),
                    source,
                })
            }
        };

        Ok(Self {
            data: Mutex::new(data),
            file_path: Some(file_path.to_path_buf()),
            hub: ChangeHub::new(),
        })
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Inserts or replaces a profile row and publishes the change.
    pub fn upsert_profile(&self, row: ProfileRow) -> Result<()> {
        row.validate().map_err(|source| GateError::MalformedRow {
            entity: "profile",
            source,
        })?;
        let user = row.user_id.clone();
        self.commit(|data| {
            data.profiles.insert(user.clone(), row.clone());
        })?;
        self.publish(Table::Profiles, &user, &row);
        Ok(())
    }

    pub fn upsert_subscription(&self, row: SubscriptionRow) -> Result<()> {
        row.validate().map_err(|source| GateError::MalformedRow {
            entity: "subscription",
            source,
        })?;
        let user = row.user_id.clone();
        self.commit(|data| {
            data.subscriptions.insert(user.clone(), row.clone());
        })?;
        self.publish(Table::Subscriptions, &user, &row);
        Ok(())
    }

    pub fn register_bearer(&self, token: &str, user: &UserId) -> Result<()> {
        self.commit(|data| {
            data.bearer_tokens.insert(token.to_string(), user.clone());
        })
    }

    pub fn roles(&self, user: &UserId) -> BTreeSet<String> {
        lock(&self.data).roles.get(user).cloned().unwrap_or_default()
    }

    pub fn profile(&self, user: &UserId) -> Option<ProfileRow> {
        lock(&self.data).profiles.get(user).cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Applies `mutate` to a copy, persists the copy, then swaps it in.
    /// Nothing changes in memory when persisting fails.
    fn commit<R>(&self, mutate: impl FnOnce(&mut BackendFile) -> R) -> Result<R> {
        let mut data = lock(&self.data);
        let mut next = data.clone();
        let result = mutate(&mut next);
        if let Some(path) = &self.file_path {
            write_atomic(path, &next)?;
        }
        *data = next;
        Ok(result)
    }

    fn publish<R: Serialize>(&self, table: Table, user: &UserId, row: &R) {
        match change_notification(table, user, row) {
            Ok(notification) => {
                self.hub.publish(&notification);
            }
            Err(err) => tracing::warn!(error = %err, "Failed to build change notification"),
        }
    }
}

/// Rows are scoped to their owner; a request without an identity owns nothing.
fn authorize(user: &UserId) -> Result<()> {
    if user.is_blank() {
        return Err(GateError::Unauthorized);
    }
    Ok(())
}

fn write_atomic(path: &Path, data: &BackendFile) -> Result<()> {
    let io_err = |context: &str, source: std::io::Error| GateError::Io {
        context: format!("{} {}", context, path.display()),
        source,
    };

    let content = serde_json::to_string_pretty(data).map_err(|source| GateError::Json {
        context: "serialize backend file".to_string(),
        source,
    })?;
    let parent_dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir).map_err(|source| io_err("create directory for", source))?;

    let mut temp_file =
        NamedTempFile::new_in(parent_dir).map_err(|source| io_err("create temp file for", source))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|source| io_err("write temp file for", source))?;
    temp_file
        .flush()
        .map_err(|source| io_err("flush temp file for", source))?;
    temp_file
        .persist(path)
        .map_err(|err| io_err("persist", err.error))?;
    Ok(())
}

#[async_trait]
impl Backend for LocalBackend {
    async fn fetch_profile(&self, user: &UserId) -> Result<Option<ProfileRow>> {
        authorize(user)?;
        Ok(self.profile(user))
    }

    async fn update_app_mode(&self, user: &UserId, mode: AppMode) -> Result<()> {
        authorize(user)?;
        // Checked before committing so a missing row never rewrites the file.
        if !lock(&self.data).profiles.contains_key(user) {
            return Err(GateError::NotFound {
                entity: "profile",
                user_id: user.clone(),
            });
        }
        let updated = self.commit(|data| {
            data.profiles.get_mut(user).map(|row| {
                row.app_mode = Some(mode);
                row.clone()
            })
        })?;
        let row = updated.ok_or_else(|| GateError::NotFound {
            entity: "profile",
            user_id: user.clone(),
        })?;
        self.publish(Table::Profiles, user, &row);
        Ok(())
    }

    async fn fetch_subscription(&self, user: &UserId) -> Result<Option<SubscriptionRow>> {
        authorize(user)?;
        Ok(lock(&self.data).subscriptions.get(user).cloned())
    }

    fn subscribe(&self, table: Table, user: &UserId) -> ChangeStream {
        self.hub.subscribe(table, user)
    }
}

#[async_trait]
impl AdminDirectory for LocalBackend {
    async fn resolve_bearer(&self, bearer: &str) -> Result<Option<UserId>> {
        Ok(lock(&self.data).bearer_tokens.get(bearer).cloned())
    }

    async fn has_role(&self, user: &UserId, role: &str) -> Result<bool> {
        Ok(lock(&self.data)
            .roles
            .get(user)
            .map(|roles| roles.contains(role))
            .unwrap_or(false))
    }

    async fn grant_role(&self, user: &UserId, role: &str) -> Result<()> {
        self.commit(|data| {
            data.roles
                .entry(user.clone())
                .or_default()
                .insert(role.to_string());
        })
    }
}
