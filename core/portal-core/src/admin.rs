//! One-shot admin bootstrap.
//!
//! An operator holding the configured setup secret can promote the identity
//! behind a bearer token to the `admin` role. Checks run in a fixed order:
//! secret, bearer presence, bearer resolution, then the grant itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portal_backend_protocol::{ErrorInfo, UserId};
use serde::Serialize;

use crate::config::PortalConfig;
use crate::error::{GateError, Result};

pub const ADMIN_ROLE: &str = "admin";

/// Identity and role lookups needed by the bootstrap.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    /// Maps a bearer token to the identity it was issued for.
    async fn resolve_bearer(&self, bearer: &str) -> Result<Option<UserId>>;

    async fn has_role(&self, user: &UserId, role: &str) -> Result<bool>;

    async fn grant_role(&self, user: &UserId, role: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct AdminSettings {
    pub setup_secret: Option<String>,
}

impl AdminSettings {
    pub fn from_config(config: &PortalConfig) -> Self {
        Self {
            setup_secret: config.admin_setup_secret.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdminRequest {
    pub setup_secret: Option<String>,
    pub bearer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminGrant {
    pub user_id: UserId,
    /// False when the identity already held the role.
    pub newly_granted: bool,
    pub granted_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Setup secret missing or invalid")]
    InvalidSecret,

    #[error("Missing bearer token")]
    MissingBearer,

    #[error("Bearer token does not resolve to a user")]
    UnknownIdentity,

    #[error("Directory lookup failed: {0}")]
    Lookup(#[source] GateError),

    #[error("Failed to persist admin role: {0}")]
    Persist(#[source] GateError),
}

impl AdminError {
    pub fn status_code(&self) -> u16 {
        match self {
            AdminError::InvalidSecret => 403,
            AdminError::MissingBearer | AdminError::UnknownIdentity => 401,
            AdminError::Lookup(_) | AdminError::Persist(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AdminError::InvalidSecret => "invalid_setup_secret",
            AdminError::MissingBearer => "missing_bearer",
            AdminError::UnknownIdentity => "unknown_identity",
            AdminError::Lookup(_) => "directory_lookup_failed",
            AdminError::Persist(_) => "grant_failed",
        }
    }
}

impl From<&AdminError> for ErrorInfo {
    fn from(err: &AdminError) -> Self {
        ErrorInfo::new(err.code(), err.to_string())
    }
}

pub async fn bootstrap_admin(
    settings: &AdminSettings,
    directory: &dyn AdminDirectory,
    request: AdminRequest,
) -> std::result::Result<AdminGrant, AdminError> {
    let expected = settings
        .setup_secret
        .as_deref()
        .filter(|secret| !secret.is_empty());
    let provided = request.setup_secret.as_deref();
    let secret_ok = match (expected, provided) {
        (Some(expected), Some(provided)) => secrets_match(expected, provided),
        _ => false,
    };
    if !secret_ok {
        tracing::warn!(configured = expected.is_some(), "Admin bootstrap refused: bad setup secret");
        return Err(AdminError::InvalidSecret);
    }

    let bearer = request
        .bearer
        .as_deref()
        .map(str::trim)
        .filter(|bearer| !bearer.is_empty())
        .ok_or(AdminError::MissingBearer)?;

    let user = directory
        .resolve_bearer(bearer)
        .await
        .map_err(AdminError::Lookup)?
        .ok_or(AdminError::UnknownIdentity)?;

    let already = directory
        .has_role(&user, ADMIN_ROLE)
        .await
        .map_err(AdminError::Lookup)?;
    if !already {
        directory
            .grant_role(&user, ADMIN_ROLE)
            .await
            .map_err(|err| {
                tracing::error!(user_id = %user, error = %err, "Failed to grant admin role");
                AdminError::Persist(err)
            })?;
    }

    tracing::info!(user_id = %user, newly_granted = !already, "Admin bootstrap completed");
    Ok(AdminGrant {
        user_id: user,
        newly_granted: !already,
        granted_at: Utc::now(),
    })
}

/// Compares every byte instead of stopping at the first mismatch.
fn secrets_match(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    let mut diff = expected.len() ^ provided.len();
    for (index, byte) in provided.iter().enumerate() {
        let other = expected.get(index % expected.len().max(1)).copied().unwrap_or(0);
        diff |= usize::from(byte ^ other);
    }
    diff == 0
}
