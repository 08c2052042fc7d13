//! Error types for portal-core operations.
//!
//! Accessors fold `Backend` and `NotFound` into conservative defaults before
//! anything reaches the gate. `EntitlementDenied` is the only error a caller
//! is expected to show to the user.

use std::path::PathBuf;

use portal_backend_protocol::{AppMode, ErrorInfo, PlanTier, UserId};

/// All errors that can occur in portal-core operations.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    // ─────────────────────────────────────────────────────────────────────
    // Backend Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Backend request failed: {context}: {message}")]
    Backend { context: String, message: String },

    #[error("{entity} not found for user {user_id}")]
    NotFound {
        entity: &'static str,
        user_id: UserId,
    },

    #[error("Malformed {entity} row: {source}")]
    MalformedRow {
        entity: &'static str,
        #[source]
        source: ErrorInfo,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Session / Entitlement Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Not authorized")]
    Unauthorized,

    #[error("No active session")]
    NoSession,

    #[error("{target} mode requires the advanced plan (current plan: {})", plan_label(.plan))]
    EntitlementDenied {
        target: AppMode,
        plan: Option<PlanTier>,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Local Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported backend file version {found} at {path} (expected {expected})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

impl GateError {
    pub fn backend(context: impl Into<String>, message: impl Into<String>) -> Self {
        GateError::Backend {
            context: context.into(),
            message: message.into(),
        }
    }

    /// True when a mode switch was refused for plan reasons rather than transport.
    pub fn is_entitlement_denied(&self) -> bool {
        matches!(self, GateError::EntitlementDenied { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GateError::NotFound { .. })
    }
}

fn plan_label(plan: &Option<PlanTier>) -> &'static str {
    plan.map(|tier| tier.as_str()).unwrap_or("unknown")
}

/// Convenience type alias for Results using GateError.
pub type Result<T> = std::result::Result<T, GateError>;
