use portal_backend_protocol::ErrorInfo;
use portal_core::{AdminError, GateError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid row: {0}")]
    InvalidRow(ErrorInfo),
}

impl CliError {
    /// 2 for entitlement denials so scripts can tell them from transport failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Gate(err) if err.is_entitlement_denied() => 2,
            _ => 1,
        }
    }

    pub fn info(&self) -> ErrorInfo {
        let code = match self {
            CliError::Gate(err) => match err {
                GateError::EntitlementDenied { .. } => "entitlement_denied",
                GateError::NoSession | GateError::Unauthorized => "unauthorized",
                GateError::NotFound { .. } => "not_found",
                GateError::Backend { .. } | GateError::MalformedRow { .. } => "backend_error",
                GateError::Io { .. }
                | GateError::Json { .. }
                | GateError::UnsupportedVersion { .. } => "storage_error",
            },
            CliError::Admin(err) => err.code(),
            CliError::Json(_) => "invalid_json",
            CliError::InvalidRow(info) => return info.clone(),
        };
        ErrorInfo::new(code, self.to_string())
    }

    /// HTTP-style status for admin failures.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            CliError::Admin(err) => Some(err.status_code()),
            _ => None,
        }
    }
}
