//! Row schemas and change-feed envelopes for the portal backend.
//!
//! This crate is shared by the portal core and every backend implementation
//! to prevent schema drift. Backends remain the authority on what they store,
//! but the core validates every row it receives through the same types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const SCHEMA_VERSION: u32 = 1;
pub const MAX_EVENT_ID_LEN: usize = 128;

/// Opaque, stable user identifier issued by the session source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppMode {
    #[default]
    Documents,
    Operations,
}

impl AppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::Documents => "documents",
            AppMode::Operations => "operations",
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppMode {
    type Err = ErrorInfo;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "documents" => Ok(AppMode::Documents),
            "operations" => Ok(AppMode::Operations),
            other => Err(ErrorInfo::new(
                "invalid_app_mode",
                format!("unknown app mode: {}", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Basic,
    Advanced,
    TrialOnly,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Basic => "basic",
            PlanTier::Advanced => "advanced",
            PlanTier::TrialOnly => "trial_only",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend tables the core reads from or listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Subscriptions,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorInfo {}

/// Per-user profile row. Only the fields the gate reads are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub user_id: UserId,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub controller_name: Option<String>,
    #[serde(default)]
    pub app_mode: Option<AppMode>,
}

impl ProfileRow {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.user_id.is_blank() {
            return Err(ErrorInfo::new("missing_field", "user_id is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRow {
    pub user_id: UserId,
    pub plan_tier: PlanTier,
    #[serde(default)]
    pub trial_active: bool,
    #[serde(default)]
    pub trial_expired: bool,
    #[serde(default)]
    pub days_remaining: u32,
    /// Informational only; expiry is asserted by the backend through `trial_expired`.
    #[serde(default)]
    pub trial_ends_at: Option<DateTime<Utc>>,
}

impl SubscriptionRow {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.user_id.is_blank() {
            return Err(ErrorInfo::new("missing_field", "user_id is required"));
        }
        if self.trial_active && self.trial_expired {
            return Err(ErrorInfo::new(
                "conflicting_trial_flags",
                "trial_active and trial_expired cannot both be set",
            ));
        }
        Ok(())
    }
}

/// A row-level update delivered by the backend change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeNotification {
    pub event_id: String,
    pub table: Table,
    pub user_id: UserId,
    pub committed_at: DateTime<Utc>,
    pub row: Value,
}

impl ChangeNotification {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.event_id.trim().is_empty() {
            return Err(ErrorInfo::new("invalid_event_id", "event_id is required"));
        }
        if self.event_id.len() > MAX_EVENT_ID_LEN {
            return Err(ErrorInfo::new(
                "invalid_event_id",
                format!("event_id must be {} characters or fewer", MAX_EVENT_ID_LEN),
            ));
        }
        if self.user_id.is_blank() {
            return Err(ErrorInfo::new("missing_field", "user_id is required"));
        }
        if !self.row.is_object() {
            return Err(ErrorInfo::new("invalid_row", "row must be an object"));
        }
        Ok(())
    }

    pub fn profile_row(&self) -> Result<ProfileRow, ErrorInfo> {
        self.expect_table(Table::Profiles)?;
        let row: ProfileRow = decode_row(&self.row)?;
        row.validate()?;
        self.expect_owner(&row.user_id)?;
        Ok(row)
    }

    pub fn subscription_row(&self) -> Result<SubscriptionRow, ErrorInfo> {
        self.expect_table(Table::Subscriptions)?;
        let row: SubscriptionRow = decode_row(&self.row)?;
        row.validate()?;
        self.expect_owner(&row.user_id)?;
        Ok(row)
    }

    fn expect_table(&self, table: Table) -> Result<(), ErrorInfo> {
        if self.table != table {
            return Err(ErrorInfo::new(
                "table_mismatch",
                format!("expected {:?} change, got {:?}", table, self.table),
            ));
        }
        Ok(())
    }

    fn expect_owner(&self, owner: &UserId) -> Result<(), ErrorInfo> {
        if owner != &self.user_id {
            return Err(ErrorInfo::new(
                "user_mismatch",
                format!("row belongs to {}, notification to {}", owner, self.user_id),
            ));
        }
        Ok(())
    }
}

fn decode_row<T: serde::de::DeserializeOwned>(row: &Value) -> Result<T, ErrorInfo> {
    serde_json::from_value(row.clone())
        .map_err(|err| ErrorInfo::new("invalid_row", format!("row is malformed: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile_change(row: Value) -> ChangeNotification {
        ChangeNotification {
            event_id: "evt-1".to_string(),
            table: Table::Profiles,
            user_id: UserId::from("U1"),
            committed_at: "2026-01-30T12:00:00Z".parse().unwrap(),
            row,
        }
    }

    #[test]
    fn parses_profile_change() {
        let change = profile_change(json!({
            "user_id": "U1",
            "company_name": "Acme",
            "controller_name": "Jane",
            "app_mode": "operations"
        }));
        let row = change.profile_row().expect("profile row");
        assert_eq!(row.company_name.as_deref(), Some("Acme"));
        assert_eq!(row.app_mode, Some(AppMode::Operations));
    }

    #[test]
    fn profile_row_fields_default_to_none() {
        let change = profile_change(json!({ "user_id": "U1" }));
        let row = change.profile_row().expect("profile row");
        assert_eq!(row.company_name, None);
        assert_eq!(row.app_mode, None);
    }

    #[test]
    fn rejects_row_for_other_user() {
        let change = profile_change(json!({ "user_id": "U2" }));
        let err = change.profile_row().unwrap_err();
        assert_eq!(err.code, "user_mismatch");
    }

    #[test]
    fn rejects_wrong_table() {
        let change = profile_change(json!({ "user_id": "U1" }));
        let err = change.subscription_row().unwrap_err();
        assert_eq!(err.code, "table_mismatch");
    }

    #[test]
    fn rejects_conflicting_trial_flags() {
        let mut change = profile_change(json!({
            "user_id": "U1",
            "plan_tier": "trial_only",
            "trial_active": true,
            "trial_expired": true
        }));
        change.table = Table::Subscriptions;
        let err = change.subscription_row().unwrap_err();
        assert_eq!(err.code, "conflicting_trial_flags");
    }

    fn decode_notification(payload: Value) -> Result<ChangeNotification, String> {
        let notification: ChangeNotification =
            serde_json::from_value(payload).map_err(|err| err.to_string())?;
        notification.validate().map_err(|info| info.code)?;
        Ok(notification)
    }

    #[test]
    fn notification_rejects_missing_event_id() {
        let payload = json!({
            "event_id": " ",
            "table": "profiles",
            "user_id": "U1",
            "committed_at": "2026-01-30T12:00:00Z",
            "row": { "user_id": "U1" }
        });
        assert!(decode_notification(payload).is_err());
    }

    #[test]
    fn notification_rejects_unknown_fields() {
        let payload = json!({
            "event_id": "evt-1",
            "table": "profiles",
            "user_id": "U1",
            "committed_at": "2026-01-30T12:00:00Z",
            "row": { "user_id": "U1" },
            "extra": true
        });
        assert!(decode_notification(payload).is_err());
    }

    #[test]
    fn notification_rejects_non_object_row() {
        let payload = json!({
            "event_id": "evt-1",
            "table": "subscriptions",
            "user_id": "U1",
            "committed_at": "2026-01-30T12:00:00Z",
            "row": [1, 2, 3]
        });
        assert_eq!(decode_notification(payload).unwrap_err(), "invalid_row");
    }

    #[test]
    fn app_mode_parses_from_str() {
        assert_eq!("operations".parse::<AppMode>(), Ok(AppMode::Operations));
        assert!("admin".parse::<AppMode>().is_err());
        assert_eq!(AppMode::default(), AppMode::Documents);
    }
}
