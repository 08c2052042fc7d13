//! Operator commands that write rows into the local backend file.

use portal_backend_protocol::{ProfileRow, SubscriptionRow, UserId};
use serde_json::{json, Value};

use crate::context::Context;
use crate::error::CliError;

pub fn put_profile(ctx: &Context, row_json: &str) -> Result<Value, CliError> {
    let row: ProfileRow = serde_json::from_str(row_json)?;
    row.validate().map_err(CliError::InvalidRow)?;
    let user_id = row.user_id.clone();
    ctx.backend.upsert_profile(row)?;
    Ok(json!({ "status": "ok", "table": "profiles", "user_id": user_id }))
}

pub fn put_subscription(ctx: &Context, row_json: &str) -> Result<Value, CliError> {
    let row: SubscriptionRow = serde_json::from_str(row_json)?;
    row.validate().map_err(CliError::InvalidRow)?;
    let user_id = row.user_id.clone();
    ctx.backend.upsert_subscription(row)?;
    Ok(json!({ "status": "ok", "table": "subscriptions", "user_id": user_id }))
}

pub fn register_bearer(ctx: &Context, token: &str, user: UserId) -> Result<Value, CliError> {
    ctx.backend.register_bearer(token, &user)?;
    Ok(json!({ "status": "ok", "user_id": user }))
}
