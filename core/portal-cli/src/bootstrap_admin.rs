//! `portal bootstrap-admin`: promote a bearer's identity to admin.

use portal_core::{bootstrap_admin, AdminRequest, AdminSettings};
use serde_json::{json, Value};

use crate::context::Context;
use crate::error::CliError;

pub async fn run(
    ctx: &Context,
    bearer: Option<String>,
    secret: Option<String>,
) -> Result<Value, CliError> {
    let settings = AdminSettings::from_config(&ctx.config);
    let request = AdminRequest {
        setup_secret: secret,
        bearer,
    };
    let grant = bootstrap_admin(&settings, ctx.backend.as_ref(), request).await?;

    Ok(json!({
        "status": "ok",
        "user_id": grant.user_id,
        "role": portal_core::ADMIN_ROLE,
        "newly_granted": grant.newly_granted,
        "granted_at": grant.granted_at,
    }))
}
