//! `portal status`: what the accessors resolve for one user.

use portal_backend_protocol::UserId;
use portal_core::PortalServices;
use serde_json::{json, Value};

use crate::context::Context;
use crate::error::CliError;

pub async fn run(ctx: &Context, user: UserId) -> Result<Value, CliError> {
    let services = PortalServices::new(ctx.backend.clone());
    services.start(user).await;
    let snapshot = services.snapshot();
    let errors = json!({
        "profile": services.profile().last_error(),
        "subscription": services.subscription().last_error(),
        "mode": services.mode().last_error(),
    });
    services.stop();

    let mut output = serde_json::to_value(snapshot)?;
    output["errors"] = errors;
    Ok(output)
}
