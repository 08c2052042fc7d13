//! `portal set-mode`: switch a user's app mode, subject to their plan.

use portal_backend_protocol::{AppMode, UserId};
use portal_core::PortalServices;
use serde_json::{json, Value};

use crate::context::Context;
use crate::error::CliError;

pub async fn run(ctx: &Context, user: UserId, mode: AppMode) -> Result<Value, CliError> {
    let services = PortalServices::new(ctx.backend.clone());
    services.start(user.clone()).await;
    let result = services.mode().write(mode).await;
    let current = services.mode().read();
    services.stop();
    result?;

    Ok(json!({
        "status": "ok",
        "user_id": user,
        "app_mode": current,
    }))
}
