//! `portal decide`: evaluate the access gate for one route.

use portal_backend_protocol::UserId;
use portal_core::{AccessGate, PortalServices, ProfileCompleteness, SessionSource};
use serde_json::{json, Value};

use crate::context::Context;
use crate::error::CliError;

pub async fn run(ctx: &Context, user: Option<UserId>, route: &str) -> Result<Value, CliError> {
    let session = SessionSource::new();
    let services = PortalServices::new(ctx.backend.clone());

    match user {
        Some(user) => {
            session.sign_in(user.clone());
            services.start(user).await;
        }
        None => session.sign_out(),
    }

    let identity = session.status();
    let completeness = match identity.user() {
        Some(_) => services.profile().completeness(),
        None => ProfileCompleteness::Unknown,
    };
    let mut gate = AccessGate::new(ctx.config.routes.clone());
    let outcome = gate.evaluate(&identity, completeness, route);
    services.stop();

    Ok(json!({
        "route": route,
        "route_class": gate.routes().classify(route),
        "user_id": identity.user(),
        "completeness": completeness,
        "state": outcome.state,
        "decision": outcome.decision,
        "navigate_to": outcome.navigate_to,
    }))
}
