//! Access gate: what may a route boundary show right now?
//!
//! [`decide`] is a pure function of identity, profile completeness and the
//! current route. [`AccessGate`] wraps it with the one piece of memory the
//! pipeline needs: a redirect is issued at most once per entry into a
//! redirecting condition, so re-rendering never produces a redirect storm.
//!
//! ```text
//! identity      completeness   route      state      decision
//! Resolving     -              any        Loading    ShowLoadingPlaceholder
//! SignedOut     -              exempt     NoSession  Render
//! SignedOut     -              other      NoSession  RedirectToAuth
//! SignedIn      Unknown        any        Loading    ShowLoadingPlaceholder
//! SignedIn      Incomplete     exempt     Gated      Render
//! SignedIn      Incomplete     other      Gated      RedirectToProfileSetup
//! SignedIn      Complete       any        Open       Render
//! ```

use serde::Serialize;

use crate::config::RouteConfig;
use crate::profile::ProfileCompleteness;
use crate::session::IdentityStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Loading,
    NoSession,
    /// Signed in with an incomplete profile.
    Gated,
    /// Signed in with a complete profile.
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    ShowLoadingPlaceholder,
    RedirectToProfileSetup,
    RedirectToAuth,
    Render,
}

impl AccessDecision {
    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            AccessDecision::RedirectToProfileSetup | AccessDecision::RedirectToAuth
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    ProfileSetup,
    Auth,
    Landing,
    Protected,
}

impl RouteClass {
    pub fn is_exempt(&self) -> bool {
        !matches!(self, RouteClass::Protected)
    }
}

impl RouteConfig {
    /// Classifies a location path. Query strings, fragments and trailing
    /// slashes are ignored; sub-paths of the setup and auth routes count as
    /// those routes, while the landing route matches only exactly.
    pub fn classify(&self, route: &str) -> RouteClass {
        let path = normalize_route(route);
        if matches_prefix(&path, &self.profile_setup) {
            RouteClass::ProfileSetup
        } else if matches_prefix(&path, &self.auth) {
            RouteClass::Auth
        } else if path == normalize_route(&self.landing) {
            RouteClass::Landing
        } else {
            RouteClass::Protected
        }
    }
}

fn normalize_route(route: &str) -> String {
    let path = route
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn matches_prefix(path: &str, base: &str) -> bool {
    let base = normalize_route(base);
    if base == "/" {
        return path == "/";
    }
    path == base
        || path
            .strip_prefix(base.as_str())
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateInput<'a> {
    pub identity: &'a IdentityStatus,
    pub completeness: ProfileCompleteness,
    pub route: RouteClass,
}

pub fn decide(input: &GateInput<'_>) -> (GateState, AccessDecision) {
    match input.identity {
        IdentityStatus::Resolving => (GateState::Loading, AccessDecision::ShowLoadingPlaceholder),
        IdentityStatus::SignedOut if input.route.is_exempt() => {
            (GateState::NoSession, AccessDecision::Render)
        }
        IdentityStatus::SignedOut => (GateState::NoSession, AccessDecision::RedirectToAuth),
        IdentityStatus::SignedIn(_) => match input.completeness {
            ProfileCompleteness::Unknown => {
                (GateState::Loading, AccessDecision::ShowLoadingPlaceholder)
            }
            ProfileCompleteness::Incomplete if input.route.is_exempt() => {
                (GateState::Gated, AccessDecision::Render)
            }
            ProfileCompleteness::Incomplete => {
                (GateState::Gated, AccessDecision::RedirectToProfileSetup)
            }
            ProfileCompleteness::Complete => (GateState::Open, AccessDecision::Render),
        },
    }
}

/// One evaluation of the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateOutcome {
    pub state: GateState,
    pub decision: AccessDecision,
    /// Set only on the evaluation that enters a redirecting condition.
    pub navigate_to: Option<String>,
}

/// Stateful gate that remembers which redirect it has already issued.
#[derive(Debug, Clone)]
pub struct AccessGate {
    routes: RouteConfig,
    issued: Option<IssuedRedirect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IssuedRedirect {
    identity: IdentityStatus,
    decision: AccessDecision,
}

impl AccessGate {
    pub fn new(routes: RouteConfig) -> Self {
        Self {
            routes,
            issued: None,
        }
    }

    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    /// Evaluates the gate and decides whether navigation must happen now.
    ///
    /// The redirect target is returned on the first evaluation of a
    /// redirecting condition and withheld while that condition persists.
    /// Leaving the condition re-arms it.
    pub fn evaluate(
        &mut self,
        identity: &IdentityStatus,
        completeness: ProfileCompleteness,
        route: &str,
    ) -> GateOutcome {
        let input = GateInput {
            identity,
            completeness,
            route: self.routes.classify(route),
        };
        let (state, decision) = decide(&input);

        let navigate_to = if decision.is_redirect() {
            let condition = IssuedRedirect {
                identity: identity.clone(),
                decision,
            };
            if self.issued.as_ref() == Some(&condition) {
                None
            } else {
                self.issued = Some(condition);
                Some(self.redirect_target(decision))
            }
        } else {
            self.issued = None;
            None
        };

        if let Some(target) = navigate_to.as_deref() {
            tracing::info!(?state, ?decision, route, to = target, "Access gate redirect");
        }

        GateOutcome {
            state,
            decision,
            navigate_to,
        }
    }

    fn redirect_target(&self, decision: AccessDecision) -> String {
        match decision {
            AccessDecision::RedirectToAuth => self.routes.auth.clone(),
            _ => self.routes.profile_setup.clone(),
        }
    }
}
