//! Route boundaries: run the access gate before rendering a protected view.
//!
//! The gate decides; the boundary performs the side effect. Navigation goes
//! through a [`Navigator`] so the view layer can plug in its own router.

use serde::Serialize;

use crate::config::RouteConfig;
use crate::gate::{AccessDecision, AccessGate, GateOutcome};
use crate::profile::{ProfileAccessor, ProfileCompleteness, ProfileSnapshot};
use crate::session::{IdentityStatus, SessionSource};

pub trait Navigator {
    fn navigate(&self, to: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str),
{
    fn navigate(&self, to: &str) {
        self(to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rendering", content = "to", rename_all = "snake_case")]
pub enum Rendering {
    Placeholder,
    Children,
    Redirected(String),
}

pub struct RouteBoundary<N: Navigator> {
    gate: AccessGate,
    navigator: N,
    last: Option<GateOutcome>,
}

impl<N: Navigator> RouteBoundary<N> {
    pub fn new(routes: RouteConfig, navigator: N) -> Self {
        Self {
            gate: AccessGate::new(routes),
            navigator,
            last: None,
        }
    }

    pub fn check(
        &mut self,
        identity: &IdentityStatus,
        profile: ProfileSnapshot,
        route: &str,
    ) -> Rendering {
        let outcome = self.gate.evaluate(identity, profile.completeness, route);
        let rendering = match (&outcome.navigate_to, outcome.decision) {
            (Some(target), _) => {
                self.navigator.navigate(target);
                Rendering::Redirected(target.clone())
            }
            (None, AccessDecision::Render) => Rendering::Children,
            // Redirect already issued: keep protected children hidden until the route changes.
            (None, _) => Rendering::Placeholder,
        };
        self.last = Some(outcome);
        rendering
    }

    /// Reads identity and completeness from live services. Completeness
    /// counts only when the accessor is bound to the session's identity.
    pub fn check_live(
        &mut self,
        session: &SessionSource,
        profile: &ProfileAccessor,
        route: &str,
    ) -> Rendering {
        let identity = session.status();
        let snapshot = match identity.user() {
            Some(user) if profile.user().as_ref() == Some(user) => profile.snapshot(),
            // Accessor still bound to a previous identity: nothing is known yet.
            Some(_) => ProfileSnapshot {
                completeness: ProfileCompleteness::Unknown,
                loading: true,
            },
            None => ProfileSnapshot {
                completeness: ProfileCompleteness::Unknown,
                loading: false,
            },
        };
        self.check(&identity, snapshot, route)
    }

    pub fn last_outcome(&self) -> Option<&GateOutcome> {
        self.last.as_ref()
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_backend_protocol::UserId;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingNavigator {
        visits: RefCell<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, to: &str) {
            self.visits.borrow_mut().push(to.to_string());
        }
    }

    fn snapshot(completeness: ProfileCompleteness) -> ProfileSnapshot {
        ProfileSnapshot {
            completeness,
            loading: false,
        }
    }

    #[test]
    fn incomplete_profile_navigates_once_across_renders() {
        let mut boundary =
            RouteBoundary::new(RouteConfig::default(), RecordingNavigator::default());
        let identity = IdentityStatus::SignedIn(UserId::from("U1"));

        let first = boundary.check(&identity, snapshot(ProfileCompleteness::Incomplete), "/dashboard");
        assert_eq!(first, Rendering::Redirected("/profile-setup".to_string()));

        for _ in 0..3 {
            let again =
                boundary.check(&identity, snapshot(ProfileCompleteness::Incomplete), "/dashboard");
            assert_eq!(again, Rendering::Placeholder);
        }

        assert_eq!(*boundary.navigator().visits.borrow(), vec!["/profile-setup"]);
    }

    #[test]
    fn unknown_completeness_shows_placeholder_without_navigation() {
        let mut boundary =
            RouteBoundary::new(RouteConfig::default(), RecordingNavigator::default());
        let identity = IdentityStatus::SignedIn(UserId::from("U1"));

        let rendering = boundary.check(
            &identity,
            ProfileSnapshot {
                completeness: ProfileCompleteness::Unknown,
                loading: true,
            },
            "/dashboard",
        );
        assert_eq!(rendering, Rendering::Placeholder);
        assert!(boundary.navigator().visits.borrow().is_empty());
    }

    #[test]
    fn complete_profile_renders_children() {
        let mut boundary =
            RouteBoundary::new(RouteConfig::default(), RecordingNavigator::default());
        let identity = IdentityStatus::SignedIn(UserId::from("U1"));
        let rendering = boundary.check(&identity, snapshot(ProfileCompleteness::Complete), "/reports");
        assert_eq!(rendering, Rendering::Children);
        assert_eq!(
            boundary.last_outcome().map(|outcome| outcome.decision),
            Some(AccessDecision::Render)
        );
    }

    #[test]
    fn closures_are_navigators() {
        let visits = RefCell::new(Vec::new());
        let mut boundary = RouteBoundary::new(RouteConfig::default(), |to: &str| {
            visits.borrow_mut().push(to.to_string())
        });
        boundary.check(
            &IdentityStatus::SignedOut,
            snapshot(ProfileCompleteness::Unknown),
            "/documents",
        );
        drop(boundary);
        assert_eq!(visits.into_inner(), vec!["/auth"]);
    }
}
