//! End-to-end gating: session source, live accessors and route boundaries.

mod common;

use common::{profile_row, settle, ScriptedBackend};
use portal_backend_protocol::UserId;
use portal_core::{
    AccessDecision, GateState, IdentityStatus, Navigator, PortalServices, ProfileCompleteness,
    Rendering, RouteBoundary, RouteConfig, SessionSource,
};
use std::cell::RefCell;
use std::sync::Arc;

#[derive(Default)]
struct RecordingNavigator {
    visits: RefCell<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, to: &str) {
        self.visits.borrow_mut().push(to.to_string());
    }
}

fn boundary() -> RouteBoundary<RecordingNavigator> {
    RouteBoundary::new(RouteConfig::default(), RecordingNavigator::default())
}

#[tokio::test]
async fn test_resolving_session_shows_placeholder() {
    let backend = Arc::new(ScriptedBackend::new());
    let session = SessionSource::new();
    let services = PortalServices::new(backend.clone());
    let mut boundary = boundary();

    let rendering = boundary.check_live(&session, services.profile(), "/dashboard");

    assert_eq!(rendering, Rendering::Placeholder);
    let outcome = boundary.last_outcome().unwrap();
    assert_eq!(outcome.state, GateState::Loading);
    assert_eq!(outcome.decision, AccessDecision::ShowLoadingPlaceholder);
    assert!(boundary.navigator().visits.borrow().is_empty());
}

#[tokio::test]
async fn test_incomplete_profile_redirects_once_then_opens_after_push() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .local
        .upsert_profile(profile_row("U1", "", "Jane"))
        .unwrap();
    let session = SessionSource::new();
    let services = PortalServices::new(backend.clone());
    let mut boundary = boundary();

    session.sign_in(UserId::from("U1"));
    services.start(UserId::from("U1")).await;

    assert_eq!(
        boundary.check_live(&session, services.profile(), "/dashboard"),
        Rendering::Redirected("/profile-setup".to_string())
    );
    for _ in 0..5 {
        assert_eq!(
            boundary.check_live(&session, services.profile(), "/dashboard"),
            Rendering::Placeholder
        );
    }
    assert_eq!(
        boundary.check_live(&session, services.profile(), "/profile-setup"),
        Rendering::Children
    );

    backend
        .local
        .upsert_profile(profile_row("U1", "Acme", "Jane"))
        .unwrap();
    settle().await;

    assert_eq!(services.profile().completeness(), ProfileCompleteness::Complete);
    assert_eq!(
        boundary.check_live(&session, services.profile(), "/dashboard"),
        Rendering::Children
    );
    assert_eq!(
        *boundary.navigator().visits.borrow(),
        vec!["/profile-setup".to_string()]
    );
}

#[tokio::test]
async fn test_complete_profile_renders_every_route() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .local
        .upsert_profile(profile_row("U1", "Acme", "Jane"))
        .unwrap();
    let session = SessionSource::new();
    let services = PortalServices::new(backend.clone());
    let mut boundary = boundary();

    session.sign_in(UserId::from("U1"));
    services.start(UserId::from("U1")).await;

    for route in ["/", "/dashboard", "/documents/42", "/profile-setup", "/auth"] {
        assert_eq!(
            boundary.check_live(&session, services.profile(), route),
            Rendering::Children,
            "route {route}"
        );
    }
}

#[tokio::test]
async fn test_signed_out_redirects_to_auth() {
    let backend = Arc::new(ScriptedBackend::new());
    let session = SessionSource::new();
    let services = PortalServices::new(backend.clone());
    let mut boundary = boundary();

    session.sign_out();

    assert_eq!(
        boundary.check_live(&session, services.profile(), "/reports"),
        Rendering::Redirected("/auth".to_string())
    );
    assert_eq!(
        boundary.check_live(&session, services.profile(), "/auth"),
        Rendering::Children
    );
}

#[tokio::test]
async fn test_profile_error_fails_closed_to_setup() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .local
        .upsert_profile(profile_row("U1", "Acme", "Jane"))
        .unwrap();
    backend
        .fail_profile
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let session = SessionSource::new();
    let services = PortalServices::new(backend.clone());
    let mut boundary = boundary();

    session.sign_in(UserId::from("U1"));
    let report = services.start(UserId::from("U1")).await;
    assert!(report.profile.error().is_some());

    assert_eq!(
        boundary.check_live(&session, services.profile(), "/dashboard"),
        Rendering::Redirected("/profile-setup".to_string())
    );
}

#[tokio::test]
async fn test_follow_tracks_session_changes() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .local
        .upsert_profile(profile_row("U1", "Acme", "Jane"))
        .unwrap();
    backend
        .local
        .upsert_profile(profile_row("U2", "", ""))
        .unwrap();
    let session = SessionSource::new();
    let services = PortalServices::new(backend.clone());

    let follower = tokio::spawn({
        let services = services.clone();
        let receiver = session.subscribe();
        async move { services.follow(receiver).await }
    });
    settle().await;
    assert_eq!(services.profile().user(), None);

    session.sign_in(UserId::from("U1"));
    settle().await;
    assert_eq!(services.profile().user(), Some(UserId::from("U1")));
    assert_eq!(services.profile().completeness(), ProfileCompleteness::Complete);

    session.sign_in(UserId::from("U2"));
    settle().await;
    assert_eq!(services.profile().user(), Some(UserId::from("U2")));
    assert_eq!(services.profile().completeness(), ProfileCompleteness::Incomplete);

    session.sign_out();
    settle().await;
    assert_eq!(services.profile().user(), None);
    assert_eq!(session.status(), IdentityStatus::SignedOut);

    drop(session);
    follower.await.unwrap();
    settle().await;
    assert_eq!(backend.local.subscriber_count(), 0);
}

#[tokio::test]
async fn test_account_snapshot_reflects_all_accessors() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .local
        .upsert_profile(profile_row("U1", "Acme", "Jane"))
        .unwrap();
    let services = PortalServices::new(backend.clone());
    services.start(UserId::from("U1")).await;

    let snapshot = services.snapshot();
    assert_eq!(snapshot.user_id, Some(UserId::from("U1")));
    assert_eq!(snapshot.profile.completeness, ProfileCompleteness::Complete);
    assert_eq!(snapshot.content_access, portal_core::ContentAccess::Allowed);
    assert_eq!(snapshot.app_mode, portal_core::AppMode::Documents);
}

#[tokio::test]
async fn test_new_identity_is_not_gated_on_previous_profile() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .local
        .upsert_profile(profile_row("U1", "Acme", "Jane"))
        .unwrap();
    let session = SessionSource::new();
    let services = PortalServices::new(backend.clone());
    let mut boundary = boundary();

    session.sign_in(UserId::from("U1"));
    services.start(UserId::from("U1")).await;
    assert_eq!(
        boundary.check_live(&session, services.profile(), "/dashboard"),
        Rendering::Children
    );

    // Accessors still hold U1's complete profile.
    session.sign_in(UserId::from("U2"));

    assert_eq!(
        boundary.check_live(&session, services.profile(), "/dashboard"),
        Rendering::Placeholder
    );
    assert_eq!(
        boundary.last_outcome().unwrap().decision,
        AccessDecision::ShowLoadingPlaceholder
    );
    assert!(boundary.navigator().visits.borrow().is_empty());
}

#[tokio::test]
async fn test_follow_abandons_start_when_identity_changes() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .local
        .upsert_profile(profile_row("U1", "Acme", "Jane"))
        .unwrap();
    backend
        .local
        .upsert_profile(profile_row("U2", "", ""))
        .unwrap();
    backend
        .local
        .upsert_profile(profile_row("U3", "Initech", "Ann"))
        .unwrap();
    let session = SessionSource::new();
    let services = PortalServices::new(backend.clone());
    let mut boundary = boundary();

    let follower = tokio::spawn({
        let services = services.clone();
        let receiver = session.subscribe();
        async move { services.follow(receiver).await }
    });
    settle().await;

    session.sign_in(UserId::from("U1"));
    settle().await;
    assert_eq!(services.profile().completeness(), ProfileCompleteness::Complete);

    // U2's profile fetch never answers while U3 signs in.
    let u2_profile = backend.hold_next_profile_fetch();
    session.sign_in(UserId::from("U2"));
    assert_eq!(
        boundary.check_live(&session, services.profile(), "/dashboard"),
        Rendering::Placeholder
    );
    settle().await;
    assert_eq!(services.profile().user(), Some(UserId::from("U2")));
    assert_eq!(
        boundary.check_live(&session, services.profile(), "/dashboard"),
        Rendering::Placeholder
    );

    session.sign_in(UserId::from("U3"));
    settle().await;
    assert_eq!(services.profile().user(), Some(UserId::from("U3")));
    assert_eq!(services.profile().completeness(), ProfileCompleteness::Complete);
    assert_eq!(
        boundary.check_live(&session, services.profile(), "/dashboard"),
        Rendering::Children
    );

    let _ = u2_profile.send(());
    settle().await;
    assert_eq!(services.profile().user(), Some(UserId::from("U3")));
    assert_eq!(services.profile().completeness(), ProfileCompleteness::Complete);
    assert!(boundary.navigator().visits.borrow().is_empty());

    drop(session);
    follower.await.unwrap();
}
