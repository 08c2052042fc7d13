//! Explicitly constructed accessor set for one signed-in identity.
//!
//! Nothing here is global: each `PortalServices` owns its accessors and is
//! driven through `start`/`stop` (or `follow`, which tracks a session source).

use portal_backend_protocol::{AppMode, UserId};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use crate::accessor::FetchOutcome;
use crate::backend::Backend;
use crate::mode::ModeAccessor;
use crate::profile::{ProfileAccessor, ProfileSnapshot};
use crate::session::IdentityStatus;
use crate::subscription::{ContentAccess, SubscriptionAccessor, SubscriptionStatus};

#[derive(Clone)]
pub struct PortalServices {
    profile: ProfileAccessor,
    subscription: SubscriptionAccessor,
    mode: ModeAccessor,
}

/// Per-accessor results of a `start`.
#[derive(Debug)]
pub struct StartReport {
    pub profile: FetchOutcome,
    pub subscription: FetchOutcome,
    pub mode: FetchOutcome,
}

/// Point-in-time view across all three accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub user_id: Option<UserId>,
    pub profile: ProfileSnapshot,
    pub subscription: SubscriptionStatus,
    pub content_access: ContentAccess,
    pub app_mode: AppMode,
}

impl PortalServices {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let subscription = SubscriptionAccessor::new(Arc::clone(&backend));
        let mode = ModeAccessor::new(Arc::clone(&backend), subscription.clone());
        let profile = ProfileAccessor::new(backend);
        Self {
            profile,
            subscription,
            mode,
        }
    }

    pub fn profile(&self) -> &ProfileAccessor {
        &self.profile
    }

    pub fn subscription(&self) -> &SubscriptionAccessor {
        &self.subscription
    }

    pub fn mode(&self) -> &ModeAccessor {
        &self.mode
    }

    /// Binds every accessor to `user`, then loads the subscription first so
    /// mode writes issued right after start see the plan.
    pub async fn start(&self, user: UserId) -> StartReport {
        tracing::info!(user_id = %user, "Starting portal services");
        self.subscription.bind(user.clone());
        self.profile.bind(user.clone());
        self.mode.bind(user);

        let subscription = self.subscription.refresh().await;
        let profile = self.profile.refresh().await;
        let mode = self.mode.refresh().await;
        StartReport {
            profile,
            subscription,
            mode,
        }
    }

    pub fn stop(&self) {
        self.profile.stop();
        self.subscription.stop();
        self.mode.stop();
        tracing::info!("Stopped portal services");
    }

    /// Starts and stops the accessors as the session identity changes.
    /// Returns once the session source is dropped.
    ///
    /// A start still loading when the identity changes again is abandoned;
    /// its responses carry the old epoch and are discarded on arrival.
    pub async fn follow(&self, mut session: watch::Receiver<IdentityStatus>) {
        let mut started: Option<UserId> = None;
        loop {
            let status = session.borrow_and_update().clone();
            match status {
                IdentityStatus::SignedIn(user) => {
                    if started.as_ref() != Some(&user) {
                        self.stop();
                        started = None;
                        let interrupted = tokio::select! {
                            _ = self.start(user.clone()) => None,
                            changed = session.changed() => Some(changed),
                        };
                        match interrupted {
                            None => started = Some(user),
                            Some(Ok(())) => {
                                tracing::debug!(user_id = %user, "Identity changed during start");
                                continue;
                            }
                            Some(Err(_)) => break,
                        }
                    }
                }
                IdentityStatus::SignedOut | IdentityStatus::Resolving => {
                    if started.take().is_some() || self.profile.user().is_some() {
                        self.stop();
                    }
                }
            }
            if session.changed().await.is_err() {
                break;
            }
        }
        self.stop();
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        let subscription = self.subscription.status();
        AccountSnapshot {
            user_id: self.profile.user(),
            profile: self.profile.snapshot(),
            content_access: subscription.content_access(),
            subscription,
            app_mode: self.mode.read(),
        }
    }
}
