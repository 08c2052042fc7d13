//! Shared fixtures for the accessor integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use portal_backend_protocol::{AppMode, PlanTier, ProfileRow, SubscriptionRow, Table, UserId};
use portal_core::{Backend, ChangeStream, GateError, LocalBackend, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// Local backend with switchable failures and fetches that can be held open.
///
/// A held fetch reads its row when the request is issued and returns it only
/// once released, which models a slow response racing a push.
pub struct ScriptedBackend {
    pub local: LocalBackend,
    pub fail_profile: AtomicBool,
    pub fail_subscription: AtomicBool,
    pub fail_writes: AtomicBool,
    profile_holds: Mutex<VecDeque<oneshot::Receiver<()>>>,
    subscription_holds: Mutex<VecDeque<oneshot::Receiver<()>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            local: LocalBackend::new_in_memory(),
            fail_profile: AtomicBool::new(false),
            fail_subscription: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            profile_holds: Mutex::new(VecDeque::new()),
            subscription_holds: Mutex::new(VecDeque::new()),
        }
    }

    /// Holds the next profile fetch until the returned sender fires.
    pub fn hold_next_profile_fetch(&self) -> oneshot::Sender<()> {
        let (release, hold) = oneshot::channel();
        self.profile_holds.lock().unwrap().push_back(hold);
        release
    }

    pub fn hold_next_subscription_fetch(&self) -> oneshot::Sender<()> {
        let (release, hold) = oneshot::channel();
        self.subscription_holds.lock().unwrap().push_back(hold);
        release
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn fetch_profile(&self, user: &UserId) -> Result<Option<ProfileRow>> {
        let response = if self.fail_profile.load(Ordering::SeqCst) {
            Err(GateError::backend("fetch_profile", "connection reset"))
        } else {
            self.local.fetch_profile(user).await
        };
        let hold = self.profile_holds.lock().unwrap().pop_front();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        response
    }

    async fn update_app_mode(&self, user: &UserId, mode: AppMode) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GateError::backend("update_app_mode", "503 service unavailable"));
        }
        self.local.update_app_mode(user, mode).await
    }

    async fn fetch_subscription(&self, user: &UserId) -> Result<Option<SubscriptionRow>> {
        let response = if self.fail_subscription.load(Ordering::SeqCst) {
            Err(GateError::backend("fetch_subscription", "connection reset"))
        } else {
            self.local.fetch_subscription(user).await
        };
        let hold = self.subscription_holds.lock().unwrap().pop_front();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        response
    }

    fn subscribe(&self, table: Table, user: &UserId) -> ChangeStream {
        self.local.subscribe(table, user)
    }
}

/// Lets spawned feed pumps and fetch tasks run on the current-thread runtime.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub fn profile_row(user: &str, company: &str, controller: &str) -> ProfileRow {
    ProfileRow {
        user_id: UserId::from(user),
        company_name: Some(company.to_string()),
        controller_name: Some(controller.to_string()),
        app_mode: None,
    }
}

pub fn subscription_row(user: &str, plan_tier: PlanTier) -> SubscriptionRow {
    SubscriptionRow {
        user_id: UserId::from(user),
        plan_tier,
        trial_active: false,
        trial_expired: false,
        days_remaining: 0,
        trial_ends_at: None,
    }
}

pub fn trial_row(user: &str, days_remaining: u32, expired: bool) -> SubscriptionRow {
    SubscriptionRow {
        user_id: UserId::from(user),
        plan_tier: PlanTier::TrialOnly,
        trial_active: !expired,
        trial_expired: expired,
        days_remaining,
        trial_ends_at: None,
    }
}
