//! Subscription status accessor: plan tier and trial state for the signed-in user.
//!
//! `Unknown` is a real third state. Callers must neither render restricted
//! content nor redirect while it lasts. Trial expiry is whatever the backend
//! says it is; a trial with zero days remaining stays active until the backend
//! reports `trial_expired`.

use portal_backend_protocol::{
    AppMode, ChangeNotification, ErrorInfo, PlanTier, SubscriptionRow, Table, UserId,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::accessor::{lock, spawn_pump, FetchOutcome, Tracked};
use crate::backend::Backend;
use crate::cell::Applied;
use crate::error::{GateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Trial {
    Inactive,
    Active { days_remaining: u32 },
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscriptionState {
    pub plan_tier: PlanTier,
    pub trial: Trial,
}

impl SubscriptionState {
    /// Resolution for a user with no subscription row.
    pub fn basic() -> Self {
        Self {
            plan_tier: PlanTier::Basic,
            trial: Trial::Inactive,
        }
    }

    pub fn from_row(row: &SubscriptionRow) -> std::result::Result<Self, ErrorInfo> {
        row.validate()?;
        let trial = if row.trial_active {
            Trial::Active {
                days_remaining: row.days_remaining,
            }
        } else if row.trial_expired {
            Trial::Expired
        } else {
            Trial::Inactive
        };
        Ok(Self {
            plan_tier: row.plan_tier,
            trial,
        })
    }

    pub fn trial_active(&self) -> bool {
        matches!(self.trial, Trial::Active { .. })
    }

    pub fn trial_expired(&self) -> bool {
        matches!(self.trial, Trial::Expired)
    }

    /// Days left on an active trial; 0 otherwise.
    pub fn days_remaining(&self) -> u32 {
        match self.trial {
            Trial::Active { days_remaining } => days_remaining,
            _ => 0,
        }
    }

    /// Whether the plan entitles the user to `mode`.
    pub fn allows(&self, mode: AppMode) -> bool {
        match mode {
            AppMode::Documents => true,
            AppMode::Operations => self.plan_tier == PlanTier::Advanced,
        }
    }

    pub fn content_access(&self) -> ContentAccess {
        match self.plan_tier {
            PlanTier::Basic | PlanTier::Advanced => ContentAccess::Allowed,
            PlanTier::TrialOnly if self.trial_active() => ContentAccess::Allowed,
            PlanTier::TrialOnly => ContentAccess::TrialExpired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "state", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Unknown,
    Known(SubscriptionState),
}

impl SubscriptionStatus {
    pub fn state(&self) -> Option<&SubscriptionState> {
        match self {
            SubscriptionStatus::Known(state) => Some(state),
            SubscriptionStatus::Unknown => None,
        }
    }

    pub fn content_access(&self) -> ContentAccess {
        match self {
            SubscriptionStatus::Unknown => ContentAccess::Pending,
            SubscriptionStatus::Known(state) => state.content_access(),
        }
    }
}

/// Whether restricted (paid) content may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentAccess {
    /// Status not known yet: show nothing restricted, redirect nowhere.
    Pending,
    Allowed,
    TrialExpired,
}

#[derive(Clone)]
pub struct SubscriptionAccessor {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn Backend>,
    state: Mutex<Tracked<SubscriptionState>>,
}

impl SubscriptionAccessor {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                state: Mutex::new(Tracked::default()),
            }),
        }
    }

    pub async fn start(&self, user: UserId) -> FetchOutcome {
        self.bind(user);
        self.refresh().await
    }

    /// Binds to `user` and subscribes without fetching.
    ///
    /// # Panics
    ///
    /// Spawns the change-feed task with `tokio::spawn`, so it panics when
    /// called outside a tokio runtime.
    pub fn bind(&self, user: UserId) {
        let stream = self.inner.backend.subscribe(Table::Subscriptions, &user);
        let mut state = lock(&self.inner.state);
        let epoch = state.bind(user.clone());
        let pump = spawn_pump(
            Arc::downgrade(&self.inner),
            stream,
            epoch,
            |inner: &Arc<Inner>, epoch, notification| {
                if let Err(err) = inner.apply_change(epoch, &notification) {
                    tracing::warn!(error = %err, "Ignoring subscription change");
                }
            },
        );
        state.set_pump(pump);
        tracing::debug!(user_id = %user, epoch, "Subscription accessor bound");
    }

    pub fn stop(&self) {
        lock(&self.inner.state).unbind();
    }

    pub async fn refresh(&self) -> FetchOutcome {
        let Some((user, ticket)) = lock(&self.inner.state).request() else {
            return FetchOutcome::NoSession;
        };

        let resolved = match self.inner.backend.fetch_subscription(&user).await {
            Ok(Some(row)) => {
                SubscriptionState::from_row(&row).map_err(|source| GateError::MalformedRow {
                    entity: "subscription",
                    source,
                })
            }
            Ok(None) => {
                tracing::debug!(user_id = %user, "No subscription row; resolving to basic plan");
                Ok(SubscriptionState::basic())
            }
            Err(err) => Err(err),
        };

        let mut state = lock(&self.inner.state);
        match resolved {
            Ok(subscription) => {
                let applied = state.apply(ticket, subscription);
                if !applied.is_accepted() {
                    tracing::debug!(user_id = %user, ?applied, "Discarding subscription response");
                    return FetchOutcome::Discarded;
                }
                state.last_error = None;
                FetchOutcome::Applied
            }
            Err(err) => {
                let settled = state.cell.settle(ticket);
                if !settled.is_accepted() {
                    return FetchOutcome::Discarded;
                }
                tracing::warn!(user_id = %user, error = %err, "Subscription fetch failed; keeping previous status");
                state.last_error = Some(err.to_string());
                FetchOutcome::Failed(err)
            }
        }
    }

    pub fn apply_change(&self, notification: &ChangeNotification) -> Result<Applied> {
        let epoch = lock(&self.inner.state).cell.epoch();
        self.inner.apply_change(epoch, notification)
    }

    pub fn status(&self) -> SubscriptionStatus {
        let state = lock(&self.inner.state);
        match (state.user(), state.cell.get()) {
            (Some(_), Some(subscription)) => SubscriptionStatus::Known(*subscription),
            _ => SubscriptionStatus::Unknown,
        }
    }

    pub fn user(&self) -> Option<UserId> {
        lock(&self.inner.state).user().cloned()
    }

    pub fn plan_tier(&self) -> Option<PlanTier> {
        self.status().state().map(|state| state.plan_tier)
    }

    pub fn content_access(&self) -> ContentAccess {
        self.status().content_access()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner.state).last_error.clone()
    }
}

impl Inner {
    fn apply_change(&self, epoch: u64, notification: &ChangeNotification) -> Result<Applied> {
        let malformed = |source| GateError::MalformedRow {
            entity: "subscription",
            source,
        };
        let row = notification.subscription_row().map_err(malformed)?;
        let subscription = SubscriptionState::from_row(&row).map_err(malformed)?;

        let mut state = lock(&self.state);
        let Some(ticket) = state.arrival(epoch, &notification.user_id) else {
            return Ok(Applied::StaleEpoch);
        };
        let applied = state.apply(ticket, subscription);
        tracing::info!(
            user_id = %notification.user_id,
            event_id = %notification.event_id,
            plan_tier = %subscription.plan_tier,
            trial = ?subscription.trial,
            ?applied,
            "Subscription change received"
        );
        Ok(applied)
    }
}
