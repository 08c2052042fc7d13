//! App-mode accessor: which product mode the user works in.
//!
//! `Operations` requires the advanced plan. Writes are confirmed by the backend
//! before local state changes, and pushed rows from the backend always win.

use portal_backend_protocol::{AppMode, ChangeNotification, Table, UserId};
use std::sync::{Arc, Mutex};

use crate::accessor::{lock, spawn_pump, FetchOutcome, Tracked};
use crate::backend::Backend;
use crate::cell::Applied;
use crate::error::{GateError, Result};
use crate::subscription::{SubscriptionAccessor, SubscriptionStatus};

#[derive(Clone)]
pub struct ModeAccessor {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn Backend>,
    subscription: SubscriptionAccessor,
    state: Mutex<Tracked<AppMode>>,
}

impl ModeAccessor {
    /// `subscription` should be bound to the same identity; while it is not,
    /// the plan counts as unknown and only `Documents` can be written.
    pub fn new(backend: Arc<dyn Backend>, subscription: SubscriptionAccessor) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                subscription,
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
        let stream = self.inner.backend.subscribe(Table::Profiles, &user);
        let mut state = lock(&self.inner.state);
        let epoch = state.bind(user.clone());
        let pump = spawn_pump(
            Arc::downgrade(&self.inner),
            stream,
            epoch,
            |inner: &Arc<Inner>, epoch, notification| {
                if let Err(err) = inner.apply_change(epoch, &notification) {
                    tracing::warn!(error = %err, "Ignoring app mode change");
                }
            },
        );
        state.set_pump(pump);
        tracing::debug!(user_id = %user, epoch, "Mode accessor bound");
    }

    pub fn stop(&self) {
        lock(&self.inner.state).unbind();
    }

    pub async fn refresh(&self) -> FetchOutcome {
        let Some((user, ticket)) = lock(&self.inner.state).request() else {
            return FetchOutcome::NoSession;
        };

        let fetched = self.inner.backend.fetch_profile(&user).await;

        let mut state = lock(&self.inner.state);
        match fetched {
            Ok(row) => {
                let mode = row.and_then(|row| row.app_mode).unwrap_or_default();
                let applied = state.apply(ticket, mode);
                if !applied.is_accepted() {
                    tracing::debug!(user_id = %user, ?applied, "Discarding app mode response");
                    return FetchOutcome::Discarded;
                }
                state.last_error = None;
                FetchOutcome::Applied
            }
            Err(err) => {
                if !state.cell.settle(ticket).is_accepted() {
                    return FetchOutcome::Discarded;
                }
                tracing::warn!(user_id = %user, error = %err, "App mode fetch failed; keeping current mode");
                state.last_error = Some(err.to_string());
                FetchOutcome::Failed(err)
            }
        }
    }

    /// Current mode, `Documents` until the backend says otherwise.
    pub fn read(&self) -> AppMode {
        lock(&self.inner.state)
            .cell
            .get()
            .copied()
            .unwrap_or_default()
    }

    /// Persists `target`, then adopts it locally.
    ///
    /// Switching to `Operations` without the advanced plan fails with
    /// [`GateError::EntitlementDenied`] and never reaches the backend. A failed
    /// backend write leaves the local mode untouched.
    pub async fn write(&self, target: AppMode) -> Result<()> {
        let user = lock(&self.inner.state)
            .user()
            .cloned()
            .ok_or(GateError::NoSession)?;

        // A subscription bound to someone else says nothing about this user.
        let subscription = if self.inner.subscription.user().as_ref() == Some(&user) {
            self.inner.subscription.status()
        } else {
            SubscriptionStatus::Unknown
        };
        let entitled = subscription
            .state()
            .map(|state| state.allows(target))
            .unwrap_or(target == AppMode::Documents);
        if !entitled {
            let plan = match subscription {
                SubscriptionStatus::Known(state) => Some(state.plan_tier),
                SubscriptionStatus::Unknown => None,
            };
            tracing::info!(user_id = %user, requested = %target, ?plan, "App mode switch refused");
            return Err(GateError::EntitlementDenied { target, plan });
        }

        let Some((user, ticket)) = lock(&self.inner.state).request() else {
            return Err(GateError::NoSession);
        };

        if let Err(err) = self.inner.backend.update_app_mode(&user, target).await {
            tracing::warn!(user_id = %user, requested = %target, error = %err, "App mode write failed");
            lock(&self.inner.state).cell.settle(ticket);
            return Err(err);
        }

        let applied = lock(&self.inner.state).apply(ticket, target);
        tracing::info!(user_id = %user, requested = %target, ?applied, "App mode written");
        Ok(())
    }

    pub fn apply_change(&self, notification: &ChangeNotification) -> Result<Applied> {
        let epoch = lock(&self.inner.state).cell.epoch();
        self.inner.apply_change(epoch, notification)
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner.state).last_error.clone()
    }
}

impl Inner {
    fn apply_change(&self, epoch: u64, notification: &ChangeNotification) -> Result<Applied> {
        let row = notification
            .profile_row()
            .map_err(|source| GateError::MalformedRow {
                entity: "profile",
                source,
            })?;
        let mode = row.app_mode.unwrap_or_default();

        let mut state = lock(&self.state);
        let Some(ticket) = state.arrival(epoch, &notification.user_id) else {
            return Ok(Applied::StaleEpoch);
        };
        let applied = state.apply(ticket, mode);
        tracing::debug!(
            user_id = %notification.user_id,
            event_id = %notification.event_id,
            mode = %mode,
            ?applied,
            "App mode change received"
        );
        Ok(applied)
    }
}
