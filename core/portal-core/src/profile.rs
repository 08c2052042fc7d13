//! Profile record accessor: is the signed-in user's profile complete?
//!
//! Completeness needs two fields on the profile row, the organization name
//! (`company_name`) and the responsible person (`controller_name`). Failures
//! and missing rows resolve to `Incomplete`, so the gate fails closed. This
//! accessor never creates a profile row; onboarding owns that.

use portal_backend_protocol::{ChangeNotification, ProfileRow, Table, UserId};
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::accessor::{lock, spawn_pump, FetchOutcome, Tracked};
use crate::backend::Backend;
use crate::cell::Applied;
use crate::error::{GateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileCompleteness {
    Unknown,
    Incomplete,
    Complete,
}

impl ProfileCompleteness {
    pub fn of(row: &ProfileRow) -> Self {
        if is_filled(&row.company_name) && is_filled(&row.controller_name) {
            ProfileCompleteness::Complete
        } else {
            ProfileCompleteness::Incomplete
        }
    }
}

fn is_filled(field: &Option<String>) -> bool {
    field
        .as_deref()
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileSnapshot {
    pub completeness: ProfileCompleteness,
    pub loading: bool,
}

#[derive(Clone)]
pub struct ProfileAccessor {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn Backend>,
    state: Mutex<Tracked<ProfileCompleteness>>,
}

impl ProfileAccessor {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                state: Mutex::new(Tracked::default()),
            }),
        }
    }

    /// Binds to `user`, subscribes to their profile row and fetches it.
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
                    tracing::warn!(error = %err, "Ignoring profile change");
                }
            },
        );
        state.set_pump(pump);
        tracing::debug!(user_id = %user, epoch, "Profile accessor bound");
    }

    pub fn stop(&self) {
        lock(&self.inner.state).unbind();
    }

    pub async fn refresh(&self) -> FetchOutcome {
        let Some((user, ticket)) = lock(&self.inner.state).request() else {
            return FetchOutcome::NoSession;
        };

        let (completeness, outcome) = match self.inner.backend.fetch_profile(&user).await {
            Ok(Some(row)) => match row.validate() {
                Ok(()) => (ProfileCompleteness::of(&row), FetchOutcome::Applied),
                Err(source) => (
                    ProfileCompleteness::Incomplete,
                    FetchOutcome::Failed(GateError::MalformedRow {
                        entity: "profile",
                        source,
                    }),
                ),
            },
            Ok(None) => {
                tracing::debug!(user_id = %user, "No profile row; treating as incomplete");
                (ProfileCompleteness::Incomplete, FetchOutcome::Applied)
            }
            Err(err) => (ProfileCompleteness::Incomplete, FetchOutcome::Failed(err)),
        };

        let mut state = lock(&self.inner.state);
        let applied = state.apply(ticket, completeness);
        if !applied.is_accepted() {
            tracing::debug!(user_id = %user, ?applied, "Discarding profile response");
            return FetchOutcome::Discarded;
        }
        state.last_error = outcome.error().map(|err| err.to_string());
        if let Some(err) = outcome.error() {
            tracing::warn!(user_id = %user, error = %err, "Profile fetch failed; treating as incomplete");
        }
        outcome
    }

    /// Applies a pushed profile row for the bound identity.
    pub fn apply_change(&self, notification: &ChangeNotification) -> Result<Applied> {
        let epoch = lock(&self.inner.state).cell.epoch();
        self.inner.apply_change(epoch, notification)
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        let state = lock(&self.inner.state);
        if state.user().is_none() {
            return ProfileSnapshot {
                completeness: ProfileCompleteness::Unknown,
                loading: false,
            };
        }
        ProfileSnapshot {
            completeness: state
                .cell
                .get()
                .copied()
                .unwrap_or(ProfileCompleteness::Unknown),
            loading: state.cell.is_pending(),
        }
    }

    pub fn completeness(&self) -> ProfileCompleteness {
        self.snapshot().completeness
    }

    pub fn user(&self) -> Option<UserId> {
        lock(&self.inner.state).user().cloned()
    }

    /// Message of the last failed fetch, kept for diagnostics.
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

        let mut state = lock(&self.state);
        let Some(ticket) = state.arrival(epoch, &notification.user_id) else {
            return Ok(Applied::StaleEpoch);
        };
        let completeness = ProfileCompleteness::of(&row);
        let applied = state.apply(ticket, completeness);
        if applied.is_accepted() {
            state.last_error = None;
        }
        tracing::debug!(
            user_id = %notification.user_id,
            event_id = %notification.event_id,
            ?completeness,
            ?applied,
            "Profile change received"
        );
        Ok(applied)
    }
}
