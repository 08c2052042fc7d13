//! Plumbing shared by the profile, subscription and app-mode accessors.
//!
//! Each accessor binds to one identity at a time. Binding starts a new
//! [`LatestCell`] epoch, so anything still in flight for the previous identity
//! is dropped on arrival. The push pump holds only a weak reference to its
//! accessor and is aborted on unbind.

use portal_backend_protocol::{ChangeNotification, UserId};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::task::JoinHandle;

use crate::backend::ChangeStream;
use crate::cell::{Applied, LatestCell, Ticket};
use crate::error::GateError;

/// Result of a fetch, as seen by the caller that triggered it.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The response became the current state.
    Applied,
    /// The backend failed; a conservative default (or no change) was applied.
    Failed(GateError),
    /// The response arrived for a stale identity or was superseded.
    Discarded,
    /// No identity is bound.
    NoSession,
}

impl FetchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, FetchOutcome::Applied)
    }

    pub fn error(&self) -> Option<&GateError> {
        match self {
            FetchOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

pub(crate) struct Tracked<T> {
    user: Option<UserId>,
    pub(crate) cell: LatestCell<T>,
    pub(crate) last_error: Option<String>,
    pump: Option<JoinHandle<()>>,
}

impl<T> Default for Tracked<T> {
    fn default() -> Self {
        Self {
            user: None,
            cell: LatestCell::new(),
            last_error: None,
            pump: None,
        }
    }
}

impl<T> Tracked<T> {
    pub(crate) fn bind(&mut self, user: UserId) -> u64 {
        self.abort_pump();
        self.user = Some(user);
        self.last_error = None;
        self.cell.reset()
    }

    pub(crate) fn unbind(&mut self) {
        self.abort_pump();
        self.user = None;
        self.last_error = None;
        self.cell.reset();
    }

    pub(crate) fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub(crate) fn set_pump(&mut self, handle: JoinHandle<()>) {
        self.abort_pump();
        self.pump = Some(handle);
    }

    /// Issues a ticket for an outgoing request against the bound identity.
    pub(crate) fn request(&mut self) -> Option<(UserId, Ticket)> {
        let user = self.user.clone()?;
        Some((user, self.cell.issue()))
    }

    /// Issues a ticket for a pushed row, if it still belongs to this binding.
    pub(crate) fn arrival(&mut self, epoch: u64, user: &UserId) -> Option<Ticket> {
        if self.cell.epoch() != epoch || self.user.as_ref() != Some(user) {
            return None;
        }
        Some(self.cell.issue())
    }

    pub(crate) fn apply(&mut self, ticket: Ticket, value: T) -> Applied {
        self.cell.apply(ticket, value)
    }

    fn abort_pump(&mut self) {
        if let Some(handle) = self.pump.take() {
            handle.abort();
        }
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.abort_pump();
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Feeds a change stream into an accessor until the stream ends or the accessor is dropped.
pub(crate) fn spawn_pump<S, F>(
    target: Weak<S>,
    mut stream: ChangeStream,
    epoch: u64,
    apply: F,
) -> JoinHandle<()>
where
    S: Send + Sync + 'static,
    F: Fn(&Arc<S>, u64, ChangeNotification) + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(notification) = stream.next().await {
            let Some(target) = target.upgrade() else {
                break;
            };
            if let Err(info) = notification.validate() {
                tracing::warn!(code = %info.code, message = %info.message, "Dropping invalid change notification");
                continue;
            }
            apply(&target, epoch, notification);
        }
        tracing::debug!(epoch, "Change feed pump finished");
    })
}
