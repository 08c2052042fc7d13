//! The backend data boundary consumed by the accessors.
//!
//! A backend owns the profile and subscription tables and a row-level change
//! feed filtered by user. The hosted service and [`crate::local::LocalBackend`]
//! both sit behind this trait; tests inject their own implementations.

use async_trait::async_trait;
use chrono::Utc;
use portal_backend_protocol::{
    AppMode, ChangeNotification, ProfileRow, SubscriptionRow, Table, UserId,
};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::error::{GateError, Result};

#[async_trait]
pub trait Backend: Send + Sync {
    /// `Ok(None)` when the user has no profile row.
    async fn fetch_profile(&self, user: &UserId) -> Result<Option<ProfileRow>>;

    /// Single-field update of `app_mode` on the user's profile row.
    async fn update_app_mode(&self, user: &UserId, mode: AppMode) -> Result<()>;

    async fn fetch_subscription(&self, user: &UserId) -> Result<Option<SubscriptionRow>>;

    /// Row-level update notifications for one table, filtered by user.
    fn subscribe(&self, table: Table, user: &UserId) -> ChangeStream;
}

/// Receiving half of a filtered change feed.
#[derive(Debug)]
pub struct ChangeStream {
    receiver: mpsc::UnboundedReceiver<ChangeNotification>,
}

impl ChangeStream {
    pub fn new(receiver: mpsc::UnboundedReceiver<ChangeNotification>) -> Self {
        Self { receiver }
    }

    /// A stream that never yields; for backends without a change feed.
    pub fn closed() -> Self {
        let (_, receiver) = mpsc::unbounded_channel();
        Self { receiver }
    }

    /// Waits for the next notification. `None` once the backend drops the feed.
    pub async fn next(&mut self) -> Option<ChangeNotification> {
        self.receiver.recv().await
    }
}

struct Subscriber {
    table: Table,
    user: UserId,
    sender: mpsc::UnboundedSender<ChangeNotification>,
}

/// Fan-out of change notifications to per-user subscribers.
#[derive(Default)]
pub struct ChangeHub {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, table: Table, user: &UserId) -> ChangeStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().push(Subscriber {
            table,
            user: user.clone(),
            sender,
        });
        ChangeStream::new(receiver)
    }

    /// Delivers to every live subscriber of the notification's table and user.
    /// Returns the number of deliveries; closed subscribers are pruned.
    pub fn publish(&self, notification: &ChangeNotification) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|subscriber| !subscriber.sender.is_closed());

        let mut delivered = 0;
        for subscriber in subscribers.iter() {
            if subscriber.table != notification.table || subscriber.user != notification.user_id {
                continue;
            }
            if subscriber.sender.send(notification.clone()).is_ok() {
                delivered += 1;
            }
        }
        tracing::debug!(
            event_id = %notification.event_id,
            table = ?notification.table,
            user_id = %notification.user_id,
            delivered,
            "Change notification published"
        );
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|subscriber| !subscriber.sender.is_closed());
        subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Builds a notification for a freshly committed row.
pub fn change_notification<R: Serialize>(
    table: Table,
    user: &UserId,
    row: &R,
) -> Result<ChangeNotification> {
    let row = serde_json::to_value(row).map_err(|source| GateError::Json {
        context: "serialize changed row".to_string(),
        source,
    })?;
    Ok(ChangeNotification {
        event_id: ulid::Ulid::new().to_string(),
        table,
        user_id: user.clone(),
        committed_at: Utc::now(),
        row,
    })
}
