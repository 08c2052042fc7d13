//! Current authenticated identity, as reported by the auth provider.
//!
//! The portal core only reads identity; signing in and out happens elsewhere
//! and is reported here through [`SessionSource::resolve`].

use portal_backend_protocol::UserId;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityStatus {
    /// The auth provider has not answered yet.
    Resolving,
    SignedOut,
    SignedIn(UserId),
}

impl IdentityStatus {
    pub fn user(&self) -> Option<&UserId> {
        match self {
            IdentityStatus::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SessionSource {
    sender: watch::Sender<IdentityStatus>,
}

impl Default for SessionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSource {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(IdentityStatus::Resolving);
        Self { sender }
    }

    pub fn resolve(&self, user: Option<UserId>) {
        let next = match user {
            Some(user) => IdentityStatus::SignedIn(user),
            None => IdentityStatus::SignedOut,
        };
        self.sender.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::info!(from = ?current, to = ?next, "Session identity changed");
            *current = next;
            true
        });
    }

    pub fn sign_in(&self, user: UserId) {
        self.resolve(Some(user));
    }

    pub fn sign_out(&self) {
        self.resolve(None);
    }

    pub fn status(&self) -> IdentityStatus {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<IdentityStatus> {
        self.sender.subscribe()
    }
}
