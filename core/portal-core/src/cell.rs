//! Latest-known state for one entity, shared by fetches and push updates.
//!
//! Fetch responses and push notifications for the same row can complete in
//! any order. Each request takes a [`Ticket`] when it is issued; on arrival it
//! is applied only if it belongs to the current identity epoch and is not
//! older than the value already stored. Every accepted value replaces the
//! previous one whole.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    revision: u64,
}

impl Ticket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Accepted,
    /// Issued under a previous identity (or before a stop).
    StaleEpoch,
    /// A newer ticket has already been applied.
    Superseded,
}

impl Applied {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Applied::Accepted)
    }
}

#[derive(Debug)]
pub struct LatestCell<T> {
    epoch: u64,
    issued: u64,
    applied: u64,
    value: Option<T>,
}

impl<T> Default for LatestCell<T> {
    fn default() -> Self {
        Self {
            epoch: 0,
            issued: 0,
            applied: 0,
            value: None,
        }
    }
}

impl<T> LatestCell<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new epoch and forgets the stored value.
    ///
    /// Tickets issued before the reset are rejected on arrival.
    pub fn reset(&mut self) -> u64 {
        self.epoch += 1;
        self.issued = 0;
        self.applied = 0;
        self.value = None;
        self.epoch
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn issue(&mut self) -> Ticket {
        self.issued += 1;
        Ticket {
            epoch: self.epoch,
            revision: self.issued,
        }
    }

    pub fn apply(&mut self, ticket: Ticket, value: T) -> Applied {
        if ticket.epoch != self.epoch {
            return Applied::StaleEpoch;
        }
        if ticket.revision < self.applied {
            return Applied::Superseded;
        }
        self.applied = ticket.revision;
        self.value = Some(value);
        Applied::Accepted
    }

    /// Retires a ticket without touching the stored value.
    pub fn settle(&mut self, ticket: Ticket) -> Applied {
        if ticket.epoch != self.epoch {
            return Applied::StaleEpoch;
        }
        if ticket.revision < self.applied {
            return Applied::Superseded;
        }
        self.applied = ticket.revision;
        Applied::Accepted
    }

    /// True when a ticket from the current epoch could still change the value.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.epoch == self.epoch && ticket.revision >= self.applied
    }

    /// True while at least one issued ticket is newer than the applied value.
    pub fn is_pending(&self) -> bool {
        self.issued > self.applied
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.applied
    }
}
