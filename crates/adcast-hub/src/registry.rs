use std::collections::HashMap;

use adcast_core::{Advertisement, SessionId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Result of offering one ad to every registered session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Sessions registered when the fan-out ran.
    pub recipients: usize,
    /// Ads placed in a mailbox.
    pub delivered: usize,
    /// Ads discarded because the mailbox was full.
    pub dropped: usize,
    /// Mailboxes whose handler already stopped reading; their unregister is in flight.
    pub closed: usize,
}

/// Live sessions keyed by id, each with the sending half of its mailbox.
///
/// Not synchronized: the coordinator task owns it by value and is the only
/// reader and writer.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    sessions: HashMap<SessionId, mpsc::Sender<Advertisement>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. A duplicate id keeps the existing entry and returns
    /// `false`; the rejected sender is dropped, so the duplicate's mailbox
    /// closes immediately.
    pub fn insert(&mut self, id: SessionId, mailbox: mpsc::Sender<Advertisement>) -> bool {
        if self.sessions.contains_key(&id) {
            warn!(session_id = %id, "duplicate session registration ignored");
            return false;
        }
        self.sessions.insert(id, mailbox);
        true
    }

    /// Remove a session and close its mailbox. Returns `false` if the session
    /// was not registered.
    pub fn remove(&mut self, id: &SessionId) -> bool {
        // Dropping the only sender is what closes the mailbox.
        self.sessions.remove(id).is_some()
    }

    /// Offer `ad` to every mailbox without waiting. A full mailbox loses this
    /// ad; nothing else is affected.
    pub fn fan_out(&self, ad: &Advertisement) -> FanOutReport {
        let mut report = FanOutReport {
            recipients: self.sessions.len(),
            ..Default::default()
        };

        for (id, mailbox) in &self.sessions {
            match mailbox.try_send(ad.clone()) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    report.dropped += 1;
                    warn!(session_id = %id, ad_id = ad.id, "mailbox full, dropping ad");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    report.closed += 1;
                    debug!(session_id = %id, ad_id = ad.id, "mailbox closed, awaiting unregister");
                }
            }
        }
        report
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every entry, closing all mailboxes. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let n = self.sessions.len();
        self.sessions.clear();
        n
    }
}
