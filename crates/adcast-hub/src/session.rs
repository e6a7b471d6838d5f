//! Per-connection session lifecycle.
//!
//! ```text
//! Connecting ──registered──► Active ──write error / peer closed / mailbox closed──► Closing ──unregister──► Closed
//!      └──────────────────────── hub unavailable ───────────────────────────────────────────────────────────┘
//! ```

use adcast_core::{Advertisement, SessionId};
use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::{HubHandle, Subscription};
use crate::error::SinkError;

/// Writing half of a client connection.
#[async_trait]
pub trait AdSink: Send {
    /// Deliver one ad to the peer. Any error ends the session.
    async fn send_ad(&mut self, ad: &Advertisement) -> Result<(), SinkError>;

    /// Release the connection. Called exactly once, after the session has unregistered.
    async fn close(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Why a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Writing to the peer failed.
    WriteFailed(SinkError),
    /// The peer went away.
    PeerClosed,
    /// The coordinator closed the mailbox (unregistered elsewhere, or hub shutdown).
    MailboxClosed,
    /// Registration never succeeded.
    HubUnavailable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOutcome {
    /// `None` when registration never happened.
    pub session_id: Option<SessionId>,
    /// Ads successfully written to the peer.
    pub delivered: u64,
    pub reason: CloseReason,
}

/// Drives one client: register, relay mailbox to peer, unregister.
pub struct SessionHandler<S> {
    hub: HubHandle,
    sink: S,
    state: watch::Sender<SessionState>,
}

impl<S: AdSink> SessionHandler<S> {
    pub fn new(hub: HubHandle, sink: S) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self { hub, sink, state }
    }

    /// Observe lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run the session to completion. `peer_closed` is cancelled by whoever
    /// reads the connection when the peer disconnects.
    pub async fn run(mut self, peer_closed: CancellationToken) -> SessionOutcome {
        let Subscription {
            session_id,
            mut mailbox,
        } = match self.hub.register().await {
            Ok(sub) => sub,
            Err(e) => {
                warn!(error = %e, "session could not register");
                self.sink.close().await;
                self.set_state(SessionState::Closed);
                return SessionOutcome {
                    session_id: None,
                    delivered: 0,
                    reason: CloseReason::HubUnavailable,
                };
            }
        };
        self.set_state(SessionState::Active);
        debug!(session_id = %session_id, "session active");

        let mut delivered = 0u64;
        let reason = loop {
            let ad = tokio::select! {
                _ = peer_closed.cancelled() => break CloseReason::PeerClosed,
                next = mailbox.recv() => match next {
                    Some(ad) => ad,
                    None => break CloseReason::MailboxClosed,
                },
            };

            let write = tokio::select! {
                _ = peer_closed.cancelled() => break CloseReason::PeerClosed,
                write = self.sink.send_ad(&ad) => write,
            };
            match write {
                Ok(()) => {
                    delivered += 1;
                    debug!(session_id = %session_id, ad_id = ad.id, "ad sent");
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "write to client failed");
                    break CloseReason::WriteFailed(e);
                }
            }
        };

        self.set_state(SessionState::Closing);
        if self.hub.unregister(&session_id).await.is_err() {
            debug!(session_id = %session_id, "hub already stopped");
        }
        drop(mailbox);
        self.sink.close().await;
        self.set_state(SessionState::Closed);

        info!(session_id = %session_id, delivered, reason = ?reason, "session closed");
        SessionOutcome {
            session_id: Some(session_id),
            delivered,
            reason,
        }
    }

    fn set_state(&self, next: SessionState) {
        self.state.send_replace(next);
    }
}
