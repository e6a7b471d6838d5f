use adcast_core::{Advertisement, SessionId};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::HubError;
use crate::registry::{ClientRegistry, FanOutReport};

/// Requests accepted by the coordinator, applied strictly in arrival order.
#[derive(Debug)]
enum HubCommand {
    Register {
        session_id: SessionId,
        mailbox: mpsc::Sender<Advertisement>,
        ack: oneshot::Sender<bool>,
    },
    Unregister {
        session_id: SessionId,
    },
    Submit {
        ad: Advertisement,
        reply: oneshot::Sender<FanOutReport>,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
}

/// Point-in-time counters, read through the coordinator like everything else.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub sessions: usize,
    pub ads_submitted: u64,
    pub deliveries: u64,
    pub drops: u64,
}

/// A freshly registered session: its identity and the receiving end of its mailbox.
#[derive(Debug)]
pub struct Subscription {
    pub session_id: SessionId,
    pub mailbox: mpsc::Receiver<Advertisement>,
}

/// Cloneable client of the coordinator. Every method is a message to the
/// coordinator task; none of them touch the registry directly.
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
    mailbox_capacity: usize,
}

impl HubHandle {
    /// Create a session with a fresh id and mailbox and wait until the
    /// coordinator has inserted it, so it is visible to the next submit.
    pub async fn register(&self) -> Result<Subscription, HubError> {
        self.register_as(SessionId::new()).await
    }

    pub(crate) async fn register_as(&self, session_id: SessionId) -> Result<Subscription, HubError> {
        let (mailbox_tx, mailbox) = mpsc::channel(self.mailbox_capacity);
        let (ack, ack_rx) = oneshot::channel();
        self.send(HubCommand::Register {
            session_id: session_id.clone(),
            mailbox: mailbox_tx,
            ack,
        })
        .await?;
        let inserted = ack_rx.await.map_err(|_| HubError::Closed)?;
        if !inserted {
            return Err(HubError::DuplicateSession(session_id));
        }
        Ok(Subscription {
            session_id,
            mailbox,
        })
    }

    /// Remove a session and close its mailbox. Unknown ids are ignored, so
    /// calling this more than once is harmless.
    pub async fn unregister(&self, session_id: &SessionId) -> Result<(), HubError> {
        self.send(HubCommand::Unregister {
            session_id: session_id.clone(),
        })
        .await
    }

    /// Fan `ad` out to every registered session and wait for the result.
    /// Full mailboxes are reported, not returned as errors.
    pub async fn submit(&self, ad: Advertisement) -> Result<FanOutReport, HubError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(HubCommand::Submit { ad, reply }).await?;
        reply_rx.await.map_err(|_| HubError::Closed)
    }

    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(HubCommand::Stats { reply }).await?;
        reply_rx.await.map_err(|_| HubError::Closed)
    }

    /// Whether the coordinator has stopped accepting requests.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), HubError> {
        self.tx.send(cmd).await.map_err(|_| HubError::Closed)
    }
}

/// Single owner of the [`ClientRegistry`].
pub(crate) struct Coordinator {
    registry: ClientRegistry,
    rx: mpsc::Receiver<HubCommand>,
    stats: HubStats,
}

/// Create a coordinator and the handle that feeds it. The coordinator does
/// nothing until [`Coordinator::run`] is polled.
pub(crate) fn channel(command_queue: usize, mailbox_capacity: usize) -> (HubHandle, Coordinator) {
    let (tx, rx) = mpsc::channel(command_queue);
    let handle = HubHandle {
        tx,
        mailbox_capacity,
    };
    let coordinator = Coordinator {
        registry: ClientRegistry::new(),
        rx,
        stats: HubStats::default(),
    };
    (handle, coordinator)
}

impl Coordinator {
    /// Process requests until `shutdown` fires or every handle is dropped.
    /// On exit the registry is cleared, which closes every mailbox.
    pub(crate) async fn run(mut self, shutdown: CancellationToken) {
        loop {
            let cmd = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };
            self.handle(cmd);
        }

        let closed = self.registry.clear();
        info!(sessions_closed = closed, "broadcast coordinator stopped");
    }

    fn handle(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register {
                session_id,
                mailbox,
                ack,
            } => {
                let inserted = self.registry.insert(session_id.clone(), mailbox);
                debug!(session_id = %session_id, sessions = self.registry.len(), "session registered");
                let _ = ack.send(inserted);
            }
            HubCommand::Unregister { session_id } => {
                if self.registry.remove(&session_id) {
                    debug!(session_id = %session_id, sessions = self.registry.len(), "session unregistered");
                }
            }
            HubCommand::Submit { ad, reply } => {
                let report = self.registry.fan_out(&ad);
                self.stats.ads_submitted += 1;
                self.stats.deliveries += report.delivered as u64;
                self.stats.drops += report.dropped as u64;
                debug!(
                    ad_id = ad.id,
                    recipients = report.recipients,
                    delivered = report.delivered,
                    dropped = report.dropped,
                    "ad fanned out"
                );
                let _ = reply.send(report);
            }
            HubCommand::Stats { reply } => {
                let _ = reply.send(HubStats {
                    sessions: self.registry.len(),
                    ..self.stats
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad(id: i64) -> Advertisement {
        Advertisement::new(id, format!("img{id}"), format!("url{id}"))
    }

    fn spawn_hub(mailbox_capacity: usize) -> (HubHandle, CancellationToken) {
        let (handle, coordinator) = channel(64, mailbox_capacity);
        let token = CancellationToken::new();
        tokio::spawn(coordinator.run(token.clone()));
        (handle, token)
    }

    #[tokio::test]
    async fn two_sessions_receive_one_submit_once() {
        let (hub, _token) = spawn_hub(4);
        let mut a = hub.register().await.unwrap();
        let mut b = hub.register().await.unwrap();

        let report = hub.submit(ad(1)).await.unwrap();
        assert_eq!(report.delivered, 2);

        assert_eq!(a.mailbox.try_recv().unwrap(), ad(1));
        assert_eq!(b.mailbox.try_recv().unwrap(), ad(1));
        assert!(a.mailbox.try_recv().is_err());
        assert!(b.mailbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_mailbox_drops_silently() {
        let (hub, _token) = spawn_hub(2);
        let mut s = hub.register().await.unwrap();

        hub.submit(ad(1)).await.unwrap();
        hub.submit(ad(2)).await.unwrap();
        let report = hub.submit(ad(3)).await.unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(report.delivered, 0);

        assert_eq!(s.mailbox.try_recv().unwrap(), ad(1));
        assert_eq!(s.mailbox.try_recv().unwrap(), ad(2));
        assert!(s.mailbox.try_recv().is_err());

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.ads_submitted, 3);
        assert_eq!(stats.deliveries, 2);
        assert_eq!(stats.drops, 1);
    }

    #[tokio::test]
    async fn slow_session_does_not_starve_fast_one() {
        let (hub, _token) = spawn_hub(1);
        let _slow = hub.register().await.unwrap();
        let mut fast = hub.register().await.unwrap();

        for i in 1..=5 {
            let report = hub.submit(ad(i)).await.unwrap();
            assert_eq!(report.recipients, 2);
            assert_eq!(fast.mailbox.try_recv().unwrap(), ad(i));
        }
    }

    #[tokio::test]
    async fn unregistered_session_gets_nothing() {
        let (hub, _token) = spawn_hub(1);
        let mut s = hub.register().await.unwrap();
        hub.unregister(&s.session_id).await.unwrap();

        let report = hub.submit(ad(1)).await.unwrap();
        assert_eq!(report.recipients, 0);
        assert_eq!(hub.stats().await.unwrap().sessions, 0);
        assert!(s.mailbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn unregister_twice_matches_once() {
        let (hub, _token) = spawn_hub(1);
        let s = hub.register().await.unwrap();
        let _other = hub.register().await.unwrap();

        hub.unregister(&s.session_id).await.unwrap();
        let after_once = hub.stats().await.unwrap().sessions;
        hub.unregister(&s.session_id).await.unwrap();
        let after_twice = hub.stats().await.unwrap().sessions;

        assert_eq!(after_once, 1);
        assert_eq!(after_once, after_twice);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let (hub, _token) = spawn_hub(1);
        let id = SessionId::new();
        let mut first = hub.register_as(id.clone()).await.unwrap();

        let err = hub.register_as(id.clone()).await.unwrap_err();
        assert_eq!(err, HubError::DuplicateSession(id));
        assert_eq!(hub.stats().await.unwrap().sessions, 1);

        // The original session still receives ads
        hub.submit(ad(4)).await.unwrap();
        assert_eq!(first.mailbox.try_recv().unwrap(), ad(4));
    }

    #[tokio::test]
    async fn concurrent_registers_both_delivered() {
        let (hub, _token) = spawn_hub(1);
        let (a, b) = tokio::join!(hub.register(), hub.register());
        let (mut a, mut b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.session_id, b.session_id);

        hub.submit(ad(7)).await.unwrap();
        assert_eq!(a.mailbox.try_recv().unwrap(), ad(7));
        assert_eq!(b.mailbox.try_recv().unwrap(), ad(7));
    }

    #[tokio::test]
    async fn register_submit_interleaving_keeps_membership() {
        let (hub, _token) = spawn_hub(1);
        let mut tasks = Vec::new();
        for i in 0..16 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                let s = hub.register().await.unwrap();
                hub.submit(ad(i)).await.unwrap();
                if i % 2 == 0 {
                    hub.unregister(&s.session_id).await.unwrap();
                }
                s
            }));
        }
        let mut kept = Vec::new();
        for task in tasks {
            kept.push(task.await.unwrap());
        }
        assert_eq!(hub.stats().await.unwrap().sessions, 8);
    }

    #[tokio::test]
    async fn shutdown_closes_mailboxes_and_rejects_calls() {
        let (hub, token) = spawn_hub(1);
        let mut s = hub.register().await.unwrap();
        token.cancel();

        assert!(s.mailbox.recv().await.is_none());
        assert_eq!(hub.submit(ad(1)).await, Err(HubError::Closed));
        assert!(hub.register().await.is_err());
        assert!(hub.is_closed());
    }

    #[test]
    fn stats_serialize_camel_case() {
        let json = serde_json::to_value(HubStats {
            sessions: 1,
            ads_submitted: 2,
            deliveries: 3,
            drops: 4,
        })
        .unwrap();
        assert_eq!(json["adsSubmitted"], 2);
        assert_eq!(json["drops"], 4);
    }
}
