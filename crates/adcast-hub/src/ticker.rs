use std::sync::Arc;
use std::time::Duration;

use adcast_core::Advertisement;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::AdCatalog;
use crate::coordinator::HubHandle;
use crate::registry::FanOutReport;

/// Periodically picks an ad and submits it to the hub.
///
/// Each firing waits for the coordinator's fan-out report before the next
/// tick is taken, so two firings never overlap. Late ticks are delayed
/// rather than replayed in a burst.
pub struct Ticker {
    hub: HubHandle,
    catalog: Arc<dyn AdCatalog>,
    period: Duration,
}

impl Ticker {
    pub fn new(hub: HubHandle, catalog: Arc<dyn AdCatalog>, period: Duration) -> Self {
        Self {
            hub,
            catalog,
            period,
        }
    }

    /// Fire every `period` until `shutdown` is cancelled or the hub stops.
    /// The first firing is one full period after start.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // consume first immediate tick

        info!(period_ms = self.period.as_millis() as u64, "ad ticker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            if self.hub.is_closed() {
                break;
            }
            self.fire().await;
        }
        info!("ad ticker stopped");
    }

    /// Select one ad and submit it. Returns `None` when nothing was submitted.
    pub async fn fire(&self) -> Option<FanOutReport> {
        let Some(ad) = self.select() else {
            warn!("ad catalog is empty, skipping broadcast");
            return None;
        };
        let ad_id = ad.id;
        match self.hub.submit(ad).await {
            Ok(report) => {
                debug!(
                    ad_id,
                    recipients = report.recipients,
                    dropped = report.dropped,
                    "broadcast tick"
                );
                Some(report)
            }
            Err(e) => {
                debug!(ad_id, error = %e, "broadcast tick after hub stopped");
                None
            }
        }
    }

    fn select(&self) -> Option<Advertisement> {
        let mut rng = rand::thread_rng();
        self.catalog.pick(&mut rng)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::mpsc;

    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::coordinator;

    fn catalog(ads: &[i64]) -> Arc<dyn AdCatalog> {
        Arc::new(StaticCatalog::new(
            ads.iter()
                .map(|&id| Advertisement::new(id, format!("img{id}"), format!("url{id}")))
                .collect(),
        ))
    }

    fn spawn_hub(mailbox_capacity: usize) -> (HubHandle, CancellationToken) {
        let (handle, coordinator) = coordinator::channel(16, mailbox_capacity);
        let token = CancellationToken::new();
        tokio::spawn(coordinator.run(token.clone()));
        (handle, token)
    }

    fn drain(mailbox: &mut mpsc::Receiver<Advertisement>) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Ok(ad) = mailbox.try_recv() {
            ids.push(ad.id);
        }
        ids
    }

    #[tokio::test]
    async fn fire_submits_a_catalog_ad() {
        let (hub, _token) = spawn_hub(4);
        let mut sub = hub.register().await.unwrap();
        let ticker = Ticker::new(hub.clone(), catalog(&[1, 2]), Duration::from_secs(10));

        let report = ticker.fire().await.unwrap();
        assert_eq!(report.delivered, 1);
        let ids = drain(&mut sub.mailbox);
        assert_eq!(ids.len(), 1);
        assert!(ids[0] == 1 || ids[0] == 2);
    }

    #[tokio::test]
    async fn empty_catalog_skips() {
        let (hub, _token) = spawn_hub(4);
        let ticker = Ticker::new(hub.clone(), catalog(&[]), Duration::from_secs(10));
        assert!(ticker.fire().await.is_none());
        assert_eq!(hub.stats().await.unwrap().ads_submitted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_period() {
        let (hub, _token) = spawn_hub(16);
        let mut sub = hub.register().await.unwrap();
        let shutdown = CancellationToken::new();
        let ticker = Ticker::new(hub.clone(), catalog(&[1]), Duration::from_secs(10));
        let task = tokio::spawn(ticker.run(shutdown.clone()));

        // Nothing before the first period elapses
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(hub.stats().await.unwrap().ads_submitted, 0);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(hub.stats().await.unwrap().ads_submitted, 3);
        assert_eq!(drain(&mut sub.mailbox), vec![1, 1, 1]);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_hub_stops() {
        let (hub, token) = spawn_hub(1);
        let ticker = Ticker::new(hub.clone(), catalog(&[1]), Duration::from_secs(1));
        let task = tokio::spawn(ticker.run(CancellationToken::new()));

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("ticker kept running after hub stopped")
            .unwrap();
    }

    /// Counts how many firings have started.
    struct CountingCatalog {
        picks: AtomicUsize,
    }

    impl AdCatalog for CountingCatalog {
        fn all(&self) -> Vec<Advertisement> {
            self.picks.fetch_add(1, Ordering::SeqCst);
            vec![Advertisement::new(1, "img1", "url1")]
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_submit_delays_ticks_without_overlap_or_burst() {
        // Coordinator not polled yet, so the first submit waits for its reply
        let (hub, coordinator) = coordinator::channel(1, 16);
        let catalog = Arc::new(CountingCatalog {
            picks: AtomicUsize::new(0),
        });
        let ticker = Ticker::new(hub.clone(), catalog.clone(), Duration::from_secs(10));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(ticker.run(shutdown.clone()));

        // Three periods pass while the first firing is in flight
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(catalog.picks.load(Ordering::SeqCst), 1);

        let hub_token = CancellationToken::new();
        tokio::spawn(coordinator.run(hub_token.clone()));

        // The stalled submit lands, then a single overdue tick fires
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(hub.stats().await.unwrap().ads_submitted, 2);

        // Schedule restarts from the late tick at t=35: next at 45, not 40
        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(hub.stats().await.unwrap().ads_submitted, 2);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hub.stats().await.unwrap().ads_submitted, 3);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(hub.stats().await.unwrap().ads_submitted, 4);
        assert_eq!(catalog.picks.load(Ordering::SeqCst), 4);

        shutdown.cancel();
        task.await.unwrap();
        hub_token.cancel();
    }
}
