use std::sync::Arc;
use std::time::Duration;

use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::AdCatalog;
use crate::coordinator::{self, HubHandle};
use crate::ticker::Ticker;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubConfig {
    /// Time between automatic broadcasts.
    pub broadcast_interval: Duration,
    /// Ads a session may hold unread before new ones are dropped for it.
    pub mailbox_capacity: usize,
    /// Pending coordinator requests before callers wait.
    pub command_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            broadcast_interval: Duration::from_secs(10),
            mailbox_capacity: 1,
            command_queue: 256,
        }
    }
}

/// A running broadcast hub: the coordinator task plus the ticker feeding it.
pub struct AdHub {
    handle: HubHandle,
    shutdown: CancellationToken,
    coordinator: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

impl AdHub {
    /// Spawn the coordinator and ticker on the current runtime.
    pub fn start(config: HubConfig, catalog: Arc<dyn AdCatalog>) -> Self {
        let mailbox_capacity = config.mailbox_capacity.max(1);
        let command_queue = config.command_queue.max(1);
        let (handle, coordinator) = coordinator::channel(command_queue, mailbox_capacity);
        let shutdown = CancellationToken::new();

        let coordinator = tokio::spawn(coordinator.run(shutdown.child_token()));
        let ticker = Ticker::new(handle.clone(), catalog, config.broadcast_interval);
        let ticker = tokio::spawn(ticker.run(shutdown.child_token()));

        info!(
            interval_ms = config.broadcast_interval.as_millis() as u64,
            mailbox_capacity,
            "ad hub started"
        );
        Self {
            handle,
            shutdown,
            coordinator,
            ticker,
        }
    }

    pub fn handle(&self) -> HubHandle {
        self.handle.clone()
    }

    /// Stop the ticker and coordinator. Every mailbox is closed once this
    /// returns, so connected sessions wind down on their own.
    pub async fn shutdown(self) {
        let Self {
            shutdown,
            coordinator,
            ticker,
            ..
        } = self;
        shutdown.cancel();
        join_or_abort(
            vec![("ticker", ticker), ("coordinator", coordinator)],
            SHUTDOWN_TIMEOUT,
        )
        .await;
        info!("ad hub stopped");
    }
}

/// Wait for `tasks` up to `limit`, then abort whatever is still running.
/// Returns `false` if anything had to be aborted.
async fn join_or_abort(tasks: Vec<(&'static str, JoinHandle<()>)>, limit: Duration) -> bool {
    let aborts: Vec<AbortHandle> = tasks.iter().map(|(_, task)| task.abort_handle()).collect();
    let joined = tokio::time::timeout(limit, async move {
        for (name, task) in tasks {
            if let Err(e) = task.await {
                warn!(task = name, error = %e, "hub task failed");
            }
        }
    })
    .await;
    if joined.is_err() {
        warn!("hub shutdown timed out, aborting tasks");
        for handle in aborts {
            handle.abort();
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use adcast_core::Advertisement;

    use super::*;
    use crate::catalog::StaticCatalog;

    #[test]
    fn default_matches_launch_behaviour() {
        let config = HubConfig::default();
        assert_eq!(config.broadcast_interval, Duration::from_secs(10));
        assert_eq!(config.mailbox_capacity, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_feeds_registered_sessions() {
        let hub = AdHub::start(
            HubConfig {
                broadcast_interval: Duration::from_millis(100),
                mailbox_capacity: 8,
                command_queue: 16,
            },
            Arc::new(StaticCatalog::new(vec![Advertisement::new(3, "i", "u")])),
        );
        let handle = hub.handle();
        let mut sub = handle.register().await.unwrap();

        let ad = tokio::time::timeout(Duration::from_secs(1), sub.mailbox.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ad.id, 3);

        hub.shutdown().await;
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn zero_capacity_is_raised_to_one() {
        let hub = AdHub::start(
            HubConfig {
                broadcast_interval: Duration::from_secs(3600),
                mailbox_capacity: 0,
                command_queue: 0,
            },
            Arc::new(StaticCatalog::builtin()),
        );
        let handle = hub.handle();
        let mut sub = handle.register().await.unwrap();

        handle.submit(Advertisement::new(1, "i", "u")).await.unwrap();
        let report = handle.submit(Advertisement::new(2, "i", "u")).await.unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(sub.mailbox.try_recv().unwrap().id, 1);
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_the_handle() {
        let hub = AdHub::start(HubConfig::default(), Arc::new(StaticCatalog::builtin()));
        let handle = hub.handle();
        hub.shutdown().await;
        assert!(handle.is_closed());
        assert!(handle.stats().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_task_is_aborted_after_timeout() {
        struct SetOnDrop(Arc<AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let guard = SetOnDrop(dropped.clone());
        let stuck = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        let finished = tokio::spawn(async {});

        let clean = join_or_abort(
            vec![("finished", finished), ("stuck", stuck)],
            Duration::from_secs(1),
        )
        .await;
        assert!(!clean);

        for _ in 0..10 {
            if dropped.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(dropped.load(Ordering::SeqCst), "stuck task kept running");
    }

    #[tokio::test]
    async fn finished_tasks_join_cleanly() {
        let a = tokio::spawn(async {});
        let b = tokio::spawn(async {});
        assert!(join_or_abort(vec![("a", a), ("b", b)], Duration::from_secs(1)).await);
    }
}
