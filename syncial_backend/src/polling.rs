//! Periodic refresh of chain and price data. Each poller owns one task that
//! publishes its latest successful fetch on a watch channel.

use crate::feed::{FeedComposer, FeedEntry};
use crate::prices::{HermesClient, PriceQuote};
use crate::services::{PollView, PredictionMarketService};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const POLL_REFRESH: Duration = Duration::from_secs(10);
pub const PRICE_REFRESH: Duration = Duration::from_secs(10);
pub const FEED_REFRESH: Duration = Duration::from_secs(30);

/// Stops its task when dropped.
pub struct PollerHandle<T> {
    name: &'static str,
    updates: watch::Receiver<Option<T>>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T: Clone> PollerHandle<T> {
    pub fn latest(&self) -> Option<T> {
        self.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.updates.clone()
    }

    /// Skips the rest of the current wait, e.g. right after a write.
    pub fn refresh_now(&self) {
        self.wake.notify_one();
    }

    /// Waits for the next published value.
    pub async fn next(&mut self) -> Option<T> {
        self.updates.changed().await.ok()?;
        self.updates.borrow_and_update().clone()
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(poller = self.name, error = %err, "poller task ended abnormally");
            }
        }
    }
}

impl<T> Drop for PollerHandle<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Runs `fetch` immediately and then every `interval` until the handle goes
/// away. Failed fetches are logged and leave the last value in place.
pub fn spawn_poller<T, E, F, Fut>(name: &'static str, interval: Duration, mut fetch: F) -> PollerHandle<T>
where
    T: Send + Sync + 'static,
    E: Display + Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let (tx, rx) = watch::channel(None);
    let wake = Arc::new(Notify::new());
    let cancel = CancellationToken::new();

    let task = {
        let wake = wake.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tracing::debug!(poller = name, ?interval, "poller started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = fetch() => match result {
                        Ok(value) => {
                            tx.send_replace(Some(value));
                        }
                        Err(err) => tracing::warn!(poller = name, error = %err, "refresh failed"),
                    },
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                    _ = wake.notified() => {}
                }
            }
            tracing::debug!(poller = name, "poller stopped");
        })
    };

    PollerHandle {
        name,
        updates: rx,
        wake,
        cancel,
        task: Some(task),
    }
}

pub fn poll_prices(client: HermesClient) -> PollerHandle<Vec<PriceQuote>> {
    spawn_poller("prices", PRICE_REFRESH, move || {
        let client = client.clone();
        async move { client.latest_defaults().await }
    })
}

pub fn poll_markets(market: PredictionMarketService) -> PollerHandle<Vec<PollView>> {
    spawn_poller("polls", POLL_REFRESH, move || {
        let market = market.clone();
        async move { market.list_polls().await }
    })
}

pub fn poll_feed(composer: Arc<FeedComposer>) -> PollerHandle<Vec<FeedEntry>> {
    spawn_poller("feed", FEED_REFRESH, move || {
        let composer = composer.clone();
        async move { composer.refresh().await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(
        interval: Duration,
        fail_on: u32,
    ) -> (Arc<AtomicU32>, PollerHandle<u32>) {
        let counter = Arc::new(AtomicU32::new(0));
        let handle = {
            let counter = counter.clone();
            spawn_poller("test", interval, move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == fail_on {
                        Err("boom")
                    } else {
                        Ok(n)
                    }
                }
            })
        };
        (counter, handle)
    }

    #[tokio::test]
    async fn publishes_fetches_and_keeps_last_value_on_error() {
        let (_counter, mut handle) = counting(Duration::from_millis(10), 2);

        assert_eq!(handle.next().await, Some(1));
        // Fetch 2 fails; the next published value is 3.
        assert_eq!(handle.next().await, Some(3));
        assert_eq!(handle.latest(), Some(3));
    }

    #[tokio::test]
    async fn refresh_now_skips_the_wait() {
        let (_counter, mut handle) = counting(Duration::from_secs(3600), 0);
        assert_eq!(handle.next().await, Some(1));

        handle.refresh_now();
        let next = tokio::time::timeout(Duration::from_secs(5), handle.next())
            .await
            .unwrap();
        assert_eq!(next, Some(2));
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_fetching() {
        let (counter, mut handle) = counting(Duration::from_millis(5), 0);
        handle.next().await;
        drop(handle);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let seen = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn shutdown_waits_for_the_task() {
        let (counter, handle) = counting(Duration::from_millis(5), 0);
        handle.shutdown().await;
        let seen = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }
}
