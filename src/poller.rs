//! Periodic battery requests.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, Instrument, Span};

use crate::error::Result;

/// A background task that re-requests battery data on a fixed interval.
///
/// The first request is issued one interval after spawning; the handshake
/// sends the initial one. The task stops on its own after a failed request
/// and stops immediately when its token is cancelled, abandoning any request
/// still in flight.
pub struct BatteryPoller {
    handle: Option<JoinHandle<()>>,
    stop: CancellationToken,
}

impl BatteryPoller {
    /// Start polling.
    ///
    /// # Arguments
    ///
    /// * `period` - Time between requests, must be non-zero
    /// * `stop` - Cancelled when the connection ends
    /// * `request` - Issues one battery request
    pub fn spawn<F, Fut>(period: Duration, stop: CancellationToken, mut request: F, span: Span) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        let token = stop.clone();

        let handle = tokio::spawn(
            async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            debug!("Battery poller cancelled");
                            break;
                        }
                        _ = ticker.tick() => {}
                    }

                    debug!("Requesting battery data");
                    let result = tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            debug!("Battery poller cancelled during request");
                            break;
                        }
                        result = request() => result,
                    };

                    if let Err(e) = result {
                        error!("Unable to request battery level, stopping poller: {}", e);
                        break;
                    }
                }
            }
            .instrument(span),
        );

        Self {
            handle: Some(handle),
            stop,
        }
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Cancel the poller and wait for the task to exit.
    pub async fn stop(mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for BatteryPoller {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting(count: Arc<AtomicU32>) -> impl FnMut() -> futures::future::Ready<Result<()>> {
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_every_interval() {
        let count = Arc::new(AtomicU32::new(0));
        let poller = BatteryPoller::spawn(
            Duration::from_secs(60),
            CancellationToken::new(),
            counting(count.clone()),
            Span::none(),
        );

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        assert!(poller.is_running());
        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_cancel() {
        let count = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();
        let poller = BatteryPoller::spawn(
            Duration::from_secs(10),
            token.clone(),
            counting(count.clone()),
            Span::none(),
        );

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        token.cancel();
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_failed_request() {
        let count = Arc::new(AtomicU32::new(0));
        let calls = count.clone();
        let poller = BatteryPoller::spawn(
            Duration::from_secs(1),
            CancellationToken::new(),
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                futures::future::ready(Err(Error::NotConnected))
            },
            Span::none(),
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_after_task_exited() {
        let poller = BatteryPoller::spawn(
            Duration::from_secs(1),
            CancellationToken::new(),
            || futures::future::ready(Err(Error::NotConnected)),
            Span::none(),
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!poller.is_running());

        tokio::time::timeout(Duration::from_secs(1), poller.stop())
            .await
            .expect("stop should return once the task is gone");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_inflight_request() {
        let started = Arc::new(AtomicU32::new(0));
        let finished = Arc::new(AtomicU32::new(0));
        let (s, f) = (started.clone(), finished.clone());

        let poller = BatteryPoller::spawn(
            Duration::from_secs(1),
            CancellationToken::new(),
            move || {
                s.fetch_add(1, Ordering::SeqCst);
                let f = f.clone();
                async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    f.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            Span::none(),
        );

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        poller.stop().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
