//! # Fallback Poller
//!
//! Periodic pull that runs only while the push channel is down and the viewer
//! is authenticated. One task owns at most one timer: the timer starts when
//! `connected` goes false, and is cleared when it goes true or the owner
//! stops the poller.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, gauge};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Something the poller refreshes on each tick.
#[async_trait]
pub trait PollTarget: Send + Sync {
    async fn poll(&self);
}

pub struct FallbackPoller {
    interval: Duration,
    connected: watch::Receiver<bool>,
    authenticated: bool,
    live_timers: Arc<AtomicUsize>,
}

/// Counts itself in `live_timers` for as long as it exists.
struct TimerGuard {
    live_timers: Arc<AtomicUsize>,
}

impl TimerGuard {
    fn start(live_timers: &Arc<AtomicUsize>) -> Self {
        let now = live_timers.fetch_add(1, Ordering::SeqCst) + 1;
        gauge!("fallback_poller_active_timers").set(now as f64);
        debug!("fallback poll timer started");
        Self {
            live_timers: Arc::clone(live_timers),
        }
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        let now = self.live_timers.fetch_sub(1, Ordering::SeqCst) - 1;
        gauge!("fallback_poller_active_timers").set(now as f64);
        debug!("fallback poll timer cleared");
    }
}

impl FallbackPoller {
    pub fn new(interval: Duration, connected: watch::Receiver<bool>, authenticated: bool) -> Self {
        Self {
            interval,
            connected,
            authenticated,
            live_timers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of timers currently live (0 or 1).
    pub fn live_timers(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live_timers)
    }

    /// Spawn the poller; it stops when the returned handle is stopped or dropped.
    pub fn spawn(self, target: Arc<dyn PollTarget>) -> PollerHandle {
        let shutdown = CancellationToken::new();
        let live_timers = self.live_timers();
        let task = tokio::spawn(self.run(target, shutdown.clone()));
        PollerHandle {
            shutdown,
            task: Some(task),
            live_timers,
        }
    }

    #[instrument(skip_all)]
    pub async fn run(mut self, target: Arc<dyn PollTarget>, shutdown: CancellationToken) {
        if !self.authenticated {
            info!("Fallback poller idle: viewer is not authenticated");
            return;
        }

        loop {
            // Idle while the push channel is up.
            while *self.connected.borrow_and_update() {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    changed = self.connected.changed() => {
                        if changed.is_err() {
                            // Channel gone while connected: the session is over.
                            return;
                        }
                    }
                }
            }

            if !self.poll_until_connected(&target, &shutdown).await {
                return;
            }
        }
    }

    /// Poll on a fixed period until the channel reconnects (`true`) or the
    /// poller is shut down (`false`).
    async fn poll_until_connected(
        &mut self,
        target: &Arc<dyn PollTarget>,
        shutdown: &CancellationToken,
    ) -> bool {
        let _timer = TimerGuard::start(&self.live_timers);
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sender_gone = false;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return false,
                changed = self.connected.changed(), if !sender_gone => {
                    match changed {
                        Ok(()) => {
                            if *self.connected.borrow_and_update() {
                                info!("Push channel reconnected; fallback polling paused");
                                return true;
                            }
                        }
                        Err(_) => sender_gone = true,
                    }
                }
                _ = ticker.tick() => {
                    counter!("fallback_poller_polls_total").increment(1);
                    debug!("fallback poll");
                    tokio::select! {
                        _ = shutdown.cancelled() => return false,
                        _ = target.poll() => {}
                    }
                }
            }
        }
    }
}

/// Owner handle for a spawned poller.
pub struct PollerHandle {
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    live_timers: Arc<AtomicUsize>,
}

impl PollerHandle {
    pub fn live_timers(&self) -> usize {
        self.live_timers.load(Ordering::SeqCst)
    }

    /// Stop polling and wait for the timer to be cleared.
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
