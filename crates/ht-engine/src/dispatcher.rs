//! Background loop that ships or drops pending heartbeats.
//!
//! Each tick evaluates the activity timeout first. While inactive the queue
//! is cleared, never sent. While active, the queue is drained at most once
//! per send interval and every drained heartbeat is attempted exactly once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ht_api::HeartbeatTransport;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::Shared;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tracking is inactive; pending heartbeats were discarded.
    Discarded { dropped: usize },
    /// Too soon after the previous send cycle.
    Throttled,
    /// Nothing was pending.
    Idle,
    /// No API key configured; drained heartbeats were discarded.
    NoApiKey { dropped: usize },
    /// Heartbeats were handed to the transport.
    Sent { sent: usize, failed: usize },
}

/// Source of dispatcher wake-ups.
pub trait Ticker: Send {
    /// Waits for the next tick. Returns `false` once no more ticks will come.
    fn tick(&mut self) -> impl Future<Output = bool> + Send;
}

/// Wall-clock ticker backed by [`tokio::time::interval`].
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticker driven explicitly through a [`TickTrigger`].
#[derive(Debug)]
pub struct ManualTicker {
    rx: mpsc::Receiver<()>,
}

/// Fires ticks on the paired [`ManualTicker`].
#[derive(Debug, Clone)]
pub struct TickTrigger {
    tx: mpsc::Sender<()>,
}

impl ManualTicker {
    pub fn new() -> (TickTrigger, Self) {
        let (tx, rx) = mpsc::channel(16);
        (TickTrigger { tx }, Self { rx })
    }
}

impl TickTrigger {
    /// Requests one tick. Returns `false` if the dispatcher is gone.
    pub async fn fire(&self) -> bool {
        self.tx.send(()).await.is_ok()
    }
}

impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

/// Drains the heartbeat queue into a transport.
pub struct Dispatcher<T> {
    shared: Arc<Shared>,
    transport: Arc<T>,
    last_cycle: Option<DateTime<Utc>>,
    observer: Option<mpsc::UnboundedSender<TickOutcome>>,
}

impl<T> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("last_cycle", &self.last_cycle)
            .finish_non_exhaustive()
    }
}

impl<T: HeartbeatTransport> Dispatcher<T> {
    pub(crate) const fn new(shared: Arc<Shared>, transport: Arc<T>) -> Self {
        Self {
            shared,
            transport,
            last_cycle: None,
            observer: None,
        }
    }

    /// Reports every tick outcome to `observer` while running.
    #[must_use]
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<TickOutcome>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs one dispatcher iteration.
    pub async fn tick(&mut self) -> TickOutcome {
        let now = self.shared.now();
        let settings = self.shared.settings();

        let batch = {
            let mut state = self.shared.lock();
            if state
                .activity
                .check_timeout(now, settings.activity_timeout())
            {
                info!(
                    timeout_secs = settings.activity_timeout,
                    "no activity, pausing tracking"
                );
            }
            if !state.activity.is_active() {
                let dropped = state.queue.clear();
                if dropped > 0 {
                    debug!(dropped, "discarding heartbeats while inactive");
                }
                return TickOutcome::Discarded { dropped };
            }

            if let Some(last) = self.last_cycle {
                let since = (now - last).to_std().unwrap_or(Duration::ZERO);
                if since < settings.send_interval() {
                    return TickOutcome::Throttled;
                }
            }

            state.queue.drain_all()
        };

        if batch.is_empty() {
            return TickOutcome::Idle;
        }
        self.last_cycle = Some(now);

        let Some(target) = settings.api_target() else {
            debug!(dropped = batch.len(), "no API key configured, dropping heartbeats");
            return TickOutcome::NoApiKey {
                dropped: batch.len(),
            };
        };

        let mut sent = 0;
        let mut failed = 0;
        for heartbeat in &batch {
            match self.transport.send(&target, heartbeat).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(entity = heartbeat.entity(), "failed to send heartbeat: {e}");
                    failed += 1;
                }
            }
        }

        info!(sent, failed, "send cycle complete");
        TickOutcome::Sent { sent, failed }
    }

    /// Ticks until `cancel` fires or the ticker runs out.
    pub async fn run<K: Ticker>(mut self, mut ticker: K, cancel: CancellationToken) {
        debug!("dispatcher started");
        loop {
            let ticked = tokio::select! {
                () = cancel.cancelled() => false,
                more = ticker.tick() => more,
            };
            if !ticked {
                break;
            }

            let outcome = self.tick().await;
            if let Some(observer) = &self.observer {
                let _ = observer.send(outcome);
            }
        }
        debug!("dispatcher stopped");
    }
}
