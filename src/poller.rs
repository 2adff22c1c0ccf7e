//! Log refresh for the selected job: interval strategy and the cancellable ticker.
//!
//! [`AdaptivePoller`] maps the remaining API quota to a delay. [`BackgroundTicker`]
//! re-queries it before every sleep, so the interval follows quota pressure
//! without restarting the task. Cancellation is a `watch` flag raced against the
//! sleep in `tokio::select!`; an invocation already running when the ticker stops
//! is allowed to finish and its result goes through the normal staleness checks.

use crate::events::AppEvent;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;

/// Below this many remaining requests, poll at the maximum interval.
pub const RATE_LIMIT_CRITICAL: u32 = 100;
/// Below this, poll at twice the base interval.
pub const RATE_LIMIT_CAUTION: u32 = 500;
/// Below this, poll at one and a half times the base interval.
pub const RATE_LIMIT_LIGHT: u32 = 1000;

pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptivePoller {
    base: Duration,
    max: Duration,
}

impl Default for AdaptivePoller {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_INTERVAL, DEFAULT_MAX_INTERVAL)
    }
}

impl AdaptivePoller {
    /// `max` is raised to `base` if it is smaller.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Band edges are fixed. There is no hysteresis, so a quota hovering around
    /// an edge makes the interval flip between bands.
    pub fn next_interval(&self, remaining: u32) -> Duration {
        let interval = if remaining < RATE_LIMIT_CRITICAL {
            self.max
        } else if remaining < RATE_LIMIT_CAUTION {
            self.base.saturating_mul(2)
        } else if remaining < RATE_LIMIT_LIGHT {
            self.base.saturating_mul(3) / 2
        } else {
            self.base
        };
        interval.min(self.max)
    }
}

/// Repeating task bound to one fetch callback. At most one loop is alive per
/// ticker: starting again stops the previous one first.
#[derive(Default)]
pub struct BackgroundTicker {
    cancel: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `callback` every interval, the first call one interval from
    /// now. `quota` reads the remaining quota and must not block. A callback
    /// returning `None` (e.g. its job is no longer selected) sends nothing.
    pub fn start<P, F, Fut>(
        &mut self,
        poller: AdaptivePoller,
        quota: P,
        tx: mpsc::UnboundedSender<AppEvent>,
        callback: F,
    ) where
        P: Fn() -> u32 + Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Option<AppEvent>> + Send + 'static,
    {
        self.stop();
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut last_delay = None;
            loop {
                let delay = poller.next_interval(quota());
                if last_delay != Some(delay) {
                    tracing::debug!(?delay, "log poll interval");
                    last_delay = Some(delay);
                }
                tokio::select! {
                    () = time::sleep(delay) => {},
                    changed = cancel_rx.changed() => {
                        if changed.is_err() {
                            return; // ticker dropped
                        }
                    },
                }
                if *cancel_rx.borrow() {
                    return;
                }
                if let Some(event) = callback().await {
                    if tx.send(event).is_err() {
                        tracing::warn!("log ticker: channel closed");
                        return;
                    }
                }
            }
        });
        self.cancel = Some(cancel_tx);
        self.handle = Some(handle);
    }

    /// Idempotent. No invocation starts after this returns.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // Err only means the loop already exited
            let _ = cancel.send(true);
        }
        self.handle = None;
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for BackgroundTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
