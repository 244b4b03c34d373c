use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant};
use tracing::{debug, info};

use crate::models::charge::PixCharge;
use crate::models::status::PixStatus;

/// Wait after approval before advancing, so the success state is visible.
pub const SETTLE_DELAY_MS: u64 = 1400;
/// Wait after expiry before removing, so the expired notice is visible.
pub const GRACE_DELAY_MS: u64 = 1200;
/// Expiry-countdown recompute interval.
pub const COUNTDOWN_TICK_MS: u64 = 300;

struct Inner {
    queue: Vec<PixCharge>,
    active: Option<i64>,
}

/// Ordered working set of in-flight charges with one active (displayed)
/// charge, operator navigation, and automatic settle/expiry advancement.
///
/// Cheaply cloneable; the remaining time of the active charge's expiry
/// countdown is published through a watch channel at a fixed tick.
#[derive(Clone)]
pub struct ChargeQueue {
    inner: Arc<Mutex<Inner>>,
    countdown: Arc<watch::Sender<Option<Duration>>>,
}

impl ChargeQueue {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        ChargeQueue {
            inner: Arc::new(Mutex::new(Inner {
                queue: Vec::new(),
                active: None,
            })),
            countdown: Arc::new(tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<Option<Duration>> {
        self.countdown.subscribe()
    }

    /// Appends a charge; it becomes active when nothing is. Enqueuing an
    /// id already in the queue replaces that charge in place.
    pub fn enqueue(&self, charge: PixCharge) {
        let id = charge.payment_id;
        let mut inner = self.lock();
        match inner.queue.iter_mut().find(|c| c.payment_id == id) {
            Some(existing) => *existing = charge,
            None => inner.queue.push(charge),
        }
        if inner.active.is_none() {
            inner.active = Some(id);
        }
        debug!(payment_id = id, queued = inner.queue.len(), "charge enqueued");
    }

    /// Explicit navigation; the caller uses only ids known from the queue.
    pub fn set_active(&self, payment_id: Option<i64>) {
        self.lock().active = payment_id;
    }

    pub fn active_payment_id(&self) -> Option<i64> {
        self.lock().active
    }

    pub fn active_charge(&self) -> Option<PixCharge> {
        let inner = self.lock();
        let active = inner.active?;
        inner.queue.iter().find(|c| c.payment_id == active).cloned()
    }

    pub fn charges(&self) -> Vec<PixCharge> {
        self.lock().queue.clone()
    }

    /// Unconditional in-place status patch.
    pub fn update_status(&self, payment_id: i64, status: PixStatus) {
        let mut inner = self.lock();
        if let Some(charge) = inner.queue.iter_mut().find(|c| c.payment_id == payment_id) {
            charge.status = status;
        }
    }

    /// Status patch that reports whether the target was found, so the
    /// ingestion path can silently ignore payments outside this queue.
    pub fn update_status_if_exists(&self, payment_id: i64, status: PixStatus) -> bool {
        let mut inner = self.lock();
        match inner.queue.iter_mut().find(|c| c.payment_id == payment_id) {
            Some(charge) => {
                charge.status = status;
                true
            }
            None => false,
        }
    }

    /// Removes the active charge; the first remaining charge (if any)
    /// becomes active. Sole removal path; no-op when nothing is active.
    pub fn close_active(&self) {
        let mut inner = self.lock();
        let Some(active) = inner.active else {
            return;
        };
        inner.queue.retain(|c| c.payment_id != active);
        inner.active = inner.queue.first().map(|c| c.payment_id);
        info!(closed = active, next = ?inner.active, "active charge closed");
    }

    /// Previous/next candidate ids from the active charge's position in
    /// the ordered queue; no wraparound.
    pub fn neighbors(&self) -> (Option<i64>, Option<i64>) {
        let inner = self.lock();
        let Some(active) = inner.active else {
            return (None, None);
        };
        let Some(idx) = inner.queue.iter().position(|c| c.payment_id == active) else {
            return (None, None);
        };
        let prev = idx.checked_sub(1).map(|i| inner.queue[i].payment_id);
        let next = inner.queue.get(idx + 1).map(|c| c.payment_id);
        (prev, next)
    }

    /// Starts the automatic lifecycle driver: expiry countdown at a fixed
    /// tick, forced `EXPIRED` at the deadline, and delayed auto-close of
    /// approved (settle) and expired (grace) active charges. Abort the
    /// returned handle on teardown.
    pub fn spawn_lifecycle(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run_lifecycle().await })
    }

    async fn run_lifecycle(self) {
        let mut tick = interval(Duration::from_millis(COUNTDOWN_TICK_MS));
        // Expiry deadline of the active charge, converted once per charge.
        let mut expiry: Option<(i64, Instant)> = None;
        // Pending delayed close, keyed by (payment id, delay) so a status
        // change re-arms and a navigation change disarms naturally.
        let mut close: Option<(i64, u64, Instant)> = None;

        loop {
            let Some(charge) = self.active_charge() else {
                expiry = None;
                close = None;
                self.countdown.send_replace(None);
                tick.tick().await;
                continue;
            };
            let id = charge.payment_id;

            if charge.status == PixStatus::Expired {
                // Already expired: countdown pinned at zero, nothing to arm.
                expiry = None;
                if charge.expires_at_utc().is_some() {
                    self.countdown.send_replace(Some(Duration::ZERO));
                }
            } else if expiry.map(|(e, _)| e) != Some(id) {
                expiry = charge.expires_at_utc().map(|at| {
                    let remaining = (at - Utc::now()).to_std().unwrap_or_default();
                    (id, Instant::now() + remaining)
                });
            }

            let wanted = match charge.status {
                PixStatus::Approved => Some(SETTLE_DELAY_MS),
                PixStatus::Expired => Some(GRACE_DELAY_MS),
                _ => None,
            };
            close = match (wanted, close) {
                (Some(delay), Some(armed)) if (armed.0, armed.1) == (id, delay) => Some(armed),
                (Some(delay), _) => {
                    Some((id, delay, Instant::now() + Duration::from_millis(delay)))
                }
                (None, _) => None,
            };

            if let Some((_, at)) = expiry {
                let remaining = at.saturating_duration_since(Instant::now());
                self.countdown.send_replace(Some(remaining));
            } else if charge.expires_at_utc().is_none() {
                self.countdown.send_replace(None);
            }

            let expiry_at = expiry.map(|(_, at)| at);
            let close_at = close.map(|(_, _, at)| at);

            tokio::select! {
                _ = tick.tick() => {}
                _ = sleep_until(expiry_at.unwrap_or_else(Instant::now)), if expiry_at.is_some() => {
                    self.update_status(id, PixStatus::Expired);
                    self.countdown.send_replace(Some(Duration::ZERO));
                    expiry = None;
                }
                _ = sleep_until(close_at.unwrap_or_else(Instant::now)), if close_at.is_some() => {
                    if self.active_payment_id() == Some(id) {
                        self.close_active();
                    }
                    close = None;
                }
            }
        }
    }
}

impl Default for ChargeQueue {
    fn default() -> Self {
        Self::new()
    }
}
