use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::event::QueueEntry;

/// How long each alert stays on screen.
pub const DISPLAY_MS: u64 = 6000;
/// Blank window between two consecutive alerts.
pub const GAP_MS: u64 = 250;

struct Inner {
    queue: VecDeque<QueueEntry>,
    showing: bool,
    timer: Option<JoinHandle<()>>,
}

/// Serializes incoming alerts into a one-at-a-time timed presentation.
///
/// Alerts rotate in strict FIFO order: each is visible for `DISPLAY_MS`,
/// followed by a `GAP_MS` blank, even when the queue is non-empty. The
/// alert currently on screen is published through a watch channel so UI
/// layers bind by subscription rather than shared state.
#[derive(Clone)]
pub struct AlertScheduler {
    inner: Arc<Mutex<Inner>>,
    current: Arc<watch::Sender<Option<QueueEntry>>>,
}

impl AlertScheduler {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        AlertScheduler {
            inner: Arc::new(Mutex::new(Inner {
                queue: VecDeque::new(),
                showing: false,
                timer: None,
            })),
            current: Arc::new(tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<QueueEntry>> {
        self.current.subscribe()
    }

    /// The alert on screen right now, if any.
    pub fn current(&self) -> Option<QueueEntry> {
        self.current.borrow().clone()
    }

    /// Appends an alert; starts the rotation immediately when idle.
    pub fn enqueue(&self, entry: QueueEntry) {
        let mut inner = self.lock();
        inner.queue.push_back(entry);
        if !inner.showing {
            drop(inner);
            self.advance();
        }
    }

    fn advance(&self) {
        let mut inner = self.lock();
        match inner.queue.pop_front() {
            None => {
                inner.showing = false;
                // send_replace stores the value even with no subscriber
                // alive, so `current()` stays truthful in standalone use.
                self.current.send_replace(None);
            }
            Some(entry) => {
                inner.showing = true;
                debug!(
                    payment_id = entry.alert.payment_id,
                    "showing alert {}", entry.id
                );
                self.current.send_replace(Some(entry));

                let this = self.clone();
                inner.timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(DISPLAY_MS)).await;
                    this.current.send_replace(None);
                    tokio::time::sleep(Duration::from_millis(GAP_MS)).await;
                    this.advance();
                }));
            }
        }
    }

    /// Cancels the pending rotation so nothing fires after teardown.
    pub fn dispose(&self) {
        let mut inner = self.lock();
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.queue.clear();
        inner.showing = false;
    }
}

impl Default for AlertScheduler {
    fn default() -> Self {
        Self::new()
    }
}
