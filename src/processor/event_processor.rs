use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{info, warn};

use crate::audio::AudioGate;
use crate::charges::ChargeQueue;
use crate::history::HistoryStore;
use crate::models::event::{NormalizedAlert, QueueEntry, RawAlertEvent};
use crate::models::status::PixStatus;
use crate::scheduler::AlertScheduler;

/// Fans one inbound stream event out to the display scheduler, the
/// history store and the charge queue. The single ingestion entry point;
/// everything downstream receives only normalized data.
pub struct AlertPipeline {
    scheduler: AlertScheduler,
    history: Arc<Mutex<HistoryStore>>,
    charges: ChargeQueue,
    audio: Arc<Mutex<AudioGate>>,
    seq: AtomicU64,
}

impl AlertPipeline {
    pub fn new(
        scheduler: AlertScheduler,
        history: Arc<Mutex<HistoryStore>>,
        charges: ChargeQueue,
        audio: Arc<Mutex<AudioGate>>,
    ) -> Self {
        AlertPipeline {
            scheduler,
            history,
            charges,
            audio,
            seq: AtomicU64::new(0),
        }
    }

    /// Handles one raw event payload. Unparseable payloads are discarded
    /// with a log line; this function never panics and never errors.
    pub fn on_event(&self, raw: &str) {
        let raw: RawAlertEvent = match serde_json::from_str(raw) {
            Ok(r) => r,
            Err(e) => {
                warn!("discarding unparseable alert event: {}", e);
                return;
            }
        };

        let now = Utc::now();
        let alert = NormalizedAlert::from_raw(raw, now);
        let entry = QueueEntry::new(alert, self.seq.fetch_add(1, Ordering::Relaxed), now);
        info!(
            payment_id = entry.alert.payment_id,
            status = %entry.alert.status,
            "alert received from {}", entry.alert.payer_name
        );

        // A panic elsewhere must not mute the overlay, so poisoned locks
        // are recovered rather than skipped.
        self.audio
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .play_alert_sound();

        self.scheduler.enqueue(entry.clone());

        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(entry.clone());

        // A vague status must not clobber a concrete charge state, and
        // payments outside the charge queue are silently ignored.
        if entry.alert.status != PixStatus::Unknown {
            self.charges
                .update_status_if_exists(entry.alert.payment_id, entry.alert.status);
        }
    }
}
