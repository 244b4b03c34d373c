use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::info;

use pix_overlay::audio::{AudioGate, NullSink};
use pix_overlay::charges::ChargeQueue;
use pix_overlay::config::AppConfig;
use pix_overlay::history::HistoryStore;
use pix_overlay::processor::event_processor::AlertPipeline;
use pix_overlay::scheduler::AlertScheduler;
use pix_overlay::sse::{self, ConnState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Pix Overlay Service...");

    // State containers, each with exclusive ownership of its queue
    let scheduler = AlertScheduler::new();
    let history = HistoryStore::load(&config.history_file);
    info!("Loaded {} history records", history.entries().len());
    let history = Arc::new(Mutex::new(history));

    let charge_queue = ChargeQueue::new();
    let _lifecycle = charge_queue.spawn_lifecycle();

    let audio = Arc::new(Mutex::new(AudioGate::new(NullSink)));
    if let Ok(mut gate) = audio.lock() {
        gate.try_unlock();
    }

    let pipeline = Arc::new(AlertPipeline::new(
        scheduler.clone(),
        history,
        charge_queue,
        audio,
    ));

    // Log the alert rotation for headless diagnostics
    let mut current = scheduler.subscribe();
    tokio::spawn(async move {
        while current.changed().await.is_ok() {
            let shown = current.borrow_and_update().clone();
            match shown {
                Some(entry) => info!(
                    payment_id = entry.alert.payment_id,
                    "on screen: {} sent {:.2}", entry.alert.payer_name, entry.alert.amount
                ),
                None => info!("screen blank"),
            }
        }
    });

    // Start the alert stream
    let (conn_tx, _conn_rx) = watch::channel(ConnState::Connecting);
    sse::run_sse_consumer(&config, pipeline, conn_tx).await
}
