//! Pix Overlay Service Library
//!
//! Core of a livestream donation-alert overlay: event ingestion and
//! normalization, the one-at-a-time alert display rotation, audio unlock
//! handling, bounded alert history, and the pending-charge queue. The
//! library is usable independently of the main binary, which only wires
//! these pieces to the SSE transport.

pub mod api;
pub mod audio;
pub mod charges;
pub mod config;
pub mod history;
pub mod models;
pub mod processor;
pub mod scheduler;
pub mod sse;

// Re-export commonly used types for convenience
pub use charges::ChargeQueue;
pub use models::charge::PixCharge;
pub use models::event::{NormalizedAlert, QueueEntry, RawAlertEvent};
pub use models::status::PixStatus;
pub use processor::event_processor::AlertPipeline;
pub use scheduler::AlertScheduler;
