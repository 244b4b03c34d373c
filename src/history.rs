use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::models::event::QueueEntry;

/// Maximum retained history records; oldest are evicted first.
pub const HISTORY_LIMIT: usize = 50;

/// Capped, newest-first, durable log of past alerts.
///
/// Persistence is best-effort: a failed write degrades the store to
/// in-memory for the session, it never propagates an error.
pub struct HistoryStore {
    path: PathBuf,
    entries: Vec<QueueEntry>,
    unread: usize,
}

impl HistoryStore {
    /// Loads history from disk once at startup. A missing, unreadable or
    /// malformed file yields an empty history (fails open, not closed).
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => parse_history(&raw),
            Err(e) => {
                debug!("no history loaded from {}: {}", path.display(), e);
                Vec::new()
            }
        };
        HistoryStore {
            path,
            entries,
            unread: 0,
        }
    }

    /// Prepends a record, evicting beyond capacity, and persists.
    pub fn record(&mut self, entry: QueueEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_LIMIT);
        self.unread = (self.unread + 1).min(HISTORY_LIMIT);
        self.persist();
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.entries) {
            Ok(j) => j,
            Err(e) => {
                warn!("failed to serialize history: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, json) {
            warn!("failed to persist history to {}: {}", self.path.display(), e);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.unread = 0;
        if let Err(e) = fs::remove_file(&self.path) {
            debug!("history file not removed: {}", e);
        }
    }

    pub fn mark_all_read(&mut self) {
        self.unread = 0;
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn unread(&self) -> usize {
        self.unread
    }
}

/// Non-array content and records without a string `id` are discarded.
fn parse_history(raw: &str) -> Vec<QueueEntry> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter(|item| item.get("id").map(Value::is_string).unwrap_or(false))
        .filter_map(|item| serde_json::from_value::<QueueEntry>(item).ok())
        .take(HISTORY_LIMIT)
        .collect()
}
