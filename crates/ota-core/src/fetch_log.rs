//! Status log of the most recent fetch

use parking_lot::RwLock;
use std::sync::Arc;

/// Number of entries shown on the status page
pub const STATUS_TAIL: usize = 50;

/// Append-only list of fetch status lines, shared by every request.
///
/// Each operation takes the lock exactly once, so a reader sees the log
/// either before or after a concurrent `clear`/`append`, never in between.
#[derive(Debug, Clone, Default)]
pub struct FetchLog {
    entries: Arc<RwLock<Vec<String>>>,
}

impl FetchLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Add one line at the end
    pub fn append(&self, line: impl Into<String>) {
        self.entries.write().push(line.into());
    }

    /// Copy of the last `min(n, len)` entries, oldest first
    pub fn tail(&self, n: usize) -> Vec<String> {
        let entries = self.entries.read();
        let start = entries.len().saturating_sub(n);
        entries[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
