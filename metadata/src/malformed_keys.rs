// Remembers windows key lines that failed to decode so that a persistently broken
// entry is only reported once, not on every poll cycle.
use crate::metrics_defs::{MALFORMED_WINDOWS_KEY, counter};
use std::collections::HashSet;

/// Entries are never evicted. A corrected line is a different string and is
/// tracked on its own.
#[derive(Debug, Default)]
pub struct MalformedKeys {
    seen: HashSet<String>,
}

impl MalformedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs the decode failure for `line` unless it was reported before.
    /// Returns true if a diagnostic was emitted.
    pub fn report_once(&mut self, line: &str, err: &serde_json::Error) -> bool {
        if self.seen.contains(line) {
            return false;
        }

        tracing::error!(error = %err, "Failed to decode windows key from metadata");
        counter!(MALFORMED_WINDOWS_KEY).increment(1);
        self.seen.insert(line.to_string());
        true
    }

    pub fn contains(&self, line: &str) -> bool {
        self.seen.contains(line)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
