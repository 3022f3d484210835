pub const DEFAULT_ETAG: &str = "NONE";

/// Tracks the etag of the last long-poll response.
///
/// The gate only observes: every update overwrites the stored value, the return
/// value merely says whether it differed from the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeGate {
    etag: String,
}

impl Default for ChangeGate {
    fn default() -> Self {
        ChangeGate {
            etag: DEFAULT_ETAG.to_string(),
        }
    }
}

impl ChangeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A missing or empty etag is stored as [`DEFAULT_ETAG`].
    pub fn update(&mut self, etag: Option<&str>) -> bool {
        let new = match etag {
            Some(e) if !e.is_empty() => e,
            _ => DEFAULT_ETAG,
        };
        let changed = self.etag != new;
        self.etag = new.to_string();
        changed
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }
}
