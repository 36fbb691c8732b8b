use crate::domain::{EditSession, ImageData};
use crate::error::{Error, Result};

/// Maximum number of sessions kept; older ones are evicted.
pub const HISTORY_LIMIT: usize = 20;

/// Bounded log of completed corrections, newest first.
/// Entries are only ever handed out by shared reference.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    entries: Vec<EditSession>,
    limit: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::with_capacity(limit),
            limit,
        }
    }

    /// Record a session at the front, evicting the oldest past the limit.
    pub fn append(&mut self, session: EditSession) -> &[EditSession] {
        self.entries.insert(0, session);
        if self.entries.len() > self.limit {
            let evicted = self.entries.len() - self.limit;
            self.entries.truncate(self.limit);
            tracing::debug!(evicted, "history limit reached");
        }
        &self.entries
    }

    pub fn entries(&self) -> &[EditSession] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&EditSession> {
        self.entries.first()
    }

    pub fn get(&self, id: &str) -> Option<&EditSession> {
        self.entries.iter().find(|s| s.id == id)
    }

    /// The original/result pair of a recorded session, for iterating from it.
    pub fn replay(&self, id: &str) -> Result<(ImageData, ImageData)> {
        self.get(id)
            .map(|s| (s.original.clone(), s.result.clone()))
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Drop every entry. Irreversible; callers confirm with the user first.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
