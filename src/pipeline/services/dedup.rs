use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::pipeline::types::DetectedCode;

/// Insertion-ordered record of the codes seen in the current session.
///
/// This is the only gate in front of the lookup: a payload is handed to the
/// fetcher only when `observe` returns `true` for it.
#[derive(Debug, Default)]
pub struct DeduplicationStore {
    seen: IndexMap<String, DetectedCode>,
}

impl DeduplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `code` is seen since the last reset.
    /// Empty payloads are never admitted.
    pub fn observe(&mut self, code: &str) -> bool {
        self.observe_at(code, Utc::now())
    }

    pub fn observe_at(&mut self, code: &str, seen_at: DateTime<Utc>) -> bool {
        if self.seen.contains_key(code) {
            return false;
        }
        match DetectedCode::new(code, seen_at) {
            Some(detected) => {
                self.seen.insert(code.to_string(), detected);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Codes in first-seen order.
    pub fn codes(&self) -> impl Iterator<Item = &DetectedCode> {
        self.seen.values()
    }

    pub fn get(&self, code: &str) -> Option<&DetectedCode> {
        self.seen.get(code)
    }
}
