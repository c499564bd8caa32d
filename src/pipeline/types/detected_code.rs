use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A decoded code payload together with the moment it was first seen in the
/// current session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectedCode {
    payload: String,
    first_seen: DateTime<Utc>,
}

impl DetectedCode {
    /// Returns `None` for an empty payload.
    pub fn new(payload: impl Into<String>, first_seen: DateTime<Utc>) -> Option<Self> {
        let payload = payload.into();
        if payload.is_empty() {
            return None;
        }
        Some(Self {
            payload,
            first_seen,
        })
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn first_seen(&self) -> DateTime<Utc> {
        self.first_seen
    }
}
