use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::common::Frame;

/// Admits at most one frame per `interval`, measured from the last admitted
/// frame. Everything in between is dropped.
#[derive(Debug, Clone)]
pub struct FrameThrottler {
    interval: Duration,
    last_admitted: Option<Instant>,
}

impl FrameThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_admitted: None,
        }
    }

    pub fn admit(&mut self, frame: &Frame, now: Instant) -> bool {
        let admitted = match self.last_admitted {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if admitted {
            self.last_admitted = Some(now);
        } else {
            trace!(frame_id = %frame.id(), "Frame dropped by throttler");
        }
        admitted
    }
}
