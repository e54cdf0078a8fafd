//! Frame pacing for host loops

use std::time::{Duration, Instant};

/// Sleeps out the remainder of a fixed frame interval
///
/// A frame that finishes early sleeps until the interval is up. One that
/// overruns it sleeps `min_sleep`, so the loop still yields the thread.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    interval: Duration,
    min_sleep: Duration,
    frame_start: Instant,
}

impl FramePacer {
    /// Create a pacer targeting `interval` per frame
    pub fn new(interval: Duration, min_sleep: Duration) -> Self {
        Self {
            interval,
            min_sleep,
            frame_start: Instant::now(),
        }
    }

    /// Mark the start of a frame
    pub fn begin_frame(&mut self) {
        self.frame_start = Instant::now();
    }

    /// Sleep until the frame interval has passed
    pub fn end_frame(&self) {
        std::thread::sleep(self.remaining(self.frame_start.elapsed()));
    }

    /// How long to sleep after spending `elapsed` on a frame
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        match self.interval.checked_sub(elapsed) {
            Some(left) if !left.is_zero() => left,
            _ => self.min_sleep,
        }
    }
}
