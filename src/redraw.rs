//! Idle-tick redraw coalescing.
//!
//! Mutations only mark the view dirty. The shell polls once per tick and
//! repaints at most once, however many requests arrived in between.

use std::time::{Duration, Instant};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct RedrawScheduler {
    interval: Duration,
    dirty: bool,
    requests: u64,
    last_tick: Option<Instant>,
}

impl Default for RedrawScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl RedrawScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            dirty: false,
            requests: 0,
            last_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval.max(Duration::from_millis(1));
    }

    pub fn request_redraw(&mut self) {
        self.dirty = true;
        self.requests += 1;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Requests received since construction.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// True if a redraw is due at `now`. Clears the dirty flag and starts a
    /// new tick when it fires.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.dirty {
            return false;
        }
        if let Some(last) = self.last_tick {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.dirty = false;
        self.last_tick = Some(now);
        true
    }

    /// Time left until the next redraw may fire, if one is pending.
    pub fn time_to_next(&self, now: Instant) -> Option<Duration> {
        if !self.dirty {
            return None;
        }
        Some(match self.last_tick {
            Some(last) => self.interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        })
    }
}
