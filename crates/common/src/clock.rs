//! Clocks that stamp captured frames.
//!
//! A capture session asks its clock for a timestamp once per committed
//! frame. Timestamps are nanoseconds on a monotonic timeline; a session
//! without a clock stamps every frame with 0.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Source of frame timestamps in nanoseconds.
pub trait Clock: Send + Sync {
    /// Current timestamp in nanoseconds.
    fn timestamp(&self) -> i64;
}

/// Wall-time clock anchored to the moment it was created.
#[derive(Debug, Clone)]
pub struct RealtimeClock {
    /// The instant the clock started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl RealtimeClock {
    /// Create a clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Wall-clock time at clock start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Seconds elapsed since the clock started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

impl Default for RealtimeClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for RealtimeClock {
    fn timestamp(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// Clock that produces evenly spaced timestamps regardless of real time.
///
/// Useful when frames should play back at a fixed rate even though the
/// host renders them irregularly. In auto-tick mode every read of
/// [`Clock::timestamp`] advances the clock by one interval, so the first
/// frame is stamped 0, the second `interval_ns`, and so on.
#[derive(Debug)]
pub struct FixedIntervalClock {
    interval_ns: i64,
    ticks: AtomicI64,
    auto_tick: bool,
}

impl FixedIntervalClock {
    /// Clock ticking at `fps` frames per second.
    pub fn from_fps(fps: f64) -> Self {
        Self::from_interval_secs(1.0 / fps.max(f64::MIN_POSITIVE))
    }

    /// Clock ticking once every `interval_secs` seconds.
    pub fn from_interval_secs(interval_secs: f64) -> Self {
        Self {
            interval_ns: secs_to_ns(interval_secs).max(1),
            ticks: AtomicI64::new(0),
            auto_tick: true,
        }
    }

    /// Disable auto-ticking; the clock only advances on [`tick`](Self::tick).
    pub fn manual(mut self) -> Self {
        self.auto_tick = false;
        self
    }

    /// Advance the clock by one interval.
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Frame interval in nanoseconds.
    pub fn interval_ns(&self) -> i64 {
        self.interval_ns
    }
}

impl Clock for FixedIntervalClock {
    fn timestamp(&self) -> i64 {
        let ticks = if self.auto_tick {
            self.ticks.fetch_add(1, Ordering::Relaxed)
        } else {
            self.ticks.load(Ordering::Relaxed)
        };
        ticks.saturating_mul(self.interval_ns)
    }
}

/// Convert an elapsed nanosecond value to seconds.
pub fn ns_to_secs(ns: i64) -> f64 {
    ns as f64 / 1_000_000_000.0
}

/// Convert seconds to nanoseconds.
pub fn secs_to_ns(secs: f64) -> i64 {
    (secs * 1_000_000_000.0).round() as i64
}
