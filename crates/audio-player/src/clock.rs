//! Session clock shared between the output callback and readers on other threads.
//!
//! The output callback advances a frame counter; everyone else derives position,
//! duration and progress from it without taking a lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Cloneable handle to the position counters of one playback session.
#[derive(Clone, Debug, Default)]
pub struct PlaybackClock {
    inner: Arc<ClockInner>,
}

#[derive(Debug, Default)]
struct ClockInner {
    played_frames: AtomicU64,
    sample_rate: AtomicU32,
    /// Zero means "unknown".
    duration_ms: AtomicU64,
    finished: AtomicBool,
}

/// Point-in-time reading of a [`PlaybackClock`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockSnapshot {
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub finished: bool,
}

impl ClockSnapshot {
    /// Position divided by duration, clamped to `[0, 1]`.
    ///
    /// `None` when the duration is unknown or zero.
    pub fn ratio(&self) -> Option<f64> {
        let total = self.duration_ms.filter(|d| *d > 0)?;
        Some((self.position_ms as f64 / total as f64).clamp(0.0, 1.0))
    }
}

impl PlaybackClock {
    pub fn new(duration_ms: Option<u64>) -> Self {
        let clock = Self::default();
        clock.set_duration_ms(duration_ms);
        clock
    }

    pub fn set_duration_ms(&self, duration_ms: Option<u64>) {
        self.inner
            .duration_ms
            .store(duration_ms.unwrap_or(0), Ordering::Relaxed);
    }

    /// Rate the frame counter is measured in (the output stream rate).
    pub fn set_sample_rate(&self, rate_hz: u32) {
        self.inner.sample_rate.store(rate_hz, Ordering::Relaxed);
    }

    /// Called by the output callback with the number of frames just written.
    pub fn advance(&self, frames: u64) {
        self.inner.played_frames.fetch_add(frames, Ordering::Relaxed);
    }

    /// Rewind to the start and clear the finished flag.
    pub fn reset(&self) {
        self.inner.played_frames.store(0, Ordering::Relaxed);
        self.inner.finished.store(false, Ordering::Relaxed);
    }

    pub fn mark_finished(&self) {
        self.inner.finished.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Relaxed)
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match self.inner.duration_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    /// Elapsed milliseconds, capped at the duration when it is known.
    pub fn position_ms(&self) -> u64 {
        let rate = self.inner.sample_rate.load(Ordering::Relaxed);
        if rate == 0 {
            return 0;
        }
        let frames = self.inner.played_frames.load(Ordering::Relaxed);
        let ms = frames.saturating_mul(1000) / u64::from(rate);
        match self.duration_ms() {
            Some(total) => ms.min(total),
            None => ms,
        }
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            position_ms: self.position_ms(),
            duration_ms: self.duration_ms(),
            finished: self.is_finished(),
        }
    }
}
