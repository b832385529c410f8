//! Local audio playback engine: Symphonia decode → Rubato resample → CPAL output.
//!
//! Callers normally only touch [`engine`]: a [`PlaybackEngine`] creates a
//! [`PlaybackSession`] per file, and the session's [`PlaybackClock`] reports progress.

pub mod clock;
pub mod config;
pub mod decode;
pub mod device;
pub mod engine;
pub mod pipeline;
pub mod playback;
pub mod queue;
pub mod resample;

pub use clock::{ClockSnapshot, PlaybackClock};
pub use config::PlaybackConfig;
pub use engine::{LocalEngine, LocalSession, PlaybackEngine, PlaybackError, PlaybackSession};
