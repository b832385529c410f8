use serde::Deserialize;

/// Playback tuning shared by the decode, resample and output stages.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Resampler chunk size in frames.
    pub chunk_frames: usize,
    /// Max frames the output callback pulls per refill.
    pub refill_max_frames: usize,
    /// Target buffering per stage, in seconds.
    pub buffer_seconds: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_frames: 1024,
            refill_max_frames: 4096,
            buffer_seconds: 2.0,
        }
    }
}

impl PlaybackConfig {
    /// Clamp values that would stall or starve the pipeline.
    pub fn sanitized(mut self) -> Self {
        self.chunk_frames = self.chunk_frames.max(64);
        self.refill_max_frames = self.refill_max_frames.max(1);
        if !self.buffer_seconds.is_finite() || self.buffer_seconds <= 0.0 {
            self.buffer_seconds = Self::default().buffer_seconds;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_repairs_degenerate_values() {
        let cfg = PlaybackConfig {
            chunk_frames: 0,
            refill_max_frames: 0,
            buffer_seconds: f32::NAN,
        }
        .sanitized();
        assert_eq!(cfg.chunk_frames, 64);
        assert_eq!(cfg.refill_max_frames, 1);
        assert_eq!(cfg.buffer_seconds, 2.0);
    }

    #[test]
    fn sanitized_keeps_sane_values() {
        let cfg = PlaybackConfig {
            chunk_frames: 2048,
            refill_max_frames: 512,
            buffer_seconds: 0.5,
        };
        assert_eq!(cfg.clone().sanitized(), cfg);
    }
}
