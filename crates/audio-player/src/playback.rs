//! Output stage: the CPAL stream and its real-time callback.
//!
//! The callback:
//! - outputs silence without draining the queue while paused
//! - refills a small local buffer from the queue without blocking
//! - maps channels (mono↔stereo, best-effort otherwise)
//! - converts `f32` to the device sample format
//! - advances the session clock by the frames actually played

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::clock::PlaybackClock;
use crate::queue::{PopStrategy, SampleQueue};

/// Shared state the output callback reads and updates.
#[derive(Clone)]
pub struct OutputOptions {
    /// Max frames pulled from the queue per refill.
    pub refill_max_frames: usize,
    /// While `true` the callback writes silence and leaves the queue untouched.
    pub paused: Arc<AtomicBool>,
    /// Advanced by the number of frames written to the device.
    pub clock: PlaybackClock,
    /// Raised when the device reports a stream error.
    pub failed: Arc<AtomicBool>,
}

/// Build (but do not start) an output stream draining `queue`.
///
/// `queue` must carry interleaved `f32` already at the stream sample rate.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    opts: OutputOptions,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, opts),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, opts),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, opts),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, opts),
        other => Err(anyhow!("unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    opts: OutputOptions,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let channels_out = usize::from(config.channels).max(1);
    let refill = opts.refill_max_frames.max(1);
    let queue = queue.clone();
    let mut local = FrameBuffer::new(queue.channels());
    let silence = T::from_sample(0.0f32);

    let failed = opts.failed.clone();
    let err_fn = move |err| {
        tracing::warn!("output stream error: {err}");
        failed.store(true, Ordering::Relaxed);
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if opts.paused.load(Ordering::Relaxed) {
                data.fill(silence);
                return;
            }

            let mut written = 0u64;
            for frame in data.chunks_mut(channels_out) {
                if local.is_empty() {
                    match queue.pop(PopStrategy::NonBlocking { max_frames: refill }) {
                        Some(samples) => local.refill(samples),
                        None => {
                            frame.fill(silence);
                            continue;
                        }
                    }
                }
                for (ch, out) in frame.iter_mut().enumerate() {
                    *out = T::from_sample(local.mapped_sample(channels_out, ch));
                }
                local.advance();
                written += 1;
            }
            if written > 0 {
                opts.clock.advance(written);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Samples popped from the queue but not yet written to the device.
struct FrameBuffer {
    src_channels: usize,
    samples: Vec<f32>,
    pos: usize,
}

impl FrameBuffer {
    fn new(src_channels: usize) -> Self {
        Self {
            src_channels: src_channels.max(1),
            samples: Vec::new(),
            pos: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.pos + self.src_channels > self.samples.len()
    }

    fn refill(&mut self, samples: Vec<f32>) {
        self.samples = samples;
        self.pos = 0;
    }

    fn advance(&mut self) {
        self.pos += self.src_channels;
    }

    /// Sample for output channel `dst_ch` of the current frame.
    ///
    /// - mono → any: duplicate
    /// - stereo → mono: average L/R
    /// - otherwise: clamp to the last available source channel
    fn mapped_sample(&self, dst_channels: usize, dst_ch: usize) -> f32 {
        let get = |ch: usize| self.samples.get(self.pos + ch).copied().unwrap_or(0.0);
        match (self.src_channels, dst_channels) {
            (1, _) => get(0),
            (2, 1) => 0.5 * (get(0) + get(1)),
            (src, _) => get(dst_ch.min(src - 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_source_is_duplicated() {
        let mut buf = FrameBuffer::new(1);
        buf.refill(vec![0.25, 0.5]);
        assert_eq!(buf.mapped_sample(2, 0), 0.25);
        assert_eq!(buf.mapped_sample(2, 1), 0.25);
        buf.advance();
        assert_eq!(buf.mapped_sample(2, 1), 0.5);
        buf.advance();
        assert!(buf.is_empty());
    }

    #[test]
    fn stereo_to_mono_averages() {
        let mut buf = FrameBuffer::new(2);
        buf.refill(vec![1.0, 0.0]);
        assert_eq!(buf.mapped_sample(1, 0), 0.5);
    }

    #[test]
    fn extra_output_channels_reuse_last_source_channel() {
        let mut buf = FrameBuffer::new(2);
        buf.refill(vec![0.1, 0.2]);
        assert_eq!(buf.mapped_sample(4, 0), 0.1);
        assert_eq!(buf.mapped_sample(4, 1), 0.2);
        assert_eq!(buf.mapped_sample(4, 3), 0.2);
    }

    #[test]
    fn empty_buffer_reports_empty() {
        let buf = FrameBuffer::new(2);
        assert!(buf.is_empty());
    }
}
