//! Streaming resample stage.
//!
//! Converts decoded audio to the output device rate with Rubato's sinc resampler. Runs on a
//! background thread between two [`SampleQueue`]s.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};
use symphonia::core::audio::SignalSpec;

use crate::queue::{PopStrategy, SampleQueue, samples_for_duration};

/// Start a resampler thread reading `srcq` at `src_spec.rate` and writing `dst_rate` audio
/// into the returned queue.
///
/// The output queue is closed once `srcq` is closed and drained, or when the output queue
/// itself is closed by a consumer.
pub fn start_resampler(
    srcq: Arc<SampleQueue>,
    src_spec: SignalSpec,
    dst_rate: u32,
    chunk_frames: usize,
    buffer_seconds: f32,
) -> Result<Arc<SampleQueue>> {
    let channels = src_spec.channels.count();
    let chunk_frames = chunk_frames.max(1);

    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: calculate_cutoff(128, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };
    let ratio = f64::from(dst_rate) / f64::from(src_spec.rate);
    let resampler =
        Async::<f32>::new_sinc(ratio, 1.1, &params, chunk_frames, channels, FixedAsync::Input)
            .map_err(|e| anyhow!("resampler init: {e}"))?;

    let dstq = Arc::new(SampleQueue::new(
        channels,
        samples_for_duration(dst_rate, channels, buffer_seconds),
    ));

    let dstq_thread = dstq.clone();
    thread::Builder::new()
        .name("resample".into())
        .spawn(move || {
            let mut stage = Stage {
                resampler,
                channels,
                out: vec![0.0f32; channels * chunk_frames * 3],
            };
            if let Err(e) = stage.run(&srcq, &dstq_thread, chunk_frames) {
                tracing::error!("resampler error: {e:#}");
                srcq.close();
            }
            dstq_thread.close();
        })
        .context("spawn resampler thread")?;

    Ok(dstq)
}

struct Stage {
    resampler: Async<f32>,
    channels: usize,
    out: Vec<f32>,
}

impl Stage {
    fn run(&mut self, srcq: &SampleQueue, dstq: &SampleQueue, chunk_frames: usize) -> Result<()> {
        // Steady state: full chunks only.
        while let Some(chunk) = srcq.pop(PopStrategy::BlockingExact { frames: chunk_frames }) {
            if !self.process(&chunk, None, dstq)? {
                return Ok(());
            }
        }
        // Tail: whatever is left after the source closed.
        while let Some(tail) = srcq.pop(PopStrategy::BlockingUpTo { max_frames: chunk_frames }) {
            let frames = tail.len() / self.channels;
            let mut padded = tail;
            padded.resize(chunk_frames * self.channels, 0.0);
            if !self.process(&padded, Some(frames), dstq)? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Resample one chunk and forward it. Returns `false` once `dstq` stops accepting data.
    fn process(&mut self, input: &[f32], partial: Option<usize>, dstq: &SampleQueue) -> Result<bool> {
        let in_frames = input.len() / self.channels;
        let input = InterleavedSlice::new(input, self.channels, in_frames)
            .map_err(|e| anyhow!("input buffer: {e}"))?;
        let out_frames = self.out.len() / self.channels;
        let mut output = InterleavedSlice::new_mut(&mut self.out, self.channels, out_frames)
            .map_err(|e| anyhow!("output buffer: {e}"))?;

        let indexing = Indexing {
            input_offset: 0,
            output_offset: 0,
            active_channels_mask: None,
            partial_len: partial,
        };
        let (_consumed, produced) = self
            .resampler
            .process_into_buffer(&input, &mut output, Some(&indexing))
            .map_err(|e| anyhow!("resample: {e}"))?;

        let produced = produced * self.channels;
        if produced == 0 {
            return Ok(true);
        }
        Ok(dstq.push_blocking(&self.out[..produced]))
    }
}
