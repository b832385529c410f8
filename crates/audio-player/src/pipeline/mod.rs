//! Pipeline wiring: resample (when needed) + output stream.
//!
//! [`start`] builds and starts the stages; [`RunningPipeline::wait`] blocks until the source
//! drains, the owner cancels, or the device fails. Both must run on the same thread because
//! the CPAL stream is not `Send` on every host.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use cpal::traits::StreamTrait;

use crate::clock::PlaybackClock;
use crate::config::PlaybackConfig;
use crate::decode::DecodedStream;
use crate::playback::{self, OutputOptions};
use crate::queue::{self, SampleQueue};
use crate::resample;

/// Why [`RunningPipeline::wait`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineEnd {
    /// The source played out completely.
    Eof,
    /// The owner raised the cancel flag.
    Cancelled,
    /// The output device reported an error.
    Failed,
}

/// A started output stream and the queues feeding it.
pub struct RunningPipeline {
    stream: cpal::Stream,
    srcq: Arc<SampleQueue>,
    dstq: Arc<SampleQueue>,
    failed: Arc<AtomicBool>,
}

/// Output device plus the stream parameters chosen for it.
pub struct OutputTarget<'a> {
    pub device: &'a cpal::Device,
    pub config: &'a cpal::SupportedStreamConfig,
    pub stream_config: &'a cpal::StreamConfig,
}

/// Start playing `source` on `target`.
///
/// `paused` gates the output callback; `clock` is set to the stream rate and advanced as
/// frames are played. On error every queue is closed so upstream threads wind down.
pub fn start(
    target: &OutputTarget<'_>,
    playback: &PlaybackConfig,
    source: DecodedStream,
    paused: Arc<AtomicBool>,
    clock: &PlaybackClock,
) -> Result<RunningPipeline> {
    let srcq = source.queue;
    let dst_rate = target.stream_config.sample_rate;
    let dstq = if source.spec.rate == dst_rate {
        tracing::info!(rate_hz = dst_rate, "resample skipped");
        srcq.clone()
    } else {
        tracing::info!(from_hz = source.spec.rate, to_hz = dst_rate, "resampling");
        match resample::start_resampler(
            srcq.clone(),
            source.spec,
            dst_rate,
            playback.chunk_frames,
            playback.buffer_seconds,
        ) {
            Ok(q) => q,
            Err(e) => {
                srcq.close();
                return Err(e);
            }
        }
    };

    clock.set_sample_rate(dst_rate);
    let failed = Arc::new(AtomicBool::new(false));
    let started = playback::build_output_stream(
        target.device,
        target.stream_config,
        target.config.sample_format(),
        &dstq,
        OutputOptions {
            refill_max_frames: playback.refill_max_frames,
            paused,
            clock: clock.clone(),
            failed: failed.clone(),
        },
    )
    .and_then(|stream| {
        stream.play()?;
        Ok(stream)
    });

    match started {
        Ok(stream) => Ok(RunningPipeline {
            stream,
            srcq,
            dstq,
            failed,
        }),
        Err(e) => {
            srcq.close();
            dstq.close();
            Err(e)
        }
    }
}

impl RunningPipeline {
    /// Block until the source drains, `cancel` is raised, or the device fails.
    pub fn wait(self, cancel: &AtomicBool) -> PipelineEnd {
        let drained = queue::wait_drained_or(&self.dstq, || {
            cancel.load(Ordering::Relaxed) || self.failed.load(Ordering::Relaxed)
        });

        let end = if drained {
            // Let the device play out what it already pulled.
            thread::sleep(Duration::from_millis(100));
            PipelineEnd::Eof
        } else if self.failed.load(Ordering::Relaxed) {
            PipelineEnd::Failed
        } else {
            PipelineEnd::Cancelled
        };

        drop(self.stream);
        self.srcq.close();
        self.dstq.close();
        end
    }
}
