//! Playback engine adapter.
//!
//! [`PlaybackEngine`] creates sessions bound to one local file; [`PlaybackSession`] is the
//! create/start/pause/stop/release surface the screen drives. [`LocalEngine`] implements both
//! on top of the decode → resample → CPAL pipeline.
//!
//! Each [`LocalSession`] owns at most one worker thread. The worker holds the output stream,
//! so pause/resume are flag flips, while stop tears the worker down and primes a fresh one
//! at position zero.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use cpal::traits::DeviceTrait;
use crossbeam_channel::{Receiver, bounded};
use thiserror::Error;

use crate::clock::PlaybackClock;
use crate::config::PlaybackConfig;
use crate::pipeline::{self, OutputTarget, PipelineEnd};
use crate::{decode, device};

/// How long `create_and_start` waits for the output stream to come up.
const OUTPUT_START_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The file could not be opened, probed or decoded.
    #[error("cannot play {}: {reason}", path.display())]
    Unplayable { path: PathBuf, reason: String },
    /// The output device could not be opened or started.
    #[error("audio output unavailable: {0}")]
    Output(String),
}

/// Factory for playback sessions.
pub trait PlaybackEngine {
    type Session: PlaybackSession;

    /// Bind a new session to `path` and start playing immediately.
    ///
    /// The caller must release any previous session first.
    fn create_and_start(&self, path: &Path) -> Result<Self::Session, PlaybackError>;
}

/// One live playback bound to a single file.
///
/// Every operation on a released session is a no-op.
pub trait PlaybackSession {
    /// Resume a paused or stopped session.
    fn resume(&mut self);

    /// Freeze playback; the position stays put until [`resume`](Self::resume).
    fn pause(&mut self);

    /// Stop and re-prime from the start, paused, so `resume` works without recreating.
    fn stop(&mut self) -> Result<(), PlaybackError>;

    /// Release every underlying resource. Idempotent.
    fn release(&mut self);

    fn is_released(&self) -> bool;

    /// Handle for reading position/duration from another thread.
    fn clock(&self) -> PlaybackClock;

    fn position_ms(&self) -> u64 {
        self.clock().position_ms()
    }

    fn duration_ms(&self) -> Option<u64> {
        self.clock().duration_ms()
    }

    /// Position divided by duration; `None` without a usable duration or once released.
    fn position_ratio(&self) -> Option<f64> {
        if self.is_released() {
            return None;
        }
        self.clock().snapshot().ratio()
    }

    /// The source played out to the end.
    fn is_finished(&self) -> bool {
        self.clock().is_finished()
    }
}

/// Engine playing local files on a CPAL output device.
#[derive(Clone, Debug, Default)]
pub struct LocalEngine {
    /// Output device substring; `None` uses the host default.
    device: Option<String>,
    playback: PlaybackConfig,
}

impl LocalEngine {
    pub fn new(device: Option<String>, playback: PlaybackConfig) -> Self {
        Self {
            device,
            playback: playback.sanitized(),
        }
    }
}

impl PlaybackEngine for LocalEngine {
    type Session = LocalSession;

    fn create_and_start(&self, path: &Path) -> Result<LocalSession, PlaybackError> {
        let mut session = LocalSession {
            path: path.to_path_buf(),
            device: self.device.clone(),
            playback: self.playback.clone(),
            clock: PlaybackClock::default(),
            paused: Arc::new(AtomicBool::new(false)),
            worker: None,
            released: false,
        };
        session.worker = Some(session.spawn_worker(false)?);
        tracing::info!(path = %path.display(), "session started");
        Ok(session)
    }
}

pub struct LocalSession {
    path: PathBuf,
    device: Option<String>,
    playback: PlaybackConfig,
    clock: PlaybackClock,
    paused: Arc<AtomicBool>,
    worker: Option<Worker>,
    released: bool,
}

struct Worker {
    cancel: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl Worker {
    fn shutdown(self) {
        self.cancel.store(true, Ordering::Relaxed);
        if self.join.join().is_err() {
            tracing::error!("playback worker panicked");
        }
    }

    /// Raise the cancel flag without waiting. The thread exits once it next checks it.
    fn detach(self) {
        self.cancel.store(true, Ordering::Relaxed);
        drop(self.join);
    }
}

/// Wait for the worker to report that output is running.
///
/// A worker that reports an error has already finished and is joined. One that does not
/// answer within `timeout` may be stuck opening the device, so it is detached instead.
fn await_ready(
    worker: Worker,
    ready_rx: &Receiver<Result<(), String>>,
    timeout: Duration,
) -> Result<Worker, PlaybackError> {
    match ready_rx.recv_timeout(timeout) {
        Ok(Ok(())) => Ok(worker),
        Ok(Err(reason)) => {
            worker.shutdown();
            Err(PlaybackError::Output(reason))
        }
        Err(_) => {
            tracing::warn!(?timeout, "output stream did not start, abandoning worker");
            worker.detach();
            Err(PlaybackError::Output("output stream did not start".into()))
        }
    }
}

impl LocalSession {
    /// Decode `path` from the start and bring up an output stream for it.
    ///
    /// Decoding is probed on this thread; the device is opened on the worker, which
    /// reports back before this returns.
    fn spawn_worker(&self, start_paused: bool) -> Result<Worker, PlaybackError> {
        let source = decode::start_file_decode(&self.path, self.playback.buffer_seconds)
            .map_err(|e| PlaybackError::Unplayable {
                path: self.path.clone(),
                reason: format!("{e:#}"),
            })?;
        tracing::debug!(
            path = %self.path.display(),
            codec = source.codec.as_deref().unwrap_or("?"),
            duration_ms = ?source.duration_ms,
            "source probed"
        );

        self.clock.reset();
        self.clock.set_duration_ms(source.duration_ms);
        self.paused.store(start_paused, Ordering::Relaxed);

        let cancel = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);

        let device_name = self.device.clone();
        let playback = self.playback.clone();
        let paused = self.paused.clone();
        let clock = self.clock.clone();
        let cancel_for_thread = cancel.clone();
        let join = std::thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                let srcq = source.queue.clone();
                let host = cpal::default_host();
                let running = open_output(&host, device_name.as_deref()).and_then(
                    |(dev, config, stream_config)| {
                        let name = dev
                            .description()
                            .map(|d| d.name().to_string())
                            .unwrap_or_default();
                        tracing::info!(
                            device = %name,
                            rate_hz = stream_config.sample_rate,
                            "output opened"
                        );
                        let target = OutputTarget {
                            device: &dev,
                            config: &config,
                            stream_config: &stream_config,
                        };
                        pipeline::start(&target, &playback, source, paused, &clock)
                    },
                );
                let running = match running {
                    Ok(r) => {
                        let _ = ready_tx.send(Ok(()));
                        r
                    }
                    Err(e) => {
                        srcq.close();
                        let _ = ready_tx.send(Err(format!("{e:#}")));
                        return;
                    }
                };

                match running.wait(&cancel_for_thread) {
                    PipelineEnd::Eof => {
                        tracing::info!("playback reached end of stream");
                        clock.mark_finished();
                    }
                    PipelineEnd::Cancelled => {}
                    PipelineEnd::Failed => {
                        tracing::warn!("playback ended by output failure");
                        clock.mark_finished();
                    }
                }
            })
            .map_err(|e| PlaybackError::Output(format!("spawn playback thread: {e}")))?;

        await_ready(Worker { cancel, join }, &ready_rx, OUTPUT_START_TIMEOUT)
    }

    fn shutdown_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

impl PlaybackSession for LocalSession {
    fn resume(&mut self) {
        if self.released || self.worker.is_none() {
            return;
        }
        self.paused.store(false, Ordering::Relaxed);
        tracing::debug!("session resumed");
    }

    fn pause(&mut self) {
        if self.released {
            return;
        }
        self.paused.store(true, Ordering::Relaxed);
        tracing::debug!(position_ms = self.clock.position_ms(), "session paused");
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        if self.released {
            return Ok(());
        }
        self.shutdown_worker();
        self.clock.reset();
        self.worker = Some(self.spawn_worker(true)?);
        tracing::debug!("session stopped and re-primed");
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.shutdown_worker();
        self.released = true;
        tracing::info!(path = %self.path.display(), "session released");
    }

    fn is_released(&self) -> bool {
        self.released
    }

    fn clock(&self) -> PlaybackClock {
        self.clock.clone()
    }
}

impl Drop for LocalSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn open_output(
    host: &cpal::Host,
    device_name: Option<&str>,
) -> anyhow::Result<(cpal::Device, cpal::SupportedStreamConfig, cpal::StreamConfig)> {
    let dev = device::pick_device(host, device_name)?;
    let config = device::pick_output_config(&dev, None).context("pick output config")?;
    let mut stream_config: cpal::StreamConfig = config.clone().into();
    if let Some(buf) = device::pick_buffer_size(&config) {
        stream_config.buffer_size = buf;
    }
    Ok((dev, config, stream_config))
}
