//! Periodic progress sampling for the playing session.
//!
//! One poller runs per Playing span. It only reads the session clock and posts samples to
//! the UI thread; the controller drops samples whose generation is no longer current.

use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use audio_player::PlaybackClock;
use crossbeam_channel::{Sender, bounded, select, tick};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
pub const MIN_INTERVAL: Duration = Duration::from_millis(50);

/// One reading of the session clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressSample {
    /// Poller generation that produced this sample.
    pub generation: u64,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    /// `position / duration`; `None` only when the stream finished without a known length.
    pub ratio: Option<f64>,
    pub finished: bool,
}

/// Running poller; dropping it cancels and joins the thread.
pub struct PollerHandle {
    generation: u64,
    cancel_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

/// Sample `clock` every `interval` and send the readings on `tx`.
///
/// Nothing is sent while the duration is unknown or zero, except a final sample once the
/// stream has finished. The thread exits after that final sample, on cancel, or when the
/// receiver is gone.
pub fn start(
    clock: PlaybackClock,
    interval: Duration,
    generation: u64,
    tx: Sender<ProgressSample>,
) -> Result<PollerHandle> {
    let interval = interval.max(MIN_INTERVAL);
    let (cancel_tx, cancel_rx) = bounded::<()>(1);
    let join = std::thread::Builder::new()
        .name(format!("progress-{generation}"))
        .spawn(move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(cancel_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        let Some(sample) = sample_clock(&clock, generation) else {
                            continue;
                        };
                        if tx.send(sample).is_err() || sample.finished {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(generation, "progress poller exited");
        })
        .context("spawn progress poller")?;
    tracing::debug!(generation, interval_ms = interval.as_millis() as u64, "progress poller started");
    Ok(PollerHandle {
        generation,
        cancel_tx: Some(cancel_tx),
        join: Some(join),
    })
}

/// Read `clock` into a sample, or `None` when there is nothing meaningful to publish.
pub fn sample_clock(clock: &PlaybackClock, generation: u64) -> Option<ProgressSample> {
    let snap = clock.snapshot();
    let ratio = snap.ratio();
    if ratio.is_none() && !snap.finished {
        return None;
    }
    Some(ProgressSample {
        generation,
        position_ms: snap.position_ms,
        duration_ms: snap.duration_ms,
        ratio,
        finished: snap.finished,
    })
}

impl PollerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the thread and wait for it. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::error!(generation = self.generation, "progress poller panicked");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn clock_at(duration_ms: Option<u64>, position_ms: u64) -> PlaybackClock {
        let clock = PlaybackClock::new(duration_ms);
        clock.set_sample_rate(1_000);
        clock.advance(position_ms);
        clock
    }

    #[test]
    fn sample_carries_ratio_and_generation() {
        let clock = clock_at(Some(10_000), 2_500);
        let sample = sample_clock(&clock, 7).unwrap();
        assert_eq!(sample.generation, 7);
        assert_eq!(sample.position_ms, 2_500);
        assert_eq!(sample.ratio, Some(0.25));
        assert!(!sample.finished);
    }

    #[test]
    fn no_sample_without_duration() {
        assert!(sample_clock(&clock_at(None, 2_500), 1).is_none());
        assert!(sample_clock(&clock_at(Some(0), 2_500), 1).is_none());
    }

    #[test]
    fn finished_stream_reports_even_without_duration() {
        let clock = clock_at(None, 900);
        clock.mark_finished();
        let sample = sample_clock(&clock, 1).unwrap();
        assert!(sample.finished);
        assert_eq!(sample.ratio, None);
    }

    #[test]
    fn poller_publishes_then_stops_on_cancel() {
        let clock = clock_at(Some(10_000), 1_000);
        let (tx, rx) = unbounded();
        let mut handle = start(clock.clone(), MIN_INTERVAL, 3, tx).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.generation, 3);
        assert_eq!(first.ratio, Some(0.1));

        clock.advance(1_000);
        let later = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(later.position_ms >= first.position_ms);

        handle.cancel();
        handle.cancel();
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(MIN_INTERVAL * 3).is_err());
    }

    #[test]
    fn poller_exits_after_finished_sample() {
        let clock = clock_at(Some(1_000), 1_000);
        clock.mark_finished();
        let (tx, rx) = unbounded();
        let _handle = start(clock, MIN_INTERVAL, 1, tx).unwrap();

        let sample = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(sample.finished);
        // Sender is dropped once the thread exits.
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(2)),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn silent_while_duration_unknown() {
        let (tx, rx) = unbounded();
        let handle = start(clock_at(None, 500), MIN_INTERVAL, 1, tx).unwrap();
        assert!(rx.recv_timeout(MIN_INTERVAL * 4).is_err());
        drop(handle);
    }
}
