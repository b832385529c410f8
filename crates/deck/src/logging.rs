//! Tracing setup for a full-screen TUI.
//!
//! The terminal belongs to ratatui, so formatted log lines are sent over a channel and shown
//! in the Logs panel instead of being written to stderr.

use std::io;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

const DEFAULT_FILTER: &str = "info,deck=info,audio_player=info";
const CHANNEL_CAP: usize = 1024;

/// `io::Write` sink forwarding each formatted event as one line.
#[derive(Clone)]
pub struct LogSink {
    tx: Sender<String>,
}

impl LogSink {
    pub fn new(tx: Sender<String>) -> Self {
        Self { tx }
    }
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        for line in text.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            match self.tx.try_send(line.to_string()) {
                // Full: the UI is behind, drop rather than block the logging thread.
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Install the global subscriber and return the receiving end for the Logs panel.
pub fn init() -> Result<Receiver<String>> {
    let (tx, rx) = bounded(CHANNEL_CAP);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_ansi(false)
        .with_target(false)
        .with_writer(LogSink::new(tx))
        .try_init()
        .map_err(|e| anyhow::anyhow!("install log subscriber: {e}"))?;
    Ok(rx)
}
