//! `deck`: play one local audio file in the terminal.
//!
//! Pick a file, play/pause/stop it, and watch its progress. Decoding and output are
//! handled by the `audio-player` crate.

mod cli;
mod config;
mod controller;
mod logging;
mod media_ref;
mod picker;
mod poller;
mod resolver;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    if args.list_devices {
        let host = cpal::default_host();
        for name in audio_player::device::list_device_names(&host)? {
            println!("{name}");
        }
        return Ok(());
    }

    let file_cfg = config::DeckConfig::load_or_default(args.config.as_deref())
        .context("load configuration")?;
    let settings = config::Settings::resolve(file_cfg, &args);

    let log_rx = logging::init()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = env!("GIT_SHA"),
        start_dir = %settings.start_dir.display(),
        device = settings.device.as_deref().unwrap_or("default"),
        "deck starting"
    );

    ui::run_tui(settings, log_rx)
}
