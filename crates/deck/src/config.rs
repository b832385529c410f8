//! Configuration loading and merging.
//!
//! An optional TOML file supplies defaults; command-line flags override it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use audio_player::PlaybackConfig;
use serde::Deserialize;

use crate::cli::Args;
use crate::poller;

/// File configuration loaded from TOML. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeckConfig {
    /// Directory the file picker opens in.
    pub start_dir: Option<PathBuf>,
    /// Output device substring.
    pub device: Option<String>,
    /// Progress refresh interval in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Pipeline tuning.
    pub playback: Option<PlaybackConfig>,
}

impl DeckConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        toml::from_str::<DeckConfig>(&raw).with_context(|| format!("parse config {:?}", path))
    }

    /// Load `explicit` if given, else the default location when it exists.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// `$XDG_CONFIG_HOME/deck/config.toml`, falling back to `~/.config/deck/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("deck").join("config.toml"))
}

/// Effective settings after merging the file with command-line flags.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub start_dir: PathBuf,
    pub device: Option<String>,
    pub poll_interval: Duration,
    pub playback: PlaybackConfig,
    pub initial_file: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(file: DeckConfig, args: &Args) -> Self {
        let mut playback = file.playback.unwrap_or_default();
        if let Some(secs) = args.buffer_seconds {
            playback.buffer_seconds = secs;
        }
        let poll_ms = args
            .poll_ms
            .or(file.poll_interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(poller::DEFAULT_INTERVAL);
        let start_dir = args
            .dir
            .clone()
            .or(file.start_dir)
            .or_else(|| args.file.as_ref().and_then(|f| f.parent().map(Path::to_path_buf)))
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            start_dir,
            device: args.device.clone().or(file.device),
            poll_interval: poll_ms.max(poller::MIN_INTERVAL),
            playback: playback.sanitized(),
            initial_file: args.file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("deck").chain(argv.iter().copied()))
    }

    #[test]
    fn parses_full_file() {
        let cfg: DeckConfig = toml::from_str(
            r#"
            start_dir = "/music"
            device = "USB DAC"
            poll_interval_ms = 250

            [playback]
            buffer_seconds = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.start_dir.as_deref(), Some(Path::new("/music")));
        assert_eq!(cfg.device.as_deref(), Some("USB DAC"));
        let playback = cfg.playback.unwrap();
        assert_eq!(playback.buffer_seconds, 1.5);
        assert_eq!(playback.chunk_frames, PlaybackConfig::default().chunk_frames);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<DeckConfig>("volume = 3").is_err());
    }

    #[test]
    fn load_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "device = [").unwrap();
        let err = DeckConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parse config"));
        assert!(DeckConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let settings = Settings::resolve(DeckConfig::default(), &args(&[]));
        assert_eq!(settings.start_dir, PathBuf::from("."));
        assert_eq!(settings.device, None);
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
        assert_eq!(settings.playback, PlaybackConfig::default());
        assert_eq!(settings.initial_file, None);
    }

    #[test]
    fn flags_override_file_values() {
        let file = DeckConfig {
            start_dir: Some(PathBuf::from("/from-file")),
            device: Some("file-dev".into()),
            poll_interval_ms: Some(1_000),
            playback: Some(PlaybackConfig {
                buffer_seconds: 4.0,
                ..PlaybackConfig::default()
            }),
        };
        let settings = Settings::resolve(
            file,
            &args(&["--dir", "/cli", "--device", "cli-dev", "--poll-ms", "10", "--buffer-seconds", "0.5"]),
        );
        assert_eq!(settings.start_dir, PathBuf::from("/cli"));
        assert_eq!(settings.device.as_deref(), Some("cli-dev"));
        assert_eq!(settings.poll_interval, poller::MIN_INTERVAL);
        assert_eq!(settings.playback.buffer_seconds, 0.5);
    }

    #[test]
    fn file_argument_sets_start_dir() {
        let settings = Settings::resolve(DeckConfig::default(), &args(&["/music/a/song.flac"]));
        assert_eq!(settings.start_dir, PathBuf::from("/music/a"));
        assert_eq!(
            settings.initial_file.as_deref(),
            Some(Path::new("/music/a/song.flac"))
        );

        let bare = Settings::resolve(DeckConfig::default(), &args(&["song.flac"]));
        assert_eq!(bare.start_dir, PathBuf::from("."));
    }
}
