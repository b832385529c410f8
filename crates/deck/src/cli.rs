use std::path::PathBuf;

use clap::Parser;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "deck", version = VERSION, about = "Play one local audio file in the terminal")]
pub struct Args {
    /// Audio file to start playing right away
    pub file: Option<PathBuf>,

    /// Directory the file picker opens in
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Config file (defaults to $XDG_CONFIG_HOME/deck/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Queue buffer target in seconds (per stage)
    #[arg(long)]
    pub buffer_seconds: Option<f32>,

    /// Progress refresh interval in milliseconds
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_carries_git_sha_and_build_date() {
        let sha = env!("GIT_SHA");
        let date = env!("BUILD_DATE");
        assert!(!sha.is_empty());
        assert!(VERSION.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(VERSION.ends_with(&format!("({sha}, {date})")));
        if date != "unknown-date" {
            assert_eq!(date.len(), 10);
            assert_eq!(date.as_bytes()[4], b'-');
            assert_eq!(date.as_bytes()[7], b'-');
        }
    }

    #[test]
    fn file_argument_and_flags_parse() {
        let args = Args::try_parse_from(["deck", "song.flac", "--poll-ms", "250", "--device", "USB"])
            .unwrap();
        assert_eq!(args.file, Some(PathBuf::from("song.flac")));
        assert_eq!(args.poll_ms, Some(250));
        assert_eq!(args.device.as_deref(), Some("USB"));
        assert!(!args.list_devices);
    }
}
