use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_default());

    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-changed=build.rs");
    if let Some(head) = git_head(&manifest_dir) {
        println!("cargo:rerun-if-changed={}", head.display());
    }

    println!("cargo:rustc-env=GIT_SHA={}", git_sha(&manifest_dir));
    println!("cargo:rustc-env=BUILD_DATE={}", build_date());
}

/// `HEAD` of the repository containing the crate; the crate sits two levels below it.
fn git_head(manifest_dir: &Path) -> Option<PathBuf> {
    let from_git = git(manifest_dir, &["rev-parse", "--absolute-git-dir"])
        .map(|dir| PathBuf::from(dir).join("HEAD"));
    let fallback = manifest_dir.join("../../.git/HEAD");
    from_git
        .filter(|p| p.exists())
        .or_else(|| fallback.exists().then_some(fallback))
}

fn git_sha(manifest_dir: &Path) -> String {
    git(manifest_dir, &["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into())
}

fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git").current_dir(dir).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8(out.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// UTC date of the build, honouring `SOURCE_DATE_EPOCH` for reproducible builds.
fn build_date() -> String {
    let when = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);
    match when.format(&Rfc3339) {
        Ok(stamp) => stamp.chars().take(10).collect(),
        Err(_) => "unknown-date".into(),
    }
}
