use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Opaque handle to a file the user picked.
///
/// Existence is checked once, when the handle is created; nothing re-validates it later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaRef {
    path: PathBuf,
}

impl MediaRef {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
        if !meta.is_file() {
            bail!("{} is not a regular file", path.display());
        }
        let path = path
            .canonicalize()
            .with_context(|| format!("resolve {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
