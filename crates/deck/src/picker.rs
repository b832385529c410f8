//! File picker: a directory browser that only offers files matching one MIME filter.
//!
//! The picker yields zero references (cancelled) or exactly one [`MediaRef`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::media_ref::MediaRef;

/// MIME filter used when the screen asks for an audio file.
pub const AUDIO_FILTER: &str = "audio/*";

/// A single `type/subtype` pattern; the subtype may be `*`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MimeFilter {
    kind: String,
    subtype: Option<String>,
}

impl MimeFilter {
    pub fn parse(filter: &str) -> Result<Self> {
        let (kind, subtype) = filter
            .trim()
            .split_once('/')
            .with_context(|| format!("invalid MIME filter {filter:?}"))?;
        if kind.is_empty() || subtype.is_empty() {
            anyhow::bail!("invalid MIME filter {filter:?}");
        }
        Ok(Self {
            kind: kind.to_ascii_lowercase(),
            subtype: (subtype != "*").then(|| subtype.to_ascii_lowercase()),
        })
    }

    pub fn matches(&self, mime: &str) -> bool {
        let Some((kind, subtype)) = mime.split_once('/') else {
            return false;
        };
        (self.kind == "*" || kind.eq_ignore_ascii_case(&self.kind))
            && self
                .subtype
                .as_deref()
                .is_none_or(|want| subtype.eq_ignore_ascii_case(want))
    }

    pub fn accepts_path(&self, path: &Path) -> bool {
        mime_for_path(path).is_some_and(|mime| self.matches(mime))
    }
}

/// MIME type guessed from the file extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "flac" => "audio/flac",
        "mp3" => "audio/mpeg",
        "wav" | "wave" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "m4a" | "mp4a" => "audio/mp4",
        "aac" => "audio/aac",
        "aif" | "aiff" => "audio/aiff",
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "txt" | "cue" | "log" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PickerEntry {
    Dir { name: String, path: PathBuf },
    File { name: String, path: PathBuf },
}

impl PickerEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Dir { name, .. } | Self::File { name, .. } => name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir { .. })
    }
}

/// Directories first, then matching files, each sorted case-insensitively.
/// Hidden entries are skipped; a `..` entry leads to the parent when there is one.
pub fn list_entries(dir: &Path, filter: &MimeFilter) -> Result<Vec<PickerEntry>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    let read = std::fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    for entry in read {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        // Follows symlinks; broken links are skipped.
        let Ok(meta) = std::fs::metadata(&path) else {
            continue;
        };
        if meta.is_dir() {
            dirs.push(PickerEntry::Dir { name, path });
        } else if meta.is_file() && filter.accepts_path(&path) {
            files.push(PickerEntry::File { name, path });
        }
    }
    let key = |e: &PickerEntry| e.name().to_lowercase();
    dirs.sort_by_key(key);
    files.sort_by_key(key);

    let mut entries = Vec::with_capacity(dirs.len() + files.len() + 1);
    if let Some(parent) = dir.parent() {
        entries.push(PickerEntry::Dir {
            name: "..".to_string(),
            path: parent.to_path_buf(),
        });
    }
    entries.extend(dirs);
    entries.extend(files);
    Ok(entries)
}

/// What a picker interaction produced.
#[derive(Debug, PartialEq, Eq)]
pub enum PickerOutcome {
    /// Still browsing.
    Browsing,
    Picked(MediaRef),
    Cancelled,
}

/// Browsing state of an open picker.
pub struct FilePicker {
    filter: MimeFilter,
    dir: PathBuf,
    entries: Vec<PickerEntry>,
    selected: usize,
    pub(crate) error: Option<String>,
}

impl FilePicker {
    pub fn open(dir: &Path, filter: &str) -> Result<Self> {
        let filter = MimeFilter::parse(filter)?;
        let dir = dir
            .canonicalize()
            .with_context(|| format!("resolve {}", dir.display()))?;
        let entries = list_entries(&dir, &filter)?;
        let selected = first_file_index(&entries);
        Ok(Self {
            filter,
            dir,
            entries,
            selected,
            error: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[PickerEntry] {
        &self.entries
    }

    pub fn selected(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.selected)
    }

    pub fn select_next(&mut self) {
        if !self.entries.is_empty() {
            self.selected = (self.selected + 1).min(self.entries.len() - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Enter the highlighted directory or pick the highlighted file.
    pub fn activate(&mut self) -> PickerOutcome {
        let Some(entry) = self.entries.get(self.selected).cloned() else {
            return PickerOutcome::Browsing;
        };
        match entry {
            PickerEntry::Dir { path, .. } => {
                self.navigate(path);
                PickerOutcome::Browsing
            }
            PickerEntry::File { path, .. } => match MediaRef::from_path(&path) {
                Ok(media) => PickerOutcome::Picked(media),
                Err(e) => {
                    self.error = Some(format!("{e:#}"));
                    PickerOutcome::Browsing
                }
            },
        }
    }

    pub fn go_parent(&mut self) {
        if let Some(parent) = self.dir.parent().map(Path::to_path_buf) {
            self.navigate(parent);
        }
    }

    pub fn cancel(&self) -> PickerOutcome {
        PickerOutcome::Cancelled
    }

    fn navigate(&mut self, dir: PathBuf) {
        match list_entries(&dir, &self.filter) {
            Ok(entries) => {
                self.selected = first_file_index(&entries);
                self.entries = entries;
                self.dir = dir;
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "cannot browse: {e:#}");
                self.error = Some(format!("{e:#}"));
            }
        }
    }
}

/// Land on the first file so a single Enter picks it; otherwise the first entry.
fn first_file_index(entries: &[PickerEntry]) -> usize {
    entries.iter().position(|e| !e.is_dir()).unwrap_or(0)
}
