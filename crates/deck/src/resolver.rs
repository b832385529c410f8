//! Display-name and tag lookup for a picked file.
//!
//! Lookups never fail from the caller's point of view: a missing or unreadable record
//! resolves to `None` and the screen falls back to [`PLACEHOLDER_NAME`].

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use lofty::{Accessor, TaggedFileExt};

use crate::media_ref::MediaRef;

/// Shown when a selection has no resolvable name.
pub const PLACEHOLDER_NAME: &str = "Selected file";

/// Source of per-file metadata records.
///
/// `open` acquires a read-only handle; dropping the record releases it.
pub trait MetadataProvider {
    type Record: MetadataRecord;

    /// `Ok(None)` means the lookup succeeded but found nothing.
    fn open(&self, media: &MediaRef) -> Result<Option<Self::Record>>;
}

pub trait MetadataRecord {
    fn display_name(&self) -> Option<String>;
}

/// Looks names up on the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsMetadataProvider;

pub struct FsRecord {
    _handle: File,
    path: PathBuf,
}

impl MetadataProvider for FsMetadataProvider {
    type Record = FsRecord;

    fn open(&self, media: &MediaRef) -> Result<Option<FsRecord>> {
        let path = media.path();
        let handle = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("open {}", path.display())),
        };
        Ok(Some(FsRecord {
            _handle: handle,
            path: path.to_path_buf(),
        }))
    }
}

impl MetadataRecord for FsRecord {
    fn display_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
    }
}

/// Display name for `media`, or `None` when it cannot be resolved.
pub fn resolve_display_name<P: MetadataProvider>(provider: &P, media: &MediaRef) -> Option<String> {
    match provider.open(media) {
        Ok(Some(record)) => record.display_name(),
        Ok(None) => {
            tracing::debug!(media = %media, "no metadata record");
            None
        }
        Err(e) => {
            tracing::debug!(media = %media, "metadata lookup failed: {e:#}");
            None
        }
    }
}

pub fn display_name_or_placeholder<P: MetadataProvider>(provider: &P, media: &MediaRef) -> String {
    resolve_display_name(provider, media).unwrap_or_else(|| PLACEHOLDER_NAME.to_string())
}

/// Embedded tags shown under the file name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl TrackTags {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.album.is_none()
    }
}

/// Read title/artist/album best-effort; unreadable or untagged files give empty tags.
pub fn probe_tags(media: &MediaRef) -> TrackTags {
    let tagged = match lofty::read_from_path(media.path()) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!(media = %media, "tag probe skipped: {e}");
            return TrackTags::default();
        }
    };
    let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
        return TrackTags::default();
    };
    let clean = |v: Option<std::borrow::Cow<'_, str>>| {
        v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    };
    TrackTags {
        title: clean(tag.title()),
        artist: clean(tag.artist()),
        album: clean(tag.album()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Copy)]
    enum Lookup {
        Found(Option<&'static str>),
        Empty,
        Fails,
    }

    struct CountingProvider {
        lookup: Lookup,
        live: Rc<Cell<i32>>,
    }

    struct CountingRecord {
        name: Option<&'static str>,
        live: Rc<Cell<i32>>,
    }

    impl Drop for CountingRecord {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    impl MetadataRecord for CountingRecord {
        fn display_name(&self) -> Option<String> {
            self.name.map(str::to_string)
        }
    }

    impl MetadataProvider for CountingProvider {
        type Record = CountingRecord;

        fn open(&self, _media: &MediaRef) -> Result<Option<CountingRecord>> {
            match self.lookup {
                Lookup::Found(name) => {
                    self.live.set(self.live.get() + 1);
                    Ok(Some(CountingRecord {
                        name,
                        live: self.live.clone(),
                    }))
                }
                Lookup::Empty => Ok(None),
                Lookup::Fails => anyhow::bail!("provider offline"),
            }
        }
    }

    fn media() -> (tempfile::TempDir, MediaRef) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Song One.flac");
        std::fs::write(&path, b"not really flac").unwrap();
        let media = MediaRef::from_path(&path).unwrap();
        (dir, media)
    }

    #[test]
    fn filesystem_name_is_the_file_name() {
        let (_dir, media) = media();
        assert_eq!(
            resolve_display_name(&FsMetadataProvider, &media).as_deref(),
            Some("Song One.flac")
        );
    }

    #[test]
    fn record_is_released_on_every_path() {
        let (_dir, media) = media();
        for lookup in [
            Lookup::Found(Some("x.mp3")),
            Lookup::Found(None),
            Lookup::Empty,
            Lookup::Fails,
        ] {
            let live = Rc::new(Cell::new(0));
            let provider = CountingProvider {
                lookup,
                live: live.clone(),
            };
            let _ = resolve_display_name(&provider, &media);
            assert_eq!(live.get(), 0);
        }
    }

    #[test]
    fn misses_and_failures_fall_back_to_placeholder() {
        let (_dir, media) = media();
        for lookup in [Lookup::Found(None), Lookup::Empty, Lookup::Fails] {
            let provider = CountingProvider {
                lookup,
                live: Rc::new(Cell::new(0)),
            };
            assert_eq!(resolve_display_name(&provider, &media), None);
            assert_eq!(display_name_or_placeholder(&provider, &media), PLACEHOLDER_NAME);
        }
    }

    #[test]
    fn vanished_file_has_no_record() {
        let (dir, media) = media();
        drop(dir);
        assert_eq!(resolve_display_name(&FsMetadataProvider, &media), None);
    }

    #[test]
    fn untagged_file_gives_empty_tags() {
        let (_dir, media) = media();
        assert!(probe_tags(&media).is_empty());
    }
}
