// Pass one: walk every archive and index its entries per directory

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::sidecar::{parse_sidecar, Album, AssetMetadata, Sidecar};
use crate::archive::{base_of, dir_of, ext_of, ArchiveEntry, ArchiveRef};
use crate::cancel::CancelToken;
use crate::config::ImportOptions;
use crate::constants::{FAILED_VIDEOS_SEGMENT, IGNORED_JSON_FILES};
use crate::error::{Result, TakeoutError};
use crate::events::{EventCode, Recorder};
use crate::media::{MediaType, SupportedMedia};

/// A media file inside one of the input archives.
#[derive(Clone)]
pub struct AssetFile {
    pub archive: ArchiveRef,
    /// Full '/'-separated path inside the archive.
    pub path: String,
    pub base: String,
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
    pub media: MediaType,
    /// Set by the solver.
    pub metadata: Option<Arc<AssetMetadata>>,
}

impl AssetFile {
    /// "archive:path", as used in events.
    pub fn display(&self) -> String {
        format!("{}:{}", self.archive.name(), self.path)
    }
}

impl fmt::Debug for AssetFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetFile")
            .field("file", &self.display())
            .field("size", &self.size)
            .field("media", &self.media)
            .field("metadata", &self.metadata.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct DirectoryCatalog {
    /// Asset sidecars by basename.
    pub jsons: BTreeMap<String, Arc<AssetMetadata>>,
    pub unmatched: HashMap<String, AssetFile>,
    pub matched: HashMap<String, AssetFile>,
}

#[derive(Debug, Default)]
pub struct Catalog {
    pub dirs: BTreeMap<String, DirectoryCatalog>,
    /// Albums by directory path.
    pub albums: BTreeMap<String, Album>,
}

impl Catalog {
    pub fn file_count(&self) -> usize {
        self.dirs
            .values()
            .map(|d| d.matched.len() + d.unmatched.len())
            .sum()
    }
}

// Same logical sidecar, wherever Google copied it
type SidecarKey = (String, Option<i64>);

pub struct CatalogBuilder<'a> {
    media: &'a SupportedMedia,
    options: &'a ImportOptions,
    recorder: &'a Recorder,
    cancel: &'a CancelToken,
    files: BTreeMap<String, HashMap<String, AssetFile>>,
    jsons: BTreeMap<String, BTreeMap<String, AssetMetadata>>,
    albums: BTreeMap<String, Album>,
    found: HashMap<SidecarKey, BTreeSet<String>>,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(
        media: &'a SupportedMedia,
        options: &'a ImportOptions,
        recorder: &'a Recorder,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            media,
            options,
            recorder,
            cancel,
            files: BTreeMap::new(),
            jsons: BTreeMap::new(),
            albums: BTreeMap::new(),
            found: HashMap::new(),
        }
    }

    /// Walk one archive. Entry errors are recorded and skipped; a failing
    /// walk abandons this archive only. Returns `Err` on cancellation.
    pub fn ingest(&mut self, archive: &ArchiveRef) -> Result<()> {
        log::info!("scanning {}", archive.name());
        let walk = match archive.walk() {
            Ok(w) => w,
            Err(e) => {
                self.recorder
                    .record(EventCode::Error, archive.name(), &[("error", &e.to_string())]);
                return Ok(());
            }
        };

        for entry in walk {
            self.cancel.check()?;
            match entry {
                Ok(entry) if !entry.is_dir => self.classify(archive, entry),
                Ok(_) => {}
                Err(e) => {
                    self.recorder
                        .record(EventCode::Error, archive.name(), &[("error", &e.to_string())]);
                }
            }
        }
        Ok(())
    }

    fn classify(&mut self, archive: &ArchiveRef, entry: ArchiveEntry) {
        let display = format!("{}:{}", archive.name(), entry.path);
        let dir = dir_of(&entry.path).to_string();
        let base = base_of(&entry.path).to_string();
        let ext = ext_of(&base).to_lowercase();

        if self.options.banned_files.is_banned(&entry.path) {
            self.recorder
                .record(EventCode::DiscoveredDiscarded, &display, &[("reason", "banned file")]);
            return;
        }

        if ext == ".json" {
            self.ingest_json(archive, &entry, dir, base, &display);
            return;
        }

        let media = self.media.type_of(&ext);
        match media {
            MediaType::Image | MediaType::Video => {}
            MediaType::Sidecar => {
                self.recorder
                    .record(EventCode::DiscoveredSidecar, &display, &[("type", "xmp")]);
                return;
            }
            MediaType::Unknown => {
                self.recorder.record(EventCode::DiscoveredUnsupported, &display, &[]);
                return;
            }
        }

        if entry.path.split('/').any(|seg| seg == FAILED_VIDEOS_SEGMENT) {
            self.recorder
                .record(EventCode::DiscoveredDiscarded, &display, &[("reason", "failed video")]);
            return;
        }

        let code = if media == MediaType::Image {
            EventCode::DiscoveredImage
        } else {
            EventCode::DiscoveredVideo
        };
        self.recorder.record(code, &display, &[]);

        let files = self.files.entry(dir).or_default();
        if let Some(first) = files.get(&base) {
            let first = first.display();
            self.recorder
                .record(EventCode::LocalDuplicate, &display, &[("first", &first)]);
            return;
        }
        files.insert(
            base.clone(),
            AssetFile {
                archive: archive.clone(),
                path: entry.path,
                base,
                size: entry.size,
                mtime: entry.mtime,
                media,
                metadata: None,
            },
        );
    }

    fn ingest_json(&mut self, archive: &ArchiveRef, entry: &ArchiveEntry, dir: String, base: String, display: &str) {
        if IGNORED_JSON_FILES.contains(&base.as_str()) {
            self.recorder
                .record(EventCode::DiscoveredSidecar, display, &[("type", "ignored")]);
            return;
        }

        let sidecar = archive
            .read_json(&entry.path)
            .and_then(parse_sidecar);
        let sidecar = match sidecar {
            Ok(s) => s,
            Err(e @ (TakeoutError::Json(_) | TakeoutError::Sidecar(_))) => {
                self.recorder.record(
                    EventCode::DiscoveredUnsupported,
                    display,
                    &[("reason", "unknown sidecar"), ("error", &e.to_string())],
                );
                return;
            }
            Err(e) => {
                self.recorder.record(EventCode::Error, display, &[("error", &e.to_string())]);
                return;
            }
        };

        match sidecar {
            Sidecar::Asset(md) => {
                self.recorder
                    .record(EventCode::DiscoveredSidecar, display, &[("type", "asset")]);
                let key = (base.clone(), md.taken.map(|t| t.timestamp()));
                self.found.entry(key).or_default().insert(dir.clone());

                let jsons = self.jsons.entry(dir).or_default();
                if jsons.contains_key(&base) {
                    self.recorder.record(EventCode::LocalDuplicate, display, &[]);
                    return;
                }
                jsons.insert(base, md);
            }
            Sidecar::Album(mut album) => {
                self.recorder
                    .record(EventCode::DiscoveredSidecar, display, &[("type", "album")]);
                if self.albums.contains_key(&dir) {
                    self.recorder.record(EventCode::LocalDuplicate, display, &[]);
                    return;
                }
                album.path = base_of(&dir).to_string();
                self.albums.insert(dir, album);
            }
            Sidecar::Unknown => {
                self.recorder
                    .record(EventCode::DiscoveredUnsupported, display, &[("reason", "unknown JSON")]);
            }
        }
    }

    /// Freeze the sidecars with their accumulated locations.
    pub fn finish(self) -> Catalog {
        let mut dirs: BTreeMap<String, DirectoryCatalog> = BTreeMap::new();

        for (dir, files) in self.files {
            dirs.entry(dir).or_default().unmatched = files;
        }
        for (dir, jsons) in self.jsons {
            let catalog = dirs.entry(dir).or_default();
            for (base, mut md) in jsons {
                let key = (base.clone(), md.taken.map(|t| t.timestamp()));
                if let Some(paths) = self.found.get(&key) {
                    md.found_in_paths = paths.iter().cloned().collect();
                }
                catalog.jsons.insert(base, Arc::new(md));
            }
        }

        let mut albums = BTreeMap::new();
        for (dir, mut album) in self.albums {
            if album.title.trim().is_empty() {
                if !self.options.keep_untitled_albums {
                    self.recorder.record(
                        EventCode::DiscoveredUnsupported,
                        &dir,
                        &[("reason", "discard untitled album")],
                    );
                    continue;
                }
                album.title = album.path.clone();
            }
            albums.insert(dir, album);
        }

        log::info!(
            "catalog: {} directories, {} albums",
            dirs.len(),
            albums.len()
        );
        Catalog { dirs, albums }
    }
}
