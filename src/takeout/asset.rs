// Emitted asset: one upload candidate with its reconciled metadata

use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;

use super::sidecar::Album;
use crate::archive::ArchiveRef;
use crate::constants::{TEMP_FILE_PREFIX, TEMP_FILE_SUFFIX};
use crate::error::Result;
use crate::filenames::NameInfo;
use crate::media::MediaType;

#[derive(Serialize)]
pub struct EmittedAsset {
    /// Path inside the archive.
    pub file_name: String,
    #[serde(serialize_with = "archive_name")]
    pub archive: ArchiveRef,
    pub size: u64,
    /// Sidecar title with the file's actual extension.
    pub title: String,
    pub capture_date: Option<DateTime<Utc>>,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub description: String,
    pub archived: bool,
    pub trashed: bool,
    pub favorited: bool,
    pub from_partner: bool,
    pub from_shared_album: bool,
    pub albums: Vec<Album>,
    pub tags: Vec<String>,
    pub media: MediaType,
    pub name_info: NameInfo,
    pub companion_video: Option<Box<EmittedAsset>>,
    #[serde(skip)]
    probe: Option<Probe>,
}

struct Probe {
    file: NamedTempFile,
    len: usize,
}

fn archive_name<S: serde::Serializer>(archive: &ArchiveRef, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(archive.name())
}

impl EmittedAsset {
    /// A bare asset; the emitter fills the metadata fields.
    pub fn new(archive: ArchiveRef, file_name: &str, size: u64, media: MediaType, name_info: NameInfo) -> Self {
        Self {
            file_name: file_name.to_string(),
            archive,
            size,
            title: name_info.base.clone(),
            capture_date: None,
            lat: 0.0,
            lon: 0.0,
            alt: 0.0,
            description: String::new(),
            archived: false,
            trashed: false,
            favorited: false,
            from_partner: false,
            from_shared_album: false,
            albums: Vec::new(),
            tags: Vec::new(),
            media,
            name_info,
            companion_video: None,
            probe: None,
        }
    }

    /// "archive:path", as used in events.
    pub fn display(&self) -> String {
        format!("{}:{}", self.archive.name(), self.file_name)
    }

    /// Up to `limit` bytes from the start of the file. The bytes are spooled
    /// once into a temporary file that lives until `close`.
    pub fn probe(&mut self, limit: usize) -> Result<Vec<u8>> {
        let stale = self.probe.as_ref().map_or(true, |p| p.len < limit && (p.len as u64) < self.size);
        if stale {
            let mut file = tempfile::Builder::new()
                .prefix(TEMP_FILE_PREFIX)
                .suffix(TEMP_FILE_SUFFIX)
                .tempfile()?;
            let head = self.archive.read_head(&self.file_name, limit)?;
            file.as_file_mut().write_all(&head)?;
            log::debug!("probed {} bytes of {}", head.len(), self.display());
            self.probe = Some(Probe { file, len: limit });
        }

        let mut buf = Vec::new();
        if let Some(p) = self.probe.as_mut() {
            let f = p.file.as_file_mut();
            f.seek(SeekFrom::Start(0))?;
            f.take(limit as u64).read_to_end(&mut buf)?;
        }
        Ok(buf)
    }

    /// Location of the probe buffer, if any.
    pub fn probe_path(&self) -> Option<&Path> {
        self.probe.as_ref().map(|p| p.file.path())
    }

    /// Release temporary buffers, companion included. Safe to call twice.
    pub fn close(&mut self) {
        if let Some(p) = self.probe.take() {
            if let Err(e) = p.file.close() {
                log::warn!("cannot remove probe buffer of {}: {}", self.display(), e);
            }
        }
        if let Some(video) = self.companion_video.as_mut() {
            video.close();
        }
    }
}

impl Drop for EmittedAsset {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for EmittedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmittedAsset")
            .field("file", &self.display())
            .field("title", &self.title)
            .field("capture_date", &self.capture_date)
            .field("albums", &self.albums.iter().map(|a| &a.title).collect::<Vec<_>>())
            .field("companion_video", &self.companion_video.as_ref().map(|v| v.display()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::FakeFs;
    use crate::filenames::{NameAnalyzer, NameZone};
    use crate::media::SupportedMedia;
    use std::sync::Arc;

    fn asset() -> EmittedAsset {
        let mut fs = FakeFs::new("mem");
        fs.add_file("d/a.jpg", b"\xff\xd8\xff\xe0 jpeg body");
        let archive: ArchiveRef = Arc::new(fs);
        let info = NameAnalyzer::new(SupportedMedia::default(), NameZone::Utc).analyze("a.jpg");
        EmittedAsset::new(archive, "d/a.jpg", 14, MediaType::Image, info)
    }

    #[test]
    fn test_probe_uses_temp_file() {
        let mut a = asset();
        assert!(a.probe_path().is_none());
        let head = a.probe(4).unwrap();
        assert_eq!(head, b"\xff\xd8\xff\xe0");

        let path = a.probe_path().unwrap().to_path_buf();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(TEMP_FILE_PREFIX));
        assert!(name.ends_with(TEMP_FILE_SUFFIX));

        assert_eq!(a.probe(2).unwrap(), b"\xff\xd8");
        assert_eq!(a.probe(100).unwrap().len(), 14);

        let path = a.probe_path().unwrap().to_path_buf();
        a.close();
        assert!(!path.exists());
        a.close();
    }

    // Member bytes are only reachable through the bounded head read
    struct HeadOnly;

    impl crate::archive::Archive for HeadOnly {
        fn name(&self) -> &str {
            "head-only"
        }

        fn walk(&self) -> Result<crate::archive::EntryIter<'_>> {
            Ok(Box::new(std::iter::empty()))
        }

        fn stat(&self, path: &str) -> Result<crate::archive::ArchiveEntry> {
            Err(crate::error::TakeoutError::NotFound(path.to_string()))
        }

        fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
            Err(crate::error::TakeoutError::Archive(format!("{} must not be opened whole", path)))
        }

        fn read_head(&self, _path: &str, limit: usize) -> Result<Vec<u8>> {
            Ok(vec![0xab; limit.min(8 * 1024 * 1024)])
        }
    }

    #[test]
    fn test_probe_reads_only_the_head() {
        let info = NameAnalyzer::new(SupportedMedia::default(), NameZone::Utc).analyze("big.mp4");
        let mut a = EmittedAsset::new(Arc::new(HeadOnly), "d/big.mp4", 8 * 1024 * 1024, MediaType::Video, info);
        assert_eq!(a.probe(4).unwrap(), vec![0xab; 4]);
        let len = std::fs::metadata(a.probe_path().unwrap()).unwrap().len();
        assert_eq!(len, 4);
    }

    #[test]
    fn test_drop_releases_companion_buffers() {
        let mut still = asset();
        let mut video = asset();
        video.probe(3).unwrap();
        let path = video.probe_path().unwrap().to_path_buf();
        still.companion_video = Some(Box::new(video));
        drop(still);
        assert!(!path.exists());
    }
}
