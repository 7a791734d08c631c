// Tar-gz archive input
//
// Gzip streams cannot seek. The member list and the (small) JSON sidecars
// are captured in one pass at open time; other members are found again by
// rescanning the stream.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use flate2::read::GzDecoder;
use tar::Archive as TarArchive;

use super::{clean_member, Archive, ArchiveEntry, EntryIter};
use crate::constants::{TEMP_FILE_PREFIX, TEMP_FILE_SUFFIX};
use crate::error::{Result, TakeoutError};

// Larger JSON files are not cached and go through a rescan
const MAX_CACHED_JSON: u64 = 4 * 1024 * 1024;

pub struct TarGzFs {
    path: PathBuf,
    name: String,
    entries: Vec<ArchiveEntry>,
    json_cache: HashMap<String, Vec<u8>>,
}

impl TarGzFs {
    pub fn open(path: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        let mut json_cache = HashMap::new();

        let mut tar = TarArchive::new(GzDecoder::new(File::open(path)?));
        for entry in tar.entries()? {
            let mut entry = entry?;
            let member = clean_member(&entry.path()?.to_string_lossy());
            let member = member.trim_end_matches('/').to_string();
            if member.is_empty() {
                continue;
            }
            let header = entry.header();
            let is_dir = header.entry_type().is_dir();
            let size = header.size()?;
            let mtime = Utc.timestamp_opt(header.mtime()? as i64, 0).single();

            if !is_dir && member.to_lowercase().ends_with(".json") && size <= MAX_CACHED_JSON {
                let mut buf = Vec::with_capacity(size as usize);
                entry.read_to_end(&mut buf)?;
                json_cache.insert(member.clone(), buf);
            }
            entries.push(ArchiveEntry { path: member, is_dir, size, mtime });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        log::debug!("opened tar-gz {} with {} entries", name, entries.len());

        Ok(Self {
            path: path.to_path_buf(),
            name,
            entries,
            json_cache,
        })
    }

    /// Rescan the stream until `wanted`, then hand the member to `f`.
    fn with_member<T>(&self, wanted: &str, f: impl FnOnce(&mut dyn Read) -> Result<T>) -> Result<T> {
        let mut tar = TarArchive::new(GzDecoder::new(File::open(&self.path)?));
        for entry in tar.entries()? {
            let mut entry = entry?;
            let member = clean_member(&entry.path()?.to_string_lossy());
            if member == wanted {
                return f(&mut entry);
            }
        }
        Err(TakeoutError::NotFound(format!("{}:{}", self.name, wanted)))
    }
}

impl Archive for TarGzFs {
    fn name(&self) -> &str {
        &self.name
    }

    fn walk(&self) -> Result<EntryIter<'_>> {
        Ok(Box::new(self.entries.iter().cloned().map(Ok)))
    }

    fn stat(&self, path: &str) -> Result<ArchiveEntry> {
        let wanted = path.trim_start_matches("./");
        self.entries
            .iter()
            .find(|e| e.path == wanted)
            .cloned()
            .ok_or_else(|| TakeoutError::NotFound(format!("{}:{}", self.name, path)))
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let wanted = path.trim_start_matches("./");
        if let Some(buf) = self.json_cache.get(wanted) {
            return Ok(Box::new(Cursor::new(buf.clone())));
        }
        self.with_member(wanted, |r| {
            let mut spool = tempfile::Builder::new()
                .prefix(TEMP_FILE_PREFIX)
                .suffix(TEMP_FILE_SUFFIX)
                .tempfile()?
                .into_file();
            std::io::copy(r, &mut spool)?;
            spool.seek(SeekFrom::Start(0))?;
            Ok(Box::new(spool) as Box<dyn Read + Send>)
        })
    }

    fn read_head(&self, path: &str, limit: usize) -> Result<Vec<u8>> {
        let wanted = path.trim_start_matches("./");
        if let Some(buf) = self.json_cache.get(wanted) {
            return Ok(buf[..buf.len().min(limit)].to_vec());
        }
        self.with_member(wanted, |r| {
            let mut buf = Vec::new();
            r.take(limit as u64).read_to_end(&mut buf)?;
            Ok(buf)
        })
    }

    fn read_json(&self, path: &str) -> Result<serde_json::Value> {
        let wanted = path.trim_start_matches("./");
        match self.json_cache.get(wanted) {
            Some(buf) => Ok(serde_json::from_slice(buf)?),
            None => {
                let reader = self.open(wanted)?;
                Ok(serde_json::from_reader(reader)?)
            }
        }
    }
}
