// Zip archive input (one part of a Google Takeout export)

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use zip::ZipArchive;

use super::{clean_member, Archive, ArchiveEntry, EntryIter};
use crate::constants::{TEMP_FILE_PREFIX, TEMP_FILE_SUFFIX};
use crate::error::{Result, TakeoutError};

pub struct ZipFs {
    name: String,
    archive: Mutex<ZipArchive<File>>,
    entries: Vec<ArchiveEntry>,
    // cleaned path -> raw member name
    members: HashMap<String, String>,
}

impl ZipFs {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut members = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let member = archive.by_index(i)?;
            let raw = member.name().to_string();
            let path = clean_member(&raw).trim_end_matches('/').to_string();
            if path.is_empty() {
                continue;
            }
            entries.push(ArchiveEntry {
                path: path.clone(),
                is_dir: member.is_dir(),
                size: member.size(),
                mtime: zip_time(member.last_modified()),
            });
            members.insert(path, raw);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        log::debug!("opened zip {} with {} entries", name, entries.len());

        Ok(Self {
            name,
            archive: Mutex::new(archive),
            entries,
            members,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ZipArchive<File>>> {
        self.archive
            .lock()
            .map_err(|_| TakeoutError::Archive(format!("{}: archive lock poisoned", self.name)))
    }

    fn member(&self, path: &str) -> Result<&str> {
        self.members
            .get(path.trim_start_matches("./"))
            .map(|s| s.as_str())
            .ok_or_else(|| TakeoutError::NotFound(format!("{}:{}", self.name, path)))
    }
}

fn zip_time(dt: zip::DateTime) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(dt.year() as i32, dt.month() as u32, dt.day() as u32)
        .and_then(|d| d.and_hms_opt(dt.hour() as u32, dt.minute() as u32, dt.second() as u32))
        .map(|naive| naive.and_utc())
}

impl Archive for ZipFs {
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

    /// Zip members borrow the archive, so the entry is spooled into an
    /// anonymous temp file that is removed when the reader is dropped.
    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let member = self.member(path)?;
        let mut archive = self.lock()?;
        let mut entry = archive.by_name(member)?;
        let mut spool = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(TEMP_FILE_SUFFIX)
            .tempfile()?
            .into_file();
        std::io::copy(&mut entry, &mut spool)?;
        spool.seek(SeekFrom::Start(0))?;
        Ok(Box::new(spool))
    }

    fn read_head(&self, path: &str, limit: usize) -> Result<Vec<u8>> {
        let member = self.member(path)?;
        let mut archive = self.lock()?;
        let entry = archive.by_name(member)?;
        let mut buf = Vec::new();
        entry.take(limit as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn read_json(&self, path: &str) -> Result<serde_json::Value> {
        let member = self.member(path)?;
        let mut archive = self.lock()?;
        let mut entry = archive.by_name(member)?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        Ok(serde_json::from_slice(&buf)?)
    }
}
