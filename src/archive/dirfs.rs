// Plain directory input

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use filetime::FileTime;
use walkdir::WalkDir;

use super::{check_relative, Archive, ArchiveEntry, EntryIter};
use crate::error::{Result, TakeoutError};

pub struct DirFs {
    root: PathBuf,
    name: String,
}

impl DirFs {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(TakeoutError::InvalidPath(format!("not a directory: {}", root.display())));
        }
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root.display().to_string());
        Ok(Self { root, name })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        check_relative(path)?;
        Ok(self.root.join(path))
    }

    fn entry_for(&self, full: &Path, meta: &fs::Metadata) -> Option<ArchiveEntry> {
        let rel = full.strip_prefix(&self.root).ok()?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if rel.is_empty() {
            return None;
        }
        Some(ArchiveEntry {
            path: rel,
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
            mtime: modification_time(meta),
        })
    }
}

fn modification_time(meta: &fs::Metadata) -> Option<DateTime<Utc>> {
    let ft = FileTime::from_last_modification_time(meta);
    Utc.timestamp_opt(ft.unix_seconds(), ft.nanoseconds()).single()
}

impl Archive for DirFs {
    fn name(&self) -> &str {
        &self.name
    }

    fn walk(&self) -> Result<EntryIter<'_>> {
        let iter = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |e| {
                let entry = match e {
                    Ok(entry) => entry,
                    Err(err) => return Some(Err(TakeoutError::Io(err.into()))),
                };
                let meta = match entry.metadata() {
                    Ok(m) => m,
                    Err(err) => return Some(Err(TakeoutError::Io(err.into()))),
                };
                self.entry_for(entry.path(), &meta).map(Ok)
            });
        Ok(Box::new(iter))
    }

    fn stat(&self, path: &str) -> Result<ArchiveEntry> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full)
            .map_err(|_| TakeoutError::NotFound(format!("{}:{}", self.name, path)))?;
        self.entry_for(&full, &meta)
            .ok_or_else(|| TakeoutError::InvalidPath(path.to_string()))
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let full = self.resolve(path)?;
        Ok(Box::new(File::open(full)?))
    }
}
