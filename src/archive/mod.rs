// Read-only input file systems: zip, tar-gz, plain directories and fakes

pub mod dirfs;
pub mod fake;
pub mod targz;
pub mod zipfs;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Result, TakeoutError};
use crate::events::{EventCode, Recorder};

pub use dirfs::DirFs;
pub use fake::FakeFs;
pub use targz::TarGzFs;
pub use zipfs::ZipFs;

/// One entry of an archive walk. Paths are relative, '/'-separated.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
}

pub type EntryIter<'a> = Box<dyn Iterator<Item = Result<ArchiveEntry>> + 'a>;

/// Common read interface over every kind of input.
pub trait Archive: Send + Sync {
    /// Display name, used in events as "name:path".
    fn name(&self) -> &str;

    fn walk(&self) -> Result<EntryIter<'_>>;

    fn stat(&self, path: &str) -> Result<ArchiveEntry>;

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Read at most `limit` bytes from the start of an entry.
    fn read_head(&self, path: &str, limit: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(limit.min(64 * 1024));
        self.open(path)?.take(limit as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn read_json(&self, path: &str) -> Result<serde_json::Value> {
        let reader = self.open(path)?;
        Ok(serde_json::from_reader(reader)?)
    }
}

pub type ArchiveRef = Arc<dyn Archive>;

/// Open a command-line input. A listing file may describe several archive parts.
pub fn open_input(path: &Path) -> Result<Vec<ArchiveRef>> {
    if path.is_dir() {
        return Ok(vec![Arc::new(DirFs::open(path)?)]);
    }
    if !path.is_file() {
        return Err(TakeoutError::NotFound(path.display().to_string()));
    }

    let lower = path.to_string_lossy().to_lowercase();
    if lower.ends_with(".zip") {
        Ok(vec![Arc::new(ZipFs::open(path)?)])
    } else if lower.ends_with(".tgz") || lower.ends_with(".tar.gz") {
        Ok(vec![Arc::new(TarGzFs::open(path)?)])
    } else if lower.ends_with(".lst") || lower.ends_with(".txt") {
        let parts = fake::load_listing(path)?;
        Ok(parts.into_iter().map(|fs| Arc::new(fs) as ArchiveRef).collect())
    } else {
        Err(TakeoutError::InvalidPath(format!(
            "{}: expected a directory, .zip, .tgz, .tar.gz or listing file",
            path.display()
        )))
    }
}

/// Open every command-line input. An input that cannot be opened is
/// recorded as an error and skipped; only an empty result is fatal.
pub fn open_inputs<P: AsRef<Path>>(paths: &[P], recorder: &Recorder) -> Result<Vec<ArchiveRef>> {
    let mut archives = Vec::new();
    for path in paths {
        let path = path.as_ref();
        match open_input(path) {
            Ok(opened) => archives.extend(opened),
            Err(e) => {
                recorder.record(EventCode::Error, &path.display().to_string(), &[("error", &e.to_string())]);
            }
        }
    }
    if archives.is_empty() {
        return Err(TakeoutError::NotFound(format!("none of the {} input(s) could be opened", paths.len())));
    }
    Ok(archives)
}

/// Directory part of a '/'-separated path; "." for a bare name.
pub fn dir_of(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => ".",
    }
}

/// Last element of a '/'-separated path.
pub fn base_of(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Extension of the last path element including its dot, or "" when the
/// element has no dot.
pub fn ext_of(path: &str) -> &str {
    let base_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[base_start..].rfind('.') {
        Some(i) => &path[base_start + i..],
        None => "",
    }
}

/// `name` without its extension.
pub fn strip_ext(name: &str) -> &str {
    &name[..name.len() - ext_of(name).len()]
}

pub fn join(dir: &str, base: &str) -> String {
    if dir.is_empty() || dir == "." {
        base.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), base)
    }
}

/// Reject absolute paths and parent traversal in archive-relative paths.
pub(crate) fn check_relative(path: &str) -> Result<()> {
    if path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
        return Err(TakeoutError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Normalize an archive member name: '/' separators, no leading "./".
pub(crate) fn clean_member(name: &str) -> String {
    let name = name.replace('\\', "/");
    name.trim_start_matches("./").to_string()
}
