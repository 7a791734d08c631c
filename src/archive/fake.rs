// In-memory archive for tests and dry runs
//
// A FakeFs is either built in code or loaded from an `unzip -l` listing:
//
//   Part: takeout-001.zip
//     2104348  07-20-2023 00:00   Takeout/Google Photos/2020 - Costa Rica/IMG_3235.MP4
//
// Listed media files read as zeros. Listed JSON files get synthesized
// sidecar content so that the whole pipeline can run on a listing alone.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{json, Value};

use super::{base_of, check_relative, clean_member, dir_of, Archive, ArchiveEntry, EntryIter};
use crate::constants::{ALBUM_METADATA_FILES, IGNORED_JSON_FILES, LISTING_DATE_FORMAT};
use crate::error::{Result, TakeoutError};
use crate::filenames::{take_time_from_name, NameZone};

enum Content {
    Bytes(Vec<u8>),
    Zeros,
}

struct FakeFile {
    size: u64,
    mtime: Option<DateTime<Utc>>,
    content: Content,
}

pub struct FakeFs {
    name: String,
    files: BTreeMap<String, FakeFile>,
}

impl FakeFs {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            files: BTreeMap::new(),
        }
    }

    pub fn add_file(&mut self, path: &str, bytes: &[u8]) -> &mut Self {
        self.insert(path, bytes.len() as u64, None, Content::Bytes(bytes.to_vec()))
    }

    /// A file of `size` zero bytes.
    pub fn add_sized(&mut self, path: &str, size: u64) -> &mut Self {
        self.insert(path, size, None, Content::Zeros)
    }

    pub fn add_json(&mut self, path: &str, value: &Value) -> &mut Self {
        let bytes = value.to_string().into_bytes();
        self.insert(path, bytes.len() as u64, None, Content::Bytes(bytes))
    }

    pub fn set_mtime(&mut self, path: &str, mtime: DateTime<Utc>) -> &mut Self {
        if let Some(f) = self.files.get_mut(&clean_member(path)) {
            f.mtime = Some(mtime);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn insert(&mut self, path: &str, size: u64, mtime: Option<DateTime<Utc>>, content: Content) -> &mut Self {
        self.files.insert(clean_member(path), FakeFile { size, mtime, content });
        self
    }

    // Listed entry: JSON files get plausible sidecar content
    fn add_listed(&mut self, path: &str, size: u64, mtime: Option<DateTime<Utc>>) {
        let base = base_of(path);
        if !base.to_lowercase().ends_with(".json") {
            self.insert(path, size, mtime, Content::Zeros);
            return;
        }

        let value = if ALBUM_METADATA_FILES.contains(&base) {
            album_json(base_of(dir_of(path)))
        } else if IGNORED_JSON_FILES.contains(&base) {
            json!({ "Nothing": "" })
        } else {
            let title = &base[..base.len() - ".json".len()];
            let taken = take_time_from_name(title, NameZone::Utc).or(mtime);
            photo_json(title, taken.map_or(0, |t| t.timestamp()))
        };
        let bytes = value.to_string().into_bytes();
        self.insert(path, bytes.len() as u64, mtime, Content::Bytes(bytes));
    }

    fn get(&self, path: &str) -> Result<&FakeFile> {
        check_relative(path)?;
        self.files
            .get(path)
            .ok_or_else(|| TakeoutError::NotFound(format!("{}:{}", self.name, path)))
    }
}

fn album_json(title: &str) -> Value {
    json!({
        "title": title,
        "description": "",
        "access": "",
        "date": { "timestamp": "0", "formatted": "1 janv. 1970, 00:00:00 UTC" },
        "geoData": {
            "latitude": 0.0, "longitude": 0.0, "altitude": 0.0,
            "latitudeSpan": 0.0, "longitudeSpan": 0.0
        }
    })
}

fn photo_json(title: &str, timestamp: i64) -> Value {
    let geo = json!({
        "latitude": 48.0, "longitude": 1.0, "altitude": 102.86,
        "latitudeSpan": 0.0, "longitudeSpan": 0.0
    });
    json!({
        "title": title,
        "description": "",
        "imageViews": "50",
        "creationTime": { "timestamp": timestamp.to_string() },
        "photoTakenTime": { "timestamp": timestamp.to_string() },
        "geoData": geo.clone(),
        "geoDataExif": geo,
        "url": "https://photos.google.com/photo/fake",
        "googlePhotosOrigin": { "webUpload": { "computerUpload": {} } }
    })
}

impl Archive for FakeFs {
    fn name(&self) -> &str {
        &self.name
    }

    fn walk(&self) -> Result<EntryIter<'_>> {
        Ok(Box::new(self.files.iter().map(|(path, f)| {
            Ok(ArchiveEntry {
                path: path.clone(),
                is_dir: false,
                size: f.size,
                mtime: f.mtime,
            })
        })))
    }

    fn stat(&self, path: &str) -> Result<ArchiveEntry> {
        let f = self.get(path)?;
        Ok(ArchiveEntry {
            path: path.to_string(),
            is_dir: false,
            size: f.size,
            mtime: f.mtime,
        })
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let f = self.get(path)?;
        Ok(match &f.content {
            Content::Bytes(b) => Box::new(Cursor::new(b.clone())),
            Content::Zeros => Box::new(std::io::repeat(0).take(f.size)),
        })
    }
}

fn listing_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(-rw-r--r-- 0/0\s+)?(\d+)\s+(.{16})\s+(.*)$").ok())
        .as_ref()
}

fn total_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+\s+\d+\s+files$").ok()).as_ref()
}

/// Parse `unzip -l` (or `tar -tvzf`) listings. "Part:" and "Archive:" lines
/// start a new archive; parts come back sorted by name.
pub fn parse_listing(text: &str) -> Result<Vec<FakeFs>> {
    let line_re = listing_re().ok_or_else(|| TakeoutError::Other("listing regex".to_string()))?;
    let total_re = total_re().ok_or_else(|| TakeoutError::Other("listing regex".to_string()))?;

    let mut parts: BTreeMap<String, FakeFs> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let header = line
            .strip_prefix("Part:")
            .or_else(|| line.strip_prefix("Archive:"));
        if let Some(name) = header {
            let name = name.trim().to_string();
            parts.entry(name.clone()).or_insert_with(|| FakeFs::new(&name));
            current = Some(name);
            continue;
        }
        if line.len() < 30 || total_re.is_match(line) {
            continue;
        }
        let Some(caps) = line_re.captures(line) else {
            continue;
        };
        let (Some(size), Some(date), Some(path)) = (caps.get(2), caps.get(3), caps.get(4)) else {
            continue;
        };
        let path = path.as_str().trim_end();
        if path.ends_with('/') || path.is_empty() {
            continue;
        }

        let part_name = current.get_or_insert_with(|| "listing".to_string()).clone();
        let fs = parts
            .entry(part_name.clone())
            .or_insert_with(|| FakeFs::new(&part_name));
        let size = size.as_str().parse::<u64>().unwrap_or(0);
        let mtime = NaiveDateTime::parse_from_str(date.as_str().trim(), LISTING_DATE_FORMAT)
            .ok()
            .map(|n| n.and_utc());
        fs.add_listed(path, size, mtime);
    }

    Ok(parts.into_values().collect())
}

pub fn load_listing(path: &Path) -> Result<Vec<FakeFs>> {
    let text = std::fs::read_to_string(path)?;
    let parts = parse_listing(&text)?;
    log::debug!("listing {} describes {} part(s)", path.display(), parts.len());
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Part: takeout-20230720T065335Z-001.zip
Archive:  takeout-20230720T065335Z-001.zip
  Length      Date    Time    Name
---------  ---------- -----   ----
        0  07-20-2023 00:00   Takeout/Google Photos/2020 - Costa Rica/
  2104348  07-20-2023 00:00   Takeout/Google Photos/2020 - Costa Rica/IMG_3235.MP4
      421  07-20-2023 00:00   Takeout/Google Photos/2020 - Costa Rica/IMG_3235.MP4.json
      301  07-20-2023 00:00   Takeout/Google Photos/2020 - Costa Rica/metadata.json
      230  07-20-2023 00:00   Takeout/Google Photos/print-subscriptions.json
---------                     -------
  2105300                     5 files
Part: takeout-20230720T065335Z-002.zip
     1000  07-21-2023 10:30   Takeout/Google Photos/Photos from 2020/PXL_20200104_111111111.jpg
";

    #[test]
    fn test_parse_listing() {
        let parts = parse_listing(LISTING).unwrap();
        assert_eq!(parts.len(), 2);
        let first = &parts[0];
        assert_eq!(first.name(), "takeout-20230720T065335Z-001.zip");
        assert_eq!(first.len(), 4);

        let mp4 = first.stat("Takeout/Google Photos/2020 - Costa Rica/IMG_3235.MP4").unwrap();
        assert_eq!(mp4.size, 2104348);
        assert_eq!(mp4.mtime.unwrap().timestamp(), 1_689_811_200);

        let album = first.read_json("Takeout/Google Photos/2020 - Costa Rica/metadata.json").unwrap();
        assert_eq!(album["title"], "2020 - Costa Rica");
        assert!(album.get("date").is_some());

        let photo = first
            .read_json("Takeout/Google Photos/2020 - Costa Rica/IMG_3235.MP4.json")
            .unwrap();
        assert_eq!(photo["title"], "IMG_3235.MP4");
        assert_eq!(photo["photoTakenTime"]["timestamp"], "1689811200");

        let ignored = first.read_json("Takeout/Google Photos/print-subscriptions.json").unwrap();
        assert_eq!(ignored, json!({ "Nothing": "" }));

        assert_eq!(parts[1].len(), 1);
    }

    #[test]
    fn test_media_reads_zeros() {
        let mut fs = FakeFs::new("mem");
        fs.add_sized("a/b.jpg", 5).add_file("a/c.txt", b"hello");
        let head = fs.read_head("a/b.jpg", 3).unwrap();
        assert_eq!(head, vec![0, 0, 0]);
        assert_eq!(fs.read_head("a/c.txt", 100).unwrap(), b"hello");
        assert!(fs.open("a/missing.jpg").is_err());
        assert!(fs.open("../etc/passwd").is_err());
    }

    #[test]
    fn test_walk_is_sorted() {
        let mut fs = FakeFs::new("mem");
        fs.add_sized("b/2.jpg", 1)
            .add_sized("a/1.jpg", 1)
            .add_json("a/1.jpg.json", &json!({"title": "1.jpg"}));
        let paths: Vec<String> = fs.walk().unwrap().map(|e| e.unwrap().path).collect();
        assert_eq!(paths, vec!["a/1.jpg", "a/1.jpg.json", "b/2.jpg"]);
    }
}
