// Import options: defaults, JSON config file, validation

use std::path::Path;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::banned::BannedFiles;
use crate::constants::{DEFAULT_BURST_INTERVAL_MS, DEFAULT_SERIES_PAIR_WINDOW_MS};
use crate::error::{Result, TakeoutError};
use crate::filenames::NameZone;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Attach album memberships to emitted assets.
    pub create_albums: bool,
    /// Only emit assets belonging to this album.
    pub import_from_album: Option<String>,
    /// Put every emitted asset into this album.
    pub import_into_album: Option<String>,
    /// Put partner-shared assets into this album.
    pub partner_shared_album: Option<String>,
    pub keep_trashed: bool,
    pub keep_partner: bool,
    pub keep_untitled_albums: bool,
    pub keep_archived: bool,
    /// Emit files for which no sidecar was found.
    pub keep_json_less: bool,
    pub banned_files: BannedFiles,
    pub date_range: DateRange,
    pub tags: Vec<String>,
    pub session_tag: bool,
    pub takeout_tag: bool,
    pub people_tag: bool,
    pub manage_burst: bool,
    pub manage_epson_fastfoto: bool,
    pub burst_interval_ms: i64,
    pub series_pair_window_ms: i64,
    pub time_zone: NameZone,
    /// Use the current time when no other capture date is known.
    pub fallback_to_now: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            create_albums: true,
            import_from_album: None,
            import_into_album: None,
            partner_shared_album: None,
            keep_trashed: false,
            keep_partner: true,
            keep_untitled_albums: false,
            keep_archived: true,
            keep_json_less: false,
            banned_files: BannedFiles::default(),
            date_range: DateRange::default(),
            tags: Vec::new(),
            session_tag: false,
            takeout_tag: true,
            people_tag: true,
            manage_burst: true,
            manage_epson_fastfoto: false,
            burst_interval_ms: DEFAULT_BURST_INTERVAL_MS,
            series_pair_window_ms: DEFAULT_SERIES_PAIR_WINDOW_MS,
            time_zone: NameZone::default(),
            fallback_to_now: true,
        }
    }
}

impl ImportOptions {
    /// Load options from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TakeoutError::Config(format!("{}: {}", path.display(), e)))?;
        let options: ImportOptions = serde_json::from_str(&text)
            .map_err(|e| TakeoutError::Config(format!("{}: {}", path.display(), e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.burst_interval_ms <= 0 {
            return Err(TakeoutError::Config("burst_interval_ms must be positive".to_string()));
        }
        if self.series_pair_window_ms < 0 {
            return Err(TakeoutError::Config("series_pair_window_ms must not be negative".to_string()));
        }
        if let Some(album) = &self.import_from_album {
            if album.trim().is_empty() {
                return Err(TakeoutError::Config("import_from_album is empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Half-open capture date interval. An empty range accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateRange {
    text: String,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
}

impl DateRange {
    /// "2023", "2023-09", "2023-09-22", or "first,last" made of those.
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        if text.is_empty() {
            return Ok(Self::default());
        }
        let (first, last) = match text.split_once(',') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (text, text),
        };
        let (after, _) = period(first)?;
        let (_, before) = period(last)?;
        if before <= after {
            return Err(TakeoutError::Config(format!("empty date range: {}", s)));
        }
        Ok(Self {
            text: text.to_string(),
            after: Some(after),
            before: Some(before),
        })
    }

    pub fn is_set(&self) -> bool {
        self.after.is_some() || self.before.is_some()
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.after.map_or(true, |a| t >= a) && self.before.map_or(true, |b| t < b)
    }
}

// Start and exclusive end of the period named by "YYYY", "YYYY-MM" or "YYYY-MM-DD"
fn period(s: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let bad = || TakeoutError::Config(format!("invalid date: {}", s));
    let parts: Vec<&str> = s.split('-').collect();
    let nums: Vec<u32> = parts
        .iter()
        .map(|p| p.parse::<u32>().map_err(|_| bad()))
        .collect::<Result<_>>()?;

    let (start, end) = match nums.as_slice() {
        [y] => {
            let start = NaiveDate::from_ymd_opt(*y as i32, 1, 1).ok_or_else(bad)?;
            let end = NaiveDate::from_ymd_opt(*y as i32 + 1, 1, 1).ok_or_else(bad)?;
            (start, end)
        }
        [y, m] => {
            let start = NaiveDate::from_ymd_opt(*y as i32, *m, 1).ok_or_else(bad)?;
            let end = if *m == 12 {
                NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(start.year(), *m + 1, 1)
            }
            .ok_or_else(bad)?;
            (start, end)
        }
        [y, m, d] => {
            let start = NaiveDate::from_ymd_opt(*y as i32, *m, *d).ok_or_else(bad)?;
            (start, start + Duration::days(1))
        }
        _ => return Err(bad()),
    };

    let at_midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    Ok((at_midnight(start).ok_or_else(bad)?, at_midnight(end).ok_or_else(bad)?))
}

impl TryFrom<String> for DateRange {
    type Error = TakeoutError;

    fn try_from(s: String) -> Result<Self> {
        DateRange::parse(&s)
    }
}

impl From<DateRange> for String {
    fn from(r: DateRange) -> Self {
        r.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let o = ImportOptions::default();
        assert!(!o.keep_trashed);
        assert!(o.keep_partner);
        assert!(o.keep_archived);
        assert!(!o.keep_untitled_albums);
        assert!(!o.keep_json_less);
        assert_eq!(o.burst_interval_ms, 250);
        assert!(o.banned_files.is_banned("x/@eaDir/a.jpg"));
        assert!(o.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut f = NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"keep_json_less": true, "date_range": "2023-09", "banned_files": ["*.tmp"], "time_zone": "UTC"}}"#
        )
        .unwrap();
        let o = ImportOptions::load(f.path()).unwrap();
        assert!(o.keep_json_less);
        assert!(o.keep_partner);
        assert_eq!(o.time_zone, NameZone::Utc);
        assert!(o.banned_files.is_banned("a/b.TMP"));
        assert!(!o.banned_files.is_banned("x/@eaDir/a.jpg"));
        assert!(o.date_range.contains(Utc.with_ymd_and_hms(2023, 9, 30, 23, 0, 0).unwrap()));
        assert!(!o.date_range.contains(Utc.with_ymd_and_hms(2023, 10, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, r#"{{"burst_interval_ms": 0}}"#).unwrap();
        assert!(ImportOptions::load(f.path()).is_err());

        let mut f = NamedTempFile::new().unwrap();
        write!(f, r#"{{"date_range": "2023-13"}}"#).unwrap();
        assert!(ImportOptions::load(f.path()).is_err());
    }

    #[test]
    fn test_date_range() {
        let r = DateRange::parse("2022,2023-02").unwrap();
        assert!(r.contains(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()));
        assert!(r.contains(Utc.with_ymd_and_hms(2023, 2, 28, 12, 0, 0).unwrap()));
        assert!(!r.contains(Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap()));
        assert!(!r.contains(Utc.with_ymd_and_hms(2021, 12, 31, 0, 0, 0).unwrap()));

        let day = DateRange::parse("2023-12-31").unwrap();
        assert!(day.contains(Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()));
        assert!(DateRange::parse("2023-12").unwrap().contains(Utc.with_ymd_and_hms(2023, 12, 5, 0, 0, 0).unwrap()));

        assert!(!DateRange::default().is_set());
        assert!(DateRange::default().contains(Utc::now()));
        assert!(DateRange::parse("2024,2023").is_err());
        assert!(DateRange::parse("yesterday").is_err());
    }
}
