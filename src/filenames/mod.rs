// Filename analyzer: identity and capture time derived from a basename

pub mod device;
pub mod time;

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::archive::{base_of, ext_of, strip_ext};
use crate::constants::EDITED_SUFFIXES;
use crate::media::{is_motion_ext, MediaType, SupportedMedia};

pub use time::{take_time_from_name, NameZone};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NameKind {
    Regular,
    Burst,
    LivePhoto,
    Edited,
    Cover,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameInfo {
    pub base: String,
    /// Stem with burst, counter, edit and motion suffixes removed.
    pub radical: String,
    /// "(N)" counter or burst sequence number, 0 when absent.
    pub index: u32,
    /// Lowercase, with leading dot.
    pub ext: String,
    pub kind: NameKind,
    pub is_cover: bool,
    pub burst_id: Option<String>,
    pub media: MediaType,
    pub taken: Option<DateTime<Utc>>,
}

impl NameInfo {
    /// Rebuild a regular name from its parts.
    pub fn reconstructed(&self) -> String {
        let counter = if self.index > 0 {
            format!("({})", self.index)
        } else {
            String::new()
        };
        format!("{}{}{}", self.radical, counter, ext_of(&self.base))
    }
}

/// True when `s` holds Google's motion photo marker ".MP" or ".MP~N".
pub(crate) fn has_motion_marker(s: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\.MP(~[0-9]+)?(\.|$)").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(s))
}

/// Strip a trailing ".MP" / ".MP~N" marker from a stem.
pub fn strip_motion_marker(stem: &str) -> Option<&str> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r"(?i)^(.*)\.MP(~[0-9]+)?$").ok())
        .as_ref()?;
    re.captures(stem).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Split a trailing "(N)" counter: "IMG_3479(2)" -> ("IMG_3479", 2).
pub fn split_counter(stem: &str) -> (&str, u32) {
    if let Some(open) = stem.rfind('(') {
        if stem.ends_with(')') && open + 1 < stem.len() - 1 {
            if let Ok(n) = stem[open + 1..stem.len() - 1].parse::<u32>() {
                return (&stem[..open], n);
            }
        }
    }
    (stem, 0)
}

fn strip_edited_suffix(stem: &str) -> Option<&str> {
    let lower = stem.to_lowercase();
    EDITED_SUFFIXES.iter().find_map(|sfx| {
        if lower.ends_with(sfx) && lower.len() == stem.len() {
            stem.get(..stem.len() - sfx.len())
        } else {
            None
        }
    })
}

/// Pure basename analyzer. Same input, same `NameInfo`.
#[derive(Debug, Clone)]
pub struct NameAnalyzer {
    media: SupportedMedia,
    zone: NameZone,
}

impl NameAnalyzer {
    pub fn new(media: SupportedMedia, zone: NameZone) -> Self {
        Self { media, zone }
    }

    pub fn media(&self) -> &SupportedMedia {
        &self.media
    }

    pub fn zone(&self) -> NameZone {
        self.zone
    }

    pub fn analyze(&self, name: &str) -> NameInfo {
        let base = base_of(name);
        for recognize in device::RECOGNIZERS {
            if let Some(info) = recognize(base, &self.media, self.zone) {
                return info;
            }
        }
        self.default_info(base)
    }

    fn default_info(&self, base: &str) -> NameInfo {
        let ext = ext_of(base);
        let mut stem = strip_ext(base);
        let mut kind = NameKind::Regular;
        let mut is_cover = false;

        if is_motion_ext(ext) {
            kind = NameKind::LivePhoto;
        } else if let Some(s) = strip_motion_marker(stem) {
            stem = s;
            kind = NameKind::LivePhoto;
        }

        let (without_counter, index) = split_counter(stem);
        stem = without_counter;

        if let Some(s) = strip_edited_suffix(stem) {
            stem = s;
            kind = NameKind::Edited;
        } else if kind == NameKind::Regular && stem.to_uppercase().ends_with(".COVER") {
            stem = &stem[..stem.len() - ".COVER".len()];
            kind = NameKind::Cover;
            is_cover = true;
        }

        NameInfo {
            base: base.to_string(),
            radical: stem.to_string(),
            index,
            ext: ext.to_lowercase(),
            kind,
            is_cover,
            burst_id: None,
            media: self.media.type_of(ext),
            taken: take_time_from_name(base, self.zone),
        }
    }
}
