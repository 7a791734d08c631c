// Camera and phone naming schemes
//
//   Pixel          PXL_20231207_032111247.RAW-01.MP.COVER.jpg
//   Samsung burst  20231207_101605_001.jpg (001 is the cover)
//   Nexus burst    00015IMG_00015_BURST20171111030039_COVER.jpg
//   Huawei burst   IMG_20231014_183246_BURST001_COVER.jpg
//   Xperia burst   DSC_0001_BURST20230709220904977.JPG
//   any burst      <radical>_BURST007[_COVER].jpg

use std::sync::OnceLock;

use chrono::{TimeZone, Utc};
use regex::Regex;

use super::time::{parse_stamp, NameZone};
use super::{has_motion_marker, NameInfo, NameKind};
use crate::media::SupportedMedia;

type Recognizer = fn(&str, &SupportedMedia, NameZone) -> Option<NameInfo>;

pub(super) const RECOGNIZERS: [Recognizer; 6] = [pixel, samsung, nexus, huawei, sony_xperia, generic_burst];

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn base_info(name: &str, radical: &str, ext: &str, media: &SupportedMedia) -> NameInfo {
    NameInfo {
        base: name.to_string(),
        radical: radical.to_string(),
        index: 0,
        ext: ext.to_lowercase(),
        kind: NameKind::Regular,
        is_cover: false,
        burst_id: None,
        media: media.type_of(ext),
        taken: None,
    }
}

fn pixel(name: &str, media: &SupportedMedia, _zone: NameZone) -> Option<NameInfo> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let caps = cached(&RE, r"^(PXL_[0-9]{8}_[0-9]{9})((.*)?([0-9]{2}))?(.*)?(\..*)$")?.captures(name)?;
    let radical = caps.get(1)?.as_str();
    let middle = caps.get(3).map_or("", |m| m.as_str());
    let tail = caps.get(5).map_or("", |m| m.as_str());
    let ext = caps.get(6)?.as_str();

    let mut info = base_info(name, radical, ext, media);
    info.index = caps.get(4).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    info.is_cover = tail.ends_with("COVER");
    info.kind = if has_motion_marker(middle) || has_motion_marker(tail) || crate::media::is_motion_ext(ext) {
        NameKind::LivePhoto
    } else if info.is_cover {
        NameKind::Cover
    } else {
        NameKind::Regular
    };
    // Pixel names carry UTC with milliseconds
    info.taken = parse_stamp(radical.get(4..22)?, "%Y%m%d_%H%M%S%3f", NameZone::Utc);
    Some(info)
}

fn samsung(name: &str, media: &SupportedMedia, zone: NameZone) -> Option<NameInfo> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let caps = cached(&RE, r"^([0-9]{8}_[0-9]{6})_([0-9]{3})(\..+)$")?.captures(name)?;
    let radical = caps.get(1)?.as_str();

    let mut info = base_info(name, radical, caps.get(3)?.as_str(), media);
    info.kind = NameKind::Burst;
    info.index = caps.get(2)?.as_str().parse().ok()?;
    info.is_cover = info.index == 1;
    info.burst_id = Some(radical.to_string());
    info.taken = parse_stamp(radical, "%Y%m%d_%H%M%S", zone);
    Some(info)
}

fn nexus(name: &str, media: &SupportedMedia, zone: NameZone) -> Option<NameInfo> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let caps = cached(&RE, r"^([0-9]+)[^0-9]+_[0-9]+_(BURST[0-9]+)([^0-9]+)?(\..+)$")?.captures(name)?;
    let radical = caps.get(2)?.as_str();

    let mut info = base_info(name, radical, caps.get(4)?.as_str(), media);
    info.kind = NameKind::Burst;
    info.index = caps.get(1)?.as_str().parse().ok()?;
    info.is_cover = caps.get(3).map_or(false, |m| m.as_str().contains("COVER"));
    info.burst_id = Some(radical.to_string());

    let stamp = &radical["BURST".len()..];
    info.taken = match stamp.len() {
        14 => parse_stamp(stamp, "%Y%m%d%H%M%S", zone),
        // Nothing phones write unix milliseconds
        13 => stamp.parse::<i64>().ok().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        17 => parse_stamp(stamp, "%Y%m%d%H%M%S%3f", zone),
        _ => None,
    };
    Some(info)
}

fn huawei(name: &str, media: &SupportedMedia, zone: NameZone) -> Option<NameInfo> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let caps = cached(&RE, r"^(IMG_[0-9]{8}_[0-9]{6})_BURST([0-9]{3})(?:_(\w+))?(\..+)$")?.captures(name)?;
    let radical = caps.get(1)?.as_str();

    let mut info = base_info(name, radical, caps.get(4)?.as_str(), media);
    info.kind = NameKind::Burst;
    info.index = caps.get(2)?.as_str().parse().ok()?;
    info.is_cover = caps.get(3).map_or(false, |m| m.as_str().ends_with("COVER"));
    info.burst_id = Some(radical.to_string());
    info.taken = parse_stamp(radical.get(4..19)?, "%Y%m%d_%H%M%S", zone);
    Some(info)
}

fn sony_xperia(name: &str, media: &SupportedMedia, zone: NameZone) -> Option<NameInfo> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let caps = cached(&RE, r"^DSC_([0-9]+)_BURST([0-9]+)([^0-9]+)?(\..+)$")?.captures(name)?;
    let stamp = caps.get(2)?.as_str();
    let radical = format!("BURST{}", stamp);

    let mut info = base_info(name, &radical, caps.get(4)?.as_str(), media);
    info.kind = NameKind::Burst;
    info.index = caps.get(1)?.as_str().parse().ok()?;
    info.is_cover = caps.get(3).map_or(false, |m| m.as_str().contains("COVER"));
    info.burst_id = Some(radical);
    info.taken = stamp.get(..17).and_then(|s| parse_stamp(s, "%Y%m%d%H%M%S%3f", zone));
    Some(info)
}

fn generic_burst(name: &str, media: &SupportedMedia, zone: NameZone) -> Option<NameInfo> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let caps = cached(&RE, r"(?i)^(.+)_BURST([0-9]+)(_COVER)?(\.[^.]+)$")?.captures(name)?;
    let radical = caps.get(1)?.as_str();

    let mut info = base_info(name, radical, caps.get(4)?.as_str(), media);
    info.kind = NameKind::Burst;
    info.index = caps.get(2)?.as_str().parse().ok()?;
    info.is_cover = caps.get(3).is_some();
    info.burst_id = Some(radical.to_string());
    info.taken = super::time::take_time_from_name(radical, zone);
    Some(info)
}
