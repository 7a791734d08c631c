// Capture time inferred from file names

use std::sync::OnceLock;

use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::NAME_TIME_FUTURE_TOLERANCE_HOURS;
use crate::error::{Result, TakeoutError};

/// Zone used to interpret wall-clock times found in file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NameZone {
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl NameZone {
    /// "Local", "UTC" or a fixed offset such as "+02:00".
    pub fn parse(s: &str) -> Result<Self> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("local") || t.is_empty() {
            return Ok(NameZone::Local);
        }
        if t.eq_ignore_ascii_case("utc") || t == "Z" {
            return Ok(NameZone::Utc);
        }
        t.parse::<FixedOffset>()
            .map(NameZone::Fixed)
            .map_err(|_| TakeoutError::Config(format!("unknown time zone: {}", s)))
    }

    pub fn resolve(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            NameZone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.with_timezone(&Utc)),
            NameZone::Utc => Some(Utc.from_utc_datetime(&naive)),
            NameZone::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

impl TryFrom<String> for NameZone {
    type Error = TakeoutError;

    fn try_from(s: String) -> Result<Self> {
        NameZone::parse(&s)
    }
}

impl From<NameZone> for String {
    fn from(z: NameZone) -> Self {
        match z {
            NameZone::Local => "Local".to_string(),
            NameZone::Utc => "UTC".to_string(),
            NameZone::Fixed(offset) => offset.to_string(),
        }
    }
}

fn time_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(19[89][0-9]|20[0-9][0-9])[^0-9]?(0[0-9]|1[0-2])[^0-9]?([0-3][0-9])[^0-9]?([01][0-9]|2[0-4])?[^0-9]?([0-5][0-9])?[^0-9]?([0-5][0-9])?",
        )
        .ok()
    })
    .as_ref()
}

/// Find a date (and optional time) in a file name: "20230922_144936",
/// "2023-09-22 14.49.36", "IMG-20230922-WA0001". Impossible calendar
/// moments and moments more than a day in the future yield `None`.
pub fn take_time_from_name(name: &str, zone: NameZone) -> Option<DateTime<Utc>> {
    let caps = time_re()?.captures(name)?;
    let num = |i: usize| -> u32 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    let date = NaiveDate::from_ymd_opt(num(1) as i32, num(2), num(3))?;
    let time = NaiveTime::from_hms_opt(num(4), num(5), num(6))?;
    let taken = zone.resolve(date.and_time(time))?;

    if taken - Utc::now() > Duration::hours(NAME_TIME_FUTURE_TOLERANCE_HOURS) {
        return None;
    }
    Some(taken)
}

/// Parse a fixed-layout stamp such as "20231207_101605" or "20171111030039".
pub(crate) fn parse_stamp(stamp: &str, layout: &str, zone: NameZone) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(stamp, layout).ok()?;
    zone.resolve(naive)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_take_time_from_name() {
        let z = NameZone::Utc;
        assert_eq!(take_time_from_name("PXL_20230922_144936660.jpg", z), Some(utc(2023, 9, 22, 14, 49, 36)));
        assert_eq!(take_time_from_name("2019-05-12 08.15.02.jpg", z), Some(utc(2019, 5, 12, 8, 15, 2)));
        assert_eq!(take_time_from_name("IMG-20200101-WA0003.jpg", z), Some(utc(2020, 1, 1, 0, 0, 0)));
        assert_eq!(take_time_from_name("Photos from 2023", z), None);
        assert_eq!(take_time_from_name("holiday.jpg", z), None);
    }

    #[test]
    fn test_invalid_calendar_moment_rejected() {
        let z = NameZone::Utc;
        assert_eq!(take_time_from_name("IMG_20230231_101010.jpg", z), None);
        assert_eq!(take_time_from_name("IMG_20230228_241010.jpg", z), None);
        assert_eq!(take_time_from_name("IMG_20230230.jpg", z), None);
    }

    #[test]
    fn test_future_time_rejected() {
        let later_year = Utc::now().format("%Y").to_string().parse::<i32>().unwrap() + 2;
        let name = format!("IMG_{}0101_101010.jpg", later_year);
        assert_eq!(take_time_from_name(&name, NameZone::Utc), None);
    }

    #[test]
    fn test_zone_parse() {
        assert_eq!(NameZone::parse("UTC").unwrap(), NameZone::Utc);
        assert_eq!(NameZone::parse("local").unwrap(), NameZone::Local);
        let fixed = NameZone::parse("+02:00").unwrap();
        let naive = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(fixed.resolve(naive), Some(utc(2023, 1, 1, 10, 0, 0)));
        assert!(NameZone::parse("Mars/Olympus").is_err());
    }
}
