// Google Photos sidecar JSON reader
//
// Keys are matched case-insensitively: the value tree is lowercased first,
// then deserialized into one internal shape. The legacy `albumData` wrapper
// is folded into the top level here and never seen past this module.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TakeoutError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl GeoPoint {
    pub fn is_zero(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}

/// Normalized asset sidecar.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetMetadata {
    pub title: String,
    pub description: String,
    /// `photoTakenTime`; `None` for "" and "0".
    pub taken: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub geo_exif: GeoPoint,
    pub geo_fallback: GeoPoint,
    pub archived: bool,
    pub trashed: bool,
    pub favorited: bool,
    pub partner_shared: bool,
    pub from_shared_album: bool,
    pub people: Vec<String>,
    /// Directories holding a copy of this sidecar, sorted.
    pub found_in_paths: Vec<String>,
}

impl AssetMetadata {
    /// Exif position when set, the fallback block otherwise.
    pub fn position(&self) -> GeoPoint {
        if !self.geo_exif.is_zero() {
            self.geo_exif
        } else {
            self.geo_fallback
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Album {
    pub title: String,
    /// Base name of the album directory.
    pub path: String,
    pub description: String,
    pub lat: f64,
    pub lon: f64,
}

impl Album {
    pub fn has_position(&self) -> bool {
        self.lat != 0.0 || self.lon != 0.0
    }
}

#[derive(Debug, Clone)]
pub enum Sidecar {
    Asset(AssetMetadata),
    Album(Album),
    /// Neither shape: print orders, comments, etc.
    Unknown,
}

// ----------------------------------------------------------------------------
// Raw shapes, keys lowercased
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSidecar {
    title: Option<String>,
    description: Option<String>,
    date: Option<Value>,
    #[serde(rename = "phototakentime")]
    photo_taken_time: Option<RawTime>,
    #[serde(rename = "creationtime")]
    creation_time: Option<RawTime>,
    #[serde(rename = "geodata")]
    geo_data: Option<RawGeo>,
    #[serde(rename = "geodataexif")]
    geo_data_exif: Option<RawGeo>,
    url: Option<Value>,
    trashed: Option<bool>,
    archived: Option<bool>,
    favorited: Option<bool>,
    #[serde(rename = "googlephotosorigin")]
    origin: Option<Map<String, Value>>,
    enrichments: Option<Vec<RawEnrichment>>,
    people: Option<Vec<RawPerson>>,
    #[serde(rename = "albumdata")]
    album_data: Option<Box<RawSidecar>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTime {
    timestamp: Option<Value>,
}

impl RawTime {
    fn text(&self) -> String {
        match &self.timestamp {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    fn time(&self) -> Option<DateTime<Utc>> {
        let secs = self.text().parse::<i64>().ok()?;
        if secs == 0 {
            return None;
        }
        Utc.timestamp_opt(secs, 0).single()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGeo {
    #[serde(alias = "lat")]
    latitude: Option<f64>,
    #[serde(alias = "lon")]
    longitude: Option<f64>,
    #[serde(alias = "alt")]
    altitude: Option<f64>,
}

impl RawGeo {
    fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude.unwrap_or(0.0),
            lon: self.longitude.unwrap_or(0.0),
            alt: self.altitude.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEnrichment {
    #[serde(rename = "narrativeenrichment")]
    narrative: Option<RawNarrative>,
    #[serde(rename = "locationenrichment")]
    location: Option<RawLocationEnrichment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNarrative {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLocationEnrichment {
    location: Vec<RawLocation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLocation {
    name: Option<String>,
    description: Option<String>,
    #[serde(rename = "latitudee7")]
    latitude_e7: Option<i64>,
    #[serde(rename = "longitudee7")]
    longitude_e7: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPerson {
    name: Option<String>,
}

impl RawSidecar {
    // Fill fields missing at the top level from the legacy wrapper
    fn unify(mut self) -> Self {
        let Some(inner) = self.album_data.take() else {
            return self;
        };
        let inner = inner.unify();
        self.title = self.title.or(inner.title);
        self.description = self.description.or(inner.description);
        self.date = self.date.or(inner.date);
        self.photo_taken_time = self.photo_taken_time.or(inner.photo_taken_time);
        self.creation_time = self.creation_time.or(inner.creation_time);
        self.geo_data = self.geo_data.or(inner.geo_data);
        self.geo_data_exif = self.geo_data_exif.or(inner.geo_data_exif);
        self.url = self.url.or(inner.url);
        self.trashed = self.trashed.or(inner.trashed);
        self.archived = self.archived.or(inner.archived);
        self.favorited = self.favorited.or(inner.favorited);
        self.origin = self.origin.or(inner.origin);
        self.enrichments = self.enrichments.or(inner.enrichments);
        self.people = self.people.or(inner.people);
        self
    }

    fn is_asset(&self) -> bool {
        self.photo_taken_time
            .as_ref()
            .map_or(false, |t| !t.text().is_empty())
    }

    fn is_album(&self) -> bool {
        self.date.is_some()
    }

    fn origin_flag(&self, key: &str) -> bool {
        self.origin
            .as_ref()
            .and_then(|o| o.get(key))
            .map_or(false, |v| !v.is_null())
    }

    fn into_asset(self) -> AssetMetadata {
        let partner_shared = self.origin_flag("frompartnersharing");
        let from_shared_album = self.origin_flag("fromsharedalbum");
        AssetMetadata {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            taken: self.photo_taken_time.as_ref().and_then(RawTime::time),
            created: self.creation_time.as_ref().and_then(RawTime::time),
            geo_exif: self.geo_data_exif.as_ref().map(RawGeo::point).unwrap_or_default(),
            geo_fallback: self.geo_data.as_ref().map(RawGeo::point).unwrap_or_default(),
            archived: self.archived.unwrap_or(false),
            trashed: self.trashed.unwrap_or(false),
            favorited: self.favorited.unwrap_or(false),
            partner_shared,
            from_shared_album,
            people: self
                .people
                .unwrap_or_default()
                .into_iter()
                .filter_map(|p| p.name)
                .filter(|n| !n.trim().is_empty())
                .collect(),
            found_in_paths: Vec::new(),
        }
    }

    fn into_album(self) -> Album {
        let geo = self.geo_data.as_ref().map(RawGeo::point).unwrap_or_default();
        let mut album = Album {
            title: self.title.unwrap_or_default(),
            path: String::new(),
            description: self.description.unwrap_or_default(),
            lat: geo.lat,
            lon: geo.lon,
        };

        for e in self.enrichments.unwrap_or_default() {
            if let Some(text) = e.narrative.and_then(|n| n.text).filter(|t| !t.is_empty()) {
                append(&mut album.description, "\n", &text);
            }
            for loc in e.location.map(|l| l.location).unwrap_or_default() {
                if let Some(name) = loc.name.filter(|n| !n.is_empty()) {
                    append(&mut album.description, "\n", &name);
                }
                if let Some(desc) = loc.description.filter(|d| !d.is_empty()) {
                    append(&mut album.description, " - ", &desc);
                }
                if geo.is_zero() {
                    if let (Some(lat), Some(lon)) = (loc.latitude_e7, loc.longitude_e7) {
                        album.lat = lat as f64 / 1e7;
                        album.lon = lon as f64 / 1e7;
                    }
                }
            }
        }
        album
    }
}

fn append(s: &mut String, sep: &str, t: &str) {
    if !s.is_empty() {
        s.push_str(sep);
    }
    s.push_str(t);
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), lowercase_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Classify and normalize one sidecar. An asset sidecar wins when the JSON
/// carries both shapes.
pub fn parse_sidecar(value: Value) -> Result<Sidecar> {
    if !value.is_object() {
        return Ok(Sidecar::Unknown);
    }
    let raw: RawSidecar = serde_json::from_value(lowercase_keys(value))
        .map_err(|e| TakeoutError::Sidecar(e.to_string()))?;
    let raw = raw.unify();

    if raw.is_asset() {
        Ok(Sidecar::Asset(raw.into_asset()))
    } else if raw.is_album() {
        Ok(Sidecar::Album(raw.into_album()))
    } else {
        Ok(Sidecar::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn asset(v: Value) -> AssetMetadata {
        match parse_sidecar(v).unwrap() {
            Sidecar::Asset(a) => a,
            other => panic!("expected asset, got {:?}", other),
        }
    }

    fn album(v: Value) -> Album {
        match parse_sidecar(v).unwrap() {
            Sidecar::Album(a) => a,
            other => panic!("expected album, got {:?}", other),
        }
    }

    #[test]
    fn test_asset_sidecar() {
        let md = asset(json!({
            "title": "PXL_20230922_144936660.jpg",
            "description": "at the beach",
            "photoTakenTime": { "timestamp": "1695394176", "formatted": "22 sept. 2023" },
            "geoData": { "latitude": 48.1, "longitude": 1.2, "altitude": 10.0 },
            "geoDataExif": { "latitude": 0.0, "longitude": 0.0, "altitude": 0.0 },
            "url": "https://photos.google.com/photo/x",
            "favorited": true,
            "googlePhotosOrigin": { "fromPartnerSharing": {} },
            "people": [{ "name": "Alice" }, { "name": "" }]
        }));
        assert_eq!(md.title, "PXL_20230922_144936660.jpg");
        assert_eq!(md.taken.unwrap().timestamp(), 1_695_394_176);
        assert!(md.geo_exif.is_zero());
        assert_eq!(md.position().lat, 48.1);
        assert!(md.favorited);
        assert!(md.partner_shared);
        assert!(!md.from_shared_album);
        assert!(!md.trashed);
        assert_eq!(md.people, vec!["Alice".to_string()]);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let md = asset(json!({
            "Title": "a.jpg",
            "PHOTOTAKENTIME": { "Timestamp": 1695394176 },
            "GeoDataExif": { "Lat": 45.5, "Lon": 3.25, "Alt": 1.0 },
            "Trashed": true
        }));
        assert_eq!(md.title, "a.jpg");
        assert_eq!(md.taken.unwrap().timestamp(), 1_695_394_176);
        assert_eq!(md.position(), GeoPoint { lat: 45.5, lon: 3.25, alt: 1.0 });
        assert!(md.trashed);
    }

    #[test]
    fn test_zero_timestamp_is_still_an_asset() {
        let md = asset(json!({ "title": "a.jpg", "photoTakenTime": { "timestamp": "0" } }));
        assert!(md.taken.is_none());

        let md = parse_sidecar(json!({ "title": "a.jpg", "photoTakenTime": { "timestamp": "" } })).unwrap();
        assert!(matches!(md, Sidecar::Unknown));
    }

    #[test]
    fn test_album_sidecar_with_enrichments() {
        let a = album(json!({
            "title": "Costa Rica",
            "description": "",
            "date": { "timestamp": "1577836800" },
            "geoData": { "latitude": 0.0, "longitude": 0.0 },
            "enrichments": [
                { "narrativeEnrichment": { "text": "Day one" } },
                { "locationEnrichment": { "location": [
                    { "name": "San José", "description": "Costa Rica", "latitudeE7": 99325000, "longitudeE7": -840800000 }
                ] } }
            ]
        }));
        assert_eq!(a.title, "Costa Rica");
        assert_eq!(a.description, "Day one\nSan José - Costa Rica");
        assert!((a.lat - 9.9325).abs() < 1e-9);
        assert!((a.lon + 84.08).abs() < 1e-9);
    }

    #[test]
    fn test_legacy_album_data_wrapper() {
        let a = album(json!({
            "albumData": {
                "title": "Vacances",
                "date": { "timestamp": "0" },
                "geoData": { "latitude": 43.3, "longitude": 5.4 }
            }
        }));
        assert_eq!(a.title, "Vacances");
        assert!(a.has_position());
    }

    #[test]
    fn test_asset_wins_over_album() {
        let md = parse_sidecar(json!({
            "title": "a.jpg",
            "date": { "timestamp": "1" },
            "photoTakenTime": { "timestamp": "1695394176" }
        }))
        .unwrap();
        assert!(matches!(md, Sidecar::Asset(_)));
    }

    #[test]
    fn test_unknown_shapes() {
        assert!(matches!(parse_sidecar(json!({ "Nothing": "" })).unwrap(), Sidecar::Unknown));
        assert!(matches!(parse_sidecar(json!([1, 2])).unwrap(), Sidecar::Unknown));
        assert!(parse_sidecar(json!({ "title": 12 })).is_err());
    }
}
