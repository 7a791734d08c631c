// Pass three: turn linked files into decorated upload candidates

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Local, Utc};
use crossbeam_channel::Sender;
use regex::Regex;

use super::asset::EmittedAsset;
use super::catalog::{AssetFile, Catalog};
use super::linker::{link_directory, LinkedAsset};
use super::sidecar::{Album, AssetMetadata};
use crate::archive::ext_of;
use crate::cancel::{send_or_cancel, CancelToken};
use crate::config::ImportOptions;
use crate::constants::{PEOPLE_TAG_PREFIX, SESSION_TAG_PREFIX, TAKEOUT_TAG_PREFIX};
use crate::error::{Result, TakeoutError};
use crate::events::{EventCode, Recorder};
use crate::filenames::NameAnalyzer;

/// Replace stale or doubled extensions of a sidecar title by the file's
/// own extension: "IMG_1.HEIC" for "IMG_1.JPG" gives "IMG_1.JPG".
pub fn reconcile_title(title: &str, file_name: &str) -> String {
    let file_ext = ext_of(file_name);
    let title_ext = ext_of(title);
    if title_ext == file_ext {
        return title.to_string();
    }
    let stem = &title[..title.len() - title_ext.len()];
    if ext_of(stem) == file_ext {
        return stem.to_string();
    }
    let stem = &stem[..stem.len() - ext_of(stem).len()];
    format!("{}{}", stem, file_ext)
}

/// Tag naming the export: archive name without its extension and without
/// the "-001" part number.
pub fn takeout_name(archive_name: &str) -> Option<String> {
    static PART: OnceLock<Option<Regex>> = OnceLock::new();

    let lower = archive_name.to_lowercase();
    let mut name = archive_name;
    for ext in [".tar.gz", ".tgz", ".zip", ".lst", ".txt"] {
        if lower.ends_with(ext) {
            name = &archive_name[..archive_name.len() - ext.len()];
            break;
        }
    }
    let name = name.trim_end_matches('/');
    let name = match PART.get_or_init(|| Regex::new(r"-\d{3}$").ok()).as_ref() {
        Some(re) => re.replace(name, "").to_string(),
        None => name.to_string(),
    };
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

pub struct Emitter {
    options: Arc<ImportOptions>,
    analyzer: NameAnalyzer,
    recorder: Arc<Recorder>,
    session: String,
    takeout: Option<String>,
}

impl Emitter {
    pub fn new(options: Arc<ImportOptions>, analyzer: NameAnalyzer, recorder: Arc<Recorder>) -> Self {
        let session = format!("{}/{}", SESSION_TAG_PREFIX, Local::now().format("%Y-%m-%d %H-%M-%S"));
        Self {
            options,
            analyzer,
            recorder,
            session,
            takeout: None,
        }
    }

    /// Name used by the `{takeout}/...` tag, usually the first archive's.
    pub fn with_takeout_name(mut self, name: Option<String>) -> Self {
        self.takeout = name;
        self
    }

    pub fn session_tag(&self) -> &str {
        &self.session
    }

    /// Emit every directory in order. Returns `Err(Cancelled)` when the token
    /// fires; a consumer going away ends the run quietly.
    pub fn run(&self, catalog: &Catalog, tx: &Sender<EmittedAsset>, cancel: &CancelToken) -> Result<()> {
        let mut emitted = 0usize;
        for (dir, dc) in catalog.dirs.iter() {
            cancel.check()?;
            if dc.matched.is_empty() {
                continue;
            }

            let batch = self.directory(catalog, dir, &link_directory(dc));
            for asset in batch {
                if !send_or_cancel(tx, asset, cancel) {
                    if cancel.is_cancelled() {
                        return Err(TakeoutError::Cancelled);
                    }
                    log::debug!("emitter: consumer went away");
                    return Ok(());
                }
                emitted += 1;
            }
        }
        log::info!("emitted {} assets", emitted);
        Ok(())
    }

    /// Decorate, filter and order the assets of one directory.
    pub fn directory(&self, catalog: &Catalog, dir: &str, linked: &[LinkedAsset]) -> Vec<EmittedAsset> {
        let mut batch: Vec<EmittedAsset> = linked
            .iter()
            .filter_map(|l| self.build(catalog, dir, l))
            .collect();
        batch.sort_by(|a, b| {
            a.name_info
                .radical
                .cmp(&b.name_info.radical)
                .then_with(|| a.capture_date.cmp(&b.capture_date))
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        batch
    }

    fn build(&self, catalog: &Catalog, dir: &str, linked: &LinkedAsset) -> Option<EmittedAsset> {
        let (mut asset, memberships) = self.decorate(catalog, dir, &linked.file, None);

        if let Some(reason) = self.discard_reason(&asset, &memberships) {
            self.recorder
                .record(EventCode::DiscoveredDiscarded, &asset.display(), &[("reason", reason)]);
            return None;
        }

        if let Some(companion) = &linked.companion {
            let (video, _) = self.decorate(catalog, dir, companion, linked.file.metadata.as_deref());
            self.recorder
                .record(EventCode::LivePhoto, &asset.display(), &[("video", &video.display())]);
            asset.companion_video = Some(Box::new(video));
        }
        Some(asset)
    }

    // The asset and the albums it belongs to, before the album options apply
    fn decorate(
        &self,
        catalog: &Catalog,
        dir: &str,
        file: &AssetFile,
        fallback: Option<&AssetMetadata>,
    ) -> (EmittedAsset, Vec<Album>) {
        let options = &self.options;
        let md = file.metadata.as_deref().or(fallback);

        let title = match md {
            Some(m) if !m.title.is_empty() => reconcile_title(&m.title, &file.base),
            _ => file.base.clone(),
        };
        let info = self.analyzer.analyze(&title);

        let mut asset = EmittedAsset::new(file.archive.clone(), &file.path, file.size, file.media, info);
        asset.title = title;
        asset.capture_date = capture_date(
            md.and_then(|m| m.taken),
            asset.name_info.taken,
            file.mtime,
            options.fallback_to_now,
        );

        let memberships: Vec<Album> = match md {
            Some(m) => m
                .found_in_paths
                .iter()
                .filter_map(|p| catalog.albums.get(p))
                .cloned()
                .collect(),
            None => catalog.albums.get(dir).cloned().into_iter().collect(),
        };

        if let Some(m) = md {
            let position = m.position();
            asset.lat = position.lat;
            asset.lon = position.lon;
            asset.alt = position.alt;
            asset.description = m.description.clone();
            asset.archived = m.archived;
            asset.trashed = m.trashed;
            asset.favorited = m.favorited;
            asset.from_partner = m.partner_shared;
            asset.from_shared_album = m.from_shared_album;
        }
        if asset.lat == 0.0 && asset.lon == 0.0 {
            if let Some(album) = memberships.iter().find(|a| a.has_position()) {
                asset.lat = album.lat;
                asset.lon = album.lon;
            }
        }

        if options.create_albums {
            asset.albums = match &options.import_into_album {
                Some(title) => vec![named_album(title)],
                None => memberships.clone(),
            };
            if let Some(title) = &options.partner_shared_album {
                if asset.from_partner {
                    asset.albums.push(named_album(title));
                }
            }
        }

        let mut tags: Vec<String> = options.tags.clone();
        if options.session_tag {
            tags.push(self.session.clone());
        }
        if options.takeout_tag {
            if let Some(name) = &self.takeout {
                tags.push(format!("{}/{}", TAKEOUT_TAG_PREFIX, name));
            }
        }
        if options.people_tag {
            if let Some(m) = md {
                tags.extend(m.people.iter().map(|p| format!("{}/{}", PEOPLE_TAG_PREFIX, p)));
            }
        }
        let mut seen = HashSet::new();
        tags.retain(|t| seen.insert(t.clone()));
        asset.tags = tags;

        (asset, memberships)
    }

    fn discard_reason(&self, asset: &EmittedAsset, memberships: &[Album]) -> Option<&'static str> {
        let options = &self.options;
        if !options.keep_archived && asset.archived {
            return Some("archived file");
        }
        if !options.keep_partner && asset.from_partner {
            return Some("partner file");
        }
        if !options.keep_trashed && asset.trashed {
            return Some("trashed file");
        }
        if options.date_range.is_set() && !asset.capture_date.map_or(false, |d| options.date_range.contains(d)) {
            return Some("out of date range");
        }
        if let Some(wanted) = &options.import_from_album {
            if !memberships.iter().any(|a| &a.title == wanted) {
                return Some("not in the selected album");
            }
        }
        None
    }
}

fn named_album(title: &str) -> Album {
    Album {
        title: title.to_string(),
        ..Default::default()
    }
}

/// Sidecar date, then the date found in the name, then the archive entry
/// time, then now.
pub fn capture_date(
    taken: Option<DateTime<Utc>>,
    from_name: Option<DateTime<Utc>>,
    mtime: Option<DateTime<Utc>>,
    fallback_to_now: bool,
) -> Option<DateTime<Utc>> {
    taken
        .or(from_name)
        .or(mtime)
        .or_else(|| fallback_to_now.then(Utc::now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveRef, FakeFs};
    use crate::filenames::NameZone;
    use crate::media::SupportedMedia;
    use crate::takeout::catalog::{CatalogBuilder, DirectoryCatalog};
    use crate::takeout::solver::solve;
    use chrono::TimeZone;
    use crossbeam_channel::bounded;
    use serde_json::json;

    fn emitter(options: ImportOptions) -> (Emitter, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::new());
        let analyzer = NameAnalyzer::new(SupportedMedia::default(), NameZone::Utc);
        (Emitter::new(Arc::new(options), analyzer, recorder.clone()), recorder)
    }

    fn solved(fs: FakeFs, options: &ImportOptions) -> Catalog {
        let media = SupportedMedia::default();
        let recorder = Recorder::new();
        let cancel = CancelToken::new();
        let archive: ArchiveRef = Arc::new(fs);
        let mut builder = CatalogBuilder::new(&media, options, &recorder, &cancel);
        builder.ingest(&archive).unwrap();
        let mut catalog = builder.finish();
        solve(&mut catalog, &media, options.keep_json_less, &recorder, &cancel).unwrap();
        catalog
    }

    fn emit_all(emitter: &Emitter, catalog: &Catalog) -> Vec<EmittedAsset> {
        let (tx, rx) = bounded(64);
        emitter.run(catalog, &tx, &CancelToken::new()).unwrap();
        drop(tx);
        rx.iter().collect()
    }

    #[test]
    fn test_reconcile_title() {
        assert_eq!(reconcile_title("IMG_3479.JPG", "IMG_3479(1).JPG"), "IMG_3479.JPG");
        assert_eq!(reconcile_title("IMG_1.HEIC", "IMG_1.JPG"), "IMG_1.JPG");
        assert_eq!(reconcile_title("IMG_1.jpg.jpg", "IMG_1.jpg"), "IMG_1.jpg.jpg");
        assert_eq!(reconcile_title("IMG_1.JPG.MP4", "IMG_1.JPG"), "IMG_1.JPG");
        assert_eq!(reconcile_title("IMG_1.HEIC.MOV", "IMG_1.JPG"), "IMG_1.JPG");
        assert_eq!(reconcile_title("photo", "photo.jpg"), "photo.jpg");
    }

    #[test]
    fn test_takeout_name() {
        assert_eq!(takeout_name("takeout-20230922T123456Z-001.zip").as_deref(), Some("takeout-20230922T123456Z"));
        assert_eq!(takeout_name("backup.tar.gz").as_deref(), Some("backup"));
        assert_eq!(takeout_name("photos").as_deref(), Some("photos"));
        assert_eq!(takeout_name(".zip"), None);
    }

    #[test]
    fn test_capture_date_chain() {
        let a = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let c = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(capture_date(Some(a), Some(b), Some(c), true), Some(a));
        assert_eq!(capture_date(None, Some(b), Some(c), true), Some(b));
        assert_eq!(capture_date(None, None, Some(c), true), Some(c));
        assert!(capture_date(None, None, None, true).is_some());
        assert_eq!(capture_date(None, None, None, false), None);
    }

    #[test]
    fn test_metadata_flags_and_tags() {
        let mut fs = FakeFs::new("takeout-20240101T000000Z-002.zip");
        fs.add_sized("G/2023/a.jpg", 10).add_json(
            "G/2023/a.jpg.json",
            &json!({
                "title": "a.jpg",
                "description": "sunset",
                "photoTakenTime": { "timestamp": "1695394176" },
                "geoDataExif": { "latitude": 48.5, "longitude": 2.25, "altitude": 35.0 },
                "favorited": true,
                "people": [{ "name": "Alex" }],
                "url": "x"
            }),
        );
        let options = ImportOptions {
            tags: vec!["holidays".to_string()],
            session_tag: true,
            ..Default::default()
        };
        let catalog = solved(fs, &options);
        let (em, _) = emitter(options);
        let em = em.with_takeout_name(takeout_name("takeout-20240101T000000Z-002.zip"));
        let out = emit_all(&em, &catalog);

        assert_eq!(out.len(), 1);
        let a = &out[0];
        assert_eq!(a.title, "a.jpg");
        assert_eq!(a.description, "sunset");
        assert!(a.favorited);
        assert_eq!((a.lat, a.lon, a.alt), (48.5, 2.25, 35.0));
        assert_eq!(a.capture_date, Some(Utc.timestamp_opt(1695394176, 0).unwrap()));
        assert_eq!(
            a.tags,
            vec![
                "holidays".to_string(),
                em.session_tag().to_string(),
                "{takeout}/takeout-20240101T000000Z".to_string(),
                "People/Alex".to_string(),
            ]
        );
        assert!(em.session_tag().starts_with("{takeout-sync}/"));
    }

    #[test]
    fn test_user_tags_are_not_repeated() {
        let mut fs = FakeFs::new("takeout-001.zip");
        fs.add_sized("G/2023/a.jpg", 10).add_json(
            "G/2023/a.jpg.json",
            &json!({
                "title": "a.jpg",
                "photoTakenTime": { "timestamp": "1695394176" },
                "people": [{ "name": "Alex" }, { "name": "Sam" }],
                "url": "x"
            }),
        );
        let options = ImportOptions {
            tags: vec![
                "People/Sam".to_string(),
                "{takeout}/takeout".to_string(),
                "trip".to_string(),
                "People/Sam".to_string(),
            ],
            ..Default::default()
        };
        let catalog = solved(fs, &options);
        let (em, _) = emitter(options);
        let em = em.with_takeout_name(takeout_name("takeout-001.zip"));
        let out = emit_all(&em, &catalog);

        assert_eq!(
            out[0].tags,
            vec![
                "People/Sam".to_string(),
                "{takeout}/takeout".to_string(),
                "trip".to_string(),
                "People/Alex".to_string(),
            ]
        );
    }

    #[test]
    fn test_album_gps_inherited_only_when_asset_has_none() {
        let mut fs = FakeFs::new("t");
        fs.add_json(
            "G/Trip/metadata.json",
            &json!({ "title": "Trip", "date": {}, "geoData": { "latitude": 10.0, "longitude": 20.0 } }),
        )
        .add_sized("G/Trip/a.jpg", 1)
        .add_json("G/Trip/a.jpg.json", &json!({ "title": "a.jpg", "photoTakenTime": { "timestamp": "1" } }))
        .add_sized("G/Trip/b.jpg", 1)
        .add_json(
            "G/Trip/b.jpg.json",
            &json!({ "title": "b.jpg", "photoTakenTime": { "timestamp": "2" }, "geoData": { "latitude": 1.0, "longitude": 2.0 } }),
        );
        let options = ImportOptions::default();
        let catalog = solved(fs, &options);
        let (em, _) = emitter(options);
        let out = emit_all(&em, &catalog);

        assert_eq!(out.len(), 2);
        assert_eq!((out[0].lat, out[0].lon), (10.0, 20.0));
        assert_eq!((out[1].lat, out[1].lon), (1.0, 2.0));
        assert!(out.iter().all(|a| a.albums.len() == 1 && a.albums[0].title == "Trip"));
    }

    #[test]
    fn test_album_options() {
        let mut fs = FakeFs::new("t");
        fs.add_json("G/Trip/metadata.json", &json!({ "title": "Trip", "date": {} }))
            .add_sized("G/Trip/a.jpg", 1)
            .add_json(
                "G/Trip/a.jpg.json",
                &json!({ "title": "a.jpg", "photoTakenTime": { "timestamp": "1" }, "googlePhotosOrigin": { "fromPartnerSharing": {} } }),
            );

        let options = ImportOptions {
            import_into_album: Some("Everything".to_string()),
            partner_shared_album: Some("From partner".to_string()),
            ..Default::default()
        };
        let catalog = solved(fs, &options);
        let (em, _) = emitter(options);
        let out = emit_all(&em, &catalog);
        let titles: Vec<&str> = out[0].albums.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Everything", "From partner"]);
        assert!(out[0].from_partner);

        let options = ImportOptions {
            create_albums: false,
            ..Default::default()
        };
        let (em, _) = emitter(options);
        let out = emit_all(&em, &catalog);
        assert!(out[0].albums.is_empty());
    }

    #[test]
    fn test_filters_discard_with_reason() {
        let mut fs = FakeFs::new("t");
        let md = |title: &str, extra: serde_json::Value| {
            let mut v = json!({ "title": title, "photoTakenTime": { "timestamp": "1695394176" } });
            if let (Some(obj), Some(more)) = (v.as_object_mut(), extra.as_object()) {
                obj.extend(more.clone());
            }
            v
        };
        fs.add_sized("G/2023/keep.jpg", 1)
            .add_json("G/2023/keep.jpg.json", &md("keep.jpg", json!({})))
            .add_sized("G/2023/trash.jpg", 1)
            .add_json("G/2023/trash.jpg.json", &md("trash.jpg", json!({ "trashed": true })))
            .add_sized("G/2023/archived.jpg", 1)
            .add_json("G/2023/archived.jpg.json", &md("archived.jpg", json!({ "archived": true })));

        let options = ImportOptions {
            keep_archived: false,
            ..Default::default()
        };
        let catalog = solved(fs, &options);
        let (em, recorder) = emitter(options);
        let out = emit_all(&em, &catalog);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "keep.jpg");
        assert_eq!(recorder.count(EventCode::DiscoveredDiscarded), 2);

        let options = ImportOptions {
            keep_trashed: true,
            date_range: crate::config::DateRange::parse("2022").unwrap(),
            ..Default::default()
        };
        let (em, recorder) = emitter(options);
        assert!(emit_all(&em, &catalog).is_empty());
        assert_eq!(recorder.count(EventCode::DiscoveredDiscarded), 3);
    }

    #[test]
    fn test_import_from_album() {
        let mut fs = FakeFs::new("t");
        let photo = |t: &str| json!({ "title": t, "photoTakenTime": { "timestamp": "1" } });
        fs.add_json("G/Trip/metadata.json", &json!({ "title": "Trip", "date": {} }))
            .add_json("G/Trip/a.jpg.json", &photo("a.jpg"))
            .add_sized("G/2023/a.jpg", 1)
            .add_json("G/2023/a.jpg.json", &photo("a.jpg"))
            .add_sized("G/2023/b.jpg", 1)
            .add_json("G/2023/b.jpg.json", &photo("b.jpg"));
        let options = ImportOptions {
            import_from_album: Some("Trip".to_string()),
            ..Default::default()
        };
        let catalog = solved(fs, &options);
        let (em, _) = emitter(options);
        let out = emit_all(&em, &catalog);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].file_name, "G/2023/a.jpg");
    }

    #[test]
    fn test_companion_uses_still_metadata() {
        let mut fs = FakeFs::new("t");
        fs.add_sized("G/2023/IMG_1.HEIC", 1000)
            .add_sized("G/2023/IMG_1.MOV", 5000)
            .add_json(
                "G/2023/IMG_1.HEIC.json",
                &json!({ "title": "IMG_1.HEIC", "photoTakenTime": { "timestamp": "1695394176" }, "favorited": true }),
            );
        let options = ImportOptions::default();
        let catalog = solved(fs, &options);
        let (em, recorder) = emitter(options);
        let out = emit_all(&em, &catalog);

        assert_eq!(out.len(), 1);
        let video = out[0].companion_video.as_ref().unwrap();
        assert_eq!(video.file_name, "G/2023/IMG_1.MOV");
        assert_eq!(video.title, "IMG_1.MOV");
        assert_eq!(video.capture_date, out[0].capture_date);
        assert_eq!(recorder.count(EventCode::LivePhoto), 1);
    }

    #[test]
    fn test_directory_sorted_by_radical_then_date() {
        let archive: ArchiveRef = Arc::new(FakeFs::new("t"));
        let media = SupportedMedia::default();
        let file = |name: &str, ts: i64| AssetFile {
            archive: archive.clone(),
            path: format!("d/{}", name),
            base: name.to_string(),
            size: 1,
            mtime: Some(Utc.timestamp_opt(ts, 0).unwrap()),
            media: media.type_of_name(name),
            metadata: None,
        };
        let mut dc = DirectoryCatalog::default();
        for (n, ts) in [("b.jpg", 1), ("a.jpg", 5), ("a.cr2", 3), ("c.jpg", 0)] {
            dc.matched.insert(n.to_string(), file(n, ts));
        }
        let catalog = Catalog::default();
        let (em, _) = emitter(ImportOptions::default());
        let batch = em.directory(&catalog, "d", &link_directory(&dc));
        let names: Vec<&str> = batch.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["d/a.cr2", "d/a.jpg", "d/b.jpg", "d/c.jpg"]);
    }

    #[test]
    fn test_cancelled_emitter_stops() {
        let mut fs = FakeFs::new("t");
        fs.add_sized("G/a.jpg", 1)
            .add_json("G/a.jpg.json", &json!({ "title": "a.jpg", "photoTakenTime": { "timestamp": "1" } }));
        let options = ImportOptions::default();
        let catalog = solved(fs, &options);
        let (em, _) = emitter(options);
        let cancel = CancelToken::new();
        cancel.cancel();
        let (tx, rx) = bounded(1);
        assert!(matches!(em.run(&catalog, &tx, &cancel), Err(TakeoutError::Cancelled)));
        drop(tx);
        assert_eq!(rx.iter().count(), 0);
    }
}
