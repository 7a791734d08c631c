// Google Photos Takeout reconciliation engine
//
// Pass one catalogs every archive entry per directory, pass two binds media
// files to their JSON sidecars, pass three links live photos and emits
// decorated assets. The grouper pipeline composes over the emitted stream.

pub mod asset;
pub mod catalog;
pub mod emitter;
pub mod linker;
pub mod matchers;
pub mod sidecar;
pub mod solver;

use std::sync::Arc;

use crossbeam_channel::bounded;

use crate::archive::ArchiveRef;
use crate::cancel::{send_or_cancel, CancelToken};
use crate::config::ImportOptions;
use crate::constants::CHANNEL_CAPACITY;
use crate::error::{Result, TakeoutError};
use crate::events::Recorder;
use crate::filenames::NameAnalyzer;
use crate::groups::{AssetGroup, GrouperPipeline};
use crate::media::SupportedMedia;
use crate::workers::{spawn_worker, Stream};

pub use asset::EmittedAsset;
pub use catalog::{AssetFile, Catalog, CatalogBuilder, DirectoryCatalog};
pub use emitter::Emitter;
pub use sidecar::{Album, AssetMetadata};

pub struct TakeoutEngine {
    archives: Vec<ArchiveRef>,
    options: Arc<ImportOptions>,
    media: SupportedMedia,
    recorder: Arc<Recorder>,
}

impl TakeoutEngine {
    pub fn new(archives: Vec<ArchiveRef>, options: ImportOptions, recorder: Arc<Recorder>) -> Self {
        Self {
            archives,
            options: Arc::new(options),
            media: SupportedMedia::default(),
            recorder,
        }
    }

    pub fn with_media(mut self, media: SupportedMedia) -> Self {
        self.media = media;
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    /// Passes one and two, on the calling thread.
    pub fn build_catalog(&self, cancel: &CancelToken) -> Result<Catalog> {
        self.check_inputs()?;
        build_catalog(&self.archives, &self.options, &self.media, &self.recorder, cancel)
    }

    /// Emitted assets, in directory order. The catalog is built on the
    /// "takeout-catalog" thread and handed to the "takeout-emitter" thread.
    pub fn browse(&self, cancel: &CancelToken) -> Result<Stream<EmittedAsset>> {
        self.check_inputs()?;

        let (catalog_tx, catalog_rx) = bounded::<Catalog>(1);
        let (assets_tx, assets_rx) = bounded::<EmittedAsset>(CHANNEL_CAPACITY);

        let archives = self.archives.clone();
        let options = Arc::clone(&self.options);
        let media = self.media.clone();
        let recorder = Arc::clone(&self.recorder);
        let token = cancel.clone();
        let catalog_worker = spawn_worker("takeout-catalog", move || {
            let catalog = build_catalog(&archives, &options, &media, &recorder, &token)?;
            if !send_or_cancel(&catalog_tx, catalog, &token) {
                token.check()?;
            }
            Ok(())
        })?;

        let analyzer = NameAnalyzer::new(self.media.clone(), self.options.time_zone);
        let emitter = Emitter::new(Arc::clone(&self.options), analyzer, Arc::clone(&self.recorder))
            .with_takeout_name(self.archives.first().and_then(|a| emitter::takeout_name(a.name())));
        let token = cancel.clone();
        let emitter_worker = spawn_worker("takeout-emitter", move || {
            let catalog = crossbeam_channel::select! {
                recv(catalog_rx) -> msg => match msg {
                    Ok(c) => c,
                    // The catalog stage failed and reports it itself
                    Err(_) => return Ok(()),
                },
                recv(token.done()) -> _ => return Err(TakeoutError::Cancelled),
            };
            emitter.run(&catalog, &assets_tx, &token)
        })?;

        Ok(Stream::new(assets_rx, vec![catalog_worker, emitter_worker]))
    }

    /// Emitted assets bundled by the grouper pipeline.
    pub fn groups(&self, cancel: &CancelToken) -> Result<Stream<AssetGroup>> {
        let (assets, mut workers) = self.browse(cancel)?.into_parts();
        let pipeline = GrouperPipeline::from_options(&self.options, &self.media);
        log::debug!("groupers: {:?}", pipeline.names());
        let (groups, group_workers) = pipeline.spawn(assets, cancel)?.into_parts();
        workers.extend(group_workers);
        Ok(Stream::new(groups, workers))
    }

    fn check_inputs(&self) -> Result<()> {
        if self.archives.is_empty() {
            return Err(TakeoutError::NotFound("no input archive".to_string()));
        }
        Ok(())
    }
}

fn build_catalog(
    archives: &[ArchiveRef],
    options: &ImportOptions,
    media: &SupportedMedia,
    recorder: &Recorder,
    cancel: &CancelToken,
) -> Result<Catalog> {
    let mut builder = CatalogBuilder::new(media, options, recorder, cancel);
    for archive in archives {
        builder.ingest(archive)?;
    }
    let mut catalog = builder.finish();
    solver::solve(&mut catalog, media, options.keep_json_less, recorder, cancel)?;
    log::info!("catalog holds {} media files", catalog.file_count());
    Ok(catalog)
}
