// Grouper pipeline: bundle related assets of the emitted stream
//
// Stages run on their own threads. Each one reads assets, passes the ones
// it does not group to the next stage and sends its groups straight to the
// output. A terminal stage wraps what is left into single-asset groups.

pub mod burst;
pub mod epson;
pub mod series;

use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;

use crate::archive::dir_of;
use crate::cancel::{send_or_cancel, CancelToken};
use crate::config::ImportOptions;
use crate::constants::CHANNEL_CAPACITY;
use crate::error::{Result, TakeoutError};
use crate::media::SupportedMedia;
use crate::takeout::asset::EmittedAsset;
use crate::workers::{spawn_worker, Stream};

pub use burst::BurstGrouper;
pub use epson::EpsonGrouper;
pub use series::SeriesGrouper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grouping {
    None,
    Burst,
    RawJpg,
    HeicJpg,
    Other,
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grouping::None => "none",
            Grouping::Burst => "burst",
            Grouping::RawJpg => "raw+jpg",
            Grouping::HeicJpg => "heic+jpg",
            Grouping::Other => "other",
        };
        f.write_str(s)
    }
}

/// Related assets released together. The group owns its members.
#[derive(Debug)]
pub struct AssetGroup {
    pub members: Vec<EmittedAsset>,
    pub grouping: Grouping,
    pub cover_index: usize,
}

impl AssetGroup {
    pub fn new(grouping: Grouping, members: Vec<EmittedAsset>) -> Self {
        Self {
            members,
            grouping,
            cover_index: 0,
        }
    }

    /// An asset standing alone.
    pub fn single(asset: EmittedAsset) -> Self {
        Self::new(Grouping::None, vec![asset])
    }

    pub fn with_cover(mut self, index: usize) -> Self {
        self.cover_index = index;
        self
    }

    pub fn cover(&self) -> Option<&EmittedAsset> {
        self.members.get(self.cover_index)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.members.is_empty() {
            return Err(TakeoutError::Other("empty group".to_string()));
        }
        if self.cover_index >= self.members.len() {
            return Err(TakeoutError::Other(format!(
                "cover index {} out of range for {} members",
                self.cover_index,
                self.members.len()
            )));
        }
        if self.grouping == Grouping::None && self.members.len() != 1 {
            return Err(TakeoutError::Other("ungrouped bundle with several members".to_string()));
        }
        Ok(())
    }

    /// Release the members' temporary buffers.
    pub fn close(&mut self) {
        for m in self.members.iter_mut() {
            m.close();
        }
    }
}

/// What a grouper hands back for the assets it was given.
#[derive(Debug)]
pub enum Output {
    /// Not grouped; goes on to the next stage.
    Asset(EmittedAsset),
    Group(AssetGroup),
}

/// One grouping rule. Input arrives sorted by radical then capture date;
/// passthrough assets must leave in the order they came.
pub trait Grouper: Send {
    fn name(&self) -> &'static str;

    fn push(&mut self, asset: EmittedAsset) -> Vec<Output>;

    /// Release the pending bucket, at input end or directory change.
    fn flush(&mut self) -> Vec<Output>;
}

pub(crate) fn passthrough(assets: Vec<EmittedAsset>) -> Vec<Output> {
    assets.into_iter().map(Output::Asset).collect()
}

#[derive(Default)]
pub struct GrouperPipeline {
    groupers: Vec<Box<dyn Grouper>>,
}

impl GrouperPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Series first, then Epson FastFoto scans, then bursts.
    pub fn from_options(options: &ImportOptions, media: &SupportedMedia) -> Self {
        let mut pipeline = Self::new().with(SeriesGrouper::new(media.clone(), options.series_pair_window_ms));
        if options.manage_epson_fastfoto {
            pipeline = pipeline.with(EpsonGrouper::new());
        }
        if options.manage_burst {
            pipeline = pipeline.with(BurstGrouper::new(options.burst_interval_ms));
        }
        pipeline
    }

    pub fn with<G: Grouper + 'static>(mut self, grouper: G) -> Self {
        self.groupers.push(Box::new(grouper));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.groupers.iter().map(|g| g.name()).collect()
    }

    /// Start one thread per grouper plus the terminal stage.
    pub fn spawn(self, input: Receiver<EmittedAsset>, cancel: &CancelToken) -> Result<Stream<AssetGroup>> {
        let (groups_tx, groups_rx) = bounded::<AssetGroup>(CHANNEL_CAPACITY);
        let mut workers = Vec::new();
        let mut upstream = input;

        for grouper in self.groupers {
            let (tx, rx) = bounded::<EmittedAsset>(CHANNEL_CAPACITY);
            let name = format!("grouper-{}", grouper.name());
            let groups = groups_tx.clone();
            let cancel = cancel.clone();
            let input = upstream;
            workers.push(spawn_worker(&name, move || run_stage(grouper, input, tx, groups, cancel))?);
            upstream = rx;
        }

        let cancel = cancel.clone();
        workers.push(spawn_worker("grouper-terminal", move || {
            for asset in upstream.iter() {
                if !send_or_cancel(&groups_tx, AssetGroup::single(asset), &cancel) {
                    break;
                }
            }
            cancel.check()
        })?);

        Ok(Stream::new(groups_rx, workers))
    }
}

fn run_stage(
    mut grouper: Box<dyn Grouper>,
    input: Receiver<EmittedAsset>,
    out: Sender<EmittedAsset>,
    groups: Sender<AssetGroup>,
    cancel: CancelToken,
) -> Result<()> {
    let mut dir: Option<String> = None;
    loop {
        let asset = crossbeam_channel::select! {
            recv(input) -> msg => match msg {
                Ok(a) => a,
                Err(_) => break,
            },
            recv(cancel.done()) -> _ => return Err(TakeoutError::Cancelled),
        };

        // Groups never span directories
        let mut produced = Vec::new();
        let asset_dir = dir_of(&asset.file_name);
        if dir.as_deref() != Some(asset_dir) {
            produced.extend(grouper.flush());
            dir = Some(asset_dir.to_string());
        }
        produced.extend(grouper.push(asset));
        if !deliver(produced, &out, &groups, &cancel)? {
            return Ok(());
        }
    }
    deliver(grouper.flush(), &out, &groups, &cancel)?;
    Ok(())
}

// Ok(false) when downstream went away
fn deliver(
    outputs: Vec<Output>,
    out: &Sender<EmittedAsset>,
    groups: &Sender<AssetGroup>,
    cancel: &CancelToken,
) -> Result<bool> {
    for output in outputs {
        let sent = match output {
            Output::Asset(a) => send_or_cancel(out, a, cancel),
            Output::Group(g) => {
                debug_assert!(g.validate().is_ok());
                log::debug!("group {} of {} assets", g.grouping, g.len());
                send_or_cancel(groups, g, cancel)
            }
        };
        if !sent {
            cancel.check()?;
            return Ok(false);
        }
    }
    Ok(true)
}
