// Burst grouper: still images shot a fraction of a second apart, for
// cameras that leave no burst marker in the name

use chrono::{DateTime, Utc};

use super::{AssetGroup, Grouper, Grouping, Output};
use crate::filenames::NameKind;
use crate::media::MediaType;
use crate::takeout::asset::EmittedAsset;

pub struct BurstGrouper {
    interval_ms: i64,
    last: Option<DateTime<Utc>>,
    bucket: Vec<EmittedAsset>,
}

impl BurstGrouper {
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms,
            last: None,
            bucket: Vec::new(),
        }
    }

    // Videos, undated images, named bursts and edits are left alone
    fn groupable(asset: &EmittedAsset) -> Option<DateTime<Utc>> {
        if asset.media != MediaType::Image {
            return None;
        }
        if matches!(asset.name_info.kind, NameKind::Burst | NameKind::Edited) {
            return None;
        }
        asset.capture_date
    }
}

impl Grouper for BurstGrouper {
    fn name(&self) -> &'static str {
        "burst"
    }

    fn push(&mut self, asset: EmittedAsset) -> Vec<Output> {
        let Some(taken) = Self::groupable(&asset) else {
            let mut out = self.flush();
            out.push(Output::Asset(asset));
            return out;
        };

        let close = self
            .last
            .map_or(false, |last| (taken - last).num_milliseconds().abs() < self.interval_ms);
        let out = if close { Vec::new() } else { self.flush() };
        self.bucket.push(asset);
        self.last = Some(taken);
        out
    }

    fn flush(&mut self) -> Vec<Output> {
        self.last = None;
        let mut bucket = std::mem::take(&mut self.bucket);
        match bucket.len() {
            0 => Vec::new(),
            1 => bucket.pop().map(Output::Asset).into_iter().collect(),
            _ => vec![Output::Group(AssetGroup::new(Grouping::Burst, bucket))],
        }
    }
}
