// Series grouper: consecutive assets sharing one radical
//
//   IMG_1234.JPG + IMG_1234.CR2          -> raw+jpg
//   IMG_1234.HEIC + IMG_1234.JPG         -> heic+jpg
//   IMG_20231014_183246_BURST001_COVER.jpg + IMG_..._BURST002.jpg -> burst

use super::{passthrough, AssetGroup, Grouper, Grouping, Output};
use crate::filenames::NameKind;
use crate::media::SupportedMedia;
use crate::takeout::asset::EmittedAsset;

pub struct SeriesGrouper {
    media: SupportedMedia,
    pair_window_ms: i64,
    radical: Option<String>,
    bucket: Vec<EmittedAsset>,
}

impl SeriesGrouper {
    pub fn new(media: SupportedMedia, pair_window_ms: i64) -> Self {
        Self {
            media,
            pair_window_ms,
            radical: None,
            bucket: Vec::new(),
        }
    }

    fn decide(&self, bucket: Vec<EmittedAsset>) -> Vec<Output> {
        if bucket.len() < 2 {
            return passthrough(bucket);
        }

        let mut grouping = Grouping::Other;
        let mut cover = 0;
        let (mut jpg, mut raw, mut heic) = (false, false, false);
        for (i, a) in bucket.iter().enumerate() {
            let ext = a.name_info.ext.as_str();
            jpg |= ext == ".jpg" || ext == ".jpeg";
            raw |= self.media.is_raw(ext);
            heic |= ext == ".heic" || ext == ".heif";
            if a.name_info.kind == NameKind::Burst {
                grouping = Grouping::Burst;
            }
            if a.name_info.is_cover {
                cover = i;
            }
        }

        if bucket.len() == 2 && grouping == Grouping::Other {
            if jpg && raw && !heic {
                grouping = Grouping::RawJpg;
            } else if jpg && heic && !raw {
                grouping = Grouping::HeicJpg;
            }
            if matches!(grouping, Grouping::RawJpg | Grouping::HeicJpg) && !self.within_window(&bucket[0], &bucket[1]) {
                return passthrough(bucket);
            }
        }

        vec![Output::Group(AssetGroup::new(grouping, bucket).with_cover(cover))]
    }

    fn within_window(&self, a: &EmittedAsset, b: &EmittedAsset) -> bool {
        match (a.capture_date, b.capture_date) {
            (Some(x), Some(y)) => (x - y).num_milliseconds().abs() <= self.pair_window_ms,
            _ => false,
        }
    }
}

impl Grouper for SeriesGrouper {
    fn name(&self) -> &'static str {
        "series"
    }

    fn push(&mut self, asset: EmittedAsset) -> Vec<Output> {
        let mut out = Vec::new();
        if self.radical.as_deref() != Some(asset.name_info.radical.as_str()) {
            out = self.flush();
            self.radical = Some(asset.name_info.radical.clone());
        }
        self.bucket.push(asset);
        out
    }

    fn flush(&mut self) -> Vec<Output> {
        self.radical = None;
        let bucket = std::mem::take(&mut self.bucket);
        self.decide(bucket)
    }
}
