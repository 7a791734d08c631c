// Epson FastFoto grouper: one print scanned as name.jpg, name_a.jpg
// (enhanced, the cover) and name_b.jpg (the back)

use std::sync::OnceLock;

use regex::Regex;

use super::{AssetGroup, Grouper, Grouping, Output};
use crate::archive::base_of;
use crate::filenames::NameKind;
use crate::media::MediaType;
use crate::takeout::asset::EmittedAsset;

fn scan_name(name: &str) -> Option<(String, bool)> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r"^(.*_\d+)(_[ab])?(\.[a-z]+)$").ok())
        .as_ref()?;
    let caps = re.captures(name)?;
    let radical = caps.get(1)?.as_str().to_string();
    let is_front = caps.get(2).map_or(false, |m| m.as_str() == "_a");
    Some((radical, is_front))
}

#[derive(Default)]
pub struct EpsonGrouper {
    radical: Option<String>,
    cover: usize,
    bucket: Vec<EmittedAsset>,
}

impl EpsonGrouper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Grouper for EpsonGrouper {
    fn name(&self) -> &'static str {
        "epson"
    }

    fn push(&mut self, asset: EmittedAsset) -> Vec<Output> {
        let scanned = scan_name(base_of(&asset.file_name));
        let eligible = asset.media == MediaType::Image && asset.name_info.kind != NameKind::Burst;
        let Some((radical, is_front)) = scanned.filter(|_| eligible) else {
            let mut out = self.flush();
            out.push(Output::Asset(asset));
            return out;
        };

        let mut out = Vec::new();
        if self.radical.as_deref() != Some(radical.as_str()) {
            out = self.flush();
            self.radical = Some(radical);
        }
        if is_front {
            self.cover = self.bucket.len();
        }
        self.bucket.push(asset);
        out
    }

    fn flush(&mut self) -> Vec<Output> {
        self.radical = None;
        let cover = std::mem::take(&mut self.cover);
        let mut bucket = std::mem::take(&mut self.bucket);
        match bucket.len() {
            0 => Vec::new(),
            1 => bucket.pop().map(Output::Asset).into_iter().collect(),
            _ => vec![Output::Group(AssetGroup::new(Grouping::Other, bucket).with_cover(cover))],
        }
    }
}
