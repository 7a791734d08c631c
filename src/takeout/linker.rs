// Live photo linking: pair a still with its motion video in one directory
//
//   PXL_20231118_035751175.MP.jpg   + PXL_20231118_035751175.MP
//   PXL_20231118_035751175.MP~2.jpg + PXL_20231118_035751175.MP~2
//   IMG_1234.HEIC                   + IMG_1234.MOV
//   20231227_152817.MP.jpg          + 20231227_152817.MP4

use std::collections::{BTreeMap, HashMap, HashSet};

use super::catalog::{AssetFile, DirectoryCatalog};
use crate::archive::{ext_of, strip_ext};
use crate::filenames::strip_motion_marker;
use crate::media::{is_motion_ext, MediaType};

/// A matched file, with its motion companion when it is a live photo.
#[derive(Debug, Clone)]
pub struct LinkedAsset {
    pub file: AssetFile,
    pub companion: Option<AssetFile>,
}

/// Link the matched files of one directory. Companion videos are absorbed
/// by their still and not returned on their own.
pub fn link_directory(dc: &DirectoryCatalog) -> Vec<LinkedAsset> {
    let mut names: Vec<&String> = dc.matched.keys().collect();
    names.sort();

    // Image basenames by their stem, and by their stem without the .MP marker
    let mut by_key: HashMap<&str, &str> = HashMap::new();
    let mut by_clean: HashMap<&str, &str> = HashMap::new();
    for name in &names {
        let file = &dc.matched[*name];
        if file.media != MediaType::Image {
            continue;
        }
        let key = strip_ext(name);
        by_key.entry(key).or_insert(name.as_str());
        if let Some(clean) = strip_motion_marker(key) {
            by_clean.entry(clean).or_insert(name.as_str());
        }
    }

    let mut companions: BTreeMap<&str, &str> = BTreeMap::new();
    for name in &names {
        let file = &dc.matched[*name];
        if file.media != MediaType::Video {
            continue;
        }
        let image = if is_motion_ext(ext_of(name)) {
            by_key.get(name.as_str()).copied()
        } else {
            let stem = strip_ext(name);
            by_key.get(stem).or_else(|| by_clean.get(stem)).copied()
        };
        if let Some(image) = image {
            // A still takes one companion only
            if !companions.contains_key(image) {
                companions.insert(image, name.as_str());
            }
        }
    }

    let absorbed: HashSet<&str> = companions.values().copied().collect();
    names
        .into_iter()
        .filter(|n| !absorbed.contains(n.as_str()))
        .map(|n| LinkedAsset {
            file: dc.matched[n].clone(),
            companion: companions.get(n.as_str()).map(|v| dc.matched[*v].clone()),
        })
        .collect()
}
