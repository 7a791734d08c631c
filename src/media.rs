// Supported media types

use std::collections::BTreeSet;

use serde::Serialize;

use crate::constants::{IMAGE_EXTENSIONS, RAW_EXTENSIONS, SIDECAR_EXTENSIONS, VIDEO_EXTENSIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Sidecar,
    Unknown,
}

/// Extension tables driving file classification. Extensions are stored
/// lowercase with their leading dot.
#[derive(Debug, Clone)]
pub struct SupportedMedia {
    images: BTreeSet<String>,
    videos: BTreeSet<String>,
    raws: BTreeSet<String>,
    sidecars: BTreeSet<String>,
}

impl Default for SupportedMedia {
    fn default() -> Self {
        Self::new(&IMAGE_EXTENSIONS, &VIDEO_EXTENSIONS, &RAW_EXTENSIONS)
    }
}

impl SupportedMedia {
    pub fn new(images: &[&str], videos: &[&str], raws: &[&str]) -> Self {
        let norm = |list: &[&str]| -> BTreeSet<String> {
            list.iter().map(|e| normalize_ext(e)).collect()
        };
        let images = norm(images);
        // Raw formats are images whatever the caller passed
        let raws: BTreeSet<String> = norm(raws).into_iter().filter(|e| images.contains(e)).collect();
        Self {
            images,
            videos: norm(videos),
            raws,
            sidecars: norm(&SIDECAR_EXTENSIONS),
        }
    }

    /// Classify an extension (".JPG", "jpg" and ".MP~2" are all accepted).
    pub fn type_of(&self, ext: &str) -> MediaType {
        let ext = normalize_ext(ext);
        if self.images.contains(&ext) {
            MediaType::Image
        } else if self.videos.contains(&ext) {
            MediaType::Video
        } else if self.sidecars.contains(&ext) {
            MediaType::Sidecar
        } else {
            MediaType::Unknown
        }
    }

    pub fn type_of_name(&self, name: &str) -> MediaType {
        self.type_of(crate::archive::ext_of(name))
    }

    pub fn is_media(&self, ext: &str) -> bool {
        matches!(self.type_of(ext), MediaType::Image | MediaType::Video)
    }

    pub fn is_raw(&self, ext: &str) -> bool {
        self.raws.contains(&normalize_ext(ext))
    }

    /// True when `ext` is a strict, non-empty truncation of a known media
    /// extension: ".jp" and ".j" for ".jpg", ".he" for ".heic".
    pub fn is_extension_prefix(&self, ext: &str) -> bool {
        if ext.len() < 2 || !ext.starts_with('.') {
            return false;
        }
        let ext = ext.to_lowercase();
        self.images
            .iter()
            .chain(self.videos.iter())
            .any(|known| known.len() > ext.len() && known.starts_with(&ext))
    }
}

/// Lowercase, add the leading dot, fold the motion photo variants
/// ".mp~2", ".MP~13" onto ".mp".
pub fn normalize_ext(ext: &str) -> String {
    let mut ext = ext.to_lowercase();
    if !ext.starts_with('.') {
        ext.insert(0, '.');
    }
    if ext.starts_with(".mp~") && ext[4..].chars().all(|c| c.is_ascii_digit()) {
        return ".mp".to_string();
    }
    ext
}

/// True for ".MP" and ".MP~N", the motion half of a Google motion photo.
pub fn is_motion_ext(ext: &str) -> bool {
    normalize_ext(ext) == ".mp"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_of() {
        let sm = SupportedMedia::default();
        assert_eq!(sm.type_of(".JPG"), MediaType::Image);
        assert_eq!(sm.type_of("heic"), MediaType::Image);
        assert_eq!(sm.type_of(".mp4"), MediaType::Video);
        assert_eq!(sm.type_of(".MP"), MediaType::Video);
        assert_eq!(sm.type_of(".MP~2"), MediaType::Video);
        assert_eq!(sm.type_of(".json"), MediaType::Sidecar);
        assert_eq!(sm.type_of(".txt"), MediaType::Unknown);
        assert_eq!(sm.type_of(""), MediaType::Unknown);
    }

    #[test]
    fn test_is_raw() {
        let sm = SupportedMedia::default();
        assert!(sm.is_raw(".CR2"));
        assert!(sm.is_raw(".dng"));
        assert!(!sm.is_raw(".jpg"));
        assert!(!sm.is_raw(".mp4"));
    }

    #[test]
    fn test_is_extension_prefix() {
        let sm = SupportedMedia::default();
        assert!(sm.is_extension_prefix(".jp"));
        assert!(sm.is_extension_prefix(".J"));
        assert!(sm.is_extension_prefix(".hei"));
        assert!(!sm.is_extension_prefix(".jpg"));
        assert!(!sm.is_extension_prefix(".ORIGIN"));
        assert!(!sm.is_extension_prefix("."));
        assert!(!sm.is_extension_prefix(""));
    }

    #[test]
    fn test_motion_ext() {
        assert!(is_motion_ext(".MP"));
        assert!(is_motion_ext(".MP~12"));
        assert!(!is_motion_ext(".MP4"));
        assert!(!is_motion_ext(".mp~x"));
    }
}
