// Sidecar to file name matchers
//
// Google Takeout renames, truncates and counts file names in ways its
// sidecar names do not follow. Each rule below is a pure predicate over
// (sidecar basename, file basename); the solver applies them in table order.

use crate::archive::{ext_of, strip_ext};
use crate::constants::FORGOTTEN_DUPLICATE_MAX_EXTRA;
use crate::media::{MediaType, SupportedMedia};

pub type MatchFn = fn(&str, &str, &SupportedMedia) -> bool;

#[derive(Clone, Copy)]
pub struct Matcher {
    pub name: &'static str,
    pub test: MatchFn,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// The cascade, in priority order. Reordering changes results.
pub const MATCHERS: [Matcher; 7] = [
    Matcher { name: "exact", test: match_exact },
    Matcher { name: "live-photo", test: match_live_photo },
    Matcher { name: "one-char-omitted", test: match_one_char_omitted },
    Matcher { name: "long-name-with-counter", test: match_long_name_with_counter },
    Matcher { name: "duplicate-in-year", test: match_duplicate_in_year },
    Matcher { name: "edited-name", test: match_edited_name },
    Matcher { name: "forgotten-duplicates", test: match_forgotten_duplicates },
];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// "IMG_1(2).JPG" -> ("IMG_1.JPG", Some("2")), using the last parentheses.
fn file_index(name: &str) -> (String, Option<&str>) {
    if let (Some(p1), Some(p2)) = (name.rfind('('), name.rfind(')')) {
        if p2 > p1 {
            let index = &name[p1 + 1..p2];
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                return (format!("{}{}", &name[..p1], &name[p2 + 1..]), Some(index));
            }
        }
    }
    (name.to_string(), None)
}

/// PXL_20211013_220651983.jpg.json / PXL_20211013_220651983.jpg
pub fn match_exact(json: &str, file: &str, _media: &SupportedMedia) -> bool {
    strip_ext(json) == file
}

/// PXL_20231118_035751175.MP.jpg.json / PXL_20231118_035751175.MP
/// IMG_1234.HEIC.json / IMG_1234.MOV
pub fn match_live_photo(json: &str, file: &str, media: &SupportedMedia) -> bool {
    if media.type_of_name(file) != MediaType::Video {
        return false;
    }
    let mut stem = strip_ext(json);
    let inner = ext_of(stem);
    if !inner.is_empty() && media.is_media(inner) {
        stem = strip_ext(stem);
    }
    file == stem || strip_ext(file) == stem
}

/// PXL_20230809_203449253.LONG_EXPOSURE-02.ORIGIN.json / ...ORIGINA.jpg
/// 05yqt21kruxwwlhhgrwrdyb6chhwszi9bqmzu16w0 2.jp.json / ...w0 2.jpg
///
/// Google cuts names at 47 UTF-16 units; the difference is counted in
/// code points so that a cut surrogate pair still counts as one character.
pub fn match_one_char_omitted(json: &str, file: &str, media: &SupportedMedia) -> bool {
    let mut base = strip_ext(json);
    if !file.starts_with(base) {
        return false;
    }
    if media.is_extension_prefix(ext_of(base)) {
        base = strip_ext(base);
    }
    let file = strip_ext(file);
    char_len(file) <= char_len(base) + 1
}

/// Backyard_ceremony_wedding_photography_xxxxxxx_(494).json
/// Backyard_ceremony_wedding_photography_xxxxxxx_m(494).jpg
pub fn match_long_name_with_counter(json: &str, file: &str, _media: &SupportedMedia) -> bool {
    let json = strip_ext(json);
    let Some(p1) = json.find('(') else {
        return false;
    };
    match json.find(')') {
        Some(p2) if p2 == json.len() - 1 => {}
        _ => return false,
    }
    if file.find('(') != Some(p1 + 1) {
        return false;
    }
    if json.get(..p1) != file.get(..p1) {
        return false;
    }
    let Some(f2) = file.find(')') else {
        return false;
    };
    if f2 <= p1 + 1 {
        return false;
    }
    json.get(p1 + 1..json.len() - 1) == file.get(p1 + 2..f2)
}

/// IMG_3479.JPG(2).json / IMG_3479(2).JPG
/// 13039_..._n.j(1).json / 13039_..._n(1).jpg when the inner extension was cut
pub fn match_duplicate_in_year(json: &str, file: &str, media: &SupportedMedia) -> bool {
    let json = strip_ext(json);
    let p1 = match json.find('(') {
        Some(p) if p >= 1 => p,
        _ => return false,
    };
    match json.find(')') {
        Some(p2) if p2 == json.len() - 1 => {}
        _ => return false,
    }
    let num = &json[p1..];
    let rest = &json[..p1];
    let ext = ext_of(rest);
    if format!("{}{}{}", strip_ext(rest), num, ext) == file {
        return true;
    }
    let file_ext = ext_of(file);
    media.is_extension_prefix(ext)
        && file_ext.starts_with(ext)
        && format!("{}{}", strip_ext(rest), num) == strip_ext(file)
}

/// PXL_20220405_090123740.PORTRAIT.jpg.json / PXL_20220405_090123740.PORTRAIT-modifié.jpg
/// but not DSC_0104.JPG.json / DSC_0104(1).JPG
pub fn match_edited_name(json: &str, file: &str, media: &SupportedMedia) -> bool {
    if file_index(file).1.is_some() {
        return false;
    }
    let base = strip_ext(json);
    let ext = ext_of(base);
    if ext.is_empty() || !media.is_media(ext) {
        return false;
    }
    strip_ext(file).starts_with(strip_ext(base))
}

/// original_1d4caa6f-16c6-4c3d-901b-9387de10e528_.json
/// original_1d4caa6f-16c6-4c3d-901b-9387de10e528_P(1).jpg
pub fn match_forgotten_duplicates(json: &str, file: &str, _media: &SupportedMedia) -> bool {
    let json = strip_ext(json);
    let file = strip_ext(file);
    file.starts_with(json) && char_len(file) - char_len(json) < FORGOTTEN_DUPLICATE_MAX_EXTRA
}

/// Name of the first rule matching the pair.
pub fn first_match(json: &str, file: &str, media: &SupportedMedia) -> Option<&'static str> {
    MATCHERS
        .iter()
        .find(|m| (m.test)(json, file, media))
        .map(|m| m.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMOJI_JSON: &str = "😀😃😄😁😆😅😂🤣🥲☺️😊😇🙂🙃😉😌😍🥰😘😗😙😚😋.json";
    const EMOJI_FILE: &str = "😀😃😄😁😆😅😂🤣🥲☺️😊😇🙂🙃😉😌😍🥰😘😗😙😚😋😛.jpg";

    #[test]
    fn test_corpus() {
        let media = SupportedMedia::default();
        let cases: &[(&str, &str, Option<&str>)] = &[
            ("PXL_20211013_220651983.jpg.json", "PXL_20211013_220651983.jpg", Some("exact")),
            ("PXL_20211013_220651983.jpg.json", "PXL_20211013_220651958.jpg", None),
            ("PXL_20220405_090123740.PORTRAIT.jpg.json", "PXL_20220405_090123740.PORTRAIT-modifié.jpg", Some("edited-name")),
            ("PXL_20220405_090123740.PORTRAIT.jpg.json", "PXL_20220405_090123741.PORTRAIT-modifié.jpg", None),
            ("DSC_0100.JPG.json", "DSC_0100.JPG", Some("exact")),
            ("DSC_0101.JPG(1).json", "DSC_0101(1).JPG", Some("duplicate-in-year")),
            ("DSC_0102.JPG(2).json", "DSC_0102(1).JPG", None),
            ("DSC_0103.JPG(1).json", "DSC_0103.JPG", None),
            ("DSC_0104.JPG.json", "DSC_0104(1).JPG", None),
            ("IMG_2710.HEIC(1).json", "IMG_2710(1).HEIC", Some("duplicate-in-year")),
            ("IMG_3479.JPG(2).json", "IMG_3479(2).JPG", Some("duplicate-in-year")),
            ("IMG_3479.JPG(2).json", "IMG_3479(3).JPG", None),
            ("PXL_20231118_035751175.MP.jpg.json", "PXL_20231118_035751175.MP.jpg", Some("exact")),
            ("PXL_20231118_035751175.MP.jpg.json", "PXL_20231118_035751175.MP", Some("live-photo")),
            ("PXL_20210102_221126856.MP~2.jpg.json", "PXL_20210102_221126856.MP~2.jpg", Some("exact")),
            ("IMG_1234.HEIC.json", "IMG_1234.MOV", Some("live-photo")),
            (
                "PXL_20230809_203449253.LONG_EXPOSURE-02.ORIGIN.json",
                "PXL_20230809_203449253.LONG_EXPOSURE-02.ORIGINA.jpg",
                Some("one-char-omitted"),
            ),
            (
                "05yqt21kruxwwlhhgrwrdyb6chhwszi9bqmzu16w0 2.jp.json",
                "05yqt21kruxwwlhhgrwrdyb6chhwszi9bqmzu16w0 2.jpg",
                Some("one-char-omitted"),
            ),
            (EMOJI_JSON, EMOJI_FILE, Some("one-char-omitted")),
            (
                "Backyard_ceremony_wedding_photography_xxxxxxx_(494).json",
                "Backyard_ceremony_wedding_photography_xxxxxxx_m(494).jpg",
                Some("long-name-with-counter"),
            ),
            (
                "Backyard_ceremony_wedding_photography_xxxxxxx_(494).json",
                "Backyard_ceremony_wedding_photography_xxxxxxx_m(185).jpg",
                None,
            ),
            (
                "original_1d4caa6f-16c6-4c3d-901b-9387de10e528_.json",
                "original_1d4caa6f-16c6-4c3d-901b-9387de10e528_P.jpg",
                Some("one-char-omitted"),
            ),
            (
                "original_1d4caa6f-16c6-4c3d-901b-9387de10e528_.json",
                "original_1d4caa6f-16c6-4c3d-901b-9387de10e528_P(1).jpg",
                Some("forgotten-duplicates"),
            ),
            (
                "13039_327707840323_537645323_9470255_27214_n.j(1).json",
                "13039_327707840323_537645323_9470255_27214_n(1).jpg",
                Some("duplicate-in-year"),
            ),
        ];

        for (json, file, want) in cases {
            assert_eq!(first_match(json, file, &media), *want, "{} / {}", json, file);
        }
    }

    #[test]
    fn test_truncated_emoji_name() {
        let media = SupportedMedia::default();
        let stem = EMOJI_FILE.trim_end_matches(".jpg");
        assert!(stem.encode_utf16().count() > 47);
        let json_stem = EMOJI_JSON.trim_end_matches(".json");
        assert!(json_stem.encode_utf16().count() <= 47);
        assert!(match_one_char_omitted(EMOJI_JSON, EMOJI_FILE, &media));
    }

    #[test]
    fn test_long_name_rejects_misplaced_counter() {
        let media = SupportedMedia::default();
        assert!(!match_long_name_with_counter("abc_(1).json", "abc_(1).jpg", &media));
        assert!(!match_long_name_with_counter("abc_(1)x.json", "abc_m(1).jpg", &media));
        assert!(!match_long_name_with_counter("abc_(1).json", "abc_m().jpg", &media));
        assert!(!match_long_name_with_counter("é(1).json", "éé(1).jpg", &media));
    }

    #[test]
    fn test_edited_requires_media_inner_extension() {
        let media = SupportedMedia::default();
        assert!(match_edited_name("IMG_0001.HEIC.json", "IMG_0001-edited.jpg", &media));
        assert!(!match_edited_name("IMG_0001.COVER.json", "IMG_0001-edited.jpg", &media));
        assert!(!match_edited_name("IMG_0001.json", "IMG_0001-edited.jpg", &media));
    }

    #[test]
    fn test_file_index() {
        assert_eq!(file_index("IMG(12).JPG"), ("IMG.JPG".to_string(), Some("12")));
        assert_eq!(file_index("IMG(x).JPG"), ("IMG(x).JPG".to_string(), None));
        assert_eq!(file_index("IMG).JPG("), ("IMG).JPG(".to_string(), None));
    }

    #[test]
    fn test_rules_are_disjoint_on_counter_corpus() {
        // Each file of a counter series is claimed by exactly one sidecar
        let media = SupportedMedia::default();
        let jsons = ["IMG_3479.JPG.json", "IMG_3479.JPG(1).json", "IMG_3479.JPG(2).json"];
        let files = ["IMG_3479.JPG", "IMG_3479(1).JPG", "IMG_3479(2).JPG"];
        for m in MATCHERS {
            for f in files {
                let owners = jsons.iter().filter(|j| (m.test)(j, f, &media)).count();
                assert!(owners <= 1, "{} claims {} {} times", m.name, f, owners);
            }
        }
    }
}
