// Takeout Sync Constants

// Image extensions (lowercase, with leading dot)
pub const IMAGE_EXTENSIONS: [&str; 46] = [
    ".3fr", ".ari", ".arw", ".avif", ".bmp", ".cap", ".cin", ".cr2", ".cr3", ".crw",
    ".dcr", ".dng", ".erf", ".fff", ".gif", ".heic", ".heif", ".hif", ".iiq", ".insp",
    ".jpe", ".jpeg", ".jpg", ".jxl", ".k25", ".kdc", ".mrw", ".nef", ".nrw", ".orf",
    ".ori", ".pef", ".png", ".psd", ".raf", ".raw", ".rw2", ".rwl", ".sr2", ".srf",
    ".srw", ".tif", ".tiff", ".webp", ".x3f", ".jfif",
];

// Video extensions; ".mp" is the motion half of a Google motion photo
pub const VIDEO_EXTENSIONS: [&str; 14] = [
    ".3gp", ".avi", ".flv", ".insv", ".m2ts", ".m4v", ".mkv", ".mov", ".mp4", ".mpg",
    ".mts", ".webm", ".wmv", ".mp",
];

// Raw formats, a subset of IMAGE_EXTENSIONS
pub const RAW_EXTENSIONS: [&str; 30] = [
    ".3fr", ".ari", ".arw", ".cap", ".cin", ".cr2", ".cr3", ".crw", ".dcr", ".dng",
    ".erf", ".fff", ".iiq", ".k25", ".kdc", ".mrw", ".nef", ".nrw", ".orf", ".ori",
    ".pef", ".psd", ".raf", ".raw", ".rw2", ".rwl", ".sr2", ".srf", ".srw", ".x3f",
];

pub const SIDECAR_EXTENSIONS: [&str; 2] = [".json", ".xmp"];

// Google marks unplayable uploads by moving them into this folder
pub const FAILED_VIDEOS_SEGMENT: &str = "Failed Videos";

// Export bookkeeping files carrying no photo or album metadata
pub const IGNORED_JSON_FILES: [&str; 3] = [
    "print-subscriptions.json",
    "shared_album_comments.json",
    "user-generated-memory-titles.json",
];

// Localized names of album metadata files
pub const ALBUM_METADATA_FILES: [&str; 5] = [
    "metadata.json",
    "métadonnées.json",
    "metadati.json",
    "metadáta.json",
    "Metadaten.json",
];

pub const DEFAULT_BANNED_FILES: [&str; 8] = [
    "@eaDir/",
    "@__thumb/",
    "SYNOFILE_THUMB_*.*",
    "Lightroom Catalog/",
    "thumbnails/",
    ".DS_Store",
    "/._*",
    ".photostructure/",
];

// Suffixes Google appends to edited copies, per locale
pub const EDITED_SUFFIXES: [&str; 7] = [
    "-edited",
    "-modifié",
    "-bearbeitet",
    "-modificato",
    "-editado",
    "-bewerkt",
    "-redigert",
];

// Grouping windows
pub const DEFAULT_BURST_INTERVAL_MS: i64 = 250;
pub const DEFAULT_SERIES_PAIR_WINDOW_MS: i64 = 500;

// Rule 7 accepts at most this many extra code points
pub const FORGOTTEN_DUPLICATE_MAX_EXTRA: usize = 10;

// Pipeline
pub const CHANNEL_CAPACITY: usize = 16;
pub const TEMP_FILE_PREFIX: &str = "takeout-sync-";
pub const TEMP_FILE_SUFFIX: &str = ".tmp";
pub const PROBE_DEFAULT_BYTES: usize = 64 * 1024;

// Tags
pub const SESSION_TAG_PREFIX: &str = "{takeout-sync}";
pub const TAKEOUT_TAG_PREFIX: &str = "{takeout}";
pub const PEOPLE_TAG_PREFIX: &str = "People";

// Filename dates further than this in the future are rejected
pub const NAME_TIME_FUTURE_TOLERANCE_HOURS: i64 = 24;

// Fake listings (unzip -l)
pub const LISTING_DATE_FORMAT: &str = "%m-%d-%Y %H:%M";
