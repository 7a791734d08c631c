// Event recorder: per-file events, counters and the end-of-run report

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

const EVENT_KINDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventCode {
    DiscoveredImage,
    DiscoveredVideo,
    DiscoveredSidecar,
    DiscoveredDiscarded,
    DiscoveredUnsupported,
    AssociatedMetadata,
    MissingMetadata,
    LocalDuplicate,
    LivePhoto,
    Error,
}

impl EventCode {
    pub const ALL: [EventCode; EVENT_KINDS] = [
        EventCode::DiscoveredImage,
        EventCode::DiscoveredVideo,
        EventCode::DiscoveredSidecar,
        EventCode::DiscoveredDiscarded,
        EventCode::DiscoveredUnsupported,
        EventCode::AssociatedMetadata,
        EventCode::MissingMetadata,
        EventCode::LocalDuplicate,
        EventCode::LivePhoto,
        EventCode::Error,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EventCode::DiscoveredImage => "scanned image file",
            EventCode::DiscoveredVideo => "scanned video file",
            EventCode::DiscoveredSidecar => "scanned sidecar file",
            EventCode::DiscoveredDiscarded => "discarded file",
            EventCode::DiscoveredUnsupported => "unsupported file",
            EventCode::AssociatedMetadata => "associated metadata file",
            EventCode::MissingMetadata => "missing associated metadata file",
            EventCode::LocalDuplicate => "file duplicated in the input",
            EventCode::LivePhoto => "live photo",
            EventCode::Error => "error",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for EventCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Thread-safe event sink. Counters are lock-free; log output is serialized
/// behind a mutex so lines from different stages do not interleave.
pub struct Recorder {
    counts: [AtomicI64; EVENT_KINDS],
    log_lock: Mutex<()>,
    json_less_accepted: bool,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            counts: Default::default(),
            log_lock: Mutex::new(()),
            json_less_accepted: false,
        }
    }

    /// Missing metadata is only informational when JSON-less files are kept.
    pub fn with_json_less_accepted(mut self, accepted: bool) -> Self {
        self.json_less_accepted = accepted;
        self
    }

    /// Record one event for `file` ("archive:path"), with optional key/value details.
    pub fn record(&self, code: EventCode, file: &str, details: &[(&str, &str)]) {
        self.counts[code.index()].fetch_add(1, Ordering::Relaxed);

        let mut line = String::new();
        let _ = write!(line, "{}", code.label());
        if !file.is_empty() {
            let _ = write!(line, " file=\"{}\"", file);
        }
        for (k, v) in details {
            let _ = write!(line, " {}=\"{}\"", k, v);
        }

        // Poisoning only means another thread panicked mid-log
        let _guard = self.log_lock.lock().unwrap_or_else(|e| e.into_inner());
        match code {
            EventCode::Error => log::error!("{}", line),
            EventCode::MissingMetadata if self.json_less_accepted => log::info!("{}", line),
            EventCode::DiscoveredDiscarded
            | EventCode::DiscoveredUnsupported
            | EventCode::LocalDuplicate
            | EventCode::MissingMetadata => log::warn!("{}", line),
            _ => log::debug!("{}", line),
        }
    }

    pub fn count(&self, code: EventCode) -> i64 {
        self.counts[code.index()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Report {
        Report {
            counts: EventCode::ALL.iter().map(|c| (*c, self.count(*c))).collect(),
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen counters, rendered at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub counts: Vec<(EventCode, i64)>,
}

impl Report {
    pub fn get(&self, code: EventCode) -> i64 {
        self.counts
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Input analysis:");
        let _ = writeln!(out, "----------------------");
        for (code, n) in &self.counts {
            let _ = writeln!(out, "{:<40}: {:>7}", code.label(), n);
        }
        let scanned = self.get(EventCode::DiscoveredImage) + self.get(EventCode::DiscoveredVideo);
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<40}: {:>7}", "total media files", scanned);
        if self.get(EventCode::Error) > 0 {
            let _ = writeln!(out, "{} error(s) occurred, see the log", self.get(EventCode::Error));
        }
        out
    }
}
