// Banned file patterns
//
// Glob patterns, case-insensitive, matched anywhere in a path:
//   "@eaDir/"             any path going through an @eaDir folder
//   "/._*"                macOS resource forks, at the start of a segment
//   "SYNOFILE_THUMB_*.*"  '*' and '?' never cross a '/'
//
// Each pattern is widened into globset globs: a "**/" prefix lets it start
// in any folder, and a "/**" suffix lets it name a folder.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_BANNED_FILES;
use crate::error::{Result, TakeoutError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct BannedFiles {
    patterns: Vec<String>,
    globs: Vec<Glob>,
    set: GlobSet,
}

impl BannedFiles {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut list = Self::empty();
        for p in patterns {
            list.add(p.as_ref())?;
        }
        Ok(list)
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            globs: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// Add one pattern. Empty patterns are ignored.
    pub fn add(&mut self, pattern: &str) -> Result<()> {
        if pattern.is_empty() {
            return Ok(());
        }
        let mut globs = self.globs.clone();
        for text in widen(pattern) {
            globs.push(compile(pattern, &text)?);
        }
        let set = globs
            .iter()
            .cloned()
            .fold(&mut GlobSetBuilder::new(), |builder, glob| builder.add(glob))
            .build()
            .map_err(|e| invalid(pattern, e))?;

        self.patterns.push(pattern.to_string());
        self.globs = globs;
        self.set = set;
        Ok(())
    }

    pub fn is_banned(&self, path: &str) -> bool {
        self.set.is_match(path)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

fn invalid(pattern: &str, e: globset::Error) -> TakeoutError {
    TakeoutError::InvalidPattern(format!("{}: {}", pattern, e))
}

fn compile(pattern: &str, text: &str) -> Result<Glob> {
    GlobBuilder::new(text)
        .case_insensitive(true)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map_err(|e| invalid(pattern, e))
}

// "/x" anchors x to a segment start; otherwise x may start mid-segment.
// "x/" names a folder; otherwise x may end mid-segment or name a folder.
fn widen(pattern: &str) -> Vec<String> {
    let (anchored, body) = match pattern.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let lead = if anchored || body.starts_with('*') { "**/" } else { "**/*" };

    if let Some(folder) = body.strip_suffix('/') {
        let tail = if folder.ends_with('*') { "" } else { "*" };
        return vec![format!("{}{}{}/**", lead, folder, tail)];
    }

    let tail = if body.ends_with('*') { "" } else { "*" };
    let entry = format!("{}{}{}", lead, body, tail);
    let folder = format!("{}/**", entry);
    vec![entry, folder]
}

impl Default for BannedFiles {
    fn default() -> Self {
        let mut list = Self::empty();
        for p in DEFAULT_BANNED_FILES {
            if let Err(e) = list.add(p) {
                log::error!("default banned pattern {} rejected: {}", p, e);
            }
        }
        list
    }
}

impl TryFrom<Vec<String>> for BannedFiles {
    type Error = TakeoutError;

    fn try_from(patterns: Vec<String>) -> Result<Self> {
        BannedFiles::new(&patterns)
    }
}

impl From<BannedFiles> for Vec<String> {
    fn from(list: BannedFiles) -> Self {
        list.patterns
    }
}
