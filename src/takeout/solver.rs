// Pass two: bind every media file to its sidecar

use std::sync::Arc;

use super::catalog::{Catalog, DirectoryCatalog};
use super::matchers::MATCHERS;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::events::{EventCode, Recorder};
use crate::media::SupportedMedia;

/// Run the matcher cascade over every directory, in lexicographic order.
/// Files left without a sidecar are promoted with no metadata when
/// `accept_missing` is set, and stay unmatched otherwise.
pub fn solve(
    catalog: &mut Catalog,
    media: &SupportedMedia,
    accept_missing: bool,
    recorder: &Recorder,
    cancel: &CancelToken,
) -> Result<()> {
    for (dir, dc) in catalog.dirs.iter_mut() {
        cancel.check()?;
        solve_directory(dc, media, accept_missing, recorder, |_| {});
        log::debug!(
            "{}: {} matched, {} unmatched, {} sidecars",
            dir,
            dc.matched.len(),
            dc.unmatched.len(),
            dc.jsons.len()
        );
    }
    Ok(())
}

// `scan_order` arranges the candidates of one matcher pass; results must
// not depend on it.
fn solve_directory<F>(
    dc: &mut DirectoryCatalog,
    media: &SupportedMedia,
    accept_missing: bool,
    recorder: &Recorder,
    scan_order: F,
) where
    F: Fn(&mut Vec<String>),
{
    for matcher in MATCHERS.iter() {
        for (json, md) in dc.jsons.iter() {
            if dc.unmatched.is_empty() {
                break;
            }
            let mut hits: Vec<String> = dc
                .unmatched
                .keys()
                .filter(|file| (matcher.test)(json, file, media))
                .cloned()
                .collect();
            scan_order(&mut hits);

            for name in hits {
                if let Some(mut file) = dc.unmatched.remove(&name) {
                    file.metadata = Some(Arc::clone(md));
                    recorder.record(
                        EventCode::AssociatedMetadata,
                        &file.display(),
                        &[("matcher", matcher.name), ("json", json)],
                    );
                    dc.matched.insert(name, file);
                }
            }
        }
    }

    let left: Vec<String> = dc.unmatched.keys().cloned().collect();
    for name in left {
        if let Some(file) = dc.unmatched.get(&name) {
            recorder.record(EventCode::MissingMetadata, &file.display(), &[]);
        }
        if accept_missing {
            if let Some(file) = dc.unmatched.remove(&name) {
                dc.matched.insert(name, file);
            }
        }
    }
}
