use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::domain::{Batches, DedupSummary};
use crate::error::Result;
use crate::hasher::{self, Fingerprint};

/// Progress events emitted while deduplicating.
pub enum DedupProgress {
    /// Starting a source batch.
    BatchStart { source: String, count: usize },
    /// A path has been fingerprinted (or failed to decode). Emitted while the
    /// batch is hashing, in completion order.
    FileHashed { path: PathBuf },
    /// A duplicate was deleted from disk.
    Removed { path: PathBuf },
}

/// Remove near-duplicates from every batch in place and delete them from disk.
///
/// Sources are processed independently. Within a source the first path of each
/// fingerprint is kept and later ones are deleted once the whole batch has been
/// fingerprinted. Unreadable images are dropped from the batch but left on disk.
pub fn deduplicate(
    batches: &mut Batches,
    progress: Option<&mut dyn FnMut(DedupProgress)>,
) -> DedupSummary {
    let mut noop = |_: DedupProgress| {};
    let cb: &mut dyn FnMut(DedupProgress) = match progress {
        Some(cb) => cb,
        None => &mut noop,
    };

    let mut total = DedupSummary::default();
    for (source, paths) in batches.iter_mut() {
        let (kept, summary) = dedup_source(source, paths, &mut *cb);
        *paths = kept;
        total.absorb(summary);
    }

    info!(
        found = total.found,
        removed = total.removed,
        survived = total.survived,
        unreadable = total.unreadable,
        delete_failed = total.delete_failed,
        "Deduplication complete"
    );
    total
}

/// Deduplicate one source batch. Returns the surviving paths in input order.
pub fn dedup_batch(
    source: &str,
    paths: &[PathBuf],
    progress: Option<&mut dyn FnMut(DedupProgress)>,
) -> (Vec<PathBuf>, DedupSummary) {
    match progress {
        Some(cb) => dedup_source(source, paths, cb),
        None => dedup_source(source, paths, &mut |_| {}),
    }
}

fn dedup_source(
    source: &str,
    paths: &[PathBuf],
    progress: &mut dyn FnMut(DedupProgress),
) -> (Vec<PathBuf>, DedupSummary) {
    let mut summary = DedupSummary {
        found: paths.len(),
        ..Default::default()
    };

    progress(DedupProgress::BatchStart {
        source: source.to_string(),
        count: paths.len(),
    });

    let fingerprints = fingerprint_all(paths, &mut *progress);

    let mut seen: HashMap<Fingerprint, &Path> = HashMap::new();
    let mut kept = Vec::new();
    let mut to_remove = Vec::new();

    for (path, fingerprint) in paths.iter().zip(fingerprints) {
        let fingerprint = match fingerprint {
            Ok(fp) => fp,
            Err(e) => {
                error!(source, path = %path.display(), "Error processing image: {e}");
                summary.unreadable += 1;
                continue;
            }
        };

        if let Some(first) = seen.get(&fingerprint) {
            info!(
                source,
                path = %path.display(),
                kept = %first.display(),
                %fingerprint,
                "Near-duplicate image"
            );
            to_remove.push(path);
        } else {
            seen.insert(fingerprint, path);
            kept.push(path.clone());
        }
    }

    for path in to_remove {
        match fs::remove_file(path) {
            Ok(()) => {
                info!(source, path = %path.display(), "Removed near-duplicate image");
                summary.removed += 1;
                progress(DedupProgress::Removed {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => {
                warn!(source, path = %path.display(), "Failed to remove duplicate: {e}");
                summary.delete_failed += 1;
            }
        }
    }

    summary.survived = kept.len();
    (kept, summary)
}

/// Fingerprint a batch on the rayon pool, reporting each file as it finishes.
/// Results come back in input order so first-seen is stable.
fn fingerprint_all(
    paths: &[PathBuf],
    progress: &mut dyn FnMut(DedupProgress),
) -> Vec<Result<Fingerprint>> {
    thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        let worker = scope.spawn(move || {
            paths
                .par_iter()
                .map_with(tx, |tx, path| {
                    let fingerprint = hasher::fingerprint_file(path);
                    // The receiver only goes away once hashing is over.
                    let _ = tx.send(path.clone());
                    fingerprint
                })
                .collect::<Vec<_>>()
        });

        for path in rx {
            progress(DedupProgress::FileHashed { path });
        }
        worker
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}
