use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::{is_image_name, Batches, CaptureDate};
use crate::error::{Error, Result};

/// Select, for every source directory under `root`, the images whose embedded
/// date equals the newest date present in that directory.
///
/// Sources with no dated images are left out of the result. Lists are in
/// filename order so downstream first-seen semantics are deterministic.
pub fn most_recent_batches(root: &Path) -> Result<Batches> {
    if !root.is_dir() {
        return Err(Error::SourceNotFound(root.to_path_buf()));
    }

    let mut batches = Batches::new();
    for entry in list_sorted(root)? {
        let source_dir = entry.path();
        if !source_dir.is_dir() {
            continue;
        }
        let Some(source_name) = entry.file_name().to_str() else {
            warn!(path = %source_dir.display(), "Skipping source with non UTF-8 name");
            continue;
        };

        match newest_in_source(source_dir) {
            Ok(Some(paths)) => {
                debug!(source = source_name, count = paths.len(), "Selected newest batch");
                batches.insert(source_name.to_string(), paths);
            }
            Ok(None) => debug!(source = source_name, "No dated images"),
            Err(e) => warn!(source = source_name, "Skipping unreadable source: {e}"),
        }
    }

    Ok(batches)
}

/// Newest-date images of one source directory, or `None` if it holds no
/// parseable dated image.
pub fn newest_in_source(source_dir: &Path) -> Result<Option<Vec<PathBuf>>> {
    let dated: Vec<(CaptureDate, PathBuf)> = list_sorted(source_dir)?
        .into_iter()
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?;
            if !is_image_name(name) || !entry.path().is_file() {
                return None;
            }
            let date = CaptureDate::from_file_name(name)?;
            Some((date, entry.into_path()))
        })
        .collect();

    let Some(newest) = dated.iter().map(|(date, _)| *date).max() else {
        return Ok(None);
    };

    Ok(Some(
        dated
            .into_iter()
            .filter(|(date, _)| *date == newest)
            .map(|(_, path)| path)
            .collect(),
    ))
}

fn list_sorted(dir: &Path) -> Result<Vec<walkdir::DirEntry>> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.map_err(Error::from))
        .collect()
}
