pub mod capture;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod hasher;
pub mod http;
pub mod prompt;
pub mod recency;
pub mod scheduler;
pub mod sync;

use std::path::Path;

use tracing::{info, warn};

use capture::ImageProducer;
use config::Config;
use dedup::DedupProgress;
use domain::*;
use error::Result;
use scheduler::Cycle;
use sync::RemoteStore;

/// Select the most recent batch of every source under `root` and remove
/// near-duplicates from it. Returns the surviving batches with the totals.
pub fn dedup_recent(
    root: &Path,
    progress: Option<&mut dyn FnMut(DedupProgress)>,
) -> Result<(Batches, DedupSummary)> {
    let mut batches = recency::most_recent_batches(root)?;
    info!(sources = batches.len(), "Selected most recent batches");
    let summary = dedup::deduplicate(&mut batches, progress);
    Ok((batches, summary))
}

/// The main entry point for the capture pipeline.
///
/// Owns the configuration, the image producers and the cloud store for the
/// lifetime of the process. Sessions inside producers and the store are
/// reused across cycles.
pub struct Pipeline<S: RemoteStore> {
    config: Config,
    producers: Vec<Box<dyn ImageProducer>>,
    store: S,
}

impl<S: RemoteStore> Pipeline<S> {
    pub fn new(config: Config, producers: Vec<Box<dyn ImageProducer>>, store: S) -> Self {
        Self {
            config,
            producers,
            store,
        }
    }

    /// Capture one image from every source.
    pub fn capture(&mut self) -> Result<CaptureReport> {
        let report = capture::capture_all(&self.config.output_root, &mut self.producers)?;
        info!(
            captured = report.captured,
            failed = report.failed,
            "Capture pass complete"
        );
        Ok(report)
    }

    pub fn dedup(
        &self,
        progress: Option<&mut dyn FnMut(DedupProgress)>,
    ) -> Result<(Batches, DedupSummary)> {
        dedup_recent(&self.config.output_root, progress)
    }

    /// Mirror the output tree into the configured remote folder.
    pub fn sync(&mut self) -> Result<SyncReport> {
        sync::mirror(
            &mut self.store,
            &self.config.output_root,
            &self.config.drive_folder,
        )
    }

    /// Recency select, dedup, then sync. Stops at the first error.
    pub fn maintain(&mut self) -> Result<()> {
        let (_, summary) = self.dedup(None)?;
        if summary.delete_failed > 0 {
            warn!(count = summary.delete_failed, "Some duplicates could not be deleted");
        }
        self.sync()?;
        Ok(())
    }
}

impl<S: RemoteStore> Cycle for Pipeline<S> {
    fn capture(&mut self) -> Result<()> {
        Pipeline::capture(self).map(|_| ())
    }

    fn maintain(&mut self) -> Result<()> {
        Pipeline::maintain(self)
    }
}
