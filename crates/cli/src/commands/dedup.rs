use std::path::Path;

use anyhow::Result;
use camsweep_core::dedup::DedupProgress;
use camsweep_core::dedup_recent;
use indicatif::{ProgressBar, ProgressStyle};

pub fn run(root: &Path) -> Result<()> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let (batches, summary) = dedup_recent(
        root,
        Some(&mut |progress| match progress {
            DedupProgress::BatchStart { source, count } => {
                pb.set_length(count as u64);
                pb.set_position(0);
                pb.set_message(format!("Fingerprinting {source}..."));
            }
            DedupProgress::FileHashed { .. } => {
                pb.inc(1);
            }
            DedupProgress::Removed { path } => {
                pb.set_message(format!("removed {}", path.display()));
            }
        }),
    )?;
    pb.finish_and_clear();

    for (source, kept) in &batches {
        println!("  {source}: {} image(s) kept", kept.len());
    }
    println!(
        "{} found, {} removed, {} survived",
        summary.found, summary.removed, summary.survived
    );
    if summary.unreadable > 0 {
        println!("{} unreadable image(s) skipped", summary.unreadable);
    }
    if summary.delete_failed > 0 {
        println!("{} duplicate(s) could not be deleted", summary.delete_failed);
    }
    Ok(())
}
