use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use camsweep_core::capture::ImageProducer;
use camsweep_core::config::Config;
use camsweep_core::dedup::{dedup_batch, deduplicate};
use camsweep_core::error::Result;
use camsweep_core::recency::most_recent_batches;
use camsweep_core::scheduler::Scheduler;
use camsweep_core::sync::{mirror, RemoteEntry, RemoteStore};
use camsweep_core::{dedup_recent, Pipeline};

/// Save a 64×64 JPEG whose bright region depends on `pattern`, so different
/// patterns produce different fingerprints.
fn create_jpeg(path: &Path, pattern: u8) {
    let img = image::RgbImage::from_fn(64, 64, |x, y| {
        let bright = match pattern {
            0 => x < 32,
            1 => y < 32,
            2 => (x / 16 + y / 16) % 2 == 0,
            _ => x + y < 64,
        };
        if bright {
            image::Rgb([230, 230, 230])
        } else {
            image::Rgb([20, 20, 20])
        }
    });
    img.save(path).unwrap();
}

fn copy_file(src: &Path, dst: &Path) {
    fs::copy(src, dst).unwrap();
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect()
}

// ── Recency + dedup scenarios ───────────────────────────────────

#[test]
fn test_kitchen_newest_date_only() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = tmp.path().join("kitchen");
    fs::create_dir_all(&kitchen).unwrap();
    create_jpeg(&kitchen.join("20240101_0800.jpg"), 0);
    copy_file(&kitchen.join("20240101_0800.jpg"), &kitchen.join("20240101_0801.jpg"));
    create_jpeg(&kitchen.join("20240102_0900.jpg"), 1);

    let mut batches = most_recent_batches(tmp.path()).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(file_names(&batches["kitchen"]), vec!["20240102_0900.jpg"]);

    let summary = deduplicate(&mut batches, None);
    assert_eq!(summary.found, 1);
    assert_eq!(summary.removed, 0);

    // Older duplicates are outside the batch and untouched.
    assert!(kitchen.join("20240101_0801.jpg").exists());
}

#[test]
fn test_nursery_keeps_first_of_each_fingerprint() {
    let tmp = tempfile::tempdir().unwrap();
    let nursery = tmp.path().join("nursery");
    fs::create_dir_all(&nursery).unwrap();
    create_jpeg(&nursery.join("20240301_070000.jpg"), 2);
    copy_file(
        &nursery.join("20240301_070000.jpg"),
        &nursery.join("20240301_070300.jpg"),
    );
    create_jpeg(&nursery.join("20240301_070600.jpg"), 3);

    let (batches, summary) = dedup_recent(tmp.path(), None).unwrap();

    assert_eq!(summary.found, 3);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.survived, 2);
    assert_eq!(
        file_names(&batches["nursery"]),
        vec!["20240301_070000.jpg", "20240301_070600.jpg"]
    );
    assert!(!nursery.join("20240301_070300.jpg").exists());
}

#[test]
fn test_undecodable_file_is_counted_but_kept_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let porch = tmp.path().join("porch");
    fs::create_dir_all(&porch).unwrap();
    create_jpeg(&porch.join("20240501_100000.jpg"), 0);
    fs::write(porch.join("20240501_100300.jpg"), b"truncated jpeg").unwrap();
    create_jpeg(&porch.join("20240501_100600.jpg"), 1);

    let (_, summary) = dedup_recent(tmp.path(), None).unwrap();

    assert_eq!(summary.found, 3);
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.survived, 2);
    assert_eq!(summary.unreadable, 1);
    assert!(porch.join("20240501_100300.jpg").exists());
}

#[test]
fn test_second_dedup_removes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let crib = tmp.path().join("crib");
    fs::create_dir_all(&crib).unwrap();
    create_jpeg(&crib.join("20240601_000000.jpg"), 0);
    for name in ["20240601_000300.jpg", "20240601_000600.jpg"] {
        copy_file(&crib.join("20240601_000000.jpg"), &crib.join(name));
    }
    create_jpeg(&crib.join("20240601_000900.jpg"), 1);

    let (batches, first) = dedup_recent(tmp.path(), None).unwrap();
    assert_eq!(first.removed, 2);

    let (_, second) = dedup_batch("crib", &batches["crib"], None);
    assert_eq!(second.removed, 0);
    assert_eq!(second.survived, 2);
}

#[test]
fn test_sources_are_deduplicated_independently() {
    let tmp = tempfile::tempdir().unwrap();
    for source in ["attic", "garage"] {
        let dir = tmp.path().join(source);
        fs::create_dir_all(&dir).unwrap();
        create_jpeg(&dir.join("20240701_120000.jpg"), 2);
    }

    let (batches, summary) = dedup_recent(tmp.path(), None).unwrap();

    assert_eq!(summary.removed, 0);
    assert_eq!(batches["attic"].len(), 1);
    assert_eq!(batches["garage"].len(), 1);
}

// ── Full pipeline ───────────────────────────────────────────────

/// Writes the same frame for every capture.
struct StillCamera {
    name: &'static str,
}

impl ImageProducer for StillCamera {
    fn label(&self) -> String {
        "still".to_string()
    }

    fn sources(&mut self) -> Result<Vec<String>> {
        Ok(vec![self.name.to_string()])
    }

    fn capture(&mut self, _source: &str, target: &Path) -> Result<()> {
        create_jpeg(target, 0);
        Ok(())
    }
}

#[derive(Default)]
struct MemoryDrive {
    parent: Option<String>,
    children: HashMap<String, Vec<RemoteEntry>>,
    uploads: Vec<String>,
    next_id: usize,
}

impl MemoryDrive {
    fn with_parent() -> Self {
        Self {
            parent: Some("parent".to_string()),
            ..Default::default()
        }
    }

    fn add(&mut self, parent_id: &str, name: String, is_folder: bool) -> String {
        self.next_id += 1;
        let id = format!("f{}", self.next_id);
        self.children
            .entry(parent_id.to_string())
            .or_default()
            .push(RemoteEntry {
                id: id.clone(),
                name,
                is_folder,
            });
        id
    }
}

impl RemoteStore for MemoryDrive {
    fn find_folder(&mut self, _name: &str) -> Result<Option<String>> {
        Ok(self.parent.clone())
    }

    fn list_children(&mut self, parent_id: &str) -> Result<Vec<RemoteEntry>> {
        Ok(self.children.get(parent_id).cloned().unwrap_or_default())
    }

    fn create_folder(&mut self, name: &str, parent_id: &str) -> Result<String> {
        Ok(self.add(parent_id, name.to_string(), true))
    }

    fn upload_file(&mut self, local: &Path, parent_id: &str) -> Result<String> {
        let name = local.file_name().unwrap().to_string_lossy().to_string();
        self.uploads.push(name.clone());
        Ok(self.add(parent_id, name, false))
    }
}

fn config_for(root: &Path) -> Config {
    Config::from_vars([
        ("CONFIG_JSON_PATH", root.join("creds/blink.json").display().to_string()),
        ("OUTPUT_FOLDER", root.join("out").display().to_string()),
        (
            "GOOGLE_DRIVE_CREDENTIALS_PATH",
            root.join("creds/drive.json").display().to_string(),
        ),
        ("GOOGLE_DRIVE_PHOTO_FOLDER_NAME", "BabyCarePhotos".to_string()),
    ])
    .unwrap()
}

#[test]
fn test_pipeline_iteration_captures_dedups_and_mirrors() {
    let tmp = tempfile::tempdir().unwrap();
    let producers: Vec<Box<dyn ImageProducer>> = vec![Box::new(StillCamera { name: "Crib Cam" })];
    let mut pipeline = Pipeline::new(config_for(tmp.path()), producers, MemoryDrive::with_parent());
    let mut scheduler = Scheduler::default();

    scheduler.run_iteration(&mut pipeline, Instant::now());

    let source_dir = tmp.path().join("out/crib_cam");
    let captured: Vec<PathBuf> = fs::read_dir(&source_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(captured.len(), 1);
    assert!(scheduler.last_maintenance().is_some());

    // A later frame of the same scene on the same day is a near-duplicate.
    let first_name = captured[0].file_name().unwrap().to_string_lossy().to_string();
    let duplicate = source_dir.join(format!("{}_999999.jpg", &first_name[..8]));
    copy_file(&captured[0], &duplicate);

    pipeline.maintain().unwrap();

    assert!(!duplicate.exists());
    let report = pipeline.sync().unwrap();
    assert_eq!(report.uploaded, 0);
    assert_eq!(report.skipped, 1);
}

#[test]
fn test_mirror_round_trip_uploads_once() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    for (source, pattern) in [("kitchen", 0), ("nursery", 1)] {
        let dir = root.join(source);
        fs::create_dir_all(&dir).unwrap();
        create_jpeg(&dir.join("20240801_080000.jpg"), pattern);
    }
    let mut drive = MemoryDrive::with_parent();

    let first = mirror(&mut drive, root, "BabyCarePhotos").unwrap();
    let second = mirror(&mut drive, root, "BabyCarePhotos").unwrap();

    assert_eq!(first.uploaded, 2);
    assert_eq!(first.folders_created, 2);
    assert_eq!(second.uploaded, 0);
    assert_eq!(drive.uploads.len(), 2);
}

#[test]
fn test_missing_remote_parent_does_not_fail_maintenance() {
    let tmp = tempfile::tempdir().unwrap();
    let producers: Vec<Box<dyn ImageProducer>> = vec![Box::new(StillCamera { name: "porch" })];
    let mut pipeline = Pipeline::new(config_for(tmp.path()), producers, MemoryDrive::default());

    pipeline.capture().unwrap();
    pipeline.maintain().unwrap();

    let report = pipeline.sync().unwrap();
    assert!(!report.parent_found);
}
