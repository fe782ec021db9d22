use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// Timestamp layout used for capture filenames: `YYYYMMDD_HHMMSS`.
pub const CAPTURE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Source identifier → capture paths, ordered by identifier.
pub type Batches = BTreeMap<String, Vec<PathBuf>>;

/// Normalized identifier of one physical camera.
///
/// Lowercased, spaces replaced with underscores, runs of underscores collapsed
/// to a single one. "Living  Room" and "living_room" name the same source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(name: &str) -> Self {
        let mut id = String::with_capacity(name.len());
        for c in name.to_lowercase().chars() {
            let c = if c == ' ' { '_' } else { c };
            if c == '_' && id.ends_with('_') {
                continue;
            }
            id.push(c);
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image formats the pipeline collects, dedups and mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }
}

/// Whether a filename carries one of the recognized image extensions.
pub fn is_image_name(name: &str) -> bool {
    ImageFormat::from_path(Path::new(name)).is_some()
}

/// Capture date embedded in the first 8 characters of a filename, as `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureDate(pub u32);

impl CaptureDate {
    /// Parse the leading 8 characters of `file_name`. Returns `None` when they
    /// are missing or are not all ASCII digits.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let prefix = file_name.get(..8)?;
        if !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        prefix.parse().ok().map(Self)
    }
}

/// Filename for a capture taken at `at`: `YYYYMMDD_HHMMSS.jpg`.
pub fn capture_file_name(at: NaiveDateTime) -> String {
    format!("{}.jpg", at.format(CAPTURE_TIMESTAMP_FORMAT))
}

/// Full path of a capture: `<root>/<source_id>/<YYYYMMDD_HHMMSS>.jpg`.
pub fn capture_path(root: &Path, source: &SourceId, at: NaiveDateTime) -> PathBuf {
    root.join(source.as_str()).join(capture_file_name(at))
}

/// Totals reported by one dedup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupSummary {
    /// Paths handed to the grouper.
    pub found: usize,
    /// Duplicates deleted from disk.
    pub removed: usize,
    /// Paths kept as the first of their fingerprint.
    pub survived: usize,
    /// Paths that could not be opened or decoded.
    pub unreadable: usize,
    /// Duplicates whose deletion failed; left on disk.
    pub delete_failed: usize,
}

impl DedupSummary {
    pub fn absorb(&mut self, other: DedupSummary) {
        self.found += other.found;
        self.removed += other.removed;
        self.survived += other.survived;
        self.unreadable += other.unreadable;
        self.delete_failed += other.delete_failed;
    }
}

/// Outcome of one capture pass across all producers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub captured: usize,
    pub failed: usize,
}

/// Outcome of one mirror pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// False when the remote parent folder was not found and nothing ran.
    pub parent_found: bool,
    pub folders_created: usize,
    pub uploaded: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_source_id_normalization() {
        assert_eq!(SourceId::new("Living Room").as_str(), "living_room");
        assert_eq!(SourceId::new("Baby  Cam").as_str(), "baby_cam");
        assert_eq!(SourceId::new("front__door _cam").as_str(), "front_door_cam");
        assert_eq!(SourceId::new("nursery").as_str(), "nursery");
    }

    #[test]
    fn test_image_format_from_extension() {
        assert_eq!(ImageFormat::from_extension("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("Png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("gif"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::from_extension("bmp"), Some(ImageFormat::Bmp));
        assert_eq!(ImageFormat::from_extension("tiff"), None);
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(
            ImageFormat::from_path(Path::new("out/kitchen/a.BMP")).map(|f| f.mime_type()),
            Some("image/bmp")
        );
        assert!(is_image_name("20240101_080000.JPEG"));
        assert!(!is_image_name("notes.txt"));
        assert!(!is_image_name("jpg"));
    }

    #[test]
    fn test_capture_date_parsing() {
        assert_eq!(
            CaptureDate::from_file_name("20240102_0900.jpg"),
            Some(CaptureDate(20240102))
        );
        assert_eq!(CaptureDate::from_file_name("2024010.jpg"), None);
        assert_eq!(CaptureDate::from_file_name("IMG_0001.jpg"), None);
        assert_eq!(CaptureDate::from_file_name("1.jpg"), None);
        assert_eq!(CaptureDate::from_file_name("+2024010_x.jpg"), None);
    }

    #[test]
    fn test_capture_path_layout() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(7, 5, 9)
            .unwrap();
        let path = capture_path(Path::new("/data/out"), &SourceId::new("Nursery Cam"), at);
        assert_eq!(path, PathBuf::from("/data/out/nursery_cam/20240301_070509.jpg"));
    }

    #[test]
    fn test_dedup_summary_absorb() {
        let mut total = DedupSummary::default();
        total.absorb(DedupSummary {
            found: 3,
            removed: 1,
            survived: 2,
            unreadable: 0,
            delete_failed: 0,
        });
        total.absorb(DedupSummary {
            found: 2,
            removed: 0,
            survived: 1,
            unreadable: 1,
            delete_failed: 0,
        });
        assert_eq!(total.found, 5);
        assert_eq!(total.removed, 1);
        assert_eq!(total.survived, 3);
        assert_eq!(total.unreadable, 1);
    }
}
