pub mod perceptual;

pub use perceptual::{fingerprint_file, fingerprint_image};

/// 64-bit average hash of an image. Two captures are near-duplicates exactly
/// when their fingerprints are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub u64);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
