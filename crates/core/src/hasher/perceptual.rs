use std::path::Path;

use fast_image_resize::{self as fir, images::Image as FirImage};
use image::DynamicImage;

use super::Fingerprint;
use crate::error::{Error, Result};

/// Side length of the hashing grid. 8x8 = 64 bits.
const GRID: u32 = 8;
const CELLS: usize = (GRID * GRID) as usize;

/// Decode the image at `path` and compute its average hash.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    fingerprint_image(&img)
}

/// Compute the average hash (aHash) of a decoded image.
///
/// Pipeline: greyscale at full resolution → resize to 8x8 → mean intensity →
/// one bit per cell, set when the cell is strictly brighter than the mean.
/// Bit `i` corresponds to cell `i` in row-major order.
pub fn fingerprint_image(img: &DynamicImage) -> Result<Fingerprint> {
    let cells = load_8x8_grayscale(img)?;
    Ok(Fingerprint(compute_ahash(&cells)))
}

fn load_8x8_grayscale(img: &DynamicImage) -> Result<[u8; CELLS]> {
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();

    let src = FirImage::from_vec_u8(w, h, gray.into_raw(), fir::PixelType::U8)
        .map_err(|e| Error::Resize(e.to_string()))?;
    let mut dst = FirImage::new(GRID, GRID, fir::PixelType::U8);
    fir::Resizer::new()
        .resize(&src, &mut dst, None)
        .map_err(|e| Error::Resize(e.to_string()))?;

    let mut cells = [0u8; CELLS];
    cells.copy_from_slice(&dst.buffer()[..CELLS]);
    Ok(cells)
}

fn compute_ahash(cells: &[u8; CELLS]) -> u64 {
    // pixel > sum / 64  <=>  pixel * 64 > sum, kept in integers
    let sum: u32 = cells.iter().map(|&p| p as u32).sum();
    let mut hash: u64 = 0;
    for (i, &pixel) in cells.iter().enumerate() {
        if pixel as u32 * CELLS as u32 > sum {
            hash |= 1 << i;
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(cell: u32) -> image::RgbImage {
        image::RgbImage::from_fn(64, 64, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn test_ahash_manual() {
        let mut cells = [100u8; CELLS];
        cells[0] = 200;
        // mean ≈ 101.6, only cell 0 is above it
        assert_eq!(compute_ahash(&cells), 1);
    }

    #[test]
    fn test_ahash_equal_to_mean_is_not_set() {
        let cells = [100u8; CELLS];
        assert_eq!(compute_ahash(&cells), 0);
    }

    #[test]
    fn test_left_half_bright_sets_left_columns() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(64, 64, |x, _| {
            if x < 32 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        }));
        let hash = fingerprint_image(&img).unwrap().0;
        for row in 0..8 {
            for col in 0..8 {
                let bit = (hash >> (row * 8 + col)) & 1;
                assert_eq!(bit == 1, col < 4, "row {row} col {col}");
            }
        }
    }

    #[test]
    fn test_identical_pixels_same_fingerprint() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.png");
        let b = tmp.path().join("b.png");
        checkerboard(8).save(&a).unwrap();
        checkerboard(8).save(&b).unwrap();

        assert_eq!(fingerprint_file(&a).unwrap(), fingerprint_file(&b).unwrap());
    }

    #[test]
    fn test_different_images_different_fingerprint() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("checker.png");
        let b = tmp.path().join("gradient.png");
        checkerboard(8).save(&a).unwrap();
        image::RgbImage::from_fn(64, 64, |x, _| image::Rgb([(x * 4) as u8, 0, 0]))
            .save(&b)
            .unwrap();

        assert_ne!(fingerprint_file(&a).unwrap(), fingerprint_file(&b).unwrap());
    }

    #[test]
    fn test_non_image_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"this is not a jpeg").unwrap();
        assert!(fingerprint_file(&path).is_err());
    }

    #[test]
    fn test_nonexistent_file_is_error() {
        let err = fingerprint_file(Path::new("/nonexistent/image.jpg")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
