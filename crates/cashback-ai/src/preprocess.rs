//! Screenshot preprocessing before it is sent to the model.
//!
//! Phone screenshots are large; scaling the longer edge to a fixed size bounds
//! both the request payload and model latency.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use thiserror::Error;
use tracing::debug;

/// Longer-edge size images are scaled to unless configured otherwise.
pub const DEFAULT_TARGET_SIZE: u32 = 1024;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode or encode {path}: {source}")]
    Codec {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("target size must be positive")]
    ZeroTarget,
}

/// Dimensions after scaling so the longer edge equals `target`.
///
/// Aspect ratio is preserved; the shorter edge is truncated, never below 1px.
pub fn scaled_dimensions(width: u32, height: u32, target: u32) -> (u32, u32) {
    let (width, height, target) = (width as u64, height as u64, target as u64);
    let longest = width.max(height).max(1);
    let w = (width * target / longest).max(1) as u32;
    let h = (height * target / longest).max(1) as u32;
    (w, h)
}

/// Resize the image at `path` in place and return it base64-encoded.
///
/// The file is re-encoded in the format its extension names. Blocking; run it
/// on the blocking pool from async code.
pub fn prepare_image(path: &Path, target: u32) -> Result<String, ImageError> {
    if target == 0 {
        return Err(ImageError::ZeroTarget);
    }
    let codec = |source| ImageError::Codec {
        path: path.to_path_buf(),
        source,
    };

    let img = image::open(path).map_err(codec)?;
    let (w, h) = scaled_dimensions(img.width(), img.height(), target);
    debug!(
        path = %path.display(),
        from = %format!("{}x{}", img.width(), img.height()),
        to = %format!("{w}x{h}"),
        "resizing image"
    );
    let resized = img.resize_exact(w, h, FilterType::Lanczos3);
    resized.save(path).map_err(codec)?;

    let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn landscape_scales_width_to_target() {
        assert_eq!(scaled_dimensions(4000, 3000, 1024), (1024, 768));
    }

    #[test]
    fn portrait_scales_height_to_target() {
        assert_eq!(scaled_dimensions(1170, 2532, 1024), (473, 1024));
    }

    #[test]
    fn small_images_are_scaled_up() {
        assert_eq!(scaled_dimensions(512, 256, 1024), (1024, 512));
    }

    #[test]
    fn extreme_aspect_keeps_one_pixel() {
        assert_eq!(scaled_dimensions(10_000, 2, 100), (100, 1));
    }

    #[test]
    fn prepare_rewrites_file_and_encodes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("shot.png");
        RgbImage::from_pixel(200, 100, Rgb([255, 0, 0])).save(&path).unwrap();

        let encoded = prepare_image(&path, 64).unwrap();
        assert!(!encoded.is_empty());

        let reread = image::open(&path).unwrap();
        assert_eq!((reread.width(), reread.height()), (64, 32));
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, std::fs::read(&path).unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = prepare_image(&tmp.path().join("nope.jpg"), 64).unwrap_err();
        assert!(matches!(err, ImageError::Codec { .. }));
    }

    #[test]
    fn zero_target_rejected() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            prepare_image(&tmp.path().join("x.jpg"), 0),
            Err(ImageError::ZeroTarget)
        ));
    }
}
