//! Image normalization: resize to a fixed width, preserving aspect ratio.
//!
//! Every upload is scaled to `target_width` (500 px by default) with the
//! height following the source aspect ratio, then written as PNG to a scoped
//! temp file. That file is the only thing handed to the requester, and it is
//! removed when the [`NormalizedImage`] handle drops.
//!
//! Decoding and resizing are CPU-bound, so [`normalize_file_async`] moves the
//! work onto tokio's blocking pool.

use crate::error::MedImgError;
use crate::pipeline::upload::scoped_temp_file;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A resized image held in a scoped temp PNG.
#[derive(Debug)]
pub struct NormalizedImage {
    file: NamedTempFile,
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

impl NormalizedImage {
    /// Path of the temp PNG; valid while `self` is alive.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn mime_type(&self) -> &'static str {
        "image/png"
    }
}

/// Largest normalized image (width × height) the normalizer will allocate.
pub const MAX_NORMALIZED_PIXELS: u64 = 16_000_000;

/// Output dimensions for a `width × height` source scaled to `target_width`.
///
/// `height = round(target_width / (width / height))`, halves rounded up,
/// never below 1 px. Both source dimensions must be non-zero. Heights past
/// `u32::MAX` saturate; [`normalize_image`] rejects them long before that.
pub fn target_dimensions(width: u32, height: u32, target_width: u32) -> (u32, u32) {
    let new_height = scaled_height(width, height, target_width);
    (target_width, u32::try_from(new_height).unwrap_or(u32::MAX))
}

// Integer half-up rounding of target_width * height / width.
fn scaled_height(width: u32, height: u32, target_width: u32) -> u64 {
    let (w, h, t) = (width as u64, height as u64, target_width as u64);
    ((2 * t * h + w) / (2 * w)).max(1)
}

/// Resize `img` and write it to a temp PNG in `temp_dir`.
pub fn normalize_image(
    img: &DynamicImage,
    target_width: u32,
    temp_dir: Option<&Path>,
) -> Result<NormalizedImage, MedImgError> {
    let (source_width, source_height) = img.dimensions();
    if source_width == 0 || source_height == 0 {
        return Err(MedImgError::ImageDecode {
            detail: format!("image has no pixels ({source_width}×{source_height})"),
        });
    }

    let scaled = scaled_height(source_width, source_height, target_width);
    if target_width as u64 * scaled > MAX_NORMALIZED_PIXELS {
        return Err(MedImgError::ImageTooLarge {
            width: target_width,
            height: scaled,
            limit: MAX_NORMALIZED_PIXELS,
        });
    }
    let (width, height) = target_dimensions(source_width, source_height, target_width);
    let resized = img.resize_exact(width, height, FilterType::CatmullRom);

    let mut buf = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| MedImgError::ImageEncode {
            detail: e.to_string(),
        })?;

    let mut file = scoped_temp_file(temp_dir, "medimg-normalized-", ".png")?;
    file.write_all(&buf)
        .and_then(|_| file.flush())
        .map_err(|source| MedImgError::TempFile { source })?;

    debug!(
        "Normalized {}×{} → {}×{} ({} bytes PNG)",
        source_width,
        source_height,
        width,
        height,
        buf.len()
    );

    Ok(NormalizedImage {
        file,
        width,
        height,
        source_width,
        source_height,
    })
}

/// Decode the image at `path` (format sniffed from content) and normalize it.
pub fn normalize_file(
    path: &Path,
    target_width: u32,
    temp_dir: Option<&Path>,
) -> Result<NormalizedImage, MedImgError> {
    let img = decode_file(path)?;
    normalize_image(&img, target_width, temp_dir)
}

/// [`normalize_file`] on the blocking pool.
pub async fn normalize_file_async(
    path: PathBuf,
    target_width: u32,
    temp_dir: Option<PathBuf>,
) -> Result<NormalizedImage, MedImgError> {
    tokio::task::spawn_blocking(move || normalize_file(&path, target_width, temp_dir.as_deref()))
        .await
        .map_err(|e| MedImgError::Internal(format!("normalize task failed: {e}")))?
}

fn decode_file(path: &Path) -> Result<DynamicImage, MedImgError> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|source| MedImgError::TempFile { source })?;
    reader.decode().map_err(|e| MedImgError::ImageDecode {
        detail: e.to_string(),
    })
}
