//! Normalizes input pictures before upload.

use crate::config::base_name;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageReader;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest side, in pixels, of an uploaded image.
pub const MAX_DIMENSION: u32 = 1024;
pub const JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("Image error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

/// Size after downsampling: the longer side is clamped to [`MAX_DIMENSION`]
/// and the shorter one scaled by the same ratio, truncated.
pub fn target_size(width: u32, height: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= MAX_DIMENSION {
        return (width, height);
    }
    let scale = |d: u32| ((d as u64 * MAX_DIMENSION as u64) / longer as u64).max(1) as u32;
    (scale(width), scale(height))
}

/// `<stem>_temp.jpg`
pub fn scratch_file_name(source: &Path) -> String {
    format!("{}_temp.jpg", base_name(source))
}

/// Decodes `source`, downsamples it if needed, converts it to RGB and writes it
/// as a JPEG into `temp_dir`, which is created if missing.
pub fn prepare_image(source: &Path, temp_dir: &Path) -> Result<PreparedImage, PrepareError> {
    std::fs::create_dir_all(temp_dir)?;

    let img = ImageReader::open(source)?.with_guessed_format()?.decode()?;
    let (width, height) = target_size(img.width(), img.height());
    let resized = (width, height) != (img.width(), img.height());
    let img = if resized {
        info!("Resized image to {}x{}", width, height);
        img.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        img
    };
    let rgb = img.to_rgb8();

    let path = temp_dir.join(scratch_file_name(source));
    let writer = BufWriter::new(File::create(&path)?);
    rgb.write_with_encoder(JpegEncoder::new_with_quality(writer, JPEG_QUALITY))?;

    Ok(PreparedImage {
        path,
        width,
        height,
        resized,
    })
}
