use crate::dispatch::Dispatcher;
use gen3d_client::GenerationClient;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// Only process the first image found, as a smoke test.
    pub single_test: bool,
    /// Pause after each request when processing the whole folder.
    pub delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            single_test: false,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    FolderMissing,
    NoImages,
    /// Number of images handed to the dispatcher.
    Dispatched(usize),
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Image files directly inside `dir`, sorted by name.
pub fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_supported_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Runs the dispatcher over the images of `input_dir`, one at a time.
///
/// Per-image failures are logged by the dispatcher and do not stop the batch.
pub async fn run_batch<C: GenerationClient>(
    dispatcher: &mut Dispatcher<C>,
    input_dir: &Path,
    options: &BatchOptions,
) -> std::io::Result<BatchStatus> {
    if !input_dir.is_dir() {
        error!("Input folder {} does not exist", input_dir.display());
        return Ok(BatchStatus::FolderMissing);
    }

    let images = list_images(input_dir)?;
    let Some(first) = images.first() else {
        warn!("No images found in {}", input_dir.display());
        return Ok(BatchStatus::NoImages);
    };

    info!("Processing {} images...", images.len());

    if options.single_test {
        info!("Test with image: {}", display_name(first));
        dispatcher.dispatch_and_report(first).await;
        return Ok(BatchStatus::Dispatched(1));
    }

    for (i, image) in images.iter().enumerate() {
        info!("[{}/{}] Processing {}", i + 1, images.len(), display_name(image));
        dispatcher.dispatch_and_report(image).await;
        tokio::time::sleep(options.delay).await;
    }

    Ok(BatchStatus::Dispatched(images.len()))
}
