use std::path::{Path, PathBuf};

pub const DEFAULT_INPUT_DIR: &str = "input_images";
pub const DEFAULT_TEMP_DIR: &str = "temp";
pub const DEFAULT_OUTPUT_DIR: &str = "output_models";

/// Folders the pipeline writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    /// Normalized scratch images.
    pub temp_dir: PathBuf,
    /// Final meshes and textures.
    pub output_dir: PathBuf,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(DEFAULT_TEMP_DIR, DEFAULT_OUTPUT_DIR)
    }
}

impl Workspace {
    pub fn new(temp_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Where the client stores files it downloads from the service.
    pub fn download_dir(&self) -> PathBuf {
        self.temp_dir.join("downloads")
    }

    pub fn mesh_output_path(&self, base_name: &str) -> PathBuf {
        self.output_dir.join(format!("{base_name}_3d.glb"))
    }

    pub fn texture_output_path(&self, base_name: &str, texture_name: &str) -> PathBuf {
        self.output_dir.join(format!("{base_name}_{texture_name}"))
    }
}

/// File name without extension, used to name every output of an image.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
