//! Submits one image to the generation service and materializes the result.

use crate::config::{base_name, Workspace};
use crate::prepare::{prepare_image, PrepareError};
use gen3d_client::{ClientError, GenerationClient, GenerationParams};
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// `generation_all` answers with: white mesh, textured mesh, two HTML previews.
pub const RESPONSE_LEN: usize = 4;
pub const TEXTURED_MESH_INDEX: usize = 1;

const TEXTURE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to prepare image: {0}")]
    Prepare(#[from] PrepareError),
    #[error("Generation request failed: {0}")]
    Client(#[from] ClientError),
    #[error("Field '{0}' not found in the textured mesh descriptor")]
    MissingField(&'static str),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("Generated mesh not found at {}", .0.display())]
    MeshNotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Location of a generated mesh as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshDescriptor {
    Bare(PathBuf),
    /// A component update such as `{"__type__": "update", "value": ...}`.
    Record(Map<String, Value>),
}

impl MeshDescriptor {
    pub fn from_value(value: &Value) -> Result<Self, DispatchError> {
        match value {
            Value::String(path) => Ok(Self::Bare(PathBuf::from(path))),
            Value::Object(map) => Ok(Self::Record(map.clone())),
            other => Err(DispatchError::UnexpectedResponse(format!(
                "mesh descriptor is neither a path nor a record: {other}"
            ))),
        }
    }

    pub fn into_path(self) -> Result<PathBuf, DispatchError> {
        let map = match self {
            Self::Bare(path) => return Ok(path),
            Self::Record(map) => map,
        };
        match map.get("value") {
            None | Some(Value::Null) => {
                let keys: Vec<&String> = map.keys().collect();
                debug!("Available keys: {:?}", keys);
                Err(DispatchError::MissingField("value"))
            }
            Some(Value::String(path)) => Ok(PathBuf::from(path)),
            Some(Value::Object(file)) => match file.get("path").and_then(Value::as_str) {
                Some(path) => Ok(PathBuf::from(path)),
                None => Err(DispatchError::MissingField("path")),
            },
            Some(other) => Err(DispatchError::UnexpectedResponse(format!(
                "mesh descriptor value is not a path: {other}"
            ))),
        }
    }
}

/// Files written to the output folder for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAsset {
    pub mesh: PathBuf,
    pub textures: Vec<PathBuf>,
}

pub struct Dispatcher<C: GenerationClient> {
    pub client: C,
    pub workspace: Workspace,
    pub params: GenerationParams,
}

impl<C: GenerationClient> Dispatcher<C> {
    pub fn new(client: C, workspace: Workspace, params: GenerationParams) -> Self {
        Self {
            client,
            workspace,
            params,
        }
    }

    /// Runs the whole flow for `image`. The scratch copy is removed whatever the outcome.
    pub async fn dispatch(&mut self, image: &Path) -> Result<GeneratedAsset, DispatchError> {
        let name = base_name(image);
        let prepared = prepare_image(image, &self.workspace.temp_dir)?;

        let result = self.submit(&name, &prepared.path).await;

        if let Err(e) = fs::remove_file(&prepared.path) {
            warn!("Could not remove {}: {}", prepared.path.display(), e);
        }
        result
    }

    /// Like [`Dispatcher::dispatch`], but logs the outcome and only reports success.
    pub async fn dispatch_and_report(&mut self, image: &Path) -> bool {
        match self.dispatch(image).await {
            Ok(_) => true,
            Err(e) => {
                error!("Error processing {}: {:?}", image.display(), anyhow::Error::from(e));
                false
            }
        }
    }

    async fn submit(&mut self, name: &str, scratch: &Path) -> Result<GeneratedAsset, DispatchError> {
        info!("Sending request for {}...", name);
        let response = self.client.generate(scratch, &self.params).await?;
        info!("Generation finished");

        debug!("Number of elements in result: {}", response.len());
        for (i, item) in response.iter().enumerate() {
            debug!("Element {}: {}", i, item);
        }
        if response.len() != RESPONSE_LEN {
            return Err(DispatchError::UnexpectedResponse(format!(
                "expected {} elements, got {}",
                RESPONSE_LEN,
                response.len()
            )));
        }

        let mesh = MeshDescriptor::from_value(&response[TEXTURED_MESH_INDEX])?.into_path()?;
        info!("Textured GLB file: {}", mesh.display());

        let result = collect_outputs(&mesh, &self.workspace, name);

        // The result folder goes away even if nothing could be moved out of it.
        if let Some(dir) = mesh.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::remove_dir_all(dir) {
                warn!("Could not remove {}: {}", dir.display(), e);
            }
        }

        result
    }
}

/// Moves the mesh into the output folder and copies the textures found next to it.
fn collect_outputs(mesh: &Path, workspace: &Workspace, name: &str) -> Result<GeneratedAsset, DispatchError> {
    fs::create_dir_all(&workspace.output_dir)?;
    if !mesh.is_file() {
        return Err(DispatchError::MeshNotFound(mesh.to_path_buf()));
    }

    let source_dir = match mesh.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let textures = find_textures(source_dir)?;

    let output = workspace.mesh_output_path(name);
    move_file(mesh, &output)?;
    info!("3D model saved to {}", output.display());

    let mut copied = Vec::with_capacity(textures.len());
    for texture in textures {
        let Some(file_name) = texture.file_name() else {
            continue;
        };
        let target = workspace.texture_output_path(name, &file_name.to_string_lossy());
        fs::copy(&texture, &target)?;
        info!("Texture copied: {}", target.display());
        copied.push(target);
    }

    Ok(GeneratedAsset {
        mesh: output,
        textures: copied,
    })
}

pub fn is_texture_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("texture")
        && Path::new(&lower)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| TEXTURE_EXTENSIONS.contains(&ext))
}

fn find_textures(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut textures = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_texture_file(&entry.file_name().to_string_lossy()) {
            textures.push(entry.path());
        }
    }
    textures.sort();
    Ok(textures)
}

/// Rename, falling back to copy and delete when crossing filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => debug!(
            "Rename {} -> {} failed ({}), copying instead",
            from.display(),
            to.display(),
            e
        ),
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}
