//! Mock implementation of the generation service for testing.

use crate::{ClientError, ClientResult, GenerationClient, GenerationParams};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// What the mock service answers with.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    /// Textured mesh element is the bare local path.
    BarePath,
    /// Textured mesh element is `{"__type__": "update", "value": <path>}`.
    Record,
    /// Textured mesh element is a record without a `value` field.
    MissingValue,
    /// Textured mesh element points at a file that was never written.
    MissingMesh,
    /// Only two elements instead of four.
    Short,
    /// The call fails like a refused connection would.
    Fail,
}

/// A mock client that does not require a running service.
///
/// Each call writes a placeholder GLB (and the configured texture files) into
/// `<download_dir>/call-<n>/`, the way the real client lays out downloads.
pub struct MockClient {
    pub response: MockResponse,
    pub download_dir: PathBuf,
    pub textures: Vec<String>,
    pub calls: Vec<PathBuf>,
}

impl MockClient {
    pub fn new(download_dir: impl Into<PathBuf>, response: MockResponse) -> Self {
        Self {
            response,
            download_dir: download_dir.into(),
            textures: Vec::new(),
            calls: Vec::new(),
        }
    }

    /// Also write these files next to the textured mesh.
    pub fn with_textures(mut self, names: &[&str]) -> Self {
        self.textures = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Number of `generate` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    fn write_outputs(&self, dir: &Path) -> std::io::Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;
        let white = dir.join("white_mesh.glb");
        let textured = dir.join("textured_mesh.glb");
        std::fs::write(&white, b"glTF white")?;
        std::fs::write(&textured, b"glTF textured")?;
        for name in &self.textures {
            std::fs::write(dir.join(name), b"texture")?;
        }
        Ok((white, textured))
    }
}

impl GenerationClient for MockClient {
    async fn generate(
        &mut self,
        image: &Path,
        _params: &GenerationParams,
    ) -> ClientResult<Vec<Value>> {
        self.calls.push(image.to_path_buf());

        if self.response == MockResponse::Fail {
            return Err(ClientError::Service("connection refused".into()));
        }

        let dir = self.download_dir.join(format!("call-{}", self.calls.len()));
        let (white, textured) = self.write_outputs(&dir)?;
        let white = Value::String(white.to_string_lossy().into_owned());
        let textured = Value::String(textured.to_string_lossy().into_owned());

        let descriptor = match self.response {
            MockResponse::BarePath | MockResponse::Short => textured,
            MockResponse::Record => json!({ "__type__": "update", "value": textured }),
            MockResponse::MissingValue => json!({ "__type__": "update", "visible": true }),
            MockResponse::MissingMesh => {
                Value::String(dir.join("missing_mesh.glb").to_string_lossy().into_owned())
            }
            MockResponse::Fail => Value::Null,
        };

        if self.response == MockResponse::Short {
            return Ok(vec![white, descriptor]);
        }
        Ok(vec![
            white,
            descriptor,
            json!("<html>white mesh preview</html>"),
            json!("<html>textured mesh preview</html>"),
        ])
    }
}
