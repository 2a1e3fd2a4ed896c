//! Client side of an image-to-3D generation service.
//!
//! The service is a Gradio app exposing a `generation_all` endpoint that turns a
//! single picture into an untextured and a textured GLB mesh. [`GradioClient`]
//! talks to it over HTTP; [`mock_client::MockClient`] stands in for it in tests.

pub mod gradio;
pub mod mock_client;

pub use gradio::GradioClient;

use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Service reported an error: {0}")]
    Service(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Parameters of a single `generation_all` call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Text prompt; empty means image-only conditioning.
    pub caption: String,
    pub steps: u32,
    pub guidance_scale: f32,
    pub seed: u64,
    pub octree_resolution: String,
    /// Ask the service to strip the image background first.
    pub remove_background: bool,
    pub api_name: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            caption: String::new(),
            steps: 40,
            guidance_scale: 5.5,
            seed: 1234,
            octree_resolution: "512".into(),
            remove_background: true,
            api_name: "/generation_all".into(),
        }
    }
}

impl GenerationParams {
    /// Endpoint name without the leading slash, as used in `/call/<name>` routes.
    pub fn endpoint_name(&self) -> &str {
        self.api_name.trim_start_matches('/')
    }
}

/// A remote service able to turn an image into 3D assets.
///
/// `generate` returns the raw result elements. File outputs are already
/// materialized locally and referenced by path.
#[allow(async_fn_in_trait)]
pub trait GenerationClient {
    async fn generate(&mut self, image: &Path, params: &GenerationParams)
        -> ClientResult<Vec<Value>>;
}
