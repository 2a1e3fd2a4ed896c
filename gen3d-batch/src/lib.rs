//! Batch conversion of pictures into textured 3D meshes.
//!
//! Each image goes through three stages: [`prepare::prepare_image`] normalizes it,
//! [`dispatch::Dispatcher`] submits it to the generation service and collects the
//! result, and [`batch::run_batch`] drives the whole folder.

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod prepare;

pub use batch::{run_batch, BatchOptions, BatchStatus};
pub use config::Workspace;
pub use dispatch::{DispatchError, Dispatcher, GeneratedAsset, MeshDescriptor};
pub use prepare::{prepare_image, PrepareError, PreparedImage};
