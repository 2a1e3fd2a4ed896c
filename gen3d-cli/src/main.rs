//! Turns every picture in a folder into a textured GLB mesh using a running
//! image-to-3D generation service.

use anyhow::Context;
use clap::Parser;
use gen3d_batch::config::{DEFAULT_INPUT_DIR, DEFAULT_OUTPUT_DIR, DEFAULT_TEMP_DIR};
use gen3d_batch::{run_batch, BatchOptions, BatchStatus, Dispatcher, Workspace};
use gen3d_client::gradio::DEFAULT_ENDPOINT;
use gen3d_client::{GenerationParams, GradioClient};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Folder containing the images to convert
    #[arg(default_value = DEFAULT_INPUT_DIR)]
    input: PathBuf,

    /// Folder receiving <name>_3d.glb and texture files
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Folder for normalized images and downloaded results
    #[arg(long, default_value = DEFAULT_TEMP_DIR)]
    temp_dir: PathBuf,

    /// URL of the generation service
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Only process the first image found
    #[arg(long)]
    single_test: bool,

    /// Pause between two requests, in milliseconds
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,

    /// Number of diffusion steps
    #[arg(long, default_value_t = 40)]
    steps: u32,

    /// Guidance scale
    #[arg(long, default_value_t = 5.5)]
    guidance_scale: f32,

    /// Random seed
    #[arg(long, default_value_t = 1234)]
    seed: u64,

    /// Octree resolution of the generated mesh
    #[arg(long, default_value = "512")]
    octree_resolution: String,

    /// Do not ask the service to remove the image background
    #[arg(long)]
    keep_background: bool,

    /// Request timeout in seconds (default: wait forever)
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let workspace = Workspace::new(args.temp_dir, args.output_dir);
    let params = GenerationParams {
        steps: args.steps,
        guidance_scale: args.guidance_scale,
        seed: args.seed,
        octree_resolution: args.octree_resolution,
        remove_background: !args.keep_background,
        ..Default::default()
    };
    let options = BatchOptions {
        single_test: args.single_test,
        delay: Duration::from_millis(args.delay_ms),
    };

    let client = GradioClient::with_timeout(
        &args.endpoint,
        workspace.download_dir(),
        args.timeout_secs.map(Duration::from_secs),
    )
    .with_context(|| format!("Failed to create client for {}", args.endpoint))?;

    let mut dispatcher = Dispatcher::new(client, workspace, params);
    let status = run_batch(&mut dispatcher, &args.input, &options)
        .await
        .with_context(|| format!("Failed to read input folder {}", args.input.display()))?;

    if let BatchStatus::Dispatched(n) = status {
        info!("Done, {} image(s) submitted", n);
    }

    Ok(())
}
