use gen3d_batch::prepare::{prepare_image, MAX_DIMENSION};
use gen3d_batch::{DispatchError, Dispatcher, Workspace};
use gen3d_client::mock_client::{MockClient, MockResponse};
use gen3d_client::GenerationParams;
use image::{ColorType, GrayImage, RgbImage, RgbaImage};
use std::path::{Path, PathBuf};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gen3d-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_rgb(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]))
        .save(path)
        .unwrap();
}

/// Palette PNG with four colors in horizontal stripes.
fn write_indexed(path: &Path, width: u32, height: u32) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255]);
    let mut writer = encoder.write_header().unwrap();
    let data: Vec<u8> = (0..width * height).map(|i| ((i / width) % 4) as u8).collect();
    writer.write_image_data(&data).unwrap();
}

fn dispatcher(root: &Path, response: MockResponse) -> Dispatcher<MockClient> {
    let workspace = Workspace::new(root.join("temp"), root.join("output_models"));
    let client = MockClient::new(workspace.download_dir(), response);
    Dispatcher::new(client, workspace, GenerationParams::default())
}

#[test]
fn test_prepare_keeps_small_images() {
    let root = scratch_dir("prepare-small");
    let source = root.join("small.png");
    write_rgb(&source, 800, 600);

    let prepared = prepare_image(&source, &root.join("temp")).unwrap();
    assert!(!prepared.resized);
    assert_eq!(prepared.path, root.join("temp").join("small_temp.jpg"));

    let out = image::open(&prepared.path).unwrap();
    assert_eq!((out.width(), out.height()), (800, 600));
}

#[test]
fn test_prepare_downsamples_large_images() {
    let root = scratch_dir("prepare-large");
    let source = root.join("wide.png");
    write_rgb(&source, 2000, 1500);

    let prepared = prepare_image(&source, &root.join("temp")).unwrap();
    assert!(prepared.resized);

    let out = image::open(&prepared.path).unwrap();
    assert_eq!(out.width().max(out.height()), MAX_DIMENSION);
    assert_eq!((out.width(), out.height()), (1024, 768));

    let tall = root.join("tall.png");
    write_rgb(&tall, 700, 3000);
    let prepared = prepare_image(&tall, &root.join("temp")).unwrap();
    let out = image::open(&prepared.path).unwrap();
    assert_eq!(out.height(), MAX_DIMENSION);
    // 700 * 1024 / 3000 = 238.9
    assert_eq!(out.width(), 238);
}

#[test]
fn test_prepare_always_outputs_rgb() {
    let root = scratch_dir("prepare-rgb");
    let temp = root.join("temp");

    let gray = root.join("gray.png");
    GrayImage::from_pixel(64, 32, image::Luma([90])).save(&gray).unwrap();
    let rgba = root.join("alpha.png");
    RgbaImage::from_pixel(32, 64, image::Rgba([10, 20, 30, 128]))
        .save(&rgba)
        .unwrap();

    let indexed = root.join("indexed.png");
    write_indexed(&indexed, 24, 24);

    for source in [gray, rgba, indexed] {
        let prepared = prepare_image(&source, &temp).unwrap();
        let out = image::open(&prepared.path).unwrap();
        assert_eq!(out.color(), ColorType::Rgb8, "{}", source.display());
    }
}

#[test]
fn test_prepare_rejects_non_images() {
    let root = scratch_dir("prepare-bad");
    let source = root.join("broken.png");
    std::fs::write(&source, b"definitely not a png").unwrap();
    assert!(prepare_image(&source, &root.join("temp")).is_err());
}

#[tokio::test]
async fn test_dispatch_saves_mesh_and_textures() {
    let root = scratch_dir("dispatch-ok");
    let source = root.join("cat.png");
    write_rgb(&source, 64, 64);

    let mut dispatcher = dispatcher(&root, MockResponse::BarePath);
    dispatcher.client = MockClient::new(dispatcher.workspace.download_dir(), MockResponse::BarePath)
        .with_textures(&["texture.png", "Texture_1.jpg", "notes.txt"]);

    let asset = dispatcher.dispatch(&source).await.unwrap();

    assert_eq!(asset.mesh, root.join("output_models").join("cat_3d.glb"));
    assert_eq!(std::fs::read(&asset.mesh).unwrap(), b"glTF textured");
    assert_eq!(asset.textures.len(), 2);
    assert!(root.join("output_models").join("cat_texture.png").is_file());
    assert!(root.join("output_models").join("cat_Texture_1.jpg").is_file());
    assert!(!root.join("output_models").join("cat_notes.txt").exists());

    // Scratch image and the downloaded result folder are gone.
    assert!(!root.join("temp").join("cat_temp.jpg").exists());
    assert!(!dispatcher.workspace.download_dir().join("call-1").exists());

    // The client received the normalized copy, not the original.
    assert_eq!(dispatcher.client.calls, vec![root.join("temp").join("cat_temp.jpg")]);
}

#[tokio::test]
async fn test_dispatch_record_descriptor() {
    let root = scratch_dir("dispatch-record");
    let source = root.join("dog.jpg");
    write_rgb(&source, 32, 48);

    let mut dispatcher = dispatcher(&root, MockResponse::Record);
    let asset = dispatcher.dispatch(&source).await.unwrap();
    assert!(asset.mesh.ends_with("dog_3d.glb"));
    assert!(asset.mesh.is_file());
    assert!(asset.textures.is_empty());
}

#[tokio::test]
async fn test_dispatch_overwrites_previous_output() {
    let root = scratch_dir("dispatch-overwrite");
    let source = root.join("cat.png");
    write_rgb(&source, 16, 16);
    std::fs::create_dir_all(root.join("output_models")).unwrap();
    std::fs::write(root.join("output_models").join("cat_3d.glb"), b"old").unwrap();

    let mut dispatcher = dispatcher(&root, MockResponse::BarePath);
    let asset = dispatcher.dispatch(&source).await.unwrap();
    assert_eq!(std::fs::read(asset.mesh).unwrap(), b"glTF textured");
}

#[tokio::test]
async fn test_dispatch_missing_value_moves_nothing() {
    let root = scratch_dir("dispatch-missing");
    let source = root.join("cat.png");
    write_rgb(&source, 64, 64);

    let mut dispatcher = dispatcher(&root, MockResponse::MissingValue);
    let result = dispatcher.dispatch(&source).await;
    assert!(matches!(result, Err(DispatchError::MissingField("value"))));

    assert!(!root.join("output_models").join("cat_3d.glb").exists());
    let generated = dispatcher.workspace.download_dir().join("call-1");
    assert!(generated.join("textured_mesh.glb").is_file());
    assert!(!root.join("temp").join("cat_temp.jpg").exists());

    assert!(!dispatcher.dispatch_and_report(&source).await);
}

#[tokio::test]
async fn test_dispatch_missing_mesh_still_cleans_up() {
    let root = scratch_dir("dispatch-no-mesh");
    let source = root.join("cat.png");
    write_rgb(&source, 8, 8);

    let mut dispatcher = dispatcher(&root, MockResponse::MissingMesh);
    let result = dispatcher.dispatch(&source).await;
    assert!(matches!(result, Err(DispatchError::MeshNotFound(_))));

    assert!(!dispatcher.workspace.download_dir().join("call-1").exists());
    assert!(!root.join("temp").join("cat_temp.jpg").exists());
    assert!(!root.join("output_models").join("cat_3d.glb").exists());
}

#[tokio::test]
async fn test_dispatch_short_response() {
    let root = scratch_dir("dispatch-short");
    let source = root.join("cat.png");
    write_rgb(&source, 8, 8);

    let mut dispatcher = dispatcher(&root, MockResponse::Short);
    let result = dispatcher.dispatch(&source).await;
    assert!(matches!(result, Err(DispatchError::UnexpectedResponse(_))));
}

#[tokio::test]
async fn test_dispatch_client_failure() {
    let root = scratch_dir("dispatch-fail");
    let source = root.join("cat.png");
    write_rgb(&source, 8, 8);

    let mut dispatcher = dispatcher(&root, MockResponse::Fail);
    let result = dispatcher.dispatch(&source).await;
    assert!(matches!(result, Err(DispatchError::Client(_))));
    assert!(!root.join("temp").join("cat_temp.jpg").exists());
    assert!(!dispatcher.dispatch_and_report(&source).await);
}

#[tokio::test]
async fn test_dispatch_undecodable_image_skips_request() {
    let root = scratch_dir("dispatch-decode");
    let source = root.join("cat.png");
    std::fs::write(&source, b"garbage").unwrap();

    let mut dispatcher = dispatcher(&root, MockResponse::BarePath);
    let result = dispatcher.dispatch(&source).await;
    assert!(matches!(result, Err(DispatchError::Prepare(_))));
    assert_eq!(dispatcher.client.call_count(), 0);
}
