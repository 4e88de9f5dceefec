//! End-to-end runs through the bundled engine.
//!
//! Inputs are generated with `create` or encoded in memory, outputs go to a
//! fresh temp directory per test.

use imagejob::config::Config;
use imagejob::job::JobSpec;
use imagejob::output::{FormatOptions, WebpOptions};
use imagejob::{Error, Input, InputOptions, Pipeline, RustEngine, StreamEvent};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn engine() -> Arc<RustEngine> {
    Arc::new(RustEngine::new())
}

fn red_canvas(width: u32, height: u32) -> Input {
    let options: InputOptions = serde_json::from_value(serde_json::json!({
        "create": { "width": width, "height": height, "channels": 3, "background": "#ff0000" }
    }))
    .unwrap();
    Input::Options(Box::new(options))
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([10, 200, 30]));
    let mut out = std::io::Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn write_png(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(6, 4)).unwrap();
    path
}

// =========================================================================
// Files
// =========================================================================

#[test]
fn create_to_png_file() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("canvas.png");

    let mut pipeline = Pipeline::new(engine(), red_canvas(8, 4), None).unwrap();
    let info = pipeline.to_file(&out).wait().unwrap();

    assert_eq!(info.format, "png");
    assert_eq!((info.width, info.height), (8, 4));
    assert!(info.size > 0);

    let decoded = image::open(&out).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (8, 4));
    assert_eq!(decoded.get_pixel(3, 2).0, [255, 0, 0]);
}

#[test]
fn file_to_file_follows_output_extension() {
    let tmp = TempDir::new().unwrap();
    let input = write_png(tmp.path(), "in.png");
    let out = tmp.path().join("out.tiff");

    let mut pipeline = Pipeline::new(engine(), input, None).unwrap();
    let info = pipeline.to_file(&out).wait().unwrap();

    assert_eq!(info.format, "tiff");
    assert_eq!(image::open(&out).unwrap().width(), 6);
}

#[test]
fn writing_over_the_input_is_refused() {
    let tmp = TempDir::new().unwrap();
    let input = write_png(tmp.path(), "same.png");

    let mut pipeline = Pipeline::new(engine(), input.clone(), None).unwrap();
    let err = pipeline.to_file(&input).wait().unwrap_err();

    assert!(matches!(err, Error::SameInputOutput));
}

#[test]
fn jp2_extension_is_refused_without_support() {
    let tmp = TempDir::new().unwrap();
    let mut pipeline = Pipeline::new(engine(), red_canvas(2, 2), None).unwrap();
    let err = pipeline.to_file(tmp.path().join("out.jp2")).wait().unwrap_err();

    assert!(matches!(err, Error::CodecUnavailable("jp2")));
}

// =========================================================================
// Buffers and streams
// =========================================================================

#[test]
fn buffer_to_webp_buffer() {
    let mut pipeline = Pipeline::new(engine(), png_bytes(5, 5), None).unwrap();
    pipeline
        .to_format("webp", WebpOptions {
            lossless: Some(true),
            ..Default::default()
        })
        .unwrap();

    let out = pipeline.to_buffer_with_info().wait().unwrap();

    assert_eq!(&out.data[0..4], b"RIFF");
    assert_eq!(&out.data[8..12], b"WEBP");
    assert_eq!(out.info.format, "webp");
    assert_eq!(out.info.size, out.data.len() as u64);
}

#[test]
fn read_stream_yields_info_then_data() {
    let mut pipeline = Pipeline::new(engine(), png_bytes(3, 3), None).unwrap();
    pipeline.to_format("jpeg", FormatOptions::None).unwrap();

    let events: Vec<StreamEvent> = pipeline.read_stream().collect();

    assert!(matches!(events.first(), Some(StreamEvent::Info(info)) if info.format == "jpeg"));
    assert!(events.iter().any(|e| matches!(e, StreamEvent::Data(d) if d.starts_with(&[0xFF, 0xD8]))));
}

#[test]
fn stream_input_runs_after_finish() {
    let bytes = png_bytes(4, 2);
    let mut pipeline = Pipeline::new(engine(), Input::None, None).unwrap();
    pipeline.to_format("png", FormatOptions::None).unwrap();
    let mut pending = pipeline.to_buffer_with_info();

    let (head, tail) = bytes.split_at(bytes.len() / 2);
    pipeline.write_all(head).unwrap();
    pipeline.write_all(tail).unwrap();
    assert!(pending.try_result().is_none());
    pipeline.finish();

    let out = pending.wait().unwrap();
    assert_eq!((out.info.width, out.info.height), (4, 2));
}

#[test]
fn undecodable_buffer_reports_engine_error() {
    let mut pipeline = Pipeline::new(engine(), vec![1u8, 2, 3, 4], None).unwrap();
    pipeline.to_format("png", FormatOptions::None).unwrap();

    let err = pipeline.to_buffer().wait().unwrap_err();

    match err {
        Error::Engine { call_site, .. } => assert!(call_site.file().ends_with("engine.rs")),
        other => panic!("expected engine error, got {other:?}"),
    }
}

// =========================================================================
// Metadata and stats
// =========================================================================

#[test]
fn metadata_of_png_file() {
    let tmp = TempDir::new().unwrap();
    let input = write_png(tmp.path(), "meta.png");

    let mut pipeline = Pipeline::new(engine(), input, None).unwrap();
    let metadata = pipeline.metadata().wait().unwrap();

    assert_eq!(metadata.format.as_deref(), Some("png"));
    assert_eq!(metadata.width, Some(6));
    assert_eq!(metadata.height, Some(4));
    assert_eq!(metadata.channels, Some(3));
}

/// Baseline JPEG carrying an ICC profile, an EXIF block and a comment.
fn tagged_jpeg(icc: &[u8], exif_tiff: &[u8]) -> Vec<u8> {
    use image::ImageEncoder;

    let image = image::RgbImage::from_pixel(8, 8, image::Rgb([90, 60, 30]));
    let mut encoded = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut encoded, 90);
    encoder.set_icc_profile(icc.to_vec()).unwrap();
    encoder
        .write_image(image.as_raw(), 8, 8, image::ExtendedColorType::Rgb8)
        .unwrap();

    let mut app1 = vec![0xFF, 0xE1];
    app1.extend_from_slice(&((2 + 6 + exif_tiff.len()) as u16).to_be_bytes());
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(exif_tiff);
    let comment = b"harbour at dusk";
    let mut com = vec![0xFF, 0xFE];
    com.extend_from_slice(&((2 + comment.len()) as u16).to_be_bytes());
    com.extend_from_slice(comment);

    let mut out = encoded[..2].to_vec();
    out.extend(app1);
    out.extend(com);
    out.extend_from_slice(&encoded[2..]);
    out
}

#[test]
fn metadata_reads_back_exif_and_icc() {
    let tmp = TempDir::new().unwrap();
    let icc = b"not-a-real-icc-profile".to_vec();
    // Big-endian TIFF header followed by an empty IFD.
    let exif_tiff = b"MM\0*\0\0\0\x08\0\0\0\0\0\0".to_vec();
    let path = tmp.path().join("tagged.jpg");
    std::fs::write(&path, tagged_jpeg(&icc, &exif_tiff)).unwrap();

    let mut pipeline = Pipeline::new(engine(), path, None).unwrap();
    let metadata = pipeline.metadata().wait().unwrap();

    assert_eq!(metadata.format.as_deref(), Some("jpeg"));
    assert_eq!(metadata.icc.as_deref(), Some(&icc[..]));
    assert_eq!(metadata.has_profile, Some(true));
    assert!(metadata.exif.unwrap().ends_with(&exif_tiff));
    assert_eq!(metadata.is_progressive, Some(false));
    assert_eq!(metadata.bits_per_sample, Some(8));
    assert!(metadata.chroma_subsampling.is_some());
    let comments = metadata.comments.unwrap();
    assert_eq!(comments[0].text, "harbour at dusk");
}

#[test]
fn stats_of_flat_canvas() {
    let mut pipeline = Pipeline::new(engine(), red_canvas(4, 4), None).unwrap();
    let stats = pipeline.stats().wait().unwrap();

    assert!(stats.is_opaque);
    assert_eq!(stats.channels[0].min, 255.0);
    assert_eq!(stats.channels[1].max, 0.0);
}

// =========================================================================
// Job files
// =========================================================================

#[test]
fn job_file_resolves_paths_next_to_it() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "photo.png");
    let job_path = tmp.path().join("job.json");
    std::fs::write(
        &job_path,
        r#"{
            "input": "photo.png",
            "output": { "format": "jpeg", "options": { "quality": 70 }, "file": "photo.jpg" },
            "timeout_seconds": 30
        }"#,
    )
    .unwrap();

    let spec = JobSpec::load(&job_path).unwrap();
    let info = spec.run(engine(), &Config::default()).unwrap();

    assert_eq!(info.format, "jpeg");
    assert!(tmp.path().join("photo.jpg").exists());
}
