//! Pure Rust engine built on the `image` crate.
//!
//! Jobs run on the global rayon pool; completions are called from a worker.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF) | `image::ImageReader` + `DynamicImage::from_decoder` |
//! | Raw `uchar` pixels | `image::ImageBuffer::from_raw` |
//! | Flat-colour `create` | `ImageBuffer::from_pixel` |
//! | Auto-orient | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Encode → JPEG / PNG / TIFF | `image::codecs::{jpeg, png, tiff}` |
//! | Encode → WebP | `WebPEncoder::new_lossless` (lossy requests are written lossless) |
//! | Encode → GIF | `GifEncoder` with loop count and frame delay |
//! | Encode → AVIF | `AvifEncoder` (rav1e) |
//! | Stats | per-channel folds on rayon |
//!
//! Text rendering, joins, noise, JPEG 2000, JPEG XL, HEVC and tile pyramids
//! are not available and fail with an [`EngineError`] naming the feature.

use std::borrow::Cow;
use std::io::Cursor;
use std::time::{Duration, Instant};

use image::codecs::avif::AvifEncoder;
use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::{
    ColorType, Delay, DynamicImage, Frame, GrayAlphaImage, GrayImage, ImageDecoder, ImageFormat,
    ImageReader, Luma, LumaA, Rgb, RgbImage, Rgba, RgbaImage,
};
use log::{debug, warn};
use rayon::prelude::*;

use super::backend::{
    Capabilities, ChannelStats, Comment, Completion, Engine, EngineError, Job, Metadata, OutputInfo,
    Stats,
};
use crate::input::{CreateInput, Fill, InputDescriptor, RawDepth, RawInput, Source};
use crate::output::{Codec, HeifCompression, JobOptions, OutputFormat};

pub struct RustEngine;

impl RustEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for RustEngine {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            jp2k: false,
            jxl: false,
            heif: true,
            prebuilt: false,
        }
    }

    fn pipeline(&self, job: Job, done: Completion<(Vec<u8>, OutputInfo)>) {
        rayon::spawn(move || done(run_pipeline(&job)));
    }

    fn metadata(&self, input: InputDescriptor, done: Completion<Metadata>) {
        rayon::spawn(move || done(read_metadata(&input)));
    }

    fn stats(&self, input: InputDescriptor, done: Completion<Stats>) {
        rayon::spawn(move || done(decode(&input).map(|d| image_stats(&d.image))));
    }
}

fn unsupported(feature: &str) -> EngineError {
    EngineError::new(format!("{feature} is not supported by the bundled engine"))
}

fn image_error(err: image::ImageError) -> EngineError {
    EngineError::new(err.to_string())
}

/// Wall-clock budget for one job, measured from the start of input reading.
///
/// Checked after decode and after encode, before anything is written out.
struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    fn new(seconds: u32) -> Self {
        Self {
            start: Instant::now(),
            limit: (seconds > 0).then(|| Duration::from_secs(u64::from(seconds))),
        }
    }

    fn check(&self, stage: &str) -> Result<(), EngineError> {
        match self.limit {
            Some(limit) if self.start.elapsed() > limit => Err(EngineError::new(format!(
                "timeout: {}s exceeded during {stage}",
                limit.as_secs()
            ))),
            _ => Ok(()),
        }
    }
}

fn run_pipeline(job: &Job) -> Result<(Vec<u8>, OutputInfo), EngineError> {
    run_within(job, &Deadline::new(job.options.timeout_seconds))
}

fn run_within(job: &Job, deadline: &Deadline) -> Result<(Vec<u8>, OutputInfo), EngineError> {
    let decoded = decode(&job.input)?;
    deadline.check("decode")?;

    let format = target_format(&job.options, decoded.format)?;
    let data = encode(&decoded.image, format, &job.options)?;
    deadline.check("encode")?;

    let info = OutputInfo {
        format: format.to_string(),
        size: data.len() as u64,
        width: decoded.image.width(),
        height: decoded.image.height(),
        channels: decoded.image.color().channel_count(),
        ..OutputInfo::default()
    };
    debug!(
        "encoded {}x{} {} ({} bytes)",
        info.width, info.height, info.format, info.size
    );

    match &job.options.delivery.file_out {
        Some(path) => {
            std::fs::write(path, &data).map_err(|e| {
                EngineError::new(format!("Failed to write {}: {e}", path.display()))
            })?;
            Ok((Vec::new(), info))
        }
        None => Ok((data, info)),
    }
}

// ============================================================================
// Decode
// ============================================================================

struct Decoded {
    image: DynamicImage,
    /// Format to fall back to when the output format is `input`.
    format: OutputFormat,
}

/// Encoded bytes for file, buffer or finished stream sources.
fn input_bytes(input: &InputDescriptor) -> Result<Cow<'_, [u8]>, EngineError> {
    if let Some(path) = input.file() {
        let bytes = std::fs::read(path).map_err(|e| {
            EngineError::new(format!("Input file is missing: {} ({e})", path.display()))
        })?;
        return Ok(Cow::Owned(bytes));
    }
    match input.bytes() {
        Some(bytes) => Ok(Cow::Borrowed(bytes)),
        None if input.is_stream() => Err(EngineError::new("Input stream has not finished")),
        None => Err(EngineError::new(format!(
            "Input of kind {} has no encoded bytes",
            input.source.kind()
        ))),
    }
}

fn check_pixel_limit(input: &InputDescriptor, width: u32, height: u32) -> Result<(), EngineError> {
    if input.unlimited || input.limit_input_pixels == 0 {
        return Ok(());
    }
    if u64::from(width) * u64::from(height) > input.limit_input_pixels {
        return Err(EngineError::new("Input image exceeds pixel limit"));
    }
    Ok(())
}

fn decode(input: &InputDescriptor) -> Result<Decoded, EngineError> {
    match &input.source {
        Source::Create(create) => {
            check_pixel_limit(input, create.width, create.height)?;
            return Ok(Decoded {
                image: create_image(create)?,
                format: OutputFormat::Png,
            });
        }
        Source::Text(_) => return Err(unsupported("Text input")),
        Source::Join { .. } => return Err(unsupported("Join input")),
        _ => {}
    }

    let bytes = input_bytes(input)?;
    if let Some(raw) = &input.raw {
        check_pixel_limit(input, raw.width, raw.height)?;
        return Ok(Decoded {
            image: raw_image(&bytes, raw)?,
            format: OutputFormat::Raw,
        });
    }

    let mut reader = ImageReader::new(Cursor::new(&bytes[..]))
        .with_guessed_format()
        .map_err(|e| EngineError::new(e.to_string()))?;
    if input.unlimited {
        reader.no_limits();
    }
    let format = reader
        .format()
        .ok_or_else(|| EngineError::new("Input buffer contains unsupported image format"))?;
    let mut decoder = reader.into_decoder().map_err(image_error)?;
    let (width, height) = decoder.dimensions();
    check_pixel_limit(input, width, height)?;
    let orientation = if input.auto_orient {
        decoder.orientation().ok()
    } else {
        None
    };
    let mut image = DynamicImage::from_decoder(decoder).map_err(image_error)?;
    if let Some(orientation) = orientation {
        image.apply_orientation(orientation);
    }
    Ok(Decoded {
        image,
        format: output_format_of(format)
            .ok_or_else(|| unsupported(&format!("Output in input format {format:?}")))?,
    })
}

fn output_format_of(format: ImageFormat) -> Option<OutputFormat> {
    match format {
        ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
        ImageFormat::Png => Some(OutputFormat::Png),
        ImageFormat::WebP => Some(OutputFormat::Webp),
        ImageFormat::Gif => Some(OutputFormat::Gif),
        ImageFormat::Tiff => Some(OutputFormat::Tiff),
        ImageFormat::Avif => Some(OutputFormat::Heif),
        _ => None,
    }
}

fn raw_image(bytes: &[u8], raw: &RawInput) -> Result<DynamicImage, EngineError> {
    if raw.depth != RawDepth::Uchar {
        return Err(unsupported(&format!("Raw input of depth {}", raw.depth)));
    }
    let (w, h) = (raw.width, raw.height);
    let expected = w as usize * h as usize * usize::from(raw.channels);
    if bytes.len() < expected {
        return Err(EngineError::new(format!(
            "Raw input is {} bytes but {w}x{h}x{} needs {expected}",
            bytes.len(),
            raw.channels
        )));
    }
    let pixels = bytes[..expected].to_vec();
    let image = match raw.channels {
        1 => GrayImage::from_raw(w, h, pixels).map(DynamicImage::ImageLuma8),
        2 => GrayAlphaImage::from_raw(w, h, pixels).map(DynamicImage::ImageLumaA8),
        3 => RgbImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgb8),
        _ => RgbaImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgba8),
    };
    image.ok_or_else(|| EngineError::new("Raw pixel buffer does not match its dimensions"))
}

fn create_image(create: &CreateInput) -> Result<DynamicImage, EngineError> {
    let colour = match &create.fill {
        Fill::Background(colour) => *colour,
        Fill::Noise(_) => return Err(unsupported("Noise generation")),
    };
    let (w, h) = (create.width, create.height);
    Ok(match create.channels {
        1 => DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([colour.r]))),
        2 => DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(w, h, LumaA([colour.r, colour.a]))),
        3 => DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([colour.r, colour.g, colour.b]))),
        _ => DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(colour.to_array()))),
    })
}

// ============================================================================
// Encode
// ============================================================================

/// Resolve the `input` sentinel: file extension first, then the input format.
fn target_format(options: &JobOptions, input_format: OutputFormat) -> Result<OutputFormat, EngineError> {
    if options.format != OutputFormat::Input {
        return Ok(options.format);
    }
    let from_path = options
        .delivery
        .file_out
        .as_deref()
        .and_then(Codec::from_path)
        .map(Codec::output_format);
    Ok(from_path.unwrap_or(input_format))
}

/// 8-bit copy that keeps the channel layout.
fn to_8bit(image: &DynamicImage) -> DynamicImage {
    match (image.color().has_color(), image.color().has_alpha()) {
        (false, false) => DynamicImage::ImageLuma8(image.to_luma8()),
        (false, true) => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        (true, false) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (true, true) => DynamicImage::ImageRgba8(image.to_rgba8()),
    }
}

fn encode(image: &DynamicImage, format: OutputFormat, options: &JobOptions) -> Result<Vec<u8>, EngineError> {
    let mut out = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let flattened = if image.color().has_color() {
                DynamicImage::ImageRgb8(image.to_rgb8())
            } else {
                DynamicImage::ImageLuma8(image.to_luma8())
            };
            let encoder = JpegEncoder::new_with_quality(&mut out, options.jpeg.quality);
            flattened.write_with_encoder(encoder).map_err(image_error)?;
        }
        OutputFormat::Png => {
            let s = &options.png;
            if s.palette {
                warn!("palette quantisation unavailable, writing truecolour PNG");
            }
            let compression = match s.compression_level {
                0..=2 => CompressionType::Fast,
                3..=6 => CompressionType::Default,
                _ => CompressionType::Best,
            };
            let filter = if s.adaptive_filtering {
                FilterType::Adaptive
            } else {
                FilterType::NoFilter
            };
            let encoder = PngEncoder::new_with_quality(&mut out, compression, filter);
            to_8bit(image).write_with_encoder(encoder).map_err(image_error)?;
        }
        OutputFormat::Webp => {
            if !options.webp.lossless {
                warn!(
                    "lossy WebP (quality {}) unavailable, writing lossless",
                    options.webp.quality
                );
            }
            let encoder = WebPEncoder::new_lossless(&mut out);
            to_8bit(image).write_with_encoder(encoder).map_err(image_error)?;
        }
        OutputFormat::Gif => encode_gif(image, options, &mut out)?,
        OutputFormat::Tiff => {
            let encoder = TiffEncoder::new(Cursor::new(&mut out));
            to_8bit(image).write_with_encoder(encoder).map_err(image_error)?;
        }
        OutputFormat::Heif => {
            let s = &options.heif;
            if s.compression != HeifCompression::Av1 {
                return Err(unsupported("HEVC compression"));
            }
            let speed = (10 - i16::from(s.effort)).clamp(1, 10) as u8;
            let encoder = AvifEncoder::new_with_speed_quality(&mut out, speed, s.quality);
            let rgb = if image.color().has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            rgb.write_with_encoder(encoder).map_err(image_error)?;
        }
        OutputFormat::Raw => {
            if options.raw.depth != RawDepth::Uchar {
                return Err(unsupported(&format!("Raw output of depth {}", options.raw.depth)));
            }
            out = to_8bit(image).into_bytes();
        }
        OutputFormat::Jp2 => return Err(unsupported("JPEG 2000 output")),
        OutputFormat::Jxl => return Err(unsupported("JPEG XL output")),
        OutputFormat::Dz => return Err(unsupported("Tile output")),
        OutputFormat::Input => return Err(EngineError::new("Output format could not be determined")),
    }
    Ok(out)
}

fn encode_gif(image: &DynamicImage, options: &JobOptions, out: &mut Vec<u8>) -> Result<(), EngineError> {
    // effort 1 (fast) .. 10 (slow) onto NeuQuant sampling 30 .. 3
    let speed = 33 - 3 * i32::from(options.gif.effort);
    let mut encoder = GifEncoder::new_with_speed(out, speed.clamp(1, 30));
    let repeat = match options.animation.loop_count {
        n if n > 0 => Repeat::Finite(n as u16),
        _ => Repeat::Infinite,
    };
    encoder.set_repeat(repeat).map_err(image_error)?;
    let delay_ms = options.animation.delay.first().copied().unwrap_or(100);
    let frame = Frame::from_parts(
        image.to_rgba8(),
        0,
        0,
        Delay::from_numer_denom_ms(delay_ms, 1),
    );
    encoder.encode_frame(frame).map_err(image_error)
}

// ============================================================================
// Metadata and stats
// ============================================================================

fn depth_name(color: ColorType) -> &'static str {
    match color.bytes_per_pixel() / color.channel_count() {
        1 => "uchar",
        2 => "ushort",
        _ => "float",
    }
}

fn read_metadata(input: &InputDescriptor) -> Result<Metadata, EngineError> {
    if let Source::Create(create) = &input.source {
        return Ok(Metadata {
            width: Some(create.width),
            height: Some(create.height),
            channels: Some(create.channels),
            depth: Some("uchar".to_string()),
            bits_per_sample: Some(8),
            space: Some(if create.channels < 3 { "b-w" } else { "srgb" }.to_string()),
            has_alpha: Some(create.channels % 2 == 0),
            ..Metadata::default()
        });
    }
    let bytes = input_bytes(input)?;
    let reader = ImageReader::new(Cursor::new(&bytes[..]))
        .with_guessed_format()
        .map_err(|e| EngineError::new(e.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| EngineError::new("Input buffer contains unsupported image format"))?;
    let mut decoder = reader.into_decoder().map_err(image_error)?;
    let (width, height) = decoder.dimensions();
    let color = decoder.color_type();
    let icc = decoder.icc_profile().ok().flatten();
    let exif = decoder.exif_metadata().ok().flatten();
    let orientation = decoder.orientation().ok().map(|o| o.to_exif());
    let mut metadata = Metadata {
        format: output_format_of(format).map(|f| f.to_string()),
        size: Some(bytes.len() as u64),
        width: Some(width),
        height: Some(height),
        space: Some(if color.has_color() { "srgb" } else { "b-w" }.to_string()),
        channels: Some(color.channel_count()),
        depth: Some(depth_name(color).to_string()),
        bits_per_sample: Some(color.bytes_per_pixel() / color.channel_count() * 8),
        has_profile: Some(icc.is_some()),
        has_alpha: Some(color.has_alpha()),
        orientation,
        icc,
        exif,
        ..Metadata::default()
    };
    match format {
        ImageFormat::Jpeg => read_jpeg_segments(&bytes, &mut metadata),
        ImageFormat::Png => read_png_chunks(&bytes, &mut metadata),
        ImageFormat::Gif => metadata.is_palette = Some(true),
        _ => {}
    }
    Ok(metadata)
}

/// Header facts the decoder does not expose: SOF type and sampling, comments,
/// XMP and IPTC. Stops at the first scan.
fn read_jpeg_segments(bytes: &[u8], metadata: &mut Metadata) {
    const XMP_PREFIX: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
    const IPTC_PREFIX: &[u8] = b"Photoshop 3.0\0";

    let mut comments = Vec::new();
    let mut i = 2;
    while i + 4 <= bytes.len() && bytes[i] == 0xFF {
        let marker = bytes[i + 1];
        match marker {
            0xFF => {
                i += 1;
                continue;
            }
            0x01 | 0xD0..=0xD8 => {
                i += 2;
                continue;
            }
            0xD9 | 0xDA => break,
            _ => {}
        }
        let length = usize::from(u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]));
        let Some(segment) = bytes.get(i + 4..i + 2 + length) else {
            break;
        };
        match marker {
            0xC4 | 0xC8 | 0xCC => {}
            0xC0..=0xCF => {
                metadata.is_progressive = Some(matches!(marker, 0xC2 | 0xC6 | 0xCA | 0xCE));
                metadata.bits_per_sample = segment.first().copied();
                metadata.chroma_subsampling = jpeg_subsampling(segment);
            }
            0xE1 if segment.starts_with(XMP_PREFIX) => {
                metadata.xmp = Some(segment[XMP_PREFIX.len()..].to_vec());
            }
            0xED if segment.starts_with(IPTC_PREFIX) => {
                metadata.iptc = Some(segment[IPTC_PREFIX.len()..].to_vec());
            }
            0xFE => comments.push(Comment {
                keyword: "comment".to_string(),
                text: String::from_utf8_lossy(segment).into_owned(),
            }),
            _ => {}
        }
        i += 2 + length;
    }
    if !comments.is_empty() {
        metadata.comments = Some(comments);
    }
}

/// Sampling name from the luma factors of a start-of-frame segment.
fn jpeg_subsampling(sof: &[u8]) -> Option<String> {
    let components = *sof.get(5)?;
    if components < 3 {
        return None;
    }
    let luma = *sof.get(7)?;
    let name = match (luma >> 4, luma & 0x0F) {
        (1, 1) => "4:4:4",
        (2, 1) => "4:2:2",
        (1, 2) => "4:4:0",
        (2, 2) => "4:2:0",
        (4, 1) => "4:1:1",
        _ => return None,
    };
    Some(if components == 4 {
        format!("{name}:4")
    } else {
        name.to_string()
    })
}

/// IHDR layout, `bKGD`, `pHYs` and `tEXt` chunks. CRCs are not checked.
fn read_png_chunks(bytes: &[u8], metadata: &mut Metadata) {
    let mut comments = Vec::new();
    let mut i = 8;
    while let Some(header) = bytes.get(i..i + 8) {
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let Some(data) = bytes.get(i + 8..i + 8 + length) else {
            break;
        };
        match &header[4..8] {
            b"IHDR" if data.len() >= 13 => {
                metadata.bits_per_sample = Some(data[8]);
                metadata.is_palette = Some(data[9] == 3);
                metadata.is_progressive = Some(data[12] == 1);
            }
            b"bKGD" => {
                metadata.background = Some(match data.len() {
                    1 => vec![u16::from(data[0])],
                    _ => data
                        .chunks_exact(2)
                        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                        .collect(),
                });
            }
            b"pHYs" if data.len() >= 9 && data[8] == 1 => {
                let per_metre = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                metadata.density = Some((f64::from(per_metre) * 0.0254 * 100.0).round() / 100.0);
                metadata.resolution_unit = Some("inch".to_string());
            }
            b"tEXt" => {
                if let Some(split) = data.iter().position(|&b| b == 0) {
                    comments.push(Comment {
                        keyword: latin1(&data[..split]),
                        text: latin1(&data[split + 1..]),
                    });
                }
            }
            b"IEND" => break,
            _ => {}
        }
        i += 12 + length;
    }
    if !comments.is_empty() {
        metadata.comments = Some(comments);
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn channel_stats(pixels: &[f32], channels: usize, channel: usize, width: u32, scale: f64) -> ChannelStats {
    let mut stats = ChannelStats {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        ..ChannelStats::default()
    };
    let mut count = 0u64;
    for (i, px) in pixels.chunks_exact(channels).enumerate() {
        let v = f64::from(px[channel]) * scale;
        let (x, y) = ((i as u32) % width, (i as u32) / width);
        if v < stats.min {
            (stats.min, stats.min_x, stats.min_y) = (v, x, y);
        }
        if v > stats.max {
            (stats.max, stats.max_x, stats.max_y) = (v, x, y);
        }
        stats.sum += v;
        stats.squares_sum += v * v;
        count += 1;
    }
    if count == 0 {
        return ChannelStats::default();
    }
    let n = count as f64;
    stats.mean = stats.sum / n;
    if count > 1 {
        let variance = (stats.squares_sum - stats.sum * stats.sum / n) / (n - 1.0);
        stats.stdev = variance.max(0.0).sqrt();
    }
    stats
}

fn image_stats(image: &DynamicImage) -> Stats {
    let color = image.color();
    let channels = usize::from(color.channel_count());
    let pixels: Vec<f32> = match channels {
        1 => image.to_luma32f().into_raw(),
        2 => image.to_luma_alpha32f().into_raw(),
        3 => image.to_rgb32f().into_raw(),
        _ => image.to_rgba32f().into_raw(),
    };
    let scale = match depth_name(color) {
        "uchar" => 255.0,
        "ushort" => 65535.0,
        _ => 1.0,
    };
    let width = image.width().max(1);
    let per_channel: Vec<ChannelStats> = (0..channels)
        .into_par_iter()
        .map(|c| channel_stats(&pixels, channels, c, width, scale))
        .collect();
    let is_opaque = !color.has_alpha()
        || per_channel
            .last()
            .is_none_or(|alpha| alpha.min >= scale);

    let mut histogram = [0u64; 256];
    for px in image.to_luma8().pixels() {
        histogram[usize::from(px[0])] += 1;
    }
    let total: u64 = histogram.iter().sum();
    let entropy = if total == 0 {
        0.0
    } else {
        histogram
            .iter()
            .filter(|&&n| n > 0)
            .map(|&n| {
                let p = n as f64 / total as f64;
                -p * p.log2()
            })
            .sum()
    };

    Stats {
        channels: per_channel,
        is_opaque,
        entropy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::Colour;
    use crate::input::{InputBuilder, InputDefaults};
    use image::ImageEncoder;
    use std::sync::mpsc;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    fn buffer_input(bytes: Vec<u8>) -> InputDescriptor {
        InputBuilder::new().build(bytes.into(), None, false).unwrap()
    }

    fn run(job: Job) -> Result<(Vec<u8>, OutputInfo), EngineError> {
        let (tx, rx) = mpsc::channel();
        RustEngine::new().pipeline(job, Box::new(move |r| tx.send(r).unwrap()));
        rx.recv().unwrap()
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    #[test]
    fn input_format_passes_through() {
        let job = Job {
            input: buffer_input(png_bytes(8, 4)),
            options: JobOptions::new(),
        };
        let (data, info) = run(job).unwrap();
        assert_eq!(info.format, "png");
        assert_eq!((info.width, info.height, info.channels), (8, 4, 3));
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn jpeg_output_drops_alpha() {
        let mut options = JobOptions::new();
        options.jpeg(None).unwrap();
        let input = InputDescriptor::new(
            Source::Create(CreateInput {
                width: 4,
                height: 4,
                channels: 4,
                page_height: None,
                fill: Fill::Background(Colour::rgba(10, 20, 30, 128)),
            }),
            &InputDefaults::default(),
        );
        let (data, info) = run(Job { input, options }).unwrap();
        assert_eq!(info.format, "jpeg");
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn pixel_limit_rejects_large_input() {
        let mut input = buffer_input(png_bytes(10, 10));
        input.limit_input_pixels = 99;
        let err = run(Job {
            input: input.clone(),
            options: JobOptions::new(),
        })
        .unwrap_err();
        assert!(err.message.contains("pixel limit"));

        input.unlimited = true;
        assert!(run(Job { input, options: JobOptions::new() }).is_ok());
    }

    #[test]
    fn unsupported_features_name_themselves() {
        let mut options = JobOptions::new();
        options.jxl(None).unwrap();
        let err = run(Job {
            input: buffer_input(png_bytes(2, 2)),
            options,
        })
        .unwrap_err();
        assert!(err.message.contains("JPEG XL"), "{}", err.message);
    }

    #[test]
    fn raw_uchar_round_trip() {
        let mut options = JobOptions::new();
        options.raw(None).unwrap();
        let (data, info) = run(Job {
            input: buffer_input(png_bytes(3, 2)),
            options,
        })
        .unwrap();
        assert_eq!(info.format, "raw");
        assert_eq!(data.len(), 3 * 2 * 3);
        assert_eq!(&data[..3], &[0, 0, 128]);
    }

    #[test]
    fn timeout_deadline() {
        let deadline = Deadline::new(0);
        assert!(deadline.check("decode").is_ok());
        let expired = Deadline {
            start: Instant::now() - Duration::from_secs(5),
            limit: Some(Duration::from_secs(1)),
        };
        assert!(expired.check("encode").unwrap_err().message.contains("timeout"));
    }

    #[test]
    fn expired_deadline_stops_before_writing() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("late.png");
        let mut options = JobOptions::new();
        options.delivery.file_out = Some(out.clone());
        let job = Job {
            input: buffer_input(png_bytes(4, 4)),
            options,
        };
        let expired = Deadline {
            start: Instant::now() - Duration::from_secs(5),
            limit: Some(Duration::from_secs(1)),
        };
        let err = run_within(&job, &expired).unwrap_err();
        assert!(err.message.contains("timeout"), "{}", err.message);
        assert!(!out.exists());
    }

    // =========================================================================
    // Format resolution
    // =========================================================================

    #[test]
    fn input_sentinel_prefers_file_extension() {
        let mut options = JobOptions::new();
        options.delivery.file_out = Some("out/photo.webp".into());
        assert_eq!(target_format(&options, OutputFormat::Png).unwrap(), OutputFormat::Webp);
        options.delivery.file_out = Some("out/photo".into());
        assert_eq!(target_format(&options, OutputFormat::Png).unwrap(), OutputFormat::Png);
        options.gif(None).unwrap();
        assert_eq!(target_format(&options, OutputFormat::Png).unwrap(), OutputFormat::Gif);
    }

    // =========================================================================
    // Metadata and stats
    // =========================================================================

    #[test]
    fn metadata_reads_header() {
        let meta = read_metadata(&buffer_input(png_bytes(7, 5))).unwrap();
        assert_eq!(meta.format.as_deref(), Some("png"));
        assert_eq!((meta.width, meta.height), (Some(7), Some(5)));
        assert_eq!(meta.channels, Some(3));
        assert_eq!(meta.depth.as_deref(), Some("uchar"));
        assert_eq!(meta.has_alpha, Some(false));
        assert_eq!(meta.bits_per_sample, Some(8));
        assert_eq!(meta.is_palette, Some(false));
        assert_eq!(meta.is_progressive, Some(false));
        assert_eq!(meta.icc, None);
    }

    #[test]
    fn png_chunks_supply_layout_background_and_comments() {
        fn chunk(kind: &[u8], data: &[u8]) -> Vec<u8> {
            let mut out = (data.len() as u32).to_be_bytes().to_vec();
            out.extend_from_slice(kind);
            out.extend_from_slice(data);
            out.extend_from_slice(&[0; 4]);
            out
        }
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend(chunk(b"IHDR", &[0, 0, 0, 4, 0, 0, 0, 4, 8, 3, 0, 0, 1]));
        bytes.extend(chunk(b"bKGD", &[7]));
        bytes.extend(chunk(b"pHYs", &[0, 0, 0x0B, 0x13, 0, 0, 0x0B, 0x13, 1]));
        bytes.extend(chunk(b"tEXt", b"Title\0Harbour"));
        bytes.extend(chunk(b"IEND", &[]));

        let mut meta = Metadata::default();
        read_png_chunks(&bytes, &mut meta);

        assert_eq!(meta.bits_per_sample, Some(8));
        assert_eq!(meta.is_palette, Some(true));
        assert_eq!(meta.is_progressive, Some(true));
        assert_eq!(meta.background, Some(vec![7]));
        assert_eq!(meta.density, Some(72.01));
        assert_eq!(
            meta.comments,
            Some(vec![Comment {
                keyword: "Title".to_string(),
                text: "Harbour".to_string(),
            }])
        );
    }

    #[test]
    fn jpeg_sampling_names() {
        let sof = |luma: u8, components: u8| vec![8, 0, 4, 0, 4, components, 1, luma, 0];
        assert_eq!(jpeg_subsampling(&sof(0x22, 3)).as_deref(), Some("4:2:0"));
        assert_eq!(jpeg_subsampling(&sof(0x11, 3)).as_deref(), Some("4:4:4"));
        assert_eq!(jpeg_subsampling(&sof(0x11, 4)).as_deref(), Some("4:4:4:4"));
        assert_eq!(jpeg_subsampling(&sof(0x11, 1)), None);
    }

    #[test]
    fn stats_of_flat_image() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([200, 100, 0, 255])));
        let stats = image_stats(&image);
        assert_eq!(stats.channels.len(), 4);
        assert!((stats.channels[0].mean - 200.0).abs() < 1e-3);
        assert!(stats.channels[1].stdev.abs() < 1e-3);
        assert!(stats.is_opaque);
        assert_eq!(stats.entropy, 0.0);
    }

    #[test]
    fn stats_detects_translucency_and_extremes() {
        let image = DynamicImage::ImageLumaA8(GrayAlphaImage::from_fn(2, 1, |x, _| {
            LumaA([if x == 0 { 0 } else { 255 }, 100])
        }));
        let stats = image_stats(&image);
        assert!(!stats.is_opaque);
        assert_eq!((stats.channels[0].max_x, stats.channels[0].min_x), (1, 0));
        assert!((stats.entropy - 1.0).abs() < 1e-9);
    }
}
