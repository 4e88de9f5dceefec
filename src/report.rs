//! CLI output formatting for every command.
//!
//! Each command has a pure `format_*` function returning display lines and a
//! thin `print_*` wrapper that writes them to stdout. Tests exercise the
//! `format_*` side; logging goes to stderr through `env_logger` and never
//! mixes with these lines.
//!
//! # Output Format
//!
//! ## run / convert
//!
//! ```text
//! webp 640x480, 3 channels
//!     Size: 18342 bytes
//! ```
//!
//! ## metadata
//!
//! ```text
//! jpeg 4000x3000
//!     Size: 2483112 bytes
//!     Space: srgb
//!     Channels: 3 (uchar)
//!     Alpha: no
//!     Density: 72
//! ```
//!
//! ## stats
//!
//! ```text
//! Opaque, entropy 7.4213
//!     0: min 0 max 255 mean 118.20 stdev 61.03
//!     1: min 2 max 255 mean 109.88 stdev 58.71
//!     2: min 0 max 251 mean 97.40 stdev 60.15
//! ```
//!
//! ## formats
//!
//! ```text
//! Formats
//!     jpeg: jpeg, jpg, jpe
//!     jp2: jp2, jpx, j2k, j2c (unavailable)
//!
//! Engine
//!     heif: yes
//!     jp2k: no
//! ```

use crate::engine::{Capabilities, Metadata, OutputInfo, Stats};
use crate::job::Plan;
use crate::output::{Codec, FORMAT_ALIASES};

// ============================================================================
// run / convert
// ============================================================================

/// Format the info record of a finished job.
pub fn format_info(info: &OutputInfo) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {}x{}, {} channels",
        info.format, info.width, info.height, info.channels
    )];
    lines.push(format!("    Size: {} bytes", info.size));
    if let Some(pages) = info.pages {
        let height = info.page_height.unwrap_or(info.height);
        lines.push(format!("    Pages: {} of height {}", pages, height));
    }
    if let (Some(left), Some(top)) = (info.crop_offset_left, info.crop_offset_top) {
        lines.push(format!("    Crop offset: {},{}", left, top));
    }
    if let (Some(x), Some(y)) = (info.attention_x, info.attention_y) {
        lines.push(format!("    Attention: {},{}", x, y));
    }
    if info.premultiplied {
        lines.push("    Premultiplied".to_string());
    }
    lines
}

pub fn print_info(info: &OutputInfo) {
    for line in format_info(info) {
        println!("{}", line);
    }
}

// ============================================================================
// metadata
// ============================================================================

/// Format an engine metadata record. Unknown fields are left out.
pub fn format_metadata(metadata: &Metadata) -> Vec<String> {
    let format = metadata.format.as_deref().unwrap_or("unknown");
    let mut lines = vec![match (metadata.width, metadata.height) {
        (Some(w), Some(h)) => format!("{} {}x{}", format, w, h),
        _ => format.to_string(),
    }];

    if let Some(size) = metadata.size {
        lines.push(format!("    Size: {} bytes", size));
    }
    if let Some(space) = &metadata.space {
        lines.push(format!("    Space: {}", space));
    }
    if let Some(channels) = metadata.channels {
        match &metadata.depth {
            Some(depth) => lines.push(format!("    Channels: {} ({})", channels, depth)),
            None => lines.push(format!("    Channels: {}", channels)),
        }
    }
    if let Some(subsampling) = &metadata.chroma_subsampling {
        lines.push(format!("    Chroma subsampling: {}", subsampling));
    }
    if let Some(progressive) = metadata.is_progressive {
        lines.push(format!("    Progressive: {}", yes_no(progressive)));
    }
    if let Some(palette) = metadata.is_palette {
        lines.push(format!("    Palette: {}", yes_no(palette)));
    }
    if let Some(alpha) = metadata.has_alpha {
        lines.push(format!("    Alpha: {}", yes_no(alpha)));
    }
    if let Some(profile) = metadata.has_profile {
        lines.push(format!("    ICC profile: {}", yes_no(profile)));
    }
    if let Some(density) = metadata.density {
        lines.push(format!("    Density: {}", density));
    }
    if let Some(orientation) = metadata.orientation {
        lines.push(format!("    Orientation: {}", orientation));
    }
    if let Some(pages) = metadata.pages {
        lines.push(format!("    Pages: {}", pages));
    }
    if let Some(loop_count) = metadata.loop_count {
        lines.push(format!("    Loop: {}", loop_count));
    }
    if let Some(delay) = &metadata.delay {
        let delays: Vec<String> = delay.iter().map(u32::to_string).collect();
        lines.push(format!("    Delay: {}", delays.join(",")));
    }
    for (name, block) in [("EXIF", &metadata.exif), ("XMP", &metadata.xmp), ("IPTC", &metadata.iptc)] {
        if let Some(block) = block {
            lines.push(format!("    {}: {} bytes", name, block.len()));
        }
    }
    for comment in metadata.comments.iter().flatten() {
        lines.push(format!("    {}: {}", comment.keyword, comment.text));
    }
    lines
}

pub fn print_metadata(metadata: &Metadata) {
    for line in format_metadata(metadata) {
        println!("{}", line);
    }
}

// ============================================================================
// stats
// ============================================================================

pub fn format_stats(stats: &Stats) -> Vec<String> {
    let opacity = if stats.is_opaque { "Opaque" } else { "Translucent" };
    let mut lines = vec![format!("{}, entropy {:.4}", opacity, stats.entropy)];
    for (index, channel) in stats.channels.iter().enumerate() {
        lines.push(format!(
            "    {}: min {} max {} mean {:.2} stdev {:.2}",
            index, channel.min, channel.max, channel.mean, channel.stdev
        ));
    }
    lines
}

pub fn print_stats(stats: &Stats) {
    for line in format_stats(stats) {
        println!("{}", line);
    }
}

// ============================================================================
// formats
// ============================================================================

/// Format the alias table grouped by codec, flagging codecs the engine lacks.
pub fn format_formats(capabilities: &Capabilities) -> Vec<String> {
    let mut lines = vec!["Formats".to_string()];

    let mut codecs: Vec<Codec> = Vec::new();
    for (_, codec) in FORMAT_ALIASES {
        if !codecs.contains(codec) {
            codecs.push(*codec);
        }
    }
    for codec in codecs {
        let aliases: Vec<&str> = FORMAT_ALIASES
            .iter()
            .filter(|(_, c)| *c == codec)
            .map(|(alias, _)| *alias)
            .collect();
        let available = match codec {
            Codec::Jp2 => capabilities.jp2k,
            Codec::Jxl => capabilities.jxl,
            Codec::Heif | Codec::Avif => capabilities.heif,
            _ => true,
        };
        let suffix = if available { "" } else { " (unavailable)" };
        lines.push(format!("    {}: {}{}", codec.name(), aliases.join(", "), suffix));
    }

    lines.push(String::new());
    lines.push("Engine".to_string());
    lines.push(format!("    heif: {}", yes_no(capabilities.heif)));
    lines.push(format!("    jp2k: {}", yes_no(capabilities.jp2k)));
    lines.push(format!("    jxl: {}", yes_no(capabilities.jxl)));
    lines.push(format!("    prebuilt: {}", yes_no(capabilities.prebuilt)));
    lines
}

pub fn print_formats(capabilities: &Capabilities) {
    for line in format_formats(capabilities) {
        println!("{}", line);
    }
}

// ============================================================================
// plan
// ============================================================================

/// Pretty JSON of a resolved job.
pub fn format_plan(plan: &Plan) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(plan)
}

pub fn print_plan(plan: &Plan) -> Result<(), serde_json::Error> {
    println!("{}", format_plan(plan)?);
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ChannelStats, Comment};
    use crate::input::{InputBuilder, InputDescriptor, Source};
    use crate::output::JobOptions;

    fn info() -> OutputInfo {
        OutputInfo {
            format: "webp".to_string(),
            size: 1234,
            width: 640,
            height: 480,
            channels: 3,
            ..Default::default()
        }
    }

    // =========================================================================
    // Info
    // =========================================================================

    #[test]
    fn info_header_and_size() {
        let lines = format_info(&info());
        assert_eq!(lines[0], "webp 640x480, 3 channels");
        assert_eq!(lines[1], "    Size: 1234 bytes");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn info_shows_pages_and_crop_offsets() {
        let mut info = info();
        info.pages = Some(4);
        info.page_height = Some(120);
        info.crop_offset_left = Some(-10);
        info.crop_offset_top = Some(5);
        let lines = format_info(&info);
        assert!(lines.contains(&"    Pages: 4 of height 120".to_string()));
        assert!(lines.contains(&"    Crop offset: -10,5".to_string()));
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    #[test]
    fn metadata_skips_unknown_fields() {
        let metadata = Metadata {
            format: Some("png".to_string()),
            width: Some(2),
            height: Some(3),
            channels: Some(4),
            depth: Some("uchar".to_string()),
            has_alpha: Some(true),
            ..Default::default()
        };
        let lines = format_metadata(&metadata);
        assert_eq!(
            lines,
            vec![
                "png 2x3".to_string(),
                "    Channels: 4 (uchar)".to_string(),
                "    Alpha: yes".to_string(),
            ]
        );
    }

    #[test]
    fn metadata_lists_jpeg_layout_and_blocks() {
        let metadata = Metadata {
            format: Some("jpeg".to_string()),
            chroma_subsampling: Some("4:2:0".to_string()),
            is_progressive: Some(true),
            exif: Some(vec![0; 14]),
            comments: Some(vec![Comment {
                keyword: "comment".to_string(),
                text: "harbour".to_string(),
            }]),
            ..Default::default()
        };
        let lines = format_metadata(&metadata);
        assert_eq!(
            lines,
            vec![
                "jpeg".to_string(),
                "    Chroma subsampling: 4:2:0".to_string(),
                "    Progressive: yes".to_string(),
                "    EXIF: 14 bytes".to_string(),
                "    comment: harbour".to_string(),
            ]
        );
    }

    #[test]
    fn metadata_without_format_says_unknown() {
        let lines = format_metadata(&Metadata::default());
        assert_eq!(lines, vec!["unknown".to_string()]);
    }

    #[test]
    fn metadata_lists_animation_delays() {
        let metadata = Metadata {
            format: Some("gif".to_string()),
            loop_count: Some(0),
            delay: Some(vec![100, 50]),
            ..Default::default()
        };
        let lines = format_metadata(&metadata);
        assert!(lines.contains(&"    Loop: 0".to_string()));
        assert!(lines.contains(&"    Delay: 100,50".to_string()));
    }

    // =========================================================================
    // Stats
    // =========================================================================

    #[test]
    fn stats_one_line_per_channel() {
        let channel = ChannelStats {
            min: 0.0,
            max: 255.0,
            mean: 127.5,
            stdev: 12.25,
            ..Default::default()
        };
        let stats = Stats {
            channels: vec![channel.clone(), channel],
            is_opaque: false,
            entropy: 1.0,
        };
        let lines = format_stats(&stats);
        assert_eq!(lines[0], "Translucent, entropy 1.0000");
        assert_eq!(lines[1], "    0: min 0 max 255 mean 127.50 stdev 12.25");
        assert_eq!(lines.len(), 3);
    }

    // =========================================================================
    // Formats
    // =========================================================================

    #[test]
    fn formats_groups_aliases_by_codec() {
        let lines = format_formats(&Capabilities::default());
        assert!(lines.contains(&"    jpeg: jpeg, jpg, jpe".to_string()));
        assert!(lines.contains(&"    tiff: tiff, tif".to_string()));
    }

    #[test]
    fn formats_marks_missing_codecs() {
        let capabilities = Capabilities {
            heif: true,
            ..Default::default()
        };
        let lines = format_formats(&capabilities);
        assert!(lines.contains(&"    jp2: jp2, jpx, j2k, j2c (unavailable)".to_string()));
        assert!(lines.contains(&"    jxl: jxl (unavailable)".to_string()));
        assert!(lines.contains(&"    avif: avif".to_string()));
        assert!(lines.contains(&"    jp2k: no".to_string()));
    }

    // =========================================================================
    // Plan
    // =========================================================================

    #[test]
    fn plan_is_json_with_input_and_options() {
        let descriptor: InputDescriptor = InputBuilder::new()
            .build("in.png".into(), None, false)
            .unwrap();
        assert!(matches!(descriptor.source, Source::File(_)));
        let options = JobOptions::default();
        let json = format_plan(&Plan {
            input: &descriptor,
            options: &options,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("input").is_some());
        assert!(value.get("options").is_some());
    }
}
