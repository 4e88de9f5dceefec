//! Caller-facing input options.
//!
//! Every field is optional and validated only when present. Values use wide
//! types so out-of-range numbers reach validation instead of being rejected
//! by the deserializer, and unknown keys are ignored.

use serde::Deserialize;

use crate::colour::ColourSpec;

/// Pixel ceiling: a boolean shorthand or an explicit count.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PixelLimit {
    Flag(bool),
    Pixels(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InputOptions {
    pub fail_on: Option<String>,
    /// Deprecated: `true` means `fail_on = "warning"`, `false` means `"none"`.
    pub fail_on_error: Option<bool>,
    pub limit_input_pixels: Option<PixelLimit>,
    pub unlimited: Option<bool>,
    pub sequential_read: Option<bool>,
    pub density: Option<f64>,
    pub ignore_icc: Option<bool>,
    pub pages: Option<i64>,
    pub page: Option<i64>,
    /// Shorthand for `pages = -1` (true) or `pages = 1` (false).
    pub animated: Option<bool>,
    pub auto_orient: Option<bool>,
    /// Deprecated spelling of `open_slide.level`.
    pub level: Option<i64>,
    /// Deprecated spelling of `tiff.subifd`.
    pub subifd: Option<i64>,
    /// Deprecated spelling of `pdf.background`.
    pub pdf_background: Option<ColourSpec>,
    pub raw: Option<RawInputOptions>,
    pub open_slide: Option<OpenSlideOptions>,
    pub tiff: Option<TiffInputOptions>,
    pub svg: Option<SvgInputOptions>,
    pub pdf: Option<PdfInputOptions>,
    pub jp2: Option<Jp2InputOptions>,
    pub create: Option<CreateOptions>,
    pub text: Option<TextOptions>,
    pub join: Option<JoinOptions>,
}

impl InputOptions {
    /// Whether these options describe how to decode a streamed image.
    pub fn has_stream_keys(&self) -> bool {
        self.fail_on.is_some()
            || self.fail_on_error.is_some()
            || self.limit_input_pixels.is_some()
            || self.unlimited.is_some()
            || self.animated.is_some()
            || self.auto_orient.is_some()
            || self.density.is_some()
            || self.ignore_icc.is_some()
            || self.page.is_some()
            || self.pages.is_some()
            || self.sequential_read.is_some()
            || self.level.is_some()
            || self.subifd.is_some()
            || self.pdf_background.is_some()
            || self.raw.is_some()
            || self.open_slide.is_some()
            || self.tiff.is_some()
            || self.svg.is_some()
            || self.pdf.is_some()
            || self.jp2.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawInputOptions {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub channels: Option<i64>,
    /// Overrides the depth implied by a typed array.
    pub depth: Option<String>,
    pub premultiplied: Option<bool>,
    pub page_height: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OpenSlideOptions {
    pub level: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TiffInputOptions {
    pub subifd: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SvgInputOptions {
    pub stylesheet: Option<String>,
    pub high_bitdepth: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PdfInputOptions {
    pub background: Option<ColourSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Jp2InputOptions {
    pub oneshot: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CreateOptions {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub channels: Option<i64>,
    pub page_height: Option<i64>,
    pub noise: Option<NoiseOptions>,
    pub background: Option<ColourSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NoiseOptions {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub mean: Option<f64>,
    pub sigma: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    pub text: Option<String>,
    pub font: Option<String>,
    pub fontfile: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub align: Option<String>,
    pub justify: Option<bool>,
    pub dpi: Option<i64>,
    pub rgba: Option<bool>,
    pub spacing: Option<i64>,
    pub wrap: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct JoinOptions {
    pub animated: Option<bool>,
    pub across: Option<i64>,
    pub shim: Option<i64>,
    pub background: Option<ColourSpec>,
    pub halign: Option<String>,
    pub valign: Option<String>,
}
