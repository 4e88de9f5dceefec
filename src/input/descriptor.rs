//! The normalized input record handed to the engine.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde::ser::SerializeStruct;

use super::stream::StreamBuffer;
use crate::colour::Colour;
use crate::validate::keyword_enum;

/// Default pixel ceiling: 16383 x 16383.
pub const DEFAULT_PIXEL_LIMIT: u64 = 16383 * 16383;

keyword_enum! {
    /// How sensitive decoding is to damaged input.
    pub enum FailOn {
        None => "none",
        Truncated => "truncated",
        Error => "error",
        Warning => "warning",
    }
}

keyword_enum! {
    /// Band format of raw pixel data, on input or output.
    pub enum RawDepth {
        Char => "char",
        Uchar => "uchar",
        Short => "short",
        Ushort => "ushort",
        Int => "int",
        Uint => "uint",
        Float => "float",
        Complex => "complex",
        Double => "double",
        Dpcomplex => "dpcomplex",
    }
}

impl RawDepth {
    /// Bytes per band, for the depths a typed array can carry.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            RawDepth::Char | RawDepth::Uchar => 1,
            RawDepth::Short | RawDepth::Ushort => 2,
            RawDepth::Int | RawDepth::Uint | RawDepth::Float => 4,
            RawDepth::Complex | RawDepth::Double => 8,
            RawDepth::Dpcomplex => 16,
        }
    }
}

keyword_enum! {
    pub enum NoiseKind {
        Gaussian => "gaussian",
    }
}

keyword_enum! {
    pub enum TextAlign {
        Left => "left",
        Centre => "centre",
        Right => "right",
    }
}

keyword_enum! {
    pub enum TextWrap {
        Word => "word",
        Char => "char",
        WordChar => "word-char",
        None => "none",
    }
}

keyword_enum! {
    pub enum HorizontalAlign {
        Left => "left",
        Centre => "centre",
        Right => "right",
    }
}

keyword_enum! {
    pub enum VerticalAlign {
        Top => "top",
        Centre => "centre",
        Bottom => "bottom",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawInput {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub depth: RawDepth,
    pub premultiplied: bool,
    pub page_height: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Noise {
    pub kind: NoiseKind,
    pub mean: f64,
    pub sigma: f64,
}

/// Either noise or a flat background fills a created image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    Noise(Noise),
    Background(Colour),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateInput {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub page_height: Option<u32>,
    pub fill: Fill,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextInput {
    pub text: String,
    pub font: Option<String>,
    pub fontfile: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub align: Option<TextAlign>,
    pub justify: Option<bool>,
    pub dpi: Option<u32>,
    pub rgba: Option<bool>,
    pub spacing: Option<i32>,
    pub wrap: Option<TextWrap>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinLayout {
    pub animated: Option<bool>,
    pub across: Option<u32>,
    pub shim: Option<u32>,
    pub background: Option<Colour>,
    pub halign: Option<HorizontalAlign>,
    pub valign: Option<VerticalAlign>,
}

/// Where pixels come from. Exactly one payload per descriptor.
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    Buffer(Arc<[u8]>),
    Stream(StreamBuffer),
    Create(CreateInput),
    Text(TextInput),
    Join {
        inputs: Vec<InputDescriptor>,
        layout: JoinLayout,
    },
}

impl Source {
    pub fn kind(&self) -> &'static str {
        match self {
            Source::File(_) => "file",
            Source::Buffer(_) => "buffer",
            Source::Stream(_) => "stream",
            Source::Create(_) => "create",
            Source::Text(_) => "text",
            Source::Join { .. } => "join",
        }
    }
}

// Byte payloads are summarized by length.
impl Serialize for Source {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Source", 2)?;
        s.serialize_field("kind", self.kind())?;
        match self {
            Source::File(path) => s.serialize_field("path", path)?,
            Source::Buffer(bytes) => s.serialize_field("bytes", &bytes.len())?,
            Source::Stream(buf) => s.serialize_field("bytes", &buf.len())?,
            Source::Create(create) => s.serialize_field("create", create)?,
            Source::Text(text) => s.serialize_field("text", text)?,
            Source::Join { inputs, layout } => {
                s.serialize_field("join", &(inputs, layout))?;
            }
        }
        s.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InputDescriptor {
    pub source: Source,
    pub fail_on: FailOn,
    /// Zero disables the ceiling.
    pub limit_input_pixels: u64,
    pub unlimited: bool,
    pub sequential_read: bool,
    pub ignore_icc: bool,
    pub auto_orient: bool,
    pub density: Option<f64>,
    pub pages: Option<i32>,
    pub page: Option<i32>,
    pub raw: Option<RawInput>,
    pub open_slide_level: Option<i32>,
    pub tiff_subifd: Option<i32>,
    pub svg_stylesheet: Option<String>,
    pub svg_high_bitdepth: Option<bool>,
    pub pdf_background: Option<Colour>,
    pub jp2_oneshot: Option<bool>,
}

impl InputDescriptor {
    pub(crate) fn new(source: Source, defaults: &InputDefaults) -> Self {
        Self {
            source,
            fail_on: defaults.fail_on,
            limit_input_pixels: defaults.limit_input_pixels,
            unlimited: false,
            sequential_read: defaults.sequential_read,
            ignore_icc: false,
            auto_orient: false,
            density: None,
            pages: None,
            page: None,
            raw: None,
            open_slide_level: None,
            tiff_subifd: None,
            svg_stylesheet: None,
            svg_high_bitdepth: None,
            pdf_background: None,
            jp2_oneshot: None,
        }
    }

    /// Encoded bytes available to decode: a buffer or a frozen stream.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.source {
            Source::Buffer(bytes) => Some(&bytes[..]),
            Source::Stream(buf) => buf.bytes(),
            _ => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.source, Source::Stream(_))
    }

    pub fn file(&self) -> Option<&std::path::Path> {
        match &self.source {
            Source::File(path) => Some(path.as_path()),
            _ => None,
        }
    }
}

/// Decode defaults applied before caller options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputDefaults {
    pub fail_on: FailOn,
    pub limit_input_pixels: u64,
    pub sequential_read: bool,
}

impl Default for InputDefaults {
    fn default() -> Self {
        Self {
            fail_on: FailOn::Warning,
            limit_input_pixels: DEFAULT_PIXEL_LIMIT,
            sequential_read: true,
        }
    }
}
