//! Engine boundary: the trait every image engine implements, and the records
//! that cross it.
//!
//! Each operation takes a finalized job and a completion. The completion is
//! called exactly once, and never before the operation call has returned, so
//! callers can finish wiring up delivery after issuing the call.
//!
//! The production implementation is [`RustEngine`](super::rust_engine::RustEngine).

use serde::Serialize;
use thiserror::Error;

use crate::input::InputDescriptor;
use crate::output::JobOptions;

/// A failure reported by the engine itself.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
    /// Engine-side stack, when the engine has one to offer.
    pub native_stack: Option<String>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            native_stack: None,
        }
    }
}

/// Build-time codec availability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub jp2k: bool,
    pub jxl: bool,
    pub heif: bool,
    /// Running on a prebuilt engine with a restricted codec build.
    pub prebuilt: bool,
}

/// A finalized input plus the output decisions to apply to it.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub input: InputDescriptor,
    pub options: JobOptions,
}

/// Post-processing result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputInfo {
    pub format: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub premultiplied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_offset_left: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_offset_top: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attention_x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attention_y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_autofit_dpi: Option<u32>,
}

/// Header-level facts about an input, read without a full decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    pub format: Option<String>,
    pub size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub space: Option<String>,
    pub channels: Option<u8>,
    pub depth: Option<String>,
    pub density: Option<f64>,
    pub has_profile: Option<bool>,
    pub has_alpha: Option<bool>,
    /// JPEG sampling as `4:2:0`, `4:4:4` and so on.
    pub chroma_subsampling: Option<String>,
    /// Progressive JPEG or interlaced PNG.
    pub is_progressive: Option<bool>,
    pub is_palette: Option<bool>,
    pub bits_per_sample: Option<u8>,
    pub orientation: Option<u8>,
    pub pages: Option<u32>,
    pub page_height: Option<u32>,
    #[serde(rename = "loop")]
    pub loop_count: Option<u32>,
    pub delay: Option<Vec<u32>>,
    /// Index of the primary image in a multi-image container.
    pub page_primary: Option<u32>,
    /// Pyramid levels of a multi-resolution input, largest first.
    pub levels: Option<Vec<PyramidLevel>>,
    pub subifds: Option<u32>,
    /// Default background, one value per channel.
    pub background: Option<Vec<u16>>,
    pub compression: Option<String>,
    pub resolution_unit: Option<String>,
    pub exif: Option<Vec<u8>>,
    pub icc: Option<Vec<u8>>,
    pub iptc: Option<Vec<u8>>,
    pub xmp: Option<Vec<u8>>,
    pub comments: Option<Vec<Comment>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PyramidLevel {
    pub width: u32,
    pub height: u32,
}

/// A free-text comment embedded in the input, e.g. a PNG `tEXt` chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub keyword: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelStats {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub squares_sum: f64,
    pub mean: f64,
    pub stdev: f64,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

/// Pixel statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub channels: Vec<ChannelStats>,
    pub is_opaque: bool,
    /// Grey-level histogram entropy, in bits.
    pub entropy: f64,
}

pub type Completion<T> = Box<dyn FnOnce(Result<T, EngineError>) + Send + 'static>;

/// Trait for image engines.
///
/// Implementations must be shareable across threads: a pipeline holds its
/// engine behind an `Arc` and completions run on the engine's own workers.
pub trait Engine: Send + Sync {
    /// Which optional codecs this build carries.
    fn capabilities(&self) -> Capabilities;

    /// Run a job. Data is empty when the job wrote to a file.
    fn pipeline(&self, job: Job, done: Completion<(Vec<u8>, OutputInfo)>);

    fn metadata(&self, input: InputDescriptor, done: Completion<Metadata>);

    fn stats(&self, input: InputDescriptor, done: Completion<Stats>);
}
