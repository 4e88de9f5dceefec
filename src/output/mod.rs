//! Output option resolvers.
//!
//! [`JobOptions`] accumulates every output-side decision for one job. Each
//! codec has a resolver (`jpeg`, `png`, `webp`, ...) that validates its
//! caller-facing options struct field by field and writes the result into
//! the codec's settings group, then selects the codec as the output format
//! unless the caller passed `force: false`. [`JobOptions::to_format`] maps a
//! format name or alias to the matching resolver.
//!
//! Resolvers take `Option<&Options>`: `None` only selects the format. Fields
//! are validated independently and unknown keys in deserialized options are
//! ignored. Repeated calls overwrite: the last write wins.

mod animation;
mod gif;
mod heif;
mod jp2;
mod jpeg;
mod jxl;
mod png;
mod raw;
mod tiff;
mod tile;
mod webp;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::engine::Capabilities;
use crate::error::Error;
use crate::metadata::MetadataIntent;
use crate::validate::{self, keyword_enum};

pub use animation::{Animation, AnimationOptions, Delay};
pub use gif::{GifOptions, GifSettings};
pub use heif::{HeifCompression, HeifOptions, HeifSettings};
pub use jp2::{Jp2Options, Jp2Settings};
pub use jpeg::{JpegOptions, JpegSettings};
pub use jxl::{JxlOptions, JxlSettings, distance_from_quality};
pub use png::{PngOptions, PngSettings};
pub use raw::{RawOptions, RawSettings};
pub use tiff::{TiffCompression, TiffOptions, TiffPredictor, TiffResolutionUnit, TiffSettings};
pub use tile::{TileContainer, TileDepth, TileLayout, TileOptions, TileSettings};
pub use webp::{WebpOptions, WebpPreset, WebpSettings};

keyword_enum! {
    /// The format the engine writes. `Input` matches the input's format.
    pub enum OutputFormat {
        Input => "input",
        Jpeg => "jpeg",
        Png => "png",
        Webp => "webp",
        Gif => "gif",
        Tiff => "tiff",
        Heif => "heif",
        Jxl => "jxl",
        Jp2 => "jp2",
        Raw => "raw",
        Dz => "dz",
    }
}

keyword_enum! {
    pub enum ChromaSubsampling {
        Yuv420 => "4:2:0",
        Yuv444 => "4:4:4",
    }
}

/// A resolver reachable through [`JobOptions::to_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Jpeg,
    Png,
    Webp,
    Gif,
    Tiff,
    Heif,
    Avif,
    Jxl,
    Jp2,
    Raw,
    Tile,
}

/// Accepted format names, in the order they are reported.
pub const FORMAT_ALIASES: &[(&str, Codec)] = &[
    ("heic", Codec::Heif),
    ("heif", Codec::Heif),
    ("avif", Codec::Avif),
    ("jpeg", Codec::Jpeg),
    ("jpg", Codec::Jpeg),
    ("jpe", Codec::Jpeg),
    ("tile", Codec::Tile),
    ("dz", Codec::Tile),
    ("png", Codec::Png),
    ("raw", Codec::Raw),
    ("tiff", Codec::Tiff),
    ("tif", Codec::Tiff),
    ("webp", Codec::Webp),
    ("gif", Codec::Gif),
    ("jp2", Codec::Jp2),
    ("jpx", Codec::Jp2),
    ("j2k", Codec::Jp2),
    ("j2c", Codec::Jp2),
    ("jxl", Codec::Jxl),
];

impl Codec {
    /// Case-insensitive lookup of a format name or alias.
    pub fn from_name(name: &str) -> Option<Codec> {
        let name = name.to_ascii_lowercase();
        FORMAT_ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, codec)| *codec)
    }

    /// Codec implied by a file extension.
    pub fn from_path(path: &Path) -> Option<Codec> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Codec::from_name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Jpeg => "jpeg",
            Codec::Png => "png",
            Codec::Webp => "webp",
            Codec::Gif => "gif",
            Codec::Tiff => "tiff",
            Codec::Heif => "heif",
            Codec::Avif => "avif",
            Codec::Jxl => "jxl",
            Codec::Jp2 => "jp2",
            Codec::Raw => "raw",
            Codec::Tile => "tile",
        }
    }

    /// The stored format this codec writes.
    pub fn output_format(self) -> OutputFormat {
        match self {
            Codec::Jpeg => OutputFormat::Jpeg,
            Codec::Png => OutputFormat::Png,
            Codec::Webp => OutputFormat::Webp,
            Codec::Gif => OutputFormat::Gif,
            Codec::Tiff => OutputFormat::Tiff,
            Codec::Heif | Codec::Avif => OutputFormat::Heif,
            Codec::Jxl => OutputFormat::Jxl,
            Codec::Jp2 => OutputFormat::Jp2,
            Codec::Raw => OutputFormat::Raw,
            Codec::Tile => OutputFormat::Dz,
        }
    }

    fn known() -> String {
        let names: Vec<&str> = FORMAT_ALIASES.iter().map(|(alias, _)| *alias).collect();
        names.join(", ")
    }
}

/// Options for [`JobOptions::to_format`], one variant per resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FormatOptions {
    #[default]
    None,
    Jpeg(JpegOptions),
    Png(PngOptions),
    Webp(WebpOptions),
    Gif(GifOptions),
    Tiff(TiffOptions),
    /// Shared by the `heif` and `avif` entry points.
    Heif(HeifOptions),
    Jxl(JxlOptions),
    Jp2(Jp2Options),
    Raw(RawOptions),
    Tile(TileOptions),
}

macro_rules! format_options_from {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(impl From<$ty> for FormatOptions {
            fn from(options: $ty) -> Self {
                FormatOptions::$variant(options)
            }
        })+
    };
}

format_options_from! {
    Jpeg(JpegOptions),
    Png(PngOptions),
    Webp(WebpOptions),
    Gif(GifOptions),
    Tiff(TiffOptions),
    Heif(HeifOptions),
    Jxl(JxlOptions),
    Jp2(Jp2Options),
    Raw(RawOptions),
    Tile(TileOptions),
}

impl FormatOptions {
    fn kind(&self) -> &'static str {
        match self {
            FormatOptions::None => "none",
            FormatOptions::Jpeg(_) => "jpeg",
            FormatOptions::Png(_) => "png",
            FormatOptions::Webp(_) => "webp",
            FormatOptions::Gif(_) => "gif",
            FormatOptions::Tiff(_) => "tiff",
            FormatOptions::Heif(_) => "heif",
            FormatOptions::Jxl(_) => "jxl",
            FormatOptions::Jp2(_) => "jp2",
            FormatOptions::Raw(_) => "raw",
            FormatOptions::Tile(_) => "tile",
        }
    }

    /// Deserialize untyped options for the codec they are meant for.
    pub fn from_value(codec: Codec, value: serde_json::Value) -> Result<Self, Error> {
        if value.is_null() {
            return Ok(FormatOptions::None);
        }
        let invalid = |e: serde_json::Error| {
            Error::invalid_parameter("options", format!("{} options", codec.name()), e.to_string())
        };
        let options = match codec {
            Codec::Jpeg => FormatOptions::Jpeg(serde_json::from_value(value).map_err(invalid)?),
            Codec::Png => FormatOptions::Png(serde_json::from_value(value).map_err(invalid)?),
            Codec::Webp => FormatOptions::Webp(serde_json::from_value(value).map_err(invalid)?),
            Codec::Gif => FormatOptions::Gif(serde_json::from_value(value).map_err(invalid)?),
            Codec::Tiff => FormatOptions::Tiff(serde_json::from_value(value).map_err(invalid)?),
            Codec::Heif | Codec::Avif => {
                FormatOptions::Heif(serde_json::from_value(value).map_err(invalid)?)
            }
            Codec::Jxl => FormatOptions::Jxl(serde_json::from_value(value).map_err(invalid)?),
            Codec::Jp2 => FormatOptions::Jp2(serde_json::from_value(value).map_err(invalid)?),
            Codec::Raw => FormatOptions::Raw(serde_json::from_value(value).map_err(invalid)?),
            Codec::Tile => FormatOptions::Tile(serde_json::from_value(value).map_err(invalid)?),
        };
        Ok(options)
    }
}

/// How the result leaves the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Delivery {
    pub stream_out: bool,
    pub resolve_with_object: bool,
    /// `None` means the bytes come back as a buffer.
    pub file_out: Option<PathBuf>,
}

/// Every output-side decision for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOptions {
    pub format: OutputFormat,
    pub jpeg: JpegSettings,
    pub png: PngSettings,
    pub webp: WebpSettings,
    pub gif: GifSettings,
    pub tiff: TiffSettings,
    pub heif: HeifSettings,
    pub jxl: JxlSettings,
    pub jp2: Jp2Settings,
    pub raw: RawSettings,
    pub tile: TileSettings,
    pub animation: Animation,
    pub metadata: MetadataIntent,
    pub delivery: Delivery,
    /// Zero means no limit.
    pub timeout_seconds: u32,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Input,
            jpeg: JpegSettings::default(),
            png: PngSettings::default(),
            webp: WebpSettings::default(),
            gif: GifSettings::default(),
            tiff: TiffSettings::default(),
            heif: HeifSettings::default(),
            jxl: JxlSettings::default(),
            jp2: Jp2Settings::default(),
            raw: RawSettings::default(),
            tile: TileSettings::default(),
            animation: Animation::default(),
            metadata: MetadataIntent::default(),
            delivery: Delivery::default(),
            timeout_seconds: 0,
        }
    }
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `format` unless the caller opted out with `force: false`.
    pub(crate) fn update_format_out(&mut self, format: OutputFormat, force: Option<bool>) {
        if force != Some(false) {
            self.format = format;
        }
    }

    /// Select an output format by name or alias and apply its options.
    pub fn to_format(
        &mut self,
        format: &str,
        options: FormatOptions,
        caps: &Capabilities,
    ) -> Result<(), Error> {
        let codec = Codec::from_name(format).ok_or_else(|| Error::UnsupportedFormat {
            requested: format.to_string(),
            known: Codec::known(),
        })?;
        match (codec, options) {
            (Codec::Jpeg, FormatOptions::None) => self.jpeg(None),
            (Codec::Jpeg, FormatOptions::Jpeg(o)) => self.jpeg(Some(&o)),
            (Codec::Png, FormatOptions::None) => self.png(None),
            (Codec::Png, FormatOptions::Png(o)) => self.png(Some(&o)),
            (Codec::Webp, FormatOptions::None) => self.webp(None),
            (Codec::Webp, FormatOptions::Webp(o)) => self.webp(Some(&o)),
            (Codec::Gif, FormatOptions::None) => self.gif(None),
            (Codec::Gif, FormatOptions::Gif(o)) => self.gif(Some(&o)),
            (Codec::Tiff, FormatOptions::None) => self.tiff(None),
            (Codec::Tiff, FormatOptions::Tiff(o)) => self.tiff(Some(&o)),
            (Codec::Heif, FormatOptions::None) => self.heif(None, caps),
            (Codec::Heif, FormatOptions::Heif(o)) => self.heif(Some(&o), caps),
            (Codec::Avif, FormatOptions::None) => self.avif(None, caps),
            (Codec::Avif, FormatOptions::Heif(o)) => self.avif(Some(&o), caps),
            (Codec::Jxl, FormatOptions::None) => self.jxl(None),
            (Codec::Jxl, FormatOptions::Jxl(o)) => self.jxl(Some(&o)),
            (Codec::Jp2, FormatOptions::None) => self.jp2(None, caps),
            (Codec::Jp2, FormatOptions::Jp2(o)) => self.jp2(Some(&o), caps),
            (Codec::Raw, FormatOptions::None) => self.raw(None),
            (Codec::Raw, FormatOptions::Raw(o)) => self.raw(Some(&o)),
            (Codec::Tile, FormatOptions::None) => self.tile(None),
            (Codec::Tile, FormatOptions::Tile(o)) => self.tile(Some(&o)),
            (codec, other) => Err(Error::invalid_parameter(
                "options",
                format!("{} options", codec.name()),
                other.kind(),
            )),
        }
    }

    /// Wall-clock limit for the engine, 0 to 3600 seconds (0 disables it).
    ///
    /// Engines check the limit between stages. An encode already running is
    /// not interrupted, so a job may overrun by one stage before it fails.
    pub fn timeout(&mut self, seconds: i64) -> Result<(), Error> {
        self.timeout_seconds = validate::integer("seconds", seconds, 0, 3600)? as u32;
        Ok(())
    }
}

/// `2^ceil(log2(colours))` for a palette of `colours` entries.
pub fn bitdepth_from_colour_count(colours: u32) -> u32 {
    colours.next_power_of_two()
}

/// Validate a palette size (2 to 256) and convert it to a bit depth.
pub(crate) fn palette_bitdepth(colours: i64) -> Result<u32, Error> {
    let colours = validate::integer("colours", colours, 2, 256)?;
    Ok(bitdepth_from_colour_count(colours as u32))
}

pub(crate) fn chroma(value: &str) -> Result<ChromaSubsampling, Error> {
    validate::keyword("chroma_subsampling", value)
}
