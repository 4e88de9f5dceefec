//! Metadata intent: which metadata survives into the output, and what is
//! overridden.
//!
//! The retention mask has one bit per category. `keep_*` calls set their
//! bit; `with_*` calls set it too and record an explicit payload.
//!
//! | Bit | Category |
//! |---|---|
//! | `0b00001` | EXIF |
//! | `0b00010` | XMP |
//! | `0b00100` | IPTC (reserved) |
//! | `0b01000` | ICC profile |
//! | `0b10000` | everything else |

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::output::JobOptions;
use crate::validate::{self, keyword_enum};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetentionMask(u8);

impl RetentionMask {
    pub const EXIF: u8 = 0b00001;
    pub const XMP: u8 = 0b00010;
    pub const IPTC: u8 = 0b00100;
    pub const ICC: u8 = 0b01000;
    pub const OTHER: u8 = 0b10000;
    pub const ALL: u8 = 0b11111;

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, bits: u8) -> bool {
        self.0 & bits == bits
    }

    fn set(&mut self, bits: u8) {
        self.0 |= bits;
    }

    fn clear(&mut self, bits: u8) {
        self.0 &= !bits;
    }
}

keyword_enum! {
    /// Profiles the engine ships with.
    pub enum BuiltinProfile {
        Srgb => "srgb",
        P3 => "p3",
        Cmyk => "cmyk",
    }
}

/// Output colour profile: a built-in name or a path to an ICC file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IccProfile {
    Builtin(BuiltinProfile),
    Path(PathBuf),
}

impl IccProfile {
    fn parse(value: &str) -> Self {
        let lower = value.to_ascii_lowercase();
        match validate::keyword::<BuiltinProfile>("icc", &lower) {
            Ok(builtin) => IccProfile::Builtin(builtin),
            Err(_) => IccProfile::Path(PathBuf::from(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataIntent {
    pub keep: RetentionMask,
    /// Flattened `exif-<ifd>-<tag>` overrides.
    pub exif: BTreeMap<String, String>,
    /// Merge `exif` into the input's EXIF rather than replacing it.
    pub exif_merge: bool,
    /// Transform to this profile; attached only when `keep` has the ICC bit.
    pub icc: Option<IccProfile>,
    pub xmp: Option<String>,
    pub orientation: Option<u8>,
    pub density: Option<f64>,
}

impl Default for MetadataIntent {
    fn default() -> Self {
        Self {
            keep: RetentionMask::default(),
            exif: BTreeMap::new(),
            exif_merge: true,
            icc: None,
            xmp: None,
            orientation: None,
            density: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct IccOptions {
    /// `false` converts to the profile without embedding it.
    pub attach: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WithMetadataOptions {
    pub orientation: Option<i64>,
    pub density: Option<f64>,
    pub icc: Option<String>,
    /// `{ifd: {tag: value}}`, merged into the input's EXIF.
    pub exif: Option<serde_json::Value>,
}

impl JobOptions {
    pub fn keep_metadata(&mut self) {
        self.metadata.keep.set(RetentionMask::ALL);
    }

    pub fn keep_exif(&mut self) {
        self.metadata.keep.set(RetentionMask::EXIF);
    }

    pub fn keep_xmp(&mut self) {
        self.metadata.keep.set(RetentionMask::XMP);
    }

    pub fn keep_icc_profile(&mut self) {
        self.metadata.keep.set(RetentionMask::ICC);
    }

    /// Replace the output EXIF with `{ifd: {tag: value}}`.
    pub fn with_exif(&mut self, exif: &serde_json::Value) -> Result<(), Error> {
        let Some(groups) = exif.as_object() else {
            return Err(Error::invalid_parameter("exif", "object", exif));
        };
        let mut flattened = BTreeMap::new();
        for (ifd, entries) in groups {
            let Some(entries) = entries.as_object() else {
                return Err(Error::invalid_parameter(ifd, "object", entries));
            };
            for (tag, value) in entries {
                let Some(value) = value.as_str() else {
                    return Err(Error::invalid_parameter(format!("{ifd}.{tag}"), "string", value));
                };
                flattened.insert(
                    format!("exif-{}-{tag}", ifd.to_lowercase()),
                    value.to_string(),
                );
            }
        }
        self.metadata.exif.extend(flattened);
        self.metadata.exif_merge = false;
        self.keep_exif();
        Ok(())
    }

    /// Like [`with_exif`](Self::with_exif), merged into the input's EXIF.
    pub fn with_exif_merge(&mut self, exif: &serde_json::Value) -> Result<(), Error> {
        self.with_exif(exif)?;
        self.metadata.exif_merge = true;
        Ok(())
    }

    pub fn with_icc_profile(&mut self, icc: &str, options: Option<&IccOptions>) -> Result<(), Error> {
        let icc = validate::non_empty("icc", icc)?;
        self.metadata.icc = Some(IccProfile::parse(icc));
        self.keep_icc_profile();
        if options.and_then(|o| o.attach) == Some(false) {
            self.metadata.keep.clear(RetentionMask::ICC);
        }
        Ok(())
    }

    pub fn with_xmp(&mut self, xmp: &str) -> Result<(), Error> {
        self.metadata.xmp = Some(validate::non_empty("xmp", xmp)?.to_string());
        self.keep_xmp();
        Ok(())
    }

    /// Keep everything and convert to sRGB, with optional overrides.
    pub fn with_metadata(&mut self, options: Option<&WithMetadataOptions>) -> Result<(), Error> {
        self.keep_metadata();
        self.with_icc_profile("srgb", None)?;
        let Some(o) = options else {
            return Ok(());
        };
        if let Some(orientation) = o.orientation {
            self.metadata.orientation =
                Some(validate::integer("orientation", orientation, 1, 8)? as u8);
        }
        if let Some(density) = o.density {
            self.metadata.density = Some(validate::positive_number("density", density)?);
        }
        if let Some(icc) = &o.icc {
            self.with_icc_profile(icc, None)?;
        }
        if let Some(exif) = &o.exif {
            self.with_exif_merge(exif)?;
        }
        Ok(())
    }
}
