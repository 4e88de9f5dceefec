use serde::{Deserialize, Serialize};

use super::{JobOptions, OutputFormat, palette_bitdepth};
use crate::error::Error;
use crate::validate::{self, prefer};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PngOptions {
    pub progressive: Option<bool>,
    pub compression_level: Option<i64>,
    pub adaptive_filtering: Option<bool>,
    /// Quantise to a palette. When unset, any of `quality`, `effort`,
    /// `colours`/`colors` or `dither` turns palette mode on.
    pub palette: Option<bool>,
    pub quality: Option<i64>,
    pub effort: Option<i64>,
    pub colours: Option<i64>,
    pub colors: Option<i64>,
    pub dither: Option<f64>,
    pub force: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PngSettings {
    pub progressive: bool,
    pub compression_level: u8,
    pub adaptive_filtering: bool,
    pub palette: bool,
    pub quality: u8,
    pub effort: u8,
    pub bitdepth: u32,
    pub dither: f64,
}

impl Default for PngSettings {
    fn default() -> Self {
        Self {
            progressive: false,
            compression_level: 6,
            adaptive_filtering: false,
            palette: false,
            quality: 100,
            effort: 7,
            bitdepth: 8,
            dither: 1.0,
        }
    }
}

impl JobOptions {
    pub fn png(&mut self, options: Option<&PngOptions>) -> Result<(), Error> {
        let Some(o) = options else {
            self.update_format_out(OutputFormat::Png, None);
            return Ok(());
        };
        let s = &mut self.png;
        if let Some(progressive) = o.progressive {
            s.progressive = progressive;
        }
        if let Some(level) = o.compression_level {
            s.compression_level = validate::integer("compression_level", level, 0, 9)? as u8;
        }
        if let Some(adaptive) = o.adaptive_filtering {
            s.adaptive_filtering = adaptive;
        }
        let colours = prefer(o.colours, o.colors);
        if let Some(palette) = o.palette {
            s.palette = palette;
        } else if o.quality.is_some() || o.effort.is_some() || colours.is_some() || o.dither.is_some()
        {
            s.palette = true;
        }
        // Palette tuning only applies, and is only validated, in palette mode.
        if s.palette {
            if let Some(q) = o.quality {
                s.quality = validate::integer("quality", q, 0, 100)? as u8;
            }
            if let Some(effort) = o.effort {
                s.effort = validate::integer("effort", effort, 1, 10)? as u8;
            }
            if let Some(colours) = colours {
                s.bitdepth = palette_bitdepth(colours)?;
            }
            if let Some(dither) = o.dither {
                s.dither = validate::number("dither", dither, 0.0, 1.0)?;
            }
        }
        self.update_format_out(OutputFormat::Png, o.force);
        Ok(())
    }
}
