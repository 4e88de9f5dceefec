use serde::{Deserialize, Serialize};

use super::{AnimationOptions, JobOptions, OutputFormat, palette_bitdepth};
use crate::error::Error;
use crate::validate::{self, prefer};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GifOptions {
    /// Reuse the input palette instead of generating a new one.
    pub reuse: Option<bool>,
    pub progressive: Option<bool>,
    pub colours: Option<i64>,
    pub colors: Option<i64>,
    pub effort: Option<i64>,
    pub dither: Option<f64>,
    pub inter_frame_max_error: Option<f64>,
    pub inter_palette_max_error: Option<f64>,
    pub keep_duplicate_frames: Option<bool>,
    #[serde(flatten)]
    pub animation: AnimationOptions,
    pub force: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GifSettings {
    pub reuse: bool,
    pub progressive: bool,
    pub bitdepth: u32,
    pub effort: u8,
    pub dither: f64,
    pub inter_frame_max_error: f64,
    pub inter_palette_max_error: f64,
    pub keep_duplicate_frames: bool,
}

impl Default for GifSettings {
    fn default() -> Self {
        Self {
            reuse: true,
            progressive: false,
            bitdepth: 8,
            effort: 7,
            dither: 1.0,
            inter_frame_max_error: 0.0,
            inter_palette_max_error: 3.0,
            keep_duplicate_frames: false,
        }
    }
}

impl JobOptions {
    pub fn gif(&mut self, options: Option<&GifOptions>) -> Result<(), Error> {
        let Some(o) = options else {
            self.update_format_out(OutputFormat::Gif, None);
            return Ok(());
        };
        let s = &mut self.gif;
        if let Some(reuse) = o.reuse {
            s.reuse = reuse;
        }
        if let Some(progressive) = o.progressive {
            s.progressive = progressive;
        }
        if let Some(colours) = prefer(o.colours, o.colors) {
            s.bitdepth = palette_bitdepth(colours)?;
        }
        if let Some(effort) = o.effort {
            s.effort = validate::integer("effort", effort, 1, 10)? as u8;
        }
        if let Some(dither) = o.dither {
            s.dither = validate::number("dither", dither, 0.0, 1.0)?;
        }
        if let Some(err) = o.inter_frame_max_error {
            s.inter_frame_max_error = validate::number("inter_frame_max_error", err, 0.0, 32.0)?;
        }
        if let Some(err) = o.inter_palette_max_error {
            s.inter_palette_max_error =
                validate::number("inter_palette_max_error", err, 0.0, 256.0)?;
        }
        if let Some(keep) = o.keep_duplicate_frames {
            s.keep_duplicate_frames = keep;
        }
        self.apply_animation(&o.animation)?;
        self.update_format_out(OutputFormat::Gif, o.force);
        Ok(())
    }
}
