use serde::{Deserialize, Serialize};

use super::{AnimationOptions, JobOptions, OutputFormat};
use crate::error::Error;
use crate::validate::{self, keyword_enum};

keyword_enum! {
    pub enum WebpPreset {
        Default => "default",
        Photo => "photo",
        Picture => "picture",
        Drawing => "drawing",
        Icon => "icon",
        Text => "text",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebpOptions {
    pub quality: Option<i64>,
    pub alpha_quality: Option<i64>,
    pub lossless: Option<bool>,
    pub near_lossless: Option<bool>,
    pub smart_subsample: Option<bool>,
    pub smart_deblock: Option<bool>,
    pub preset: Option<String>,
    pub effort: Option<i64>,
    pub min_size: Option<bool>,
    pub mixed: Option<bool>,
    #[serde(flatten)]
    pub animation: AnimationOptions,
    pub force: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebpSettings {
    pub quality: u8,
    pub alpha_quality: u8,
    pub lossless: bool,
    pub near_lossless: bool,
    pub smart_subsample: bool,
    pub smart_deblock: bool,
    pub preset: WebpPreset,
    pub effort: u8,
    pub min_size: bool,
    pub mixed: bool,
}

impl Default for WebpSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            alpha_quality: 100,
            lossless: false,
            near_lossless: false,
            smart_subsample: false,
            smart_deblock: false,
            preset: WebpPreset::Default,
            effort: 4,
            min_size: false,
            mixed: false,
        }
    }
}

impl JobOptions {
    pub fn webp(&mut self, options: Option<&WebpOptions>) -> Result<(), Error> {
        let Some(o) = options else {
            self.update_format_out(OutputFormat::Webp, None);
            return Ok(());
        };
        let s = &mut self.webp;
        if let Some(q) = o.quality {
            s.quality = validate::integer("quality", q, 1, 100)? as u8;
        }
        if let Some(q) = o.alpha_quality {
            s.alpha_quality = validate::integer("alpha_quality", q, 0, 100)? as u8;
        }
        if let Some(lossless) = o.lossless {
            s.lossless = lossless;
        }
        if let Some(near) = o.near_lossless {
            s.near_lossless = near;
        }
        if let Some(smart) = o.smart_subsample {
            s.smart_subsample = smart;
        }
        if let Some(deblock) = o.smart_deblock {
            s.smart_deblock = deblock;
        }
        if let Some(preset) = &o.preset {
            s.preset = validate::keyword("preset", preset)?;
        }
        if let Some(effort) = o.effort {
            s.effort = validate::integer("effort", effort, 0, 6)? as u8;
        }
        if let Some(min_size) = o.min_size {
            s.min_size = min_size;
        }
        if let Some(mixed) = o.mixed {
            s.mixed = mixed;
        }
        self.apply_animation(&o.animation)?;
        self.update_format_out(OutputFormat::Webp, o.force);
        Ok(())
    }
}
