use serde::{Deserialize, Serialize};

use super::{AnimationOptions, JobOptions, OutputFormat};
use crate::error::Error;
use crate::validate;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct JxlOptions {
    /// Converted to a distance; takes precedence over `distance`.
    pub quality: Option<i64>,
    pub distance: Option<f64>,
    pub decoding_tier: Option<i64>,
    pub lossless: Option<bool>,
    pub effort: Option<i64>,
    #[serde(flatten)]
    pub animation: AnimationOptions,
    pub force: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JxlSettings {
    pub distance: f64,
    pub decoding_tier: u8,
    pub lossless: bool,
    pub effort: u8,
}

impl Default for JxlSettings {
    fn default() -> Self {
        Self {
            distance: 1.0,
            decoding_tier: 0,
            lossless: false,
            effort: 7,
        }
    }
}

/// Butteraugli distance for a 1-100 quality score.
pub fn distance_from_quality(quality: f64) -> f64 {
    if quality >= 30.0 {
        0.1 + (100.0 - quality) * 0.09
    } else {
        53.0 / 3000.0 * quality * quality - 23.0 / 20.0 * quality + 25.0
    }
}

impl JobOptions {
    pub fn jxl(&mut self, options: Option<&JxlOptions>) -> Result<(), Error> {
        let Some(o) = options else {
            self.update_format_out(OutputFormat::Jxl, None);
            return Ok(());
        };
        let s = &mut self.jxl;
        if let Some(q) = o.quality {
            let q = validate::integer("quality", q, 1, 100)?;
            s.distance = distance_from_quality(q as f64);
        } else if let Some(distance) = o.distance {
            s.distance = validate::number("distance", distance, 0.0, 15.0)?;
        }
        if let Some(tier) = o.decoding_tier {
            s.decoding_tier = validate::integer("decoding_tier", tier, 0, 4)? as u8;
        }
        if let Some(lossless) = o.lossless {
            s.lossless = lossless;
        }
        if let Some(effort) = o.effort {
            s.effort = validate::integer("effort", effort, 1, 9)? as u8;
        }
        self.apply_animation(&o.animation)?;
        self.update_format_out(OutputFormat::Jxl, o.force);
        Ok(())
    }
}
