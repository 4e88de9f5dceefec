use serde::{Deserialize, Serialize};

use super::{ChromaSubsampling, JobOptions, OutputFormat, chroma};
use crate::error::Error;
use crate::validate::{self, prefer};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct JpegOptions {
    pub quality: Option<i64>,
    pub progressive: Option<bool>,
    pub chroma_subsampling: Option<String>,
    pub optimise_coding: Option<bool>,
    pub optimize_coding: Option<bool>,
    /// `true` applies trellis quantisation, overshoot deringing, scan
    /// optimisation, progressive output and quantisation table 3.
    pub mozjpeg: Option<bool>,
    pub trellis_quantisation: Option<bool>,
    pub trellis_quantization: Option<bool>,
    pub overshoot_deringing: Option<bool>,
    /// Implies progressive.
    pub optimise_scans: Option<bool>,
    pub optimize_scans: Option<bool>,
    pub quantisation_table: Option<i64>,
    pub quantization_table: Option<i64>,
    pub force: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JpegSettings {
    pub quality: u8,
    pub progressive: bool,
    pub chroma_subsampling: ChromaSubsampling,
    pub trellis_quantisation: bool,
    pub overshoot_deringing: bool,
    pub optimise_scans: bool,
    pub optimise_coding: bool,
    pub quantisation_table: u8,
}

impl Default for JpegSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            progressive: false,
            chroma_subsampling: ChromaSubsampling::Yuv420,
            trellis_quantisation: false,
            overshoot_deringing: false,
            optimise_scans: false,
            optimise_coding: true,
            quantisation_table: 0,
        }
    }
}

impl JobOptions {
    pub fn jpeg(&mut self, options: Option<&JpegOptions>) -> Result<(), Error> {
        let Some(o) = options else {
            self.update_format_out(OutputFormat::Jpeg, None);
            return Ok(());
        };
        let s = &mut self.jpeg;
        if let Some(q) = o.quality {
            s.quality = validate::integer("quality", q, 1, 100)? as u8;
        }
        if let Some(progressive) = o.progressive {
            s.progressive = progressive;
        }
        if let Some(c) = &o.chroma_subsampling {
            s.chroma_subsampling = chroma(c)?;
        }
        if let Some(optimise) = prefer(o.optimize_coding, o.optimise_coding) {
            s.optimise_coding = optimise;
        }
        if o.mozjpeg == Some(true) {
            s.trellis_quantisation = true;
            s.overshoot_deringing = true;
            s.optimise_scans = true;
            s.progressive = true;
            s.quantisation_table = 3;
        }
        if let Some(trellis) = prefer(o.trellis_quantization, o.trellis_quantisation) {
            s.trellis_quantisation = trellis;
        }
        if let Some(overshoot) = o.overshoot_deringing {
            s.overshoot_deringing = overshoot;
        }
        if let Some(scans) = prefer(o.optimize_scans, o.optimise_scans) {
            s.optimise_scans = scans;
            if scans {
                s.progressive = true;
            }
        }
        if let Some(table) = prefer(o.quantization_table, o.quantisation_table) {
            s.quantisation_table = validate::integer("quantisation_table", table, 0, 8)? as u8;
        }
        self.update_format_out(OutputFormat::Jpeg, o.force);
        Ok(())
    }
}
