use serde::{Deserialize, Serialize};

use super::{ChromaSubsampling, JobOptions, OutputFormat, chroma};
use crate::engine::Capabilities;
use crate::error::Error;
use crate::validate;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Jp2Options {
    pub quality: Option<i64>,
    pub lossless: Option<bool>,
    pub tile_width: Option<i64>,
    pub tile_height: Option<i64>,
    pub chroma_subsampling: Option<String>,
    pub force: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Jp2Settings {
    pub quality: u8,
    pub lossless: bool,
    pub tile_width: u32,
    pub tile_height: u32,
    pub chroma_subsampling: ChromaSubsampling,
}

impl Default for Jp2Settings {
    fn default() -> Self {
        Self {
            quality: 80,
            lossless: false,
            tile_width: 512,
            tile_height: 512,
            chroma_subsampling: ChromaSubsampling::Yuv444,
        }
    }
}

impl JobOptions {
    /// JPEG 2000 output; fails unless the engine was built with it.
    pub fn jp2(&mut self, options: Option<&Jp2Options>, caps: &Capabilities) -> Result<(), Error> {
        if !caps.jp2k {
            return Err(Error::CodecUnavailable("jp2"));
        }
        let Some(o) = options else {
            self.update_format_out(OutputFormat::Jp2, None);
            return Ok(());
        };
        let s = &mut self.jp2;
        if let Some(q) = o.quality {
            s.quality = validate::integer("quality", q, 1, 100)? as u8;
        }
        if let Some(lossless) = o.lossless {
            s.lossless = lossless;
        }
        if let Some(width) = o.tile_width {
            s.tile_width = validate::integer("tile_width", width, 1, 32768)? as u32;
        }
        if let Some(height) = o.tile_height {
            s.tile_height = validate::integer("tile_height", height, 1, 32768)? as u32;
        }
        if let Some(c) = &o.chroma_subsampling {
            s.chroma_subsampling = chroma(c)?;
        }
        self.update_format_out(OutputFormat::Jp2, o.force);
        Ok(())
    }
}
