use serde::{Deserialize, Serialize};

use super::{JobOptions, OutputFormat};
use crate::error::Error;
use crate::validate::{self, keyword_enum};

keyword_enum! {
    pub enum TiffCompression {
        None => "none",
        Jpeg => "jpeg",
        Deflate => "deflate",
        Packbits => "packbits",
        Ccittfax4 => "ccittfax4",
        Lzw => "lzw",
        Webp => "webp",
        Zstd => "zstd",
        Jp2k => "jp2k",
    }
}

keyword_enum! {
    pub enum TiffPredictor {
        None => "none",
        Horizontal => "horizontal",
        Float => "float",
    }
}

keyword_enum! {
    pub enum TiffResolutionUnit {
        Inch => "inch",
        Cm => "cm",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TiffOptions {
    pub quality: Option<i64>,
    pub compression: Option<String>,
    pub predictor: Option<String>,
    pub pyramid: Option<bool>,
    pub bitdepth: Option<i64>,
    pub miniswhite: Option<bool>,
    pub tile: Option<bool>,
    pub tile_width: Option<i64>,
    pub tile_height: Option<i64>,
    /// Pixels per millimetre.
    pub xres: Option<f64>,
    pub yres: Option<f64>,
    pub resolution_unit: Option<String>,
    pub force: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiffSettings {
    pub quality: u8,
    pub compression: TiffCompression,
    pub predictor: TiffPredictor,
    pub pyramid: bool,
    pub bitdepth: u8,
    pub miniswhite: bool,
    pub tile: bool,
    pub tile_width: u32,
    pub tile_height: u32,
    pub xres: f64,
    pub yres: f64,
    pub resolution_unit: TiffResolutionUnit,
}

impl Default for TiffSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            compression: TiffCompression::Jpeg,
            predictor: TiffPredictor::Horizontal,
            pyramid: false,
            bitdepth: 8,
            miniswhite: false,
            tile: false,
            tile_width: 256,
            tile_height: 256,
            xres: 1.0,
            yres: 1.0,
            resolution_unit: TiffResolutionUnit::Inch,
        }
    }
}

impl JobOptions {
    pub fn tiff(&mut self, options: Option<&TiffOptions>) -> Result<(), Error> {
        let Some(o) = options else {
            self.update_format_out(OutputFormat::Tiff, None);
            return Ok(());
        };
        let s = &mut self.tiff;
        if let Some(q) = o.quality {
            s.quality = validate::integer("quality", q, 1, 100)? as u8;
        }
        if let Some(bitdepth) = o.bitdepth {
            if ![1, 2, 4, 8].contains(&bitdepth) {
                return Err(Error::invalid_parameter("bitdepth", "1, 2, 4 or 8", bitdepth));
            }
            s.bitdepth = bitdepth as u8;
        }
        if let Some(tile) = o.tile {
            s.tile = tile;
        }
        if let Some(width) = o.tile_width {
            s.tile_width = validate::positive_integer("tile_width", width)? as u32;
        }
        if let Some(height) = o.tile_height {
            s.tile_height = validate::positive_integer("tile_height", height)? as u32;
        }
        if let Some(miniswhite) = o.miniswhite {
            s.miniswhite = miniswhite;
        }
        if let Some(predictor) = &o.predictor {
            s.predictor = validate::keyword("predictor", predictor)?;
        }
        if let Some(xres) = o.xres {
            s.xres = validate::positive_number("xres", xres)?;
        }
        if let Some(yres) = o.yres {
            s.yres = validate::positive_number("yres", yres)?;
        }
        if let Some(compression) = &o.compression {
            s.compression = validate::keyword("compression", compression)?;
        }
        if let Some(pyramid) = o.pyramid {
            s.pyramid = pyramid;
        }
        if let Some(unit) = &o.resolution_unit {
            s.resolution_unit = validate::keyword("resolution_unit", unit)?;
        }
        self.update_format_out(OutputFormat::Tiff, o.force);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiff(options: TiffOptions) -> Result<JobOptions, Error> {
        let mut job = JobOptions::new();
        job.tiff(Some(&options))?;
        Ok(job)
    }

    #[test]
    fn defaults() {
        let s = TiffSettings::default();
        assert_eq!(s.compression, TiffCompression::Jpeg);
        assert_eq!(s.predictor, TiffPredictor::Horizontal);
        assert_eq!((s.tile_width, s.tile_height), (256, 256));
    }

    #[test]
    fn bitdepth_is_restricted() {
        let depth = |d| {
            tiff(TiffOptions {
                bitdepth: Some(d),
                ..Default::default()
            })
        };
        assert_eq!(depth(4).unwrap().tiff.bitdepth, 4);
        assert_eq!(depth(3).unwrap_err().parameter(), Some("bitdepth"));
        assert!(depth(16).is_err());
    }

    #[test]
    fn keywords_and_resolution() {
        let job = tiff(TiffOptions {
            compression: Some("lzw".into()),
            predictor: Some("float".into()),
            resolution_unit: Some("cm".into()),
            xres: Some(2.5),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(job.tiff.compression, TiffCompression::Lzw);
        assert_eq!(job.tiff.predictor, TiffPredictor::Float);
        assert_eq!(job.tiff.resolution_unit, TiffResolutionUnit::Cm);
        assert_eq!(job.tiff.xres, 2.5);

        let bad = tiff(TiffOptions {
            yres: Some(0.0),
            ..Default::default()
        });
        assert_eq!(bad.unwrap_err().parameter(), Some("yres"));
        let bad = tiff(TiffOptions {
            compression: Some("rle".into()),
            ..Default::default()
        });
        assert_eq!(bad.unwrap_err().parameter(), Some("compression"));
    }

    #[test]
    fn tile_dimensions_must_be_positive() {
        let bad = tiff(TiffOptions {
            tile: Some(true),
            tile_width: Some(0),
            ..Default::default()
        });
        assert_eq!(bad.unwrap_err().parameter(), Some("tile_width"));
    }
}
