//! HEIF container output, with AV1 (AVIF) or HEVC compression.

use serde::{Deserialize, Serialize};

use super::{ChromaSubsampling, JobOptions, OutputFormat, chroma};
use crate::engine::Capabilities;
use crate::error::Error;
use crate::validate::{self, keyword_enum};

keyword_enum! {
    pub enum HeifCompression {
        Av1 => "av1",
        Hevc => "hevc",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeifOptions {
    /// Required through `heif`; forced to `av1` through `avif`.
    pub compression: Option<String>,
    pub quality: Option<i64>,
    pub lossless: Option<bool>,
    pub effort: Option<i64>,
    pub chroma_subsampling: Option<String>,
    pub bitdepth: Option<i64>,
    pub force: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeifSettings {
    pub quality: u8,
    pub lossless: bool,
    pub compression: HeifCompression,
    pub effort: u8,
    pub chroma_subsampling: ChromaSubsampling,
    pub bitdepth: u8,
}

impl Default for HeifSettings {
    fn default() -> Self {
        Self {
            quality: 50,
            lossless: false,
            compression: HeifCompression::Av1,
            effort: 4,
            chroma_subsampling: ChromaSubsampling::Yuv444,
            bitdepth: 8,
        }
    }
}

impl JobOptions {
    /// HEIF output. Options are mandatory and must name a compression.
    pub fn heif(&mut self, options: Option<&HeifOptions>, caps: &Capabilities) -> Result<(), Error> {
        let Some(o) = options else {
            return Err(Error::invalid_parameter("options", "object", None::<HeifOptions>));
        };
        let compression = o.compression.as_deref().ok_or_else(|| {
            Error::invalid_parameter("compression", "one of: av1, hevc", None::<String>)
        })?;
        self.apply_heif(o, validate::keyword("compression", compression)?, caps)
    }

    /// AVIF output: HEIF with AV1 compression.
    pub fn avif(&mut self, options: Option<&HeifOptions>, caps: &Capabilities) -> Result<(), Error> {
        let defaults = HeifOptions::default();
        self.apply_heif(options.unwrap_or(&defaults), HeifCompression::Av1, caps)
    }

    fn apply_heif(
        &mut self,
        o: &HeifOptions,
        compression: HeifCompression,
        caps: &Capabilities,
    ) -> Result<(), Error> {
        let s = &mut self.heif;
        s.compression = compression;
        if let Some(q) = o.quality {
            s.quality = validate::integer("quality", q, 1, 100)? as u8;
        }
        if let Some(lossless) = o.lossless {
            s.lossless = lossless;
        }
        if let Some(effort) = o.effort {
            s.effort = validate::integer("effort", effort, 0, 9)? as u8;
        }
        if let Some(c) = &o.chroma_subsampling {
            s.chroma_subsampling = chroma(c)?;
        }
        if let Some(bitdepth) = o.bitdepth {
            if ![8, 10, 12].contains(&bitdepth) {
                return Err(Error::invalid_parameter("bitdepth", "8, 10 or 12", bitdepth));
            }
            if bitdepth != 8 && caps.prebuilt {
                return Err(Error::invalid_parameter(
                    "bitdepth when using prebuilt binaries",
                    "8",
                    bitdepth,
                ));
            }
            s.bitdepth = bitdepth as u8;
        }
        self.update_format_out(OutputFormat::Heif, o.force);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> Capabilities {
        Capabilities::default()
    }

    #[test]
    fn heif_requires_options_and_compression() {
        let mut job = JobOptions::new();
        assert_eq!(job.heif(None, &caps()).unwrap_err().parameter(), Some("options"));
        assert_eq!(
            job.heif(Some(&HeifOptions::default()), &caps()).unwrap_err().parameter(),
            Some("compression")
        );
        let hevc = HeifOptions {
            compression: Some("hevc".into()),
            ..Default::default()
        };
        job.heif(Some(&hevc), &caps()).unwrap();
        assert_eq!(job.heif.compression, HeifCompression::Hevc);
        assert_eq!(job.format, OutputFormat::Heif);
    }

    #[test]
    fn avif_defaults_to_av1_even_when_hevc_requested() {
        let mut job = JobOptions::new();
        job.avif(None, &caps()).unwrap();
        assert_eq!(job.heif.compression, HeifCompression::Av1);
        job.avif(
            Some(&HeifOptions {
                compression: Some("hevc".into()),
                ..Default::default()
            }),
            &caps(),
        )
        .unwrap();
        assert_eq!(job.heif.compression, HeifCompression::Av1);
    }

    #[test]
    fn effort_and_quality_ranges() {
        let avif = |o: HeifOptions| JobOptions::new().avif(Some(&o), &caps());
        assert!(avif(HeifOptions { effort: Some(0), ..Default::default() }).is_ok());
        assert!(avif(HeifOptions { effort: Some(9), ..Default::default() }).is_ok());
        assert!(avif(HeifOptions { effort: Some(10), ..Default::default() }).is_err());
        assert!(avif(HeifOptions { quality: Some(100), ..Default::default() }).is_ok());
        assert!(avif(HeifOptions { quality: Some(0), ..Default::default() }).is_err());
    }

    #[test]
    fn high_bitdepth_rejected_by_prebuilt_engine() {
        let ten = HeifOptions {
            bitdepth: Some(10),
            ..Default::default()
        };
        let mut job = JobOptions::new();
        job.avif(Some(&ten), &caps()).unwrap();
        assert_eq!(job.heif.bitdepth, 10);

        let prebuilt = Capabilities {
            prebuilt: true,
            ..Capabilities::default()
        };
        assert!(JobOptions::new().avif(Some(&ten), &prebuilt).is_err());
        let eight = HeifOptions {
            bitdepth: Some(8),
            ..Default::default()
        };
        assert!(JobOptions::new().avif(Some(&eight), &prebuilt).is_ok());
        let nine = HeifOptions {
            bitdepth: Some(9),
            ..Default::default()
        };
        assert_eq!(
            JobOptions::new().avif(Some(&nine), &caps()).unwrap_err().parameter(),
            Some("bitdepth")
        );
    }
}
