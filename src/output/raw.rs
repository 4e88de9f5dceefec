use serde::{Deserialize, Serialize};

use super::{JobOptions, OutputFormat};
use crate::error::Error;
use crate::input::RawDepth;
use crate::validate;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawOptions {
    pub depth: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSettings {
    pub depth: RawDepth,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            depth: RawDepth::Uchar,
        }
    }
}

impl JobOptions {
    /// Unencoded pixel output. Always selects the raw format.
    pub fn raw(&mut self, options: Option<&RawOptions>) -> Result<(), Error> {
        if let Some(depth) = options.and_then(|o| o.depth.as_deref()) {
            self.raw.depth = validate::keyword("depth", depth)?;
        }
        self.update_format_out(OutputFormat::Raw, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_keywords() {
        let mut job = JobOptions::new();
        job.raw(Some(&RawOptions {
            depth: Some("ushort".into()),
        }))
        .unwrap();
        assert_eq!(job.raw.depth, RawDepth::Ushort);
        assert_eq!(job.format, OutputFormat::Raw);

        let err = job
            .raw(Some(&RawOptions {
                depth: Some("half".into()),
            }))
            .unwrap_err();
        assert_eq!(err.parameter(), Some("depth"));
        assert!(err.to_string().contains("dpcomplex"));
    }
}
