//! JSON job files for the CLI.
//!
//! ```json
//! {
//!   "input": "photo.jpg",
//!   "options": { "fail_on": "error", "pages": -1 },
//!   "output": { "format": "webp", "options": { "quality": 50 }, "file": "photo.webp" },
//!   "metadata": { "keep": ["exif", "icc"], "icc": "p3" },
//!   "timeout_seconds": 30
//! }
//! ```
//!
//! `input` is a path, an array of inputs to join, or an options object
//! (`{"create": {...}}`, `{"text": {...}}`). Relative paths are resolved
//! against the job file's directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::engine::{Engine, OutputInfo};
use crate::error::Error;
use crate::input::{Input, InputDescriptor, InputOptions};
use crate::metadata::IccOptions;
use crate::output::{Codec, FormatOptions, JobOptions};
use crate::pipeline::Pipeline;
use crate::validate::{self, keyword_enum};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Failed to read job file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid job file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] Error),
}

/// One job: an input, how to decode it, and what to write.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub input: InputSpec,
    #[serde(default)]
    pub options: Option<InputOptions>,
    #[serde(default)]
    pub output: OutputSpec,
    #[serde(default)]
    pub metadata: MetadataSpec,
    /// Overrides `output.timeout_seconds` from the config.
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InputSpec {
    Path(PathBuf),
    Join(Vec<InputSpec>),
    Object(Box<InputOptions>),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSpec {
    /// Format name or alias; omitted keeps the input's format.
    pub format: Option<String>,
    /// Options for `format`, in that codec's shape.
    pub options: Option<serde_json::Value>,
    pub file: Option<PathBuf>,
}

keyword_enum! {
    pub enum KeepCategory {
        All => "all",
        Exif => "exif",
        Xmp => "xmp",
        Icc => "icc",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataSpec {
    pub keep: Vec<String>,
    /// `{ifd: {tag: value}}`.
    pub exif: Option<serde_json::Value>,
    /// Merge `exif` into the input's EXIF instead of replacing it.
    pub exif_merge: bool,
    pub xmp: Option<String>,
    pub icc: Option<String>,
    pub icc_attach: Option<bool>,
}

/// Resolved state of a job, as printed by `plan`.
#[derive(Debug, Serialize)]
pub struct Plan<'a> {
    pub input: &'a InputDescriptor,
    pub options: &'a JobOptions,
}

impl From<InputSpec> for Input {
    fn from(spec: InputSpec) -> Self {
        match spec {
            InputSpec::Path(path) => Input::Path(path),
            InputSpec::Join(inputs) => Input::Join(inputs.into_iter().map(Input::from).collect()),
            InputSpec::Object(options) => Input::Options(options),
        }
    }
}

impl InputSpec {
    fn resolve_paths(&mut self, base: &Path) {
        match self {
            InputSpec::Path(path) if path.is_relative() => *path = base.join(&*path),
            InputSpec::Join(inputs) => inputs.iter_mut().for_each(|i| i.resolve_paths(base)),
            _ => {}
        }
    }
}

impl JobSpec {
    pub fn from_json(json: &str) -> Result<Self, JobError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a job file, resolving relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self, JobError> {
        let content = fs::read_to_string(path).map_err(|source| JobError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut spec = Self::from_json(&content)?;
        let base = path.parent().unwrap_or(Path::new(""));
        spec.input.resolve_paths(base);
        if let Some(file) = &mut spec.output.file {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
        Ok(spec)
    }

    /// Build a pipeline with every option applied, without running it.
    pub fn build(&self, engine: Arc<dyn Engine>, config: &Config) -> Result<Pipeline, JobError> {
        let defaults = config.input_defaults()?;
        let mut pipeline = Pipeline::with_input_defaults(
            engine,
            self.input.clone(),
            self.options.clone(),
            defaults,
        )?;

        let timeout = self
            .timeout_seconds
            .unwrap_or(i64::from(config.output.timeout_seconds));
        pipeline.timeout(timeout)?;

        if let Some(format) = &self.output.format {
            let options = match Codec::from_name(format) {
                Some(codec) => FormatOptions::from_value(
                    codec,
                    self.output.options.clone().unwrap_or_default(),
                )?,
                // Unknown names are reported by to_format.
                None => FormatOptions::None,
            };
            pipeline.to_format(format, options)?;
        } else if self.output.options.is_some() {
            return Err(Error::invalid_parameter("output.format", "format name", None::<String>).into());
        }

        self.apply_metadata(&mut pipeline)?;
        Ok(pipeline)
    }

    fn apply_metadata(&self, pipeline: &mut Pipeline) -> Result<(), Error> {
        let m = &self.metadata;
        for keep in &m.keep {
            match validate::keyword("metadata.keep", &keep.to_lowercase())? {
                KeepCategory::All => pipeline.keep_metadata(),
                KeepCategory::Exif => pipeline.keep_exif(),
                KeepCategory::Xmp => pipeline.keep_xmp(),
                KeepCategory::Icc => pipeline.keep_icc_profile(),
            };
        }
        if let Some(exif) = &m.exif {
            if m.exif_merge {
                pipeline.with_exif_merge(exif)?;
            } else {
                pipeline.with_exif(exif)?;
            }
        }
        if let Some(xmp) = &m.xmp {
            pipeline.with_xmp(xmp)?;
        }
        if let Some(icc) = &m.icc {
            let options = IccOptions { attach: m.icc_attach };
            pipeline.with_icc_profile(icc, Some(&options))?;
        }
        Ok(())
    }

    /// Build and run the job, writing `output.file`.
    #[track_caller]
    pub fn run(&self, engine: Arc<dyn Engine>, config: &Config) -> Result<OutputInfo, JobError> {
        let mut pipeline = self.build(engine, config)?;
        let file = self.output.file.as_deref().unwrap_or(Path::new(""));
        Ok(pipeline.to_file(file).wait()?)
    }
}
