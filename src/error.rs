//! Error taxonomy for pipeline construction and execution.
//!
//! Everything except [`Error::Engine`] is raised synchronously by the call
//! that caused it, before the engine is touched. Engine failures arrive
//! later through whichever delivery mode the caller chose, and carry the
//! source location of the call that requested the job.

use std::fmt;
use std::panic::Location;
use thiserror::Error;

use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum Error {
    /// An option value failed validation.
    #[error("Expected {expected} for {name} but received {actual}")]
    InvalidParameter {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Input {0} is empty")]
    EmptyInput(&'static str),
    #[error("Expected one of: {known} but received format {requested}")]
    UnsupportedFormat { requested: String, known: String },
    #[error("Recursive join is unsupported")]
    UnsupportedJoin,
    #[error("Expected input to be an array of images to join")]
    InvalidJoinTarget,
    #[error("{0} output is not supported by this engine build")]
    CodecUnavailable(&'static str),
    #[error("Missing output file path")]
    MissingOutputPath,
    #[error("Cannot use same file for input and output")]
    SameInputOutput,
    #[error("Unexpected data on writable stream: input is not a stream")]
    UnexpectedStreamData,
    #[error("Input stream already finished")]
    StreamClosed,
    #[error("Pipeline dropped before the job could run")]
    Abandoned,
    #[error("{message}\n    requested at {call_site}{}", NativeStack(.native_stack))]
    Engine {
        message: String,
        native_stack: Option<String>,
        call_site: &'static Location<'static>,
    },
}

struct NativeStack<'a>(&'a Option<String>);

impl fmt::Display for NativeStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(stack) => write!(f, "\n{stack}"),
            None => Ok(()),
        }
    }
}

impl Error {
    /// Build an [`Error::InvalidParameter`]; `actual` is rendered with `Debug`.
    pub fn invalid_parameter(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl fmt::Debug,
    ) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            expected: expected.into(),
            actual: format!("{actual:?}"),
        }
    }

    /// Attach the requesting call site to an engine failure.
    pub(crate) fn engine(err: EngineError, call_site: &'static Location<'static>) -> Self {
        Error::Engine {
            message: err.message,
            native_stack: err.native_stack,
            call_site,
        }
    }

    /// Name of the offending parameter, for `InvalidParameter` errors.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Error::InvalidParameter { name, .. } => Some(name),
            _ => None,
        }
    }
}
