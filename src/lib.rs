//! # imagejob
//!
//! Turns loosely-typed image transcoding options into one validated job
//! descriptor and hands it to an image engine.
//!
//! A [`Pipeline`] collects three things: where the image comes from (a file,
//! an in-memory buffer, raw pixels, a generated canvas, or bytes written to
//! the pipeline as a stream), what it should become (an output codec and its
//! settings), and which metadata to keep or attach. Every option is checked
//! when it is set, so a bad value fails at the call site with a message naming
//! the offending parameter. Execution then flattens the state into a
//! [`engine::Job`] and sends it to an [`Engine`].
//!
//! ```text
//! input options ──▶ InputDescriptor ─┐
//! codec options ──▶ JobOptions ──────┼──▶ Job ──▶ Engine ──▶ bytes + OutputInfo
//! metadata intent ───────────────────┘
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`input`] | Input sources, input options and the [`input::InputDescriptor`] builder |
//! | [`output`] | Per-codec option resolvers writing into [`JobOptions`] |
//! | [`metadata`] | Retention mask and metadata-intent resolvers |
//! | [`pipeline`] | The [`Pipeline`] type tying input, output and metadata together |
//! | [`dispatch`] | Delivery modes: callback, [`Pending`] and [`OutputStream`] |
//! | [`engine`] | The [`Engine`] trait, its records and the bundled [`RustEngine`] |
//! | [`colour`] | Colour parsing for backgrounds |
//! | [`validate`] | Option predicates shared by every resolver |
//! | [`error`] | The [`Error`] taxonomy |
//! | [`config`] | `imagejob.toml` loading and defaults |
//! | [`job`] | JSON job files driven by the CLI |
//! | [`report`] | CLI output formatting |
//!
//! # Delivery
//!
//! A pipeline runs in exactly one of three modes per request: a callback,
//! a [`Pending`] result that can be awaited or waited on, or an
//! [`OutputStream`] of chunks. When the input is a stream, execution is
//! deferred until [`Pipeline::finish`] freezes the buffered bytes.
//!
//! # Engines
//!
//! The engine is a trait object so callers can bring their own.
//! [`RustEngine`] decodes and encodes with the `image` crate on the `rayon`
//! pool and reports which optional codecs it lacks through
//! [`Capabilities`].

pub mod colour;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod input;
pub mod job;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod validate;

pub use dispatch::{OutputStream, Pending, StreamEvent};
pub use engine::{Capabilities, Engine, RustEngine};
pub use error::Error;
pub use input::{Input, InputOptions};
pub use output::JobOptions;
pub use pipeline::{BufferOutput, Pipeline};
