//! Image engines.
//!
//! - **Backend**: the [`Engine`] trait, its records and [`Capabilities`]
//! - **RustEngine**: the bundled implementation on `image` + `rayon`

pub mod backend;
pub mod rust_engine;

pub use backend::{
    Capabilities, ChannelStats, Comment, Completion, Engine, EngineError, Job, Metadata, OutputInfo,
    PyramidLevel, Stats,
};
pub use rust_engine::RustEngine;
