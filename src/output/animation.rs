//! Loop count and frame delays shared by webp, gif and jxl.

use serde::{Deserialize, Serialize};

use super::JobOptions;
use crate::error::Error;

/// A single delay for every frame, or one per frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Delay {
    All(i64),
    PerFrame(Vec<i64>),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimationOptions {
    /// Number of iterations, 0 for infinite.
    #[serde(rename = "loop")]
    pub loop_count: Option<i64>,
    /// Milliseconds between frames.
    pub delay: Option<Delay>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Animation {
    /// -1 keeps the input's loop count.
    #[serde(rename = "loop")]
    pub loop_count: i32,
    /// Empty keeps the input's delays.
    pub delay: Vec<u32>,
}

impl Default for Animation {
    fn default() -> Self {
        Self {
            loop_count: -1,
            delay: Vec::new(),
        }
    }
}

const DELAY_EXPECTED: &str = "integer or an array of integers between 0 and 65535";

impl JobOptions {
    pub(crate) fn apply_animation(&mut self, options: &AnimationOptions) -> Result<(), Error> {
        if let Some(loop_count) = options.loop_count {
            self.animation.loop_count =
                crate::validate::integer("loop", loop_count, 0, 65535)? as i32;
        }
        if let Some(delay) = &options.delay {
            let in_range = |d: i64| (0..=65535).contains(&d);
            self.animation.delay = match delay {
                Delay::All(d) if in_range(*d) => vec![*d as u32],
                Delay::PerFrame(frames) if frames.iter().copied().all(in_range) => {
                    frames.iter().map(|&d| d as u32).collect()
                }
                _ => return Err(Error::invalid_parameter("delay", DELAY_EXPECTED, delay)),
            };
        }
        Ok(())
    }
}
