//! Background colours for create, join, tile and PDF options.
//!
//! Accepts CSS-style hex (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`),
//! `rgb(r, g, b)` / `rgba(r, g, b, a)`, a handful of names, or an explicit
//! `{ r, g, b, alpha }` object. Alpha is 0.0–1.0 on input and stored as
//! 0–255.

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Colour {
    pub const BLACK: Colour = Colour::rgba(0, 0, 0, 255);
    pub const WHITE: Colour = Colour::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// A colour as written by the caller, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColourSpec {
    Text(String),
    Channels {
        r: f64,
        g: f64,
        b: f64,
        #[serde(default)]
        alpha: Option<f64>,
    },
}

impl From<&str> for ColourSpec {
    fn from(value: &str) -> Self {
        ColourSpec::Text(value.to_string())
    }
}

impl From<Colour> for ColourSpec {
    fn from(c: Colour) -> Self {
        ColourSpec::Channels {
            r: c.r.into(),
            g: c.g.into(),
            b: c.b.into(),
            alpha: Some(f64::from(c.a) / 255.0),
        }
    }
}

impl ColourSpec {
    /// Validate into a [`Colour`], reporting failures against `name`.
    pub fn resolve(&self, name: &str) -> Result<Colour, Error> {
        let invalid = || Error::invalid_parameter(name, "valid colour", self);
        match self {
            ColourSpec::Text(text) => parse_text(text.trim()).ok_or_else(invalid),
            ColourSpec::Channels { r, g, b, alpha } => {
                let channel = |v: f64| (0.0..=255.0).contains(&v).then(|| v.round() as u8);
                let a = match alpha {
                    Some(a) if (0.0..=1.0).contains(a) => (a * 255.0).round() as u8,
                    Some(_) => return Err(invalid()),
                    None => 255,
                };
                match (channel(*r), channel(*g), channel(*b)) {
                    (Some(r), Some(g), Some(b)) => Ok(Colour::rgba(r, g, b, a)),
                    _ => Err(invalid()),
                }
            }
        }
    }
}

fn parse_text(text: &str) -> Option<Colour> {
    if let Some(hex) = text.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = text.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_functional(args);
    }
    named(&lower)
}

fn parse_hex(hex: &str) -> Option<Colour> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Colour::rgba(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
        4 => Some(Colour::rgba(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Colour::rgba(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(Colour::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn parse_functional(args: &str) -> Option<Colour> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let channel = |s: &str| s.parse::<u8>().ok();
    match parts.as_slice() {
        [r, g, b] => Some(Colour::rgba(channel(r)?, channel(g)?, channel(b)?, 255)),
        [r, g, b, a] => {
            let alpha: f64 = a.parse().ok()?;
            if !(0.0..=1.0).contains(&alpha) {
                return None;
            }
            Some(Colour::rgba(
                channel(r)?,
                channel(g)?,
                channel(b)?,
                (alpha * 255.0).round() as u8,
            ))
        }
        _ => None,
    }
}

fn named(name: &str) -> Option<Colour> {
    let colour = match name {
        "black" => Colour::BLACK,
        "white" => Colour::WHITE,
        "transparent" => Colour::rgba(0, 0, 0, 0),
        "red" => Colour::rgba(255, 0, 0, 255),
        "green" => Colour::rgba(0, 128, 0, 255),
        "blue" => Colour::rgba(0, 0, 255, 255),
        "grey" | "gray" => Colour::rgba(128, 128, 128, 255),
        _ => return None,
    };
    Some(colour)
}
