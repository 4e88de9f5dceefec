//! Deep-zoom tile pyramids.

use serde::{Deserialize, Serialize};

use super::{JobOptions, OutputFormat};
use crate::colour::{Colour, ColourSpec};
use crate::error::Error;
use crate::validate::{self, keyword_enum, prefer};

keyword_enum! {
    pub enum TileContainer {
        Fs => "fs",
        Zip => "zip",
    }
}

keyword_enum! {
    pub enum TileLayout {
        Dz => "dz",
        Google => "google",
        Iiif => "iiif",
        Iiif3 => "iiif3",
        Zoomify => "zoomify",
    }
}

keyword_enum! {
    pub enum TileDepth {
        OnePixel => "onepixel",
        OneTile => "onetile",
        One => "one",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TileOptions {
    pub size: Option<i64>,
    pub overlap: Option<i64>,
    pub container: Option<String>,
    pub layout: Option<String>,
    pub angle: Option<i64>,
    pub background: Option<ColourSpec>,
    pub depth: Option<String>,
    /// Grey threshold for skipping blank tiles, -1 to disable.
    pub skip_blanks: Option<i64>,
    pub centre: Option<bool>,
    pub center: Option<bool>,
    pub id: Option<String>,
    pub basename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileSettings {
    pub size: u32,
    pub overlap: u32,
    pub container: TileContainer,
    pub layout: TileLayout,
    pub angle: i32,
    pub background: Colour,
    pub depth: Option<TileDepth>,
    pub skip_blanks: i32,
    pub centre: bool,
    pub id: String,
    pub basename: Option<String>,
    /// Format of the individual tiles. `None` until known: left to the
    /// engine when the output format is still `input`.
    pub format: Option<OutputFormat>,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            size: 256,
            overlap: 0,
            container: TileContainer::Fs,
            layout: TileLayout::Dz,
            angle: 0,
            background: Colour::WHITE,
            depth: None,
            skip_blanks: -1,
            centre: false,
            id: "https://example.com/iiif".to_string(),
            basename: None,
            format: None,
        }
    }
}

impl JobOptions {
    /// Tile pyramid output. Always selects the `dz` format; the current
    /// format becomes the tile format.
    pub fn tile(&mut self, options: Option<&TileOptions>) -> Result<(), Error> {
        if let Some(o) = options {
            let s = &mut self.tile;
            if let Some(size) = o.size {
                s.size = validate::integer("size", size, 1, 8192)? as u32;
            }
            if let Some(overlap) = o.overlap {
                let max = i64::from(s.size).min(8192);
                s.overlap = validate::integer("overlap", overlap, 0, max)? as u32;
            }
            if let Some(container) = &o.container {
                s.container = validate::keyword("container", container)?;
            }
            if let Some(layout) = &o.layout {
                s.layout = validate::keyword("layout", layout)?;
            }
            if let Some(angle) = o.angle {
                if angle % 90 != 0 {
                    return Err(Error::invalid_parameter("angle", "multiple of 90", angle));
                }
                s.angle = angle as i32;
            }
            if let Some(background) = &o.background {
                s.background = background.resolve("background")?;
            }
            if let Some(depth) = &o.depth {
                s.depth = Some(validate::keyword("depth", depth)?);
            }
            if let Some(skip) = o.skip_blanks {
                s.skip_blanks = validate::integer("skip_blanks", skip, -1, 65535)? as i32;
            } else if o.layout.is_some() && s.layout == TileLayout::Google {
                s.skip_blanks = 5;
            }
            if let Some(centre) = prefer(o.center, o.centre) {
                s.centre = centre;
            }
            if let Some(id) = &o.id {
                s.id = validate::non_empty("id", id)?.to_string();
            }
            if let Some(basename) = &o.basename {
                s.basename = Some(validate::non_empty("basename", basename)?.to_string());
            }
        }
        match self.format {
            OutputFormat::Jpeg | OutputFormat::Png | OutputFormat::Webp => {
                self.tile.format = Some(self.format);
            }
            OutputFormat::Input => {}
            other => {
                return Err(Error::invalid_parameter("format", "one of: jpeg, png, webp", other.to_string()));
            }
        }
        self.update_format_out(OutputFormat::Dz, None);
        Ok(())
    }
}
