//! Turns a caller-supplied [`Input`] plus [`InputOptions`] into an
//! [`InputDescriptor`].
//!
//! Source resolution follows a fixed precedence: path, buffer, byte region
//! or typed array, options object, pending stream, join array. After the
//! source is known every defined option is validated on its own; absent
//! options are never an error.

use std::sync::Arc;

use super::descriptor::{
    CreateInput, DEFAULT_PIXEL_LIMIT, Fill, FailOn, HorizontalAlign, InputDefaults,
    InputDescriptor, JoinLayout, Noise, NoiseKind, RawDepth, RawInput, Source, TextAlign,
    TextInput, TextWrap, VerticalAlign,
};
use super::options::{CreateOptions, InputOptions, JoinOptions, PixelLimit, RawInputOptions, TextOptions};
use super::stream::StreamBuffer;
use super::{Input, TypedArray};
use crate::error::Error;
use crate::validate::{self, prefer};

/// Builds descriptors for one pipeline instance.
///
/// Tracks whether a join has been started so that nested or repeated joins
/// are rejected.
#[derive(Debug, Default)]
pub struct InputBuilder {
    defaults: InputDefaults,
    joining: bool,
}

impl InputBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: InputDefaults) -> Self {
        Self {
            defaults,
            joining: false,
        }
    }

    pub fn build(
        &mut self,
        input: Input,
        options: Option<InputOptions>,
        allow_stream: bool,
    ) -> Result<InputDescriptor, Error> {
        let (source, typed_depth, options) = self.resolve_source(input, options, allow_stream)?;
        let mut descriptor = InputDescriptor::new(source, &self.defaults);
        if let Some(options) = options {
            self.apply_options(&mut descriptor, options, typed_depth)?;
        }
        Ok(descriptor)
    }

    /// Pick the source payload. Returns the options still to be applied,
    /// which for an options object is the object itself.
    fn resolve_source(
        &mut self,
        input: Input,
        options: Option<InputOptions>,
        allow_stream: bool,
    ) -> Result<(Source, Option<RawDepth>, Option<InputOptions>), Error> {
        match input {
            Input::Path(path) => Ok((Source::File(path), None, options)),
            Input::Buffer(bytes) => {
                if bytes.is_empty() {
                    return Err(Error::EmptyInput("Buffer"));
                }
                Ok((Source::Buffer(bytes.into()), None, options))
            }
            Input::Region {
                bytes,
                offset,
                length,
            } => {
                let end = match length {
                    Some(len) => offset.checked_add(len),
                    None => Some(bytes.len()),
                };
                let region = end
                    .filter(|&end| offset <= end && end <= bytes.len())
                    .map(|end| &bytes[offset..end])
                    .ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "region at offset {offset} with length {length:?} exceeds {} bytes",
                            bytes.len()
                        ))
                    })?;
                if region.is_empty() {
                    return Err(Error::EmptyInput("ArrayBuffer"));
                }
                Ok((Source::Buffer(Arc::from(region)), None, options))
            }
            Input::Typed(array) => {
                if array.is_empty() {
                    return Err(Error::EmptyInput("Bit Array"));
                }
                let depth = array.raw_depth();
                Ok((Source::Buffer(array.to_bytes().into()), Some(depth), options))
            }
            Input::Options(object) if options.is_none() => {
                let source = if object.has_stream_keys() {
                    Source::Stream(StreamBuffer::new())
                } else if object.create.is_some() || object.text.is_some() {
                    // Replaced once create/text options are validated.
                    Source::Buffer(Arc::from(Vec::new()))
                } else if object.join.is_some() {
                    return Err(Error::InvalidJoinTarget);
                } else {
                    return Err(Error::InvalidInput(
                        "options object names no input: expected create, text or stream options"
                            .into(),
                    ));
                };
                Ok((source, None, Some(*object)))
            }
            Input::None if options.is_none() && allow_stream => {
                Ok((Source::Stream(StreamBuffer::new()), None, None))
            }
            Input::Join(inputs) => {
                if inputs.len() < 2 {
                    return Err(Error::InvalidInput(
                        "Expected at least two images to join".into(),
                    ));
                }
                if self.joining {
                    return Err(Error::UnsupportedJoin);
                }
                self.joining = true;
                let inputs = inputs
                    .into_iter()
                    .map(|input| self.build(input, None, false))
                    .collect::<Result<Vec<_>, _>>()?;
                let source = Source::Join {
                    inputs,
                    layout: JoinLayout::default(),
                };
                Ok((source, None, options))
            }
            other => Err(Error::InvalidInput(format!(
                "Unsupported input of kind {}{}",
                other.kind(),
                if options.is_some() {
                    " when also providing options"
                } else {
                    ""
                }
            ))),
        }
    }

    fn apply_options(
        &self,
        d: &mut InputDescriptor,
        o: InputOptions,
        typed_depth: Option<RawDepth>,
    ) -> Result<(), Error> {
        if let Some(fail) = o.fail_on_error {
            d.fail_on = if fail { FailOn::Warning } else { FailOn::None };
        }
        if let Some(level) = &o.fail_on {
            d.fail_on = validate::keyword("fail_on", &level.to_lowercase())?;
        }
        if let Some(limit) = o.limit_input_pixels {
            d.limit_input_pixels = match limit {
                PixelLimit::Flag(true) => DEFAULT_PIXEL_LIMIT,
                PixelLimit::Flag(false) => 0,
                PixelLimit::Pixels(n) if n >= 0 => n as u64,
                PixelLimit::Pixels(n) => {
                    return Err(Error::invalid_parameter(
                        "limit_input_pixels",
                        "positive integer",
                        n,
                    ));
                }
            };
        }
        if let Some(unlimited) = o.unlimited {
            d.unlimited = unlimited;
        }
        if let Some(sequential) = o.sequential_read {
            d.sequential_read = sequential;
        }
        if let Some(density) = o.density {
            d.density = Some(validate::number("density", density, 1.0, 100_000.0)?);
        }
        if let Some(ignore) = o.ignore_icc {
            d.ignore_icc = ignore;
        }
        if let Some(animated) = o.animated {
            d.pages = Some(if animated { -1 } else { 1 });
        }
        if let Some(pages) = o.pages {
            d.pages = Some(validate::integer("pages", pages, -1, 100_000)? as i32);
        }
        if let Some(page) = o.page {
            d.page = Some(validate::integer("page", page, 0, 100_000)? as i32);
        }
        if let Some(orient) = o.auto_orient {
            d.auto_orient = orient;
        }

        let level = prefer(o.open_slide.and_then(|s| s.level), o.level);
        if let Some(level) = level {
            d.open_slide_level = Some(validate::integer("open_slide.level", level, 0, 256)? as i32);
        }
        let subifd = prefer(o.tiff.and_then(|t| t.subifd), o.subifd);
        if let Some(subifd) = subifd {
            d.tiff_subifd = Some(validate::integer("tiff.subifd", subifd, -1, 100_000)? as i32);
        }
        if let Some(svg) = o.svg {
            d.svg_stylesheet = svg.stylesheet;
            d.svg_high_bitdepth = svg.high_bitdepth;
        }
        let background = prefer(o.pdf.and_then(|p| p.background), o.pdf_background);
        if let Some(background) = background {
            d.pdf_background = Some(background.resolve("pdf.background")?);
        }
        if let Some(jp2) = o.jp2 {
            d.jp2_oneshot = jp2.oneshot;
        }

        if let Some(raw) = &o.raw {
            d.raw = Some(raw_input(raw, typed_depth)?);
        }
        if let Some(create) = &o.create {
            d.source = Source::Create(create_input(create)?);
        }
        if let Some(text) = &o.text {
            d.source = Source::Text(text_input(text)?);
        }
        if let Some(join) = &o.join {
            match &mut d.source {
                Source::Join { layout, .. } if self.joining => *layout = join_layout(join)?,
                _ => return Err(Error::InvalidJoinTarget),
            }
        }
        Ok(())
    }
}

fn dimension(name: &str, value: Option<i64>) -> Result<u32, Error> {
    match value {
        Some(v) if v > 0 && v <= i64::from(u32::MAX) => Ok(v as u32),
        other => Err(Error::invalid_parameter(name, "positive integer", other)),
    }
}

/// `page_height` must be positive and divide `height`.
fn page_height(name: &str, value: Option<i64>, height: u32, of: &str) -> Result<Option<u32>, Error> {
    match value {
        None => Ok(None),
        Some(ph) if ph > 0 && i64::from(height) % ph == 0 => Ok(Some(ph as u32)),
        Some(ph) => Err(Error::invalid_parameter(
            name,
            format!("positive integer and a divisor of {of}"),
            ph,
        )),
    }
}

fn raw_input(raw: &RawInputOptions, typed_depth: Option<RawDepth>) -> Result<RawInput, Error> {
    let width = dimension("raw.width", raw.width)?;
    let height = dimension("raw.height", raw.height)?;
    let channels = match raw.channels {
        Some(c) if (1..=4).contains(&c) => c as u8,
        other => {
            return Err(Error::invalid_parameter(
                "raw.channels",
                "integer between 1 and 4",
                other,
            ));
        }
    };
    let depth = match &raw.depth {
        Some(depth) => validate::keyword("raw.depth", depth)?,
        None => typed_depth.unwrap_or(RawDepth::Uchar),
    };
    Ok(RawInput {
        width,
        height,
        channels,
        depth,
        premultiplied: raw.premultiplied.unwrap_or(false),
        page_height: page_height("raw.page_height", raw.page_height, height, "raw.height")?,
    })
}

fn create_input(create: &CreateOptions) -> Result<CreateInput, Error> {
    let width = dimension("create.width", create.width)?;
    let height = dimension("create.height", create.height)?;
    let channels = create
        .channels
        .ok_or_else(|| Error::invalid_parameter("create.channels", "integer", None::<i64>))?;
    let page_height = page_height("create.page_height", create.page_height, height, "create.height")?;

    let (channels, fill) = if let Some(noise) = &create.noise {
        let kind: NoiseKind =
            validate::keyword("create.noise.type", noise.kind.as_deref().unwrap_or(""))?;
        let channels = validate::integer("create.channels", channels, 1, 4)?;
        let mean = match noise.mean {
            Some(mean) => validate::number("create.noise.mean", mean, 0.0, 10_000.0)?,
            None => 128.0,
        };
        let sigma = match noise.sigma {
            Some(sigma) => validate::number("create.noise.sigma", sigma, 0.0, 10_000.0)?,
            None => 30.0,
        };
        (channels, Fill::Noise(Noise { kind, mean, sigma }))
    } else if let Some(background) = &create.background {
        let channels = validate::integer("create.channels", channels, 3, 4)?;
        (channels, Fill::Background(background.resolve("create.background")?))
    } else {
        return Err(Error::InvalidInput(
            "Expected valid noise or background to create a new input image".into(),
        ));
    };

    Ok(CreateInput {
        width,
        height,
        channels: channels as u8,
        page_height,
        fill,
    })
}

fn text_input(text: &TextOptions) -> Result<TextInput, Error> {
    let Some(body) = &text.text else {
        return Err(Error::invalid_parameter("text.text", "string", None::<String>));
    };
    if text.height.is_some() && text.dpi.is_some() {
        return Err(Error::InvalidInput(
            "Expected only one of text.height or text.dpi".into(),
        ));
    }
    let align = match text.align.as_deref() {
        Some("center") => Some(TextAlign::Centre),
        Some(align) => Some(validate::keyword("text.align", align)?),
        None => None,
    };
    let wrap: Option<TextWrap> = text
        .wrap
        .as_deref()
        .map(|w| validate::keyword("text.wrap", w))
        .transpose()?;
    Ok(TextInput {
        text: body.clone(),
        font: text.font.clone(),
        fontfile: text.fontfile.clone(),
        width: text.width.map(|w| dimension("text.width", Some(w))).transpose()?,
        height: text.height.map(|h| dimension("text.height", Some(h))).transpose()?,
        align,
        justify: text.justify,
        dpi: text
            .dpi
            .map(|dpi| validate::integer("text.dpi", dpi, 1, 1_000_000).map(|v| v as u32))
            .transpose()?,
        rgba: text.rgba,
        spacing: text
            .spacing
            .map(|s| validate::integer("text.spacing", s, -1_000_000, 1_000_000).map(|v| v as i32))
            .transpose()?,
        wrap,
    })
}

fn join_layout(join: &JoinOptions) -> Result<JoinLayout, Error> {
    let halign = match join.halign.as_deref() {
        Some("center") => Some(HorizontalAlign::Centre),
        Some(h) => Some(validate::keyword("join.halign", h)?),
        None => None,
    };
    let valign = match join.valign.as_deref() {
        Some("center") => Some(VerticalAlign::Centre),
        Some(v) => Some(validate::keyword("join.valign", v)?),
        None => None,
    };
    Ok(JoinLayout {
        animated: join.animated,
        across: join
            .across
            .map(|a| validate::integer("join.across", a, 1, 1_000_000).map(|v| v as u32))
            .transpose()?,
        shim: join
            .shim
            .map(|s| validate::integer("join.shim", s, 0, 1_000_000).map(|v| v as u32))
            .transpose()?,
        background: join
            .background
            .as_ref()
            .map(|b| b.resolve("join.background"))
            .transpose()?,
        halign,
        valign,
    })
}

impl TypedArray {
    /// Band format implied by the element type.
    pub fn raw_depth(&self) -> RawDepth {
        match self {
            TypedArray::I8(_) => RawDepth::Char,
            TypedArray::U8(_) => RawDepth::Uchar,
            TypedArray::I16(_) => RawDepth::Short,
            TypedArray::U16(_) => RawDepth::Ushort,
            TypedArray::I32(_) => RawDepth::Int,
            TypedArray::U32(_) => RawDepth::Uint,
            TypedArray::F32(_) => RawDepth::Float,
            TypedArray::F64(_) => RawDepth::Double,
        }
    }
}
