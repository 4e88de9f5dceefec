//! Input descriptors.
//!
//! An [`Input`] is whatever the caller hands over: a path, encoded bytes, a
//! typed array of raw samples, an options object describing a created or
//! streamed image, or several inputs to join. [`InputBuilder`] validates it
//! together with [`InputOptions`] into an [`InputDescriptor`].

mod builder;
mod descriptor;
mod options;
mod stream;

use std::path::{Path, PathBuf};

pub use builder::InputBuilder;
pub use descriptor::{
    CreateInput, DEFAULT_PIXEL_LIMIT, FailOn, Fill, HorizontalAlign, InputDefaults,
    InputDescriptor, JoinLayout, Noise, NoiseKind, RawDepth, RawInput, Source, TextAlign,
    TextInput, TextWrap, VerticalAlign,
};
pub use options::{
    CreateOptions, InputOptions, Jp2InputOptions, JoinOptions, NoiseOptions, OpenSlideOptions,
    PdfInputOptions, PixelLimit, RawInputOptions, SvgInputOptions, TextOptions,
    TiffInputOptions,
};
pub use stream::StreamBuffer;

/// Numeric sample arrays, reinterpreted as native-endian bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl TypedArray {
    pub fn is_empty(&self) -> bool {
        match self {
            TypedArray::I8(v) => v.is_empty(),
            TypedArray::U8(v) => v.is_empty(),
            TypedArray::I16(v) => v.is_empty(),
            TypedArray::U16(v) => v.is_empty(),
            TypedArray::I32(v) => v.is_empty(),
            TypedArray::U32(v) => v.is_empty(),
            TypedArray::F32(v) => v.is_empty(),
            TypedArray::F64(v) => v.is_empty(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            TypedArray::I8(v) => bytemuck::cast_slice(v).to_vec(),
            TypedArray::U8(v) => v.clone(),
            TypedArray::I16(v) => bytemuck::cast_slice(v).to_vec(),
            TypedArray::U16(v) => bytemuck::cast_slice(v).to_vec(),
            TypedArray::I32(v) => bytemuck::cast_slice(v).to_vec(),
            TypedArray::U32(v) => bytemuck::cast_slice(v).to_vec(),
            TypedArray::F32(v) => bytemuck::cast_slice(v).to_vec(),
            TypedArray::F64(v) => bytemuck::cast_slice(v).to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum Input {
    /// Nothing yet: the image will be written to the pipeline as a stream.
    #[default]
    None,
    Path(PathBuf),
    Buffer(Vec<u8>),
    /// A window into a larger byte array. `length` defaults to the rest.
    Region {
        bytes: Vec<u8>,
        offset: usize,
        length: Option<usize>,
    },
    Typed(TypedArray),
    Options(Box<InputOptions>),
    Join(Vec<Input>),
}

impl Input {
    pub fn kind(&self) -> &'static str {
        match self {
            Input::None => "none",
            Input::Path(_) => "path",
            Input::Buffer(_) => "buffer",
            Input::Region { .. } => "region",
            Input::Typed(_) => "typed array",
            Input::Options(_) => "options",
            Input::Join(_) => "array",
        }
    }
}

impl From<&str> for Input {
    fn from(path: &str) -> Self {
        Input::Path(PathBuf::from(path))
    }
}

impl From<String> for Input {
    fn from(path: String) -> Self {
        Input::Path(PathBuf::from(path))
    }
}

impl From<&Path> for Input {
    fn from(path: &Path) -> Self {
        Input::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Input {
    fn from(path: PathBuf) -> Self {
        Input::Path(path)
    }
}

impl From<Vec<u8>> for Input {
    fn from(bytes: Vec<u8>) -> Self {
        Input::Buffer(bytes)
    }
}

impl From<&[u8]> for Input {
    fn from(bytes: &[u8]) -> Self {
        Input::Buffer(bytes.to_vec())
    }
}

impl From<TypedArray> for Input {
    fn from(array: TypedArray) -> Self {
        Input::Typed(array)
    }
}

impl From<InputOptions> for Input {
    fn from(options: InputOptions) -> Self {
        Input::Options(Box::new(options))
    }
}

impl From<Vec<Input>> for Input {
    fn from(inputs: Vec<Input>) -> Self {
        Input::Join(inputs)
    }
}
