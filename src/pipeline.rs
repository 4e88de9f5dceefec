//! The pipeline: one input, one set of output decisions, one engine call per
//! requested result.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use imagejob::{Pipeline, RustEngine, output::WebpOptions};
//! # fn main() -> Result<(), imagejob::Error> {
//! let mut pipeline = Pipeline::new(Arc::new(RustEngine::new()), "photo.jpg", None)?;
//! pipeline.webp(Some(&WebpOptions { quality: Some(50), ..Default::default() }))?;
//! let info = pipeline.to_file("photo.webp").wait()?;
//! # Ok(()) }
//! ```
//!
//! Option calls validate synchronously and return `Result<&mut Self, _>` so
//! they chain with `?`. Execution methods never fail synchronously: guard
//! failures and engine failures both arrive through the chosen delivery mode.
//! Each request snapshots the options as they are at the time of the call.

use std::io;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::dispatch::{self, Dispatcher, OutputStream, Pending, Reply};
use crate::engine::{Capabilities, Engine, Job, Metadata, OutputInfo, Stats};
use crate::error::Error;
use crate::input::{Input, InputBuilder, InputDefaults, InputDescriptor, InputOptions};
use crate::metadata::{IccOptions, WithMetadataOptions};
use crate::output::{
    Codec, Delivery, FormatOptions, GifOptions, HeifOptions, JobOptions, Jp2Options, JpegOptions,
    JxlOptions, PngOptions, RawOptions, TiffOptions, TileOptions, WebpOptions,
};

/// Buffer output together with its info record.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferOutput {
    pub data: Vec<u8>,
    pub info: OutputInfo,
}

pub struct Pipeline {
    options: JobOptions,
    dispatcher: Dispatcher,
    stream: Option<OutputStream>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

macro_rules! resolver {
    ($(#[$meta:meta])* $name:ident($ty:ty)) => {
        $(#[$meta])*
        pub fn $name(&mut self, options: Option<&$ty>) -> Result<&mut Self, Error> {
            self.options.$name(options)?;
            Ok(self)
        }
    };
    ($(#[$meta:meta])* $name:ident($ty:ty) with capabilities) => {
        $(#[$meta])*
        pub fn $name(&mut self, options: Option<&$ty>) -> Result<&mut Self, Error> {
            let caps = self.dispatcher.capabilities();
            self.options.$name(options, &caps)?;
            Ok(self)
        }
    };
}

impl Pipeline {
    /// A pipeline reading `input`, with decode defaults from
    /// [`InputDefaults::default`].
    pub fn new(
        engine: Arc<dyn Engine>,
        input: impl Into<Input>,
        options: Option<InputOptions>,
    ) -> Result<Self, Error> {
        Self::with_input_defaults(engine, input, options, InputDefaults::default())
    }

    pub fn with_input_defaults(
        engine: Arc<dyn Engine>,
        input: impl Into<Input>,
        options: Option<InputOptions>,
        defaults: InputDefaults,
    ) -> Result<Self, Error> {
        let descriptor = InputBuilder::with_defaults(defaults).build(input.into(), options, true)?;
        debug!("pipeline input: {}", descriptor.source.kind());
        Ok(Self {
            options: JobOptions::new(),
            dispatcher: Dispatcher::new(engine, descriptor),
            stream: None,
        })
    }

    pub fn input(&self) -> &InputDescriptor {
        self.dispatcher.input()
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    pub fn capabilities(&self) -> Capabilities {
        self.dispatcher.capabilities()
    }

    // ------------------------------------------------------------------------
    // Output options
    // ------------------------------------------------------------------------

    resolver!(jpeg(JpegOptions));
    resolver!(png(PngOptions));
    resolver!(webp(WebpOptions));
    resolver!(gif(GifOptions));
    resolver!(tiff(TiffOptions));
    resolver!(heif(HeifOptions) with capabilities);
    resolver!(avif(HeifOptions) with capabilities);
    resolver!(jxl(JxlOptions));
    resolver!(
        /// Fails with [`Error::CodecUnavailable`] unless the engine has JPEG 2000.
        jp2(Jp2Options) with capabilities
    );
    resolver!(raw(RawOptions));
    resolver!(tile(TileOptions));

    /// Select an output format by name or alias.
    pub fn to_format(&mut self, format: &str, options: impl Into<FormatOptions>) -> Result<&mut Self, Error> {
        let caps = self.dispatcher.capabilities();
        self.options.to_format(format, options.into(), &caps)?;
        Ok(self)
    }

    pub fn timeout(&mut self, seconds: i64) -> Result<&mut Self, Error> {
        self.options.timeout(seconds)?;
        Ok(self)
    }

    // ------------------------------------------------------------------------
    // Metadata options
    // ------------------------------------------------------------------------

    pub fn keep_metadata(&mut self) -> &mut Self {
        self.options.keep_metadata();
        self
    }

    pub fn keep_exif(&mut self) -> &mut Self {
        self.options.keep_exif();
        self
    }

    pub fn keep_xmp(&mut self) -> &mut Self {
        self.options.keep_xmp();
        self
    }

    pub fn keep_icc_profile(&mut self) -> &mut Self {
        self.options.keep_icc_profile();
        self
    }

    pub fn with_exif(&mut self, exif: &serde_json::Value) -> Result<&mut Self, Error> {
        self.options.with_exif(exif)?;
        Ok(self)
    }

    pub fn with_exif_merge(&mut self, exif: &serde_json::Value) -> Result<&mut Self, Error> {
        self.options.with_exif_merge(exif)?;
        Ok(self)
    }

    pub fn with_icc_profile(&mut self, icc: &str, options: Option<&IccOptions>) -> Result<&mut Self, Error> {
        self.options.with_icc_profile(icc, options)?;
        Ok(self)
    }

    pub fn with_xmp(&mut self, xmp: &str) -> Result<&mut Self, Error> {
        self.options.with_xmp(xmp)?;
        Ok(self)
    }

    pub fn with_metadata(&mut self, options: Option<&WithMetadataOptions>) -> Result<&mut Self, Error> {
        self.options.with_metadata(options)?;
        Ok(self)
    }

    // ------------------------------------------------------------------------
    // Stream input
    // ------------------------------------------------------------------------

    /// Append encoded bytes to a stream input.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.dispatcher.write_chunk(chunk)
    }

    /// Mark a stream input complete. Requests made so far run now.
    pub fn finish(&mut self) {
        self.dispatcher.finish();
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    /// Encode to memory.
    #[track_caller]
    pub fn to_buffer(&mut self) -> Pending<Vec<u8>> {
        let call_site = Location::caller();
        let (reply, pending) = dispatch::promise(|(data, _info): (Vec<u8>, OutputInfo)| data);
        self.request_pipeline(call_site, Delivery::default(), reply);
        pending
    }

    /// Encode to memory, resolving with the info record as well.
    ///
    /// Only this request carries the resolve-with-object flag.
    #[track_caller]
    pub fn to_buffer_with_info(&mut self) -> Pending<BufferOutput> {
        let call_site = Location::caller();
        let delivery = Delivery {
            resolve_with_object: true,
            ..Delivery::default()
        };
        let (reply, pending) =
            dispatch::promise(|(data, info): (Vec<u8>, OutputInfo)| BufferOutput { data, info });
        self.request_pipeline(call_site, delivery, reply);
        pending
    }

    #[track_caller]
    pub fn to_buffer_callback(
        &mut self,
        done: impl FnOnce(Result<(Vec<u8>, OutputInfo), Error>) + Send + 'static,
    ) {
        let call_site = Location::caller();
        self.request_pipeline(call_site, Delivery::default(), dispatch::callback(done, |out| out));
    }

    /// Encode to `path`. Without an explicit format, the extension decides.
    #[track_caller]
    pub fn to_file(&mut self, path: impl AsRef<Path>) -> Pending<OutputInfo> {
        let call_site = Location::caller();
        match self.output_path(path.as_ref()) {
            Ok(path) => {
                let (reply, pending) = dispatch::promise(|(_data, info): (Vec<u8>, OutputInfo)| info);
                self.request_file(path, call_site, reply);
                pending
            }
            Err(err) => Pending::ready(Err(err)),
        }
    }

    #[track_caller]
    pub fn to_file_callback(
        &mut self,
        path: impl AsRef<Path>,
        done: impl FnOnce(Result<OutputInfo, Error>) + Send + 'static,
    ) {
        let call_site = Location::caller();
        match self.output_path(path.as_ref()) {
            Ok(path) => {
                let reply = dispatch::callback(done, |(_data, info): (Vec<u8>, OutputInfo)| info);
                self.request_file(path, call_site, reply);
            }
            Err(err) => done(Err(err)),
        }
    }

    /// Read the output as a stream. Later calls return the same stream.
    #[track_caller]
    pub fn read_stream(&mut self) -> OutputStream {
        if let Some(stream) = &self.stream {
            return stream.clone();
        }
        let call_site = Location::caller();
        let delivery = Delivery {
            stream_out: true,
            ..Delivery::default()
        };
        let (tx, stream) = OutputStream::channel();
        self.request_pipeline(call_site, delivery, dispatch::stream(tx));
        self.stream = Some(stream.clone());
        stream
    }

    /// Header-level metadata of the input.
    #[track_caller]
    pub fn metadata(&mut self) -> Pending<Metadata> {
        let call_site = Location::caller();
        let (reply, pending) = dispatch::promise(|m| m);
        self.request_metadata(call_site, reply);
        pending
    }

    #[track_caller]
    pub fn metadata_callback(&mut self, done: impl FnOnce(Result<Metadata, Error>) + Send + 'static) {
        let call_site = Location::caller();
        self.request_metadata(call_site, dispatch::callback(done, |m| m));
    }

    /// Pixel statistics of the input.
    #[track_caller]
    pub fn stats(&mut self) -> Pending<Stats> {
        let call_site = Location::caller();
        let (reply, pending) = dispatch::promise(|s| s);
        self.request_stats(call_site, reply);
        pending
    }

    #[track_caller]
    pub fn stats_callback(&mut self, done: impl FnOnce(Result<Stats, Error>) + Send + 'static) {
        let call_site = Location::caller();
        self.request_stats(call_site, dispatch::callback(done, |s| s));
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Guards run before any engine call.
    fn output_path(&self, path: &Path) -> Result<PathBuf, Error> {
        if path.as_os_str().is_empty() {
            return Err(Error::MissingOutputPath);
        }
        if let Some(input) = self.input().file() {
            if let (Ok(a), Ok(b)) = (std::path::absolute(input), std::path::absolute(path)) {
                if a == b {
                    return Err(Error::SameInputOutput);
                }
            }
        }
        if Codec::from_path(path) == Some(Codec::Jp2) && !self.capabilities().jp2k {
            return Err(Error::CodecUnavailable("jp2"));
        }
        Ok(path.to_path_buf())
    }

    fn request_file(
        &mut self,
        path: PathBuf,
        call_site: &'static Location<'static>,
        reply: Reply<(Vec<u8>, OutputInfo)>,
    ) {
        let delivery = Delivery {
            file_out: Some(path),
            ..Delivery::default()
        };
        self.request_pipeline(call_site, delivery, reply);
    }

    /// Queue one engine job. Delivery flags belong to the request, not the pipeline.
    fn request_pipeline(
        &mut self,
        call_site: &'static Location<'static>,
        delivery: Delivery,
        reply: Reply<(Vec<u8>, OutputInfo)>,
    ) {
        let mut options = self.options.clone();
        options.delivery = delivery;
        debug!(
            "pipeline requested at {call_site}: format {}, file {:?}",
            options.format, options.delivery.file_out
        );
        self.dispatcher.run_when_ready(move |ready| match ready {
            Ok((engine, input)) => engine.pipeline(
                Job { input, options },
                dispatch::engine_completion("pipeline", call_site, reply),
            ),
            Err(err) => reply(Err(err)),
        });
    }

    fn request_metadata(&mut self, call_site: &'static Location<'static>, reply: Reply<Metadata>) {
        self.dispatcher.run_when_ready(move |ready| match ready {
            Ok((engine, input)) => {
                engine.metadata(input, dispatch::engine_completion("metadata", call_site, reply))
            }
            Err(err) => reply(Err(err)),
        });
    }

    fn request_stats(&mut self, call_site: &'static Location<'static>, reply: Reply<Stats>) {
        self.dispatcher.run_when_ready(move |ready| match ready {
            Ok((engine, input)) => {
                engine.stats(input, dispatch::engine_completion("stats", call_site, reply))
            }
            Err(err) => reply(Err(err)),
        });
    }
}

/// Bytes written to a pipeline feed its stream input.
impl io::Write for Pipeline {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.dispatcher.write_chunk(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::StreamEvent;
    use crate::engine::backend::tests::{MockEngine, RecordedOp};
    use crate::output::OutputFormat;
    use std::io::Write;
    use std::sync::mpsc;

    fn pipeline(engine: &Arc<MockEngine>, input: impl Into<Input>) -> Pipeline {
        Pipeline::new(engine.clone(), input, None).unwrap()
    }

    // =========================================================================
    // Format selection
    // =========================================================================

    #[test]
    fn forced_webp_survives_jpg_extension() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, "in.png");
        p.webp(None).unwrap();
        let info = p.to_file("x.jpg").wait().unwrap();
        assert_eq!(info.format, "webp");

        let job = engine.only_job();
        assert_eq!(job.options.format, OutputFormat::Webp);
        assert_eq!(job.options.delivery.file_out, Some(PathBuf::from("x.jpg")));
    }

    #[test]
    fn options_are_snapshotted_per_request() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, "in.png");
        p.jpeg(None).unwrap();
        let first = p.to_buffer();
        p.png(None).unwrap();
        let second = p.to_buffer();
        first.wait().unwrap();
        second.wait().unwrap();

        let formats: Vec<_> = engine
            .get_operations()
            .into_iter()
            .map(|op| match op {
                RecordedOp::Pipeline(job) => job.options.format,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(formats, [OutputFormat::Jpeg, OutputFormat::Png]);
    }

    #[test]
    fn chained_options() -> Result<(), Error> {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, "in.png");
        p.jpeg(Some(&JpegOptions {
            quality: Some(70),
            ..Default::default()
        }))?
        .keep_exif()
        .timeout(30)?;
        assert_eq!(p.options().jpeg.quality, 70);
        assert_eq!(p.options().timeout_seconds, 30);
        assert!(p.to_format("bmp", FormatOptions::None).is_err());
        Ok(())
    }

    #[test]
    fn jp2_resolver_checks_capabilities() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, "in.png");
        assert!(matches!(p.jp2(None), Err(Error::CodecUnavailable("jp2"))));
    }

    // =========================================================================
    // Guards
    // =========================================================================

    #[test]
    fn guards_never_invoke_engine() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, "dir/in.png");

        assert!(matches!(p.to_file("").wait(), Err(Error::MissingOutputPath)));
        assert!(matches!(
            p.to_file("dir/./in.png").wait(),
            Err(Error::SameInputOutput)
        ));
        assert!(matches!(
            p.to_file("out.j2c").wait(),
            Err(Error::CodecUnavailable("jp2"))
        ));

        let (tx, rx) = mpsc::channel();
        p.to_file_callback("", move |r| tx.send(r).unwrap());
        assert!(matches!(rx.recv().unwrap(), Err(Error::MissingOutputPath)));

        assert!(engine.get_operations().is_empty());
    }

    #[test]
    fn jp2_extension_allowed_with_codec() {
        let engine = Arc::new(MockEngine::with_capabilities(Capabilities {
            jp2k: true,
            ..Capabilities::default()
        }));
        let mut p = pipeline(&engine, "in.png");
        assert!(p.to_file("out.jp2").wait().is_ok());
    }

    // =========================================================================
    // Delivery modes
    // =========================================================================

    #[test]
    fn callbacks_receive_data_or_info() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, "in.png");

        let (tx, rx) = mpsc::channel();
        p.to_buffer_callback(move |r| tx.send(r).unwrap());
        let (data, info) = rx.recv().unwrap().unwrap();
        assert_eq!(data, MockEngine::OUTPUT);
        assert_eq!(info.width, 1);

        let (tx, rx) = mpsc::channel();
        p.to_file_callback("out.png", move |r| tx.send(r).unwrap());
        assert_eq!(rx.recv().unwrap().unwrap().format, "input");
    }

    #[test]
    fn buffer_with_info_resolves_object() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, "in.png");
        p.gif(None).unwrap();
        let out = p.to_buffer_with_info().wait().unwrap();
        assert_eq!(out.data, MockEngine::OUTPUT);
        assert_eq!(out.info.format, "gif");
        assert!(engine.only_job().options.delivery.resolve_with_object);
    }

    #[test]
    fn resolve_with_object_stays_with_its_request() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, "in.png");
        p.to_buffer_with_info().wait().unwrap();
        let data = p.to_buffer().wait().unwrap();
        assert_eq!(data, MockEngine::OUTPUT);

        let ops = engine.get_operations();
        let flags: Vec<bool> = ops
            .iter()
            .map(|op| match op {
                RecordedOp::Pipeline(job) => job.options.delivery.resolve_with_object,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(flags, vec![true, false]);
        assert_eq!(p.options().delivery, Delivery::default());
    }

    #[test]
    fn read_stream_is_idempotent() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, "in.png");
        let stream = p.read_stream();
        let again = p.read_stream();
        let events: Vec<_> = stream.collect();
        assert!(matches!(events[0], StreamEvent::Info(_)));
        assert!(matches!(events.last(), Some(StreamEvent::Close)));
        assert!(again.read_to_end().is_err());
        assert!(engine.only_job().options.delivery.stream_out);
    }

    #[test]
    fn metadata_and_stats() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, "in.png");
        assert_eq!(p.metadata().wait().unwrap().width, Some(1));
        assert!(p.stats().wait().unwrap().is_opaque);
        let ops = engine.get_operations();
        assert!(matches!(ops[0], RecordedOp::Metadata(_)));
        assert!(matches!(ops[1], RecordedOp::Stats(_)));
    }

    // =========================================================================
    // Stream input
    // =========================================================================

    #[tokio::test]
    async fn stream_input_resolves_only_after_finish() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, Input::None);
        assert!(p.input().is_stream());

        let mut pending = p.to_buffer();
        p.write_all(b"\x89PNG").unwrap();
        p.write_all(b"rest").unwrap();
        assert!(pending.try_result().is_none());
        assert!(engine.get_operations().is_empty());

        p.finish();
        assert_eq!(pending.await.unwrap(), MockEngine::OUTPUT);
        assert_eq!(engine.only_job().input.bytes(), Some(&b"\x89PNGrest"[..]));
        assert!(p.write_all(b"late").is_err());
    }

    #[test]
    fn stream_metadata_is_deferred_too() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, Input::None);
        let (tx, rx) = mpsc::channel();
        p.metadata_callback(move |r| tx.send(r).unwrap());
        assert!(rx.try_recv().is_err());
        p.write_chunk(b"data").unwrap();
        p.finish();
        assert!(rx.recv().unwrap().is_ok());
    }

    #[test]
    fn writing_to_direct_input_fails() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, "in.png");
        let err = p.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(matches!(p.write_chunk(b"x"), Err(Error::UnexpectedStreamData)));
    }

    #[test]
    fn dropped_pipeline_abandons_stream_requests() {
        let engine = Arc::new(MockEngine::new());
        let mut p = pipeline(&engine, Input::None);
        let pending = p.stats();
        drop(p);
        assert!(matches!(pending.wait(), Err(Error::Abandoned)));
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn engine_error_points_at_caller() {
        let engine = Arc::new(MockEngine::failing("VipsJpeg: out of order read"));
        let mut p = pipeline(&engine, "in.jpg");
        let line = line!() + 1;
        let pending = p.to_buffer();
        match pending.wait() {
            Err(Error::Engine { call_site, .. }) => {
                assert_eq!(call_site.file(), file!());
                assert_eq!(call_site.line(), line);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
