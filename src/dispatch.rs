//! Execution dispatch: when the engine is called, and how its single
//! completion reaches the caller.
//!
//! Delivery modes:
//!
//! | Mode | Surface |
//! |---|---|
//! | promise | [`Pending`], resolved with data, `{data, info}` or info |
//! | callback | caller closure with `Result<(data, info)>` or `Result<info>` |
//! | stream | [`OutputStream`] of [`StreamEvent`]s |
//!
//! Input modes: a direct input calls the engine immediately; a buffered
//! stream input defers every request until [`Dispatcher::finish`], which
//! freezes the chunk list once and then runs the deferred requests in
//! order.

use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use log::debug;
use tokio::sync::oneshot;

use crate::engine::{Capabilities, Completion, Engine, OutputInfo};
use crate::error::Error;
use crate::input::{InputDescriptor, Source};

/// Where a result goes once the engine has completed.
pub type Reply<T> = Box<dyn FnOnce(Result<T, Error>) + Send + 'static>;

/// A result that arrives later.
///
/// Await it from async code, or [`wait`](Self::wait) from a plain thread.
/// Resolves to [`Error::Abandoned`] if the job can no longer run.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, Error>>,
}

impl<T> Pending<T> {
    /// Already settled, e.g. by a guard that rejected the request.
    pub(crate) fn ready(result: Result<T, Error>) -> Self {
        let (tx, rx) = oneshot::channel();
        // The receiver is alive in this scope, so the send cannot fail.
        let _ = tx.send(result);
        Self { rx }
    }

    /// Block the current thread until the result arrives.
    ///
    /// Must not be called from inside an async runtime; `.await` instead.
    pub fn wait(self) -> Result<T, Error> {
        self.rx.blocking_recv().unwrap_or(Err(Error::Abandoned))
    }

    /// The result if it has arrived, without blocking.
    pub fn try_result(&mut self) -> Option<Result<T, Error>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(Error::Abandoned)),
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Abandoned)))
    }
}

/// Events on an [`OutputStream`], in emission order.
///
/// Success: `Info`, `Data`, `End`, `Close`. Failure: `Error`, `End`, `Close`.
#[derive(Debug)]
pub enum StreamEvent {
    Info(OutputInfo),
    Data(Vec<u8>),
    End,
    Close,
    Error(Error),
}

/// Readable side of a streamed job. Clones share one underlying stream.
#[derive(Clone)]
pub struct OutputStream {
    rx: Arc<Mutex<mpsc::Receiver<StreamEvent>>>,
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream").finish_non_exhaustive()
    }
}

impl OutputStream {
    pub(crate) fn channel() -> (mpsc::Sender<StreamEvent>, OutputStream) {
        let (tx, rx) = mpsc::channel();
        (
            tx,
            OutputStream {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// Drain the stream, returning the concatenated data and the info record.
    pub fn read_to_end(self) -> Result<(Vec<u8>, OutputInfo), Error> {
        let mut data = Vec::new();
        let mut info = None;
        for event in self {
            match event {
                StreamEvent::Info(i) => info = Some(i),
                StreamEvent::Data(chunk) => data.extend_from_slice(&chunk),
                StreamEvent::Error(err) => return Err(err),
                StreamEvent::End | StreamEvent::Close => {}
            }
        }
        info.map(|info| (data, info)).ok_or(Error::Abandoned)
    }
}

impl Iterator for OutputStream {
    type Item = StreamEvent;

    /// Blocks until the next event; `None` once the stream has closed.
    fn next(&mut self) -> Option<StreamEvent> {
        self.rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv()
            .ok()
    }
}

// ============================================================================
// Replies
// ============================================================================

/// Reply into a [`Pending`], mapping the success value first.
pub(crate) fn promise<T, U>(map: impl FnOnce(T) -> U + Send + 'static) -> (Reply<T>, Pending<U>)
where
    T: Send + 'static,
    U: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let reply: Reply<T> = Box::new(move |result| {
        // A dropped Pending means nobody is listening.
        let _ = tx.send(result.map(map));
    });
    (reply, Pending { rx })
}

/// Reply into a caller-supplied closure.
pub(crate) fn callback<T, U>(
    f: impl FnOnce(Result<U, Error>) + Send + 'static,
    map: impl FnOnce(T) -> U + Send + 'static,
) -> Reply<T>
where
    T: Send + 'static,
{
    Box::new(move |result| f(result.map(map)))
}

/// Reply as stream events.
pub(crate) fn stream(tx: mpsc::Sender<StreamEvent>) -> Reply<(Vec<u8>, OutputInfo)> {
    Box::new(move |result| {
        let events = match result {
            Ok((data, info)) => vec![
                StreamEvent::Info(info),
                StreamEvent::Data(data),
                StreamEvent::End,
                StreamEvent::Close,
            ],
            Err(err) => vec![StreamEvent::Error(err), StreamEvent::End, StreamEvent::Close],
        };
        for event in events {
            if tx.send(event).is_err() {
                break;
            }
        }
    })
}

/// Adapt a reply to the engine's completion, attributing failures to
/// `call_site`.
pub(crate) fn engine_completion<T: Send + 'static>(
    operation: &'static str,
    call_site: &'static Location<'static>,
    reply: Reply<T>,
) -> Completion<T> {
    Box::new(move |result| {
        match &result {
            Ok(_) => debug!("engine {operation} completed"),
            Err(e) => debug!("engine {operation} failed: {}", e.message),
        }
        reply(result.map_err(|e| Error::engine(e, call_site)))
    })
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Engine access handed to a request once its input is final; an error if
/// the request can no longer run.
pub(crate) type Ready<'a> = Result<(&'a dyn Engine, InputDescriptor), Error>;

type Deferred = Box<dyn for<'a> FnOnce(Ready<'a>) + Send>;

/// Owns the engine and the input, and decides when requests run.
pub(crate) struct Dispatcher {
    engine: Arc<dyn Engine>,
    input: InputDescriptor,
    finished: bool,
    deferred: Vec<Deferred>,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn Engine>, input: InputDescriptor) -> Self {
        Self {
            engine,
            input,
            finished: false,
            deferred: Vec::new(),
        }
    }

    pub fn input(&self) -> &InputDescriptor {
        &self.input
    }

    pub fn capabilities(&self) -> Capabilities {
        self.engine.capabilities()
    }

    /// Append a chunk to a buffered stream input.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), Error> {
        match &mut self.input.source {
            Source::Stream(_) if self.finished => Err(Error::StreamClosed),
            Source::Stream(buffer) => buffer.append(chunk),
            _ => Err(Error::UnexpectedStreamData),
        }
    }

    /// Close a buffered stream input and run what was waiting on it.
    /// No-op for direct inputs and on repeat calls.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        let Source::Stream(buffer) = &mut self.input.source else {
            return;
        };
        self.finished = true;
        let bytes = buffer.freeze();
        debug!(
            "input stream finished ({} bytes), running {} deferred request(s)",
            bytes.len(),
            self.deferred.len()
        );
        for run in std::mem::take(&mut self.deferred) {
            run(Ok((self.engine.as_ref(), self.input.clone())));
        }
    }

    /// Run `request` now, or at [`finish`](Self::finish) for an unfinished
    /// stream input.
    pub fn run_when_ready(&mut self, request: impl for<'a> FnOnce(Ready<'a>) + Send + 'static) {
        if self.input.is_stream() && !self.finished {
            debug!("deferring engine call until the input stream finishes");
            self.deferred.push(Box::new(request));
        } else {
            request(Ok((self.engine.as_ref(), self.input.clone())));
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        for run in self.deferred.drain(..) {
            run(Err(Error::Abandoned));
        }
    }
}
