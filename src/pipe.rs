//! In-memory pipe connecting a body producer to the consuming transport.
//!
//! The pipe is a capacity-one channel of chunks: a write suspends until the
//! previous chunk has been taken by the reader, so a producer can never run
//! more than one chunk ahead of the consumer regardless of the payload size.
//!
//! # Failure propagation
//!
//! [`PipeWriter::close_with_error`] records the error on the pipe *before*
//! delivering it to the reader. The reader yields that exact error when it
//! reaches the failure point, and a [`PipeMonitor`] lets the sending side
//! recover it after the transport has wrapped it in its own error type.
//!
//! ```
//! use streamline_http::pipe::pipe;
//! use futures::StreamExt;
//! use bytes::Bytes;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (writer, mut reader) = pipe();
//! tokio::spawn(async move {
//!     writer.write(Bytes::from_static(b"chunk")).await.unwrap();
//!     writer.close();
//! });
//! assert_eq!(reader.next().await.unwrap().unwrap(), "chunk");
//! assert!(reader.next().await.is_none());
//! # }
//! ```

use crate::error::{Error, Result};
use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Default)]
struct Shared {
    failure: Mutex<Option<Error>>,
}

/// Create a connected writer/reader pair.
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(1);
    let shared = Arc::new(Shared::default());
    (
        PipeWriter {
            tx,
            shared: shared.clone(),
        },
        PipeReader {
            rx: ReceiverStream::new(rx),
            shared,
        },
    )
}

/// Producer half of a [`pipe`].
pub struct PipeWriter {
    tx: mpsc::Sender<Result<Bytes>>,
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Hand one chunk to the reader, waiting until there is room for it.
    ///
    /// Fails with [`Error::ClosedPipe`] once the reader is gone.
    pub async fn write(&self, chunk: Bytes) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx.send(Ok(chunk)).await.map_err(|_| Error::ClosedPipe)
    }

    /// Blocking variant of [`PipeWriter::write`] for synchronous producers.
    ///
    /// Must not be called from within an async task.
    pub fn blocking_write(&self, chunk: Bytes) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx.blocking_send(Ok(chunk)).map_err(|_| Error::ClosedPipe)
    }

    /// Returns true once the reader has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Close the pipe normally; the reader sees end-of-stream.
    pub fn close(self) {}

    /// Close the pipe so the reader fails with `err`.
    pub async fn close_with_error(self, err: Error) {
        self.record(&err);
        // A gone reader already stopped caring about the outcome.
        let _ = self.tx.send(Err(err)).await;
    }

    /// Blocking variant of [`PipeWriter::close_with_error`].
    pub fn blocking_close_with_error(self, err: Error) {
        self.record(&err);
        let _ = self.tx.blocking_send(Err(err));
    }

    fn record(&self, err: &Error) {
        let mut failure = self.shared.failure.lock();
        if failure.is_none() {
            *failure = Some(err.clone());
        }
    }
}

/// Consumer half of a [`pipe`], usable directly as a request body stream.
pub struct PipeReader {
    rx: ReceiverStream<Result<Bytes>>,
    shared: Arc<Shared>,
}

impl PipeReader {
    /// A handle that outlives the reader and reports the producer's failure.
    pub fn monitor(&self) -> PipeMonitor {
        PipeMonitor {
            shared: self.shared.clone(),
        }
    }
}

impl Stream for PipeReader {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

/// Observer of the error a producer closed its pipe with.
#[derive(Clone)]
pub struct PipeMonitor {
    shared: Arc<Shared>,
}

impl PipeMonitor {
    /// The error passed to `close_with_error`, if any.
    pub fn failure(&self) -> Option<Error> {
        self.shared.failure.lock().clone()
    }
}
