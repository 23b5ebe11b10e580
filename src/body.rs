//! Streaming request and response bodies.
//!
//! [`Body`] is a [`Stream`] of `Result<Bytes>` chunks used on both sides of a
//! call. Request bodies are empty, fully buffered, or streamed (for example
//! from a [pipe](crate::pipe)); response bodies are streamed from the
//! transport.
//!
//! # Release on close
//!
//! A response body produced under a timeout carries the guard's
//! [`CancelFn`]. [`Body::close`] first drops the underlying stream and then
//! runs the release function; dropping the body does the same. Either way the
//! function runs at most once.

use crate::context::{CancelFn, Context};
use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of the fixed transfer buffer used when streaming from readers.
pub const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// A streaming HTTP body.
pub struct Body {
    kind: Kind,
    watch: Option<BoxFuture<'static, Error>>,
    release: Option<CancelFn>,
}

enum Kind {
    Empty,
    Full(Option<Bytes>),
    Stream(BoxStream<'static, Result<Bytes>>),
    Closed,
}

impl Body {
    /// A body with no content.
    pub fn empty() -> Self {
        Self::with_kind(Kind::Empty)
    }

    fn with_kind(kind: Kind) -> Self {
        Body {
            kind,
            watch: None,
            release: None,
        }
    }

    /// Wrap a stream of chunks.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self::with_kind(Kind::Stream(stream.boxed()))
    }

    /// Stream an async reader through a fixed-size transfer buffer.
    ///
    /// The reader is never read to completion up front; each chunk is pulled
    /// only when the consumer polls for it.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        let reader = Box::pin(reader);
        let stream = futures::stream::try_unfold(reader, |mut reader| async move {
            let mut buf = BytesMut::with_capacity(COPY_BUFFER_SIZE);
            let read = reader.read_buf(&mut buf).await.map_err(Error::io)?;
            if read == 0 {
                Ok(None)
            } else {
                Ok(Some((buf.freeze(), reader)))
            }
        });
        Self::from_stream(stream)
    }

    /// The buffered content, when the body is not streamed.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.kind {
            Kind::Full(bytes) => bytes.as_ref(),
            _ => None,
        }
    }

    /// Returns true when the body carries no content at all.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            Kind::Empty | Kind::Closed => true,
            Kind::Full(bytes) => bytes.as_ref().map_or(true, Bytes::is_empty),
            Kind::Stream(_) => false,
        }
    }

    /// Returns true when the body streams chunks of unknown total length.
    pub fn is_streaming(&self) -> bool {
        matches!(self.kind, Kind::Stream(_))
    }

    /// Close the body, then run its release function.
    ///
    /// Calling `close` more than once is a no-op.
    pub fn close(&mut self) {
        self.kind = Kind::Closed;
        self.watch = None;
        if let Some(release) = self.release.take() {
            release.cancel();
        }
    }

    /// Tie this body to a call's context and cancellation guard.
    ///
    /// Reads fail with the context's error once it ends, and closing the body
    /// releases the guard.
    pub(crate) fn bind(mut self, ctx: &Context, release: Option<CancelFn>) -> Self {
        if !ctx.is_background() {
            self.watch = Some(ctx.done());
        }
        self.release = release;
        self
    }

    /// Collect the remaining content and close the body.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut collected = BytesMut::new();
        while let Some(chunk) = self.next().await {
            collected.extend_from_slice(&chunk?);
        }
        self.close();
        Ok(collected.freeze())
    }

    /// Collect the remaining content as UTF-8 text.
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            Error::io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    /// Collect the remaining content and deserialize it as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(Error::json)
    }

    pub(crate) fn take_kind(&mut self) -> BodyParts {
        match std::mem::replace(&mut self.kind, Kind::Closed) {
            Kind::Empty | Kind::Closed => BodyParts::Empty,
            Kind::Full(bytes) => bytes.map_or(BodyParts::Empty, BodyParts::Full),
            Kind::Stream(stream) => BodyParts::Stream(stream),
        }
    }
}

/// Owned view of a body's content, used by transports that hand the body
/// to another HTTP stack.
pub(crate) enum BodyParts {
    Empty,
    Full(Bytes),
    Stream(BoxStream<'static, Result<Bytes>>),
}

impl Stream for Body {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(watch) = this.watch.as_mut() {
            if let Poll::Ready(err) = watch.as_mut().poll(cx) {
                this.watch = None;
                this.kind = Kind::Closed;
                return Poll::Ready(Some(Err(err)));
            }
        }

        match &mut this.kind {
            Kind::Empty | Kind::Closed => Poll::Ready(None),
            Kind::Full(bytes) => Poll::Ready(bytes.take().map(Ok)),
            Kind::Stream(stream) => stream.as_mut().poll_next(cx),
        }
    }
}

impl Drop for Body {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release.cancel();
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            Kind::Empty => "empty",
            Kind::Full(_) => "full",
            Kind::Stream(_) => "stream",
            Kind::Closed => "closed",
        };
        f.debug_struct("Body")
            .field("kind", &kind)
            .field("guarded", &self.release.is_some())
            .finish()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::with_kind(Kind::Full(Some(bytes)))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes::from(bytes).into()
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Bytes::from(text).into()
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Bytes::from_static(text.as_bytes()).into()
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Bytes::from_static(bytes).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counting_guard() -> (CancelFn, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let guard = CancelFn::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (guard, calls)
    }

    #[tokio::test]
    async fn test_full_body_yields_once() {
        let body = Body::from("hello");
        assert_eq!(body.as_bytes().map(|b| b.as_ref()), Some(&b"hello"[..]));
        assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_reader_body_chunks_bounded() {
        let data = vec![7u8; COPY_BUFFER_SIZE * 3 + 10];
        let mut body = Body::from_reader(std::io::Cursor::new(data.clone()));
        assert!(body.is_streaming());

        let mut total = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.unwrap();
            assert!(chunk.len() <= COPY_BUFFER_SIZE);
            total += chunk.len();
        }
        assert_eq!(total, data.len());
    }

    #[test]
    fn test_close_releases_guard_once() {
        let (guard, calls) = counting_guard();
        let mut body = Body::from("payload").bind(&Context::background(), Some(guard));

        body.close();
        body.close();
        drop(body);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_guard() {
        let (guard, calls) = counting_guard();
        let body = Body::empty().bind(&Context::background(), Some(guard));
        drop(body);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bound_body_fails_after_deadline() {
        let (ctx, _cancel) = Context::background().with_timeout(Duration::from_millis(20));
        let never = futures::stream::pending::<Result<Bytes>>();
        let mut body = Body::from_stream(never).bind(&ctx, None);

        let err = body.next().await.unwrap().unwrap_err();
        assert!(err.is_timeout());
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_text_and_json() {
        let text = Body::from("plain").text().await.unwrap();
        assert_eq!(text, "plain");

        let value: serde_json::Value = Body::from(r#"{"id":1}"#).json().await.unwrap();
        assert_eq!(value["id"], 1);
    }
}
