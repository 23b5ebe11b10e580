//! Request builder and the shared send path.
//!
//! A [`RequestBuilder`] accumulates the method, URL template, query
//! parameters, headers, cookies, an optional timeout guard, and one body.
//! Builder methods consume and return the builder, and
//! [`RequestBuilder::send`] consumes it for good, so a request can never be
//! reconfigured after it was sent.
//!
//! # Body selection
//!
//! Exactly one body choice is kept; the last setter wins:
//!
//! | Setter | Body | `Content-Type` |
//! |--------|------|----------------|
//! | [`json`](RequestBuilder::json) | serialized while the call streams it | `application/json` |
//! | [`form`](RequestBuilder::form) | url-encoded in memory before the call | `application/x-www-form-urlencoded` |
//! | [`body`](RequestBuilder::body) | caller-supplied [`Body`] | caller-supplied |
//!
//! # Cancellation guard
//!
//! [`timeout`](RequestBuilder::timeout) derives a bounded context. If the call
//! fails before a response exists the guard is released immediately;
//! otherwise it is attached to the response body and released when the body
//! is closed or dropped.

use super::utils::{format_float, join_path, substitute_placeholder};
use crate::body::{Body, COPY_BUFFER_SIZE};
use crate::context::{CancelFn, Context};
use crate::error::{Error, Result};
use crate::pipe::{pipe, PipeMonitor, PipeWriter};
use crate::transport::{BoxTransport, Middleware};
use crate::Response;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use http::Method;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;
use url::Url;

/// `Content-Type` of JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// `Content-Type` of url-encoded form bodies.
pub const APPLICATION_FORM: &str = "application/x-www-form-urlencoded";

type JsonEncoder = Box<dyn FnOnce(&mut dyn Write) -> serde_json::Result<()> + Send>;

/// Body choice of a standard (non-multipart) request.
#[derive(Default)]
pub struct Payload {
    kind: PayloadKind,
}

#[derive(Default)]
enum PayloadKind {
    #[default]
    None,
    Json(JsonEncoder),
    Form(BTreeMap<String, String>),
    Raw(Body),
}

/// Fluent builder for one HTTP call.
///
/// `P` is the body choice: [`Payload`] for standard requests and
/// [`MultipartForm`](super::MultipartForm) for streaming multipart uploads.
///
/// # Examples
///
/// ```no_run
/// use streamline_http::{Client, Context};
/// use std::time::Duration;
///
/// # async fn run() -> streamline_http::Result<()> {
/// let client = Client::new("https://api.example.com/v1")?;
/// let ctx = Context::background();
///
/// let response = client
///     .get(&ctx, "/users/{id}/posts")
///     .path_int("id", 42)
///     .query("page", "2")
///     .header("x-request-id", "abc")
///     .timeout(Duration::from_secs(5))
///     .send()
///     .await?;
///
/// let posts: serde_json::Value = response.into_body().json().await?;
/// # let _ = posts;
/// # Ok(())
/// # }
/// ```
pub struct RequestBuilder<P = Payload> {
    transport: BoxTransport,
    ctx: Context,
    cancel: Option<CancelFn>,
    method: Method,
    url: Url,
    path: String,
    query: BTreeMap<String, String>,
    headers: HeaderMap,
    error: Option<Error>,
    payload: P,
}

impl<P> RequestBuilder<P> {
    /// Start a request for `path` relative to `base`.
    pub(crate) fn new(
        transport: BoxTransport,
        ctx: &Context,
        method: Method,
        base: &Url,
        path: &str,
        payload: P,
    ) -> Self {
        let query = base.query_pairs().into_owned().collect();
        RequestBuilder {
            transport,
            ctx: ctx.clone(),
            cancel: None,
            method,
            url: base.clone(),
            path: join_path(base.path(), path),
            query,
            headers: HeaderMap::new(),
            error: None,
            payload,
        }
    }

    fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    // ========== Headers & Cookies ==========

    /// Set a header, replacing any previous value for the same name.
    ///
    /// An invalid name or value is reported by `send`.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        match (HeaderName::try_from(key), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(err), _) => {
                let err: http::Error = err.into();
                self.fail(err.into());
            }
            (_, Err(err)) => {
                let err: http::Error = err.into();
                self.fail(err.into());
            }
        }
        self
    }

    /// Set every header in `headers`, replacing previous values.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Append a cookie; earlier cookies are kept.
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        let pair = format!("{name}={value}");
        let combined = match self.headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.is_empty() => format!("{existing}; {pair}"),
            _ => pair,
        };
        self.header(COOKIE, combined)
    }

    // ========== Path Parameters ==========

    /// Replace every `{key}` placeholder in the path with `value`.
    pub fn path_param(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.path = substitute_placeholder(&self.path, key, value.as_ref());
        self
    }

    /// Replace `{key}` with an integer.
    pub fn path_int(self, key: &str, value: i64) -> Self {
        self.path_param(key, value.to_string())
    }

    /// Replace `{key}` with `true` or `false`.
    pub fn path_bool(self, key: &str, value: bool) -> Self {
        self.path_param(key, value.to_string())
    }

    /// Replace `{key}` with the shortest exact decimal form of `value`.
    pub fn path_float(self, key: &str, value: f64) -> Self {
        self.path_param(key, format_float(value))
    }

    // ========== Query Parameters ==========

    /// Set a query parameter; the last value set for a key wins.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Set an integer query parameter.
    pub fn query_int(self, key: impl Into<String>, value: i64) -> Self {
        self.query(key, value.to_string())
    }

    /// Set a boolean query parameter.
    pub fn query_bool(self, key: impl Into<String>, value: bool) -> Self {
        self.query(key, value.to_string())
    }

    /// Set a floating-point query parameter.
    pub fn query_float(self, key: impl Into<String>, value: f64) -> Self {
        self.query(key, format_float(value))
    }

    // ========== Lifetime & Interceptors ==========

    /// Bound the call (including reading the response body) by `duration`.
    ///
    /// Calling it again nests a further deadline inside the current one.
    pub fn timeout(mut self, duration: Duration) -> Self {
        let (ctx, cancel) = self.ctx.with_timeout(duration);
        self.ctx = ctx;
        self.cancel = Some(match self.cancel.take() {
            Some(outer) => cancel.and(outer),
            None => cancel,
        });
        self
    }

    /// Wrap the transport for this call only; `middleware` becomes the
    /// outermost interceptor.
    pub fn with_middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.transport = middleware.wrap(self.transport);
        self
    }

    // ========== Inspection ==========

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The headers set so far.
    pub fn headers_ref(&self) -> &HeaderMap {
        &self.headers
    }

    /// The context the call will run under.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The URL the call would target right now.
    pub fn url(&self) -> Url {
        let mut url = self.url.clone();
        url.set_path(&self.path);
        if self.query.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(&self.query);
        }
        url
    }

    pub(crate) fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    /// Split into the transport-facing call and the body choice.
    ///
    /// A recorded builder error releases the guard and is returned instead.
    pub(crate) fn into_call(self) -> Result<(Call, P)> {
        let url = self.url();
        let RequestBuilder {
            transport,
            ctx,
            cancel,
            method,
            headers,
            error,
            payload,
            ..
        } = self;

        if let Some(err) = error {
            if let Some(cancel) = cancel {
                cancel.cancel();
            }
            return Err(err);
        }

        let call = Call {
            transport,
            ctx,
            cancel,
            method,
            url,
            headers,
        };
        Ok((call, payload))
    }
}

impl RequestBuilder<Payload> {
    /// Send `value` as a JSON body.
    ///
    /// Serialization happens during `send`, streamed straight into the
    /// request body; a serialization failure becomes the call's error.
    pub fn json<T>(mut self, value: T) -> Self
    where
        T: Serialize + Send + 'static,
    {
        let encode: JsonEncoder = Box::new(move |out: &mut dyn Write| serde_json::to_writer(out, &value));
        self.payload_mut().kind = PayloadKind::Json(encode);
        self.header(CONTENT_TYPE, APPLICATION_JSON)
    }

    /// Set a url-encoded form field; the last value set for a key wins.
    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let payload = self.payload_mut();
        if !matches!(payload.kind, PayloadKind::Form(_)) {
            payload.kind = PayloadKind::Form(BTreeMap::new());
        }
        if let PayloadKind::Form(fields) = &mut payload.kind {
            fields.insert(key.into(), value.into());
        }
        self.header(CONTENT_TYPE, APPLICATION_FORM)
    }

    /// Send a caller-supplied body with an explicit content type.
    pub fn body(mut self, body: impl Into<Body>, content_type: &str) -> Self {
        self.payload_mut().kind = PayloadKind::Raw(body.into());
        self.header(CONTENT_TYPE, content_type)
    }

    /// Materialize the body and perform the call.
    pub async fn send(self) -> Result<Response> {
        let (call, payload) = self.into_call()?;

        match payload.kind {
            PayloadKind::None => call.dispatch(Body::empty(), None).await,
            PayloadKind::Raw(body) => call.dispatch(body, None).await,
            PayloadKind::Form(fields) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&fields)
                    .finish();
                call.dispatch(Body::from(encoded), None).await
            }
            PayloadKind::Json(encode) => {
                let (writer, reader) = pipe();
                let monitor = reader.monitor();
                spawn_json_producer(call.ctx.clone(), encode, writer);
                call.dispatch(Body::from_stream(reader), Some(monitor)).await
            }
        }
    }
}

/// A fully configured call, ready for a body.
pub(crate) struct Call {
    transport: BoxTransport,
    ctx: Context,
    cancel: Option<CancelFn>,
    method: Method,
    url: Url,
    headers: HeaderMap,
}

impl Call {
    pub(crate) fn context(&self) -> &Context {
        &self.ctx
    }

    /// Invoke the transport under the call's context.
    ///
    /// `producer` reports the failure a body producer closed its pipe with;
    /// that error takes precedence over the transport's wrapped version of it.
    pub(crate) async fn dispatch(self, body: Body, producer: Option<PipeMonitor>) -> Result<Response> {
        let Call {
            transport,
            ctx,
            cancel,
            method,
            url,
            headers,
        } = self;

        let built = http::Request::builder()
            .method(method)
            .uri(url.as_str())
            .body(body);
        let mut request = match built {
            Ok(request) => request,
            Err(err) => {
                if let Some(cancel) = cancel {
                    cancel.cancel();
                }
                return Err(err.into());
            }
        };
        *request.headers_mut() = headers;
        request.extensions_mut().insert(ctx.clone());

        let outcome = tokio::select! {
            biased;
            err = ctx.done() => Err(err),
            result = transport.send(request) => result,
        };

        match outcome {
            Ok(response) => Ok(response.map(|body| body.bind(&ctx, cancel))),
            Err(err) => {
                if let Some(cancel) = cancel {
                    cancel.cancel();
                }
                let err = producer.and_then(|p| p.failure()).unwrap_or(err);
                tracing::debug!(url = %url, error = %err, "call failed before a response arrived");
                Err(err)
            }
        }
    }
}

/// Serialize a JSON body on the blocking pool, straight into the pipe.
///
/// serde serializers are synchronous, so the producer runs on a blocking
/// thread and hands chunks over with blocking sends.
fn spawn_json_producer(ctx: Context, encode: JsonEncoder, writer: PipeWriter) {
    tokio::task::spawn_blocking(move || {
        let outcome = match ctx.err() {
            Some(err) => Err(err),
            None => encode_json(&ctx, encode, &writer),
        };

        match outcome {
            Ok(()) => {
                tracing::debug!("json producer finished");
                writer.close();
            }
            Err(Error::ClosedPipe) => tracing::debug!("json consumer stopped reading"),
            Err(err) => {
                tracing::warn!(error = %err, "json producer aborted");
                writer.blocking_close_with_error(err);
            }
        }
    });
}

fn encode_json(ctx: &Context, encode: JsonEncoder, writer: &PipeWriter) -> Result<()> {
    let mut sink = PipeSink {
        ctx,
        writer,
        failure: None,
    };
    let mut buffered = io::BufWriter::with_capacity(COPY_BUFFER_SIZE, &mut sink);
    let result = encode(&mut buffered)
        .map_err(Error::json)
        .and_then(|()| buffered.flush().map_err(Error::io));
    // Nothing more may reach the pipe once encoding stopped.
    let _ = buffered.into_parts();

    match (result, sink.failure.take()) {
        (Ok(()), _) => Ok(()),
        (Err(_), Some(cause)) => Err(cause),
        (Err(err), None) => Err(err),
    }
}

/// Synchronous writer over a pipe that stops once the context ends.
struct PipeSink<'a> {
    ctx: &'a Context,
    writer: &'a PipeWriter,
    failure: Option<Error>,
}

impl Write for PipeSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(err) = self.ctx.err() {
            let message = err.to_string();
            self.failure = Some(err);
            return Err(io::Error::other(message));
        }
        match self.writer.blocking_write(Bytes::copy_from_slice(buf)) {
            Ok(()) => Ok(buf.len()),
            Err(err) => {
                self.failure = Some(err);
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "request body closed"))
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
