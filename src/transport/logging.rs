//! Structured request/response logging interceptor.

use super::{BoxTransport, Transport};
use crate::error::Result;
use crate::{Request, Response};
use async_trait::async_trait;
use std::time::Instant;
use tower::Layer;
use tracing::{Instrument, Span};

/// Logs every exchange through `tracing`.
///
/// One `info` event is emitted before the request is forwarded (method, url,
/// headers). After the inner call returns, either an `info` event with the
/// status, duration, and response headers, or an `error` event with the
/// duration and the error.
///
/// Events are emitted inside the span given to [`LoggingLayer::in_span`], or
/// the caller's current span otherwise.
///
/// # Examples
///
/// ```
/// use streamline_http::transport::LoggingLayer;
///
/// let layer = LoggingLayer::new().in_span(tracing::info_span!("billing-api"));
/// # let _ = layer;
/// ```
#[derive(Clone, Debug, Default)]
pub struct LoggingLayer {
    span: Option<Span>,
}

impl LoggingLayer {
    /// Log within the caller's current span.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every exchange within `span`.
    pub fn in_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

impl Layer<BoxTransport> for LoggingLayer {
    type Service = Logging;

    fn layer(&self, inner: BoxTransport) -> Self::Service {
        Logging {
            next: inner,
            span: self.span.clone(),
        }
    }
}

/// Transport produced by [`LoggingLayer`].
pub struct Logging {
    next: BoxTransport,
    span: Option<Span>,
}

impl Logging {
    async fn exchange(&self, request: Request) -> Result<Response> {
        let start = Instant::now();
        let method = request.method().clone();
        let url = request.uri().to_string();

        tracing::info!(
            method = %method,
            url = %url,
            headers = ?request.headers(),
            "HTTP request"
        );

        let result = self.next.send(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => tracing::info!(
                method = %method,
                url = %url,
                status = response.status().as_u16(),
                duration = ?duration,
                headers = ?response.headers(),
                "HTTP response"
            ),
            Err(err) => tracing::error!(
                method = %method,
                url = %url,
                duration = ?duration,
                error = %err,
                "HTTP request failed"
            ),
        }

        result
    }
}

#[async_trait]
impl Transport for Logging {
    async fn send(&self, request: Request) -> Result<Response> {
        match &self.span {
            Some(span) => self.exchange(request).instrument(span.clone()).await,
            None => self.exchange(request).await,
        }
    }
}
