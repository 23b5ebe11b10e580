//! Streaming progress interceptor.

use super::{BoxTransport, Transport};
use crate::error::Result;
use crate::{Body, Request, Response};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tower::Layer;

/// Logs chunk sizes and running totals as bodies stream through.
///
/// Upload progress follows the request body as the transport reads it;
/// download progress follows the response body as the caller reads it.
/// Nothing is buffered: each chunk is observed and passed on.
#[derive(Clone, Copy, Debug)]
pub struct ProgressLayer {
    uploads: bool,
    downloads: bool,
}

impl ProgressLayer {
    /// Track both directions.
    pub fn new() -> Self {
        Self {
            uploads: true,
            downloads: true,
        }
    }

    /// Track request bodies only.
    pub fn uploads() -> Self {
        Self {
            uploads: true,
            downloads: false,
        }
    }

    /// Track response bodies only.
    pub fn downloads() -> Self {
        Self {
            uploads: false,
            downloads: true,
        }
    }
}

impl Default for ProgressLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer<BoxTransport> for ProgressLayer {
    type Service = Progress;

    fn layer(&self, inner: BoxTransport) -> Self::Service {
        Progress {
            next: inner,
            layer: *self,
        }
    }
}

/// Transport produced by [`ProgressLayer`].
pub struct Progress {
    next: BoxTransport,
    layer: ProgressLayer,
}

fn observe(body: Body, direction: &'static str, url: String) -> Body {
    if !body.is_streaming() {
        return body;
    }
    let total = Arc::new(AtomicU64::new(0));
    Body::from_stream(body.inspect_ok(move |chunk| {
        let sent = total.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
        tracing::debug!(direction, url = %url, chunk = chunk.len(), total = sent, "streaming");
    }))
}

#[async_trait]
impl Transport for Progress {
    async fn send(&self, request: Request) -> Result<Response> {
        let url = request.uri().to_string();
        let request = if self.layer.uploads {
            request.map(|body| observe(body, "upload", url.clone()))
        } else {
            request
        };

        let response = self.next.send(request).await?;
        if self.layer.downloads {
            Ok(response.map(|body| observe(body, "download", url)))
        } else {
            Ok(response)
        }
    }
}
