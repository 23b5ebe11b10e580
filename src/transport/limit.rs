//! Bounded-concurrency interceptor.

use super::{BoxTransport, Transport};
use crate::error::{Error, Result};
use crate::{Request, Response};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower::Layer;

/// Caps the number of calls inside the wrapped transport at once.
///
/// All transports produced by one layer share a single pool of slots. A slot
/// is acquired before delegating and released when the inner call returns,
/// on every exit path, because it is held by an RAII permit. A limit of zero
/// turns the layer into a pass-through.
///
/// # Examples
///
/// ```
/// use streamline_http::transport::ConcurrencyLimitLayer;
///
/// let limit = ConcurrencyLimitLayer::new(4);
/// assert_eq!(limit.limit(), 4);
/// assert_eq!(limit.in_flight(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct ConcurrencyLimitLayer {
    limit: usize,
    semaphore: Option<Arc<Semaphore>>,
}

impl ConcurrencyLimitLayer {
    /// A layer admitting at most `limit` concurrent calls (`0` = unlimited).
    pub fn new(limit: usize) -> Self {
        let semaphore = (limit > 0).then(|| Arc::new(Semaphore::new(limit)));
        Self { limit, semaphore }
    }

    /// The configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Calls currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.semaphore
            .as_ref()
            .map_or(0, |s| self.limit - s.available_permits())
    }
}

impl Layer<BoxTransport> for ConcurrencyLimitLayer {
    type Service = ConcurrencyLimit;

    fn layer(&self, inner: BoxTransport) -> Self::Service {
        ConcurrencyLimit {
            next: inner,
            semaphore: self.semaphore.clone(),
        }
    }
}

/// Transport produced by [`ConcurrencyLimitLayer`].
pub struct ConcurrencyLimit {
    next: BoxTransport,
    semaphore: Option<Arc<Semaphore>>,
}

#[async_trait]
impl Transport for ConcurrencyLimit {
    async fn send(&self, request: Request) -> Result<Response> {
        let Some(semaphore) = &self.semaphore else {
            return self.next.send(request).await;
        };

        let _permit = semaphore.acquire().await.map_err(Error::transport)?;
        self.next.send(request).await
    }
}
