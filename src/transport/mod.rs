//! Transports and the interceptor chain.
//!
//! A [`Transport`] sends one request and yields one response. The base
//! primitive ([`ReqwestTransport`], or any `tower` service through
//! [`ServiceTransport`]) is wrapped by zero or more [`Middleware`] layers.
//!
//! # Composition order
//!
//! [`compose`] folds left to right, each middleware wrapping the transport
//! built so far:
//!
//! ```text
//! t0 = base; t1 = m1(t0); t2 = m2(t1); ... tN = mN(t(N-1))
//! ```
//!
//! The last registered middleware is therefore the outermost one: it sees the
//! request first and the response (or error) last. The first registered
//! middleware sits next to the base transport.
//!
//! # Writing middleware
//!
//! Any `tower::Layer<BoxTransport>` whose service implements [`Transport`] is a
//! [`Middleware`]. For ad-hoc interceptors, [`from_fn`] turns an async closure
//! into one:
//!
//! ```
//! use streamline_http::transport::{from_fn, Next};
//! use streamline_http::Request;
//!
//! let tag = from_fn(|mut req: Request, next: Next| async move {
//!     req.headers_mut().insert("x-trace", "on".parse().unwrap());
//!     next.run(req).await
//! });
//! # let _ = tag;
//! ```

mod limit;
mod logging;
mod progress;
mod reqwest_0_12;

pub use limit::{ConcurrencyLimit, ConcurrencyLimitLayer};
pub use logging::{Logging, LoggingLayer};
pub use progress::{Progress, ProgressLayer};
pub use reqwest_0_12::ReqwestTransport;

use crate::error::{Error, Result};
use crate::{Request, Response};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tower::{Layer, Service, ServiceExt};

/// Sends a request and produces a response.
///
/// Implementations must not treat non-2xx statuses as errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one HTTP exchange.
    async fn send(&self, request: Request) -> Result<Response>;
}

/// Shared, type-erased transport.
pub type BoxTransport = Arc<dyn Transport>;

/// An interceptor constructor: wraps the next transport in a new one.
pub trait Middleware: Send + Sync {
    /// Wrap `next`, returning the new outer transport.
    fn wrap(&self, next: BoxTransport) -> BoxTransport;
}

impl<L> Middleware for L
where
    L: Layer<BoxTransport> + Send + Sync,
    L::Service: Transport + 'static,
{
    fn wrap(&self, next: BoxTransport) -> BoxTransport {
        Arc::new(self.layer(next))
    }
}

/// Shared, type-erased middleware.
pub type BoxMiddleware = Arc<dyn Middleware>;

/// Wrap `base` with `middlewares`, in registration order.
pub fn compose(base: BoxTransport, middlewares: &[BoxMiddleware]) -> BoxTransport {
    middlewares
        .iter()
        .fold(base, |transport, middleware| middleware.wrap(transport))
}

/// Adapts a cloneable `tower` service into a [`Transport`].
///
/// Each call clones the service and drives it with `oneshot`, so readiness
/// is respected without shared mutable state.
#[derive(Clone, Debug)]
pub struct ServiceTransport<S> {
    service: S,
}

impl<S> ServiceTransport<S> {
    /// Wrap `service`.
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Wrap `service` and erase its type.
    pub fn boxed(service: S) -> BoxTransport
    where
        Self: Transport + 'static,
    {
        Arc::new(Self::new(service))
    }
}

#[async_trait]
impl<S> Transport for ServiceTransport<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + Sync,
    S::Future: Send,
{
    async fn send(&self, request: Request) -> Result<Response> {
        self.service.clone().oneshot(request).await
    }
}

/// The remainder of the chain, handed to [`from_fn`] interceptors.
#[derive(Clone)]
pub struct Next {
    inner: BoxTransport,
}

impl Next {
    /// Forward the request to the inner transport.
    pub async fn run(self, request: Request) -> Result<Response> {
        self.inner.send(request).await
    }
}

/// Build a middleware from an async closure `(request, next) -> response`.
pub fn from_fn<F, Fut>(f: F) -> FromFnLayer<F>
where
    F: Fn(Request, Next) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    FromFnLayer { f }
}

/// Layer returned by [`from_fn`].
#[derive(Clone)]
pub struct FromFnLayer<F> {
    f: F,
}

impl<F: Clone> Layer<BoxTransport> for FromFnLayer<F> {
    type Service = FromFn<F>;

    fn layer(&self, inner: BoxTransport) -> Self::Service {
        FromFn {
            f: self.f.clone(),
            next: inner,
        }
    }
}

/// Transport produced by [`FromFnLayer`].
pub struct FromFn<F> {
    f: F,
    next: BoxTransport,
}

#[async_trait]
impl<F, Fut> Transport for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    async fn send(&self, request: Request) -> Result<Response> {
        let next = Next {
            inner: self.next.clone(),
        };
        (self.f)(request, next).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Body;
    use parking_lot::Mutex;
    use tower::service_fn;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn recording_base(journal: Journal) -> BoxTransport {
        ServiceTransport::boxed(service_fn(move |_req: Request| {
            let journal = journal.clone();
            async move {
                journal.lock().push("base".to_string());
                Ok::<_, Error>(http::Response::new(Body::empty()))
            }
        }))
    }

    fn recording_layer(name: &'static str, journal: Journal) -> BoxMiddleware {
        Arc::new(from_fn(move |req: Request, next: Next| {
            let journal = journal.clone();
            async move {
                journal.lock().push(format!("{name}:request"));
                let response = next.run(req).await;
                journal.lock().push(format!("{name}:response"));
                response
            }
        }))
    }

    #[tokio::test]
    async fn test_last_registered_is_outermost() {
        let journal: Journal = Arc::default();
        let transport = compose(
            recording_base(journal.clone()),
            &[
                recording_layer("a", journal.clone()),
                recording_layer("b", journal.clone()),
            ],
        );

        transport
            .send(http::Request::new(Body::empty()))
            .await
            .unwrap();

        assert_eq!(
            *journal.lock(),
            vec!["b:request", "a:request", "base", "a:response", "b:response"]
        );
    }

    #[tokio::test]
    async fn test_compose_without_middleware_is_base() {
        let journal: Journal = Arc::default();
        let transport = compose(recording_base(journal.clone()), &[]);
        transport
            .send(http::Request::new(Body::empty()))
            .await
            .unwrap();
        assert_eq!(*journal.lock(), vec!["base"]);
    }

    #[tokio::test]
    async fn test_errors_pass_through_layers_unchanged() {
        let failing = ServiceTransport::boxed(service_fn(|_req: Request| async {
            Err::<Response, _>(Error::transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )))
        }));
        let journal: Journal = Arc::default();
        let transport = compose(failing, &[recording_layer("a", journal.clone())]);

        let err = transport
            .send(http::Request::new(Body::empty()))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(*journal.lock(), vec!["a:request", "a:response"]);
    }
}
