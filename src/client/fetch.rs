//! The HTTP client: a base URL plus a composed transport.
//!
//! # Examples
//!
//! ## Simple GET request
//!
//! ```no_run
//! use streamline_http::{Client, Context};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("https://api.example.com")?;
//!     let response = client.get(&Context::background(), "/status").send().await?;
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Client with interceptors
//!
//! ```no_run
//! use streamline_http::transport::{from_fn, Next, ProgressLayer};
//! use streamline_http::{Client, Request};
//!
//! # fn run() -> streamline_http::Result<()> {
//! let client = Client::builder("https://api.example.com")
//!     .max_concurrent_requests(8)
//!     .logging(true)
//!     .middleware(ProgressLayer::uploads())
//!     .middleware(from_fn(|mut req: Request, next: Next| async move {
//!         req.headers_mut().insert("x-api-key", "secret".parse().unwrap());
//!         next.run(req).await
//!     }))
//!     .build()?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

use super::config::ClientConfig;
use super::multipart::{MultipartBuilder, MultipartForm};
use super::request::{Payload, RequestBuilder};
use super::utils::join_path;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::transport::{
    compose, BoxMiddleware, BoxTransport, ConcurrencyLimitLayer, LoggingLayer, Middleware,
    ReqwestTransport,
};
use http::Method;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// An HTTP client bound to a base URL.
///
/// Cloning is cheap; clones share the transport chain, including any
/// concurrency limit. A client is safe to use from many tasks at once.
#[derive(Clone)]
pub struct Client {
    base_url: Url,
    transport: BoxTransport,
    config: Arc<ClientConfig>,
}

impl Client {
    /// Create a client over the default reqwest transport.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(ClientConfig::new(base_url))
    }

    /// Create a client from `config`.
    ///
    /// The limiter (when `max_concurrent_requests > 0`) wraps the base
    /// transport first, then the logging interceptor (when enabled).
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        ClientBuilder::from_config(config).build()
    }

    /// Start building a client for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::from_config(ClientConfig::new(base_url))
    }

    /// Create a client over `transport`, wrapped by `middlewares` in order.
    ///
    /// The last middleware is the outermost one.
    pub fn from_transport(
        base_url: &str,
        transport: BoxTransport,
        middlewares: impl IntoIterator<Item = BoxMiddleware>,
    ) -> Result<Self> {
        let mut builder = Self::builder(base_url).transport(transport);
        builder.middlewares.extend(middlewares);
        builder.build()
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The configuration the client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The fully composed transport.
    pub fn transport(&self) -> &BoxTransport {
        &self.transport
    }

    /// Resolve `path` against the base URL, keeping the base query.
    ///
    /// ```
    /// use streamline_http::Client;
    ///
    /// let client = Client::new("https://example.com/api/").unwrap();
    /// assert_eq!(client.url("/users").as_str(), "https://example.com/api/users");
    /// assert_eq!(client.url("").as_str(), "https://example.com/api/");
    /// ```
    pub fn url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&join_path(self.base_url.path(), path));
        url
    }

    /// Start a standard request with an arbitrary method.
    pub fn request(&self, ctx: &Context, method: Method, path: &str) -> RequestBuilder {
        RequestBuilder::new(
            self.transport.clone(),
            ctx,
            method,
            &self.base_url,
            path,
            Payload::default(),
        )
    }

    /// Start a GET request.
    pub fn get(&self, ctx: &Context, path: &str) -> RequestBuilder {
        self.request(ctx, Method::GET, path)
    }

    /// Start a POST request.
    pub fn post(&self, ctx: &Context, path: &str) -> RequestBuilder {
        self.request(ctx, Method::POST, path)
    }

    /// Start a PUT request.
    pub fn put(&self, ctx: &Context, path: &str) -> RequestBuilder {
        self.request(ctx, Method::PUT, path)
    }

    /// Start a PATCH request.
    pub fn patch(&self, ctx: &Context, path: &str) -> RequestBuilder {
        self.request(ctx, Method::PATCH, path)
    }

    /// Start a DELETE request.
    pub fn delete(&self, ctx: &Context, path: &str) -> RequestBuilder {
        self.request(ctx, Method::DELETE, path)
    }

    /// Start a HEAD request.
    pub fn head(&self, ctx: &Context, path: &str) -> RequestBuilder {
        self.request(ctx, Method::HEAD, path)
    }

    /// Start an OPTIONS request.
    pub fn options(&self, ctx: &Context, path: &str) -> RequestBuilder {
        self.request(ctx, Method::OPTIONS, path)
    }

    /// Start a multipart POST request.
    pub fn multipart(&self, ctx: &Context, path: &str) -> MultipartBuilder {
        self.multipart_request(ctx, Method::POST, path)
    }

    /// Start a multipart request with an arbitrary method.
    pub fn multipart_request(&self, ctx: &Context, method: Method, path: &str) -> MultipartBuilder {
        RequestBuilder::new(
            self.transport.clone(),
            ctx,
            method,
            &self.base_url,
            path,
            MultipartForm::default(),
        )
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<BoxTransport>,
    middlewares: Vec<BoxMiddleware>,
}

impl ClientBuilder {
    /// Start from an existing configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            middlewares: Vec::new(),
        }
    }

    /// Use `transport` as the base instead of reqwest.
    ///
    /// Connection settings in the configuration only apply to the default
    /// reqwest transport.
    pub fn transport(mut self, transport: BoxTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Register a middleware; later registrations wrap earlier ones.
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Cap the number of in-flight calls (`0` = unlimited).
    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.config.max_concurrent_requests = limit;
        self
    }

    /// Install the structured-logging interceptor.
    pub fn logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    /// Overall per-exchange timeout enforced by the reqwest transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// `User-Agent` for the reqwest transport.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(agent.into());
        self
    }

    /// Build the client, composing the transport chain.
    pub fn build(self) -> Result<Client> {
        let base_url = parse_base_url(&self.config.base_url)?;

        let base = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::from_config(&self.config)?),
        };

        let mut chain: Vec<BoxMiddleware> = Vec::new();
        if self.config.max_concurrent_requests > 0 {
            chain.push(Arc::new(ConcurrencyLimitLayer::new(
                self.config.max_concurrent_requests,
            )));
        }
        if self.config.enable_logging {
            chain.push(Arc::new(LoggingLayer::new()));
        }
        chain.extend(self.middlewares);

        tracing::debug!(
            base_url = %base_url,
            middlewares = chain.len(),
            "client built"
        );

        Ok(Client {
            base_url,
            transport: compose(base, &chain),
            config: Arc::new(self.config),
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
    }
    Ok(url)
}
