//! Base transport over `reqwest` 0.12.

use super::Transport;
use crate::body::BodyParts;
use crate::client::ClientConfig;
use crate::error::{Error, Result};
use crate::{Body, Request, Response};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream};
use futures::TryStreamExt;
use parking_lot::Mutex;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// The base transport primitive, backed by a `reqwest::Client`.
///
/// Connection pooling, TLS, and redirects are all left to reqwest. Request
/// bodies that stream are forwarded chunk by chunk without buffering.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an existing reqwest client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a reqwest client from the connection settings in `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host);

        if let Some(ms) = config.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = config.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        if !config.proxy_url.is_empty() {
            let proxy = reqwest::Proxy::all(&config.proxy_url).map_err(Error::transport)?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(Error::transport)?;
        Ok(Self::new(client))
    }

    /// The wrapped reqwest client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Adds the `Sync` bound reqwest puts on streaming request bodies.
struct SyncStream(Mutex<BoxStream<'static, Result<Bytes>>>);

impl Stream for SyncStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().0.get_mut().as_mut().poll_next(cx)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let (parts, mut body) = request.into_parts();
        let url = reqwest::Url::parse(&parts.uri.to_string())?;

        let mut builder = self
            .client
            .request(parts.method, url)
            .headers(parts.headers);

        builder = match body.take_kind() {
            BodyParts::Empty => builder,
            BodyParts::Full(bytes) => builder.body(bytes),
            BodyParts::Stream(stream) => {
                builder.body(reqwest::Body::wrap_stream(SyncStream(Mutex::new(stream))))
            }
        };

        let response = builder.send().await.map_err(Error::transport)?;

        let mut converted = http::Response::builder()
            .status(response.status())
            .version(response.version());
        if let Some(headers) = converted.headers_mut() {
            *headers = response.headers().clone();
        }

        let stream = response.bytes_stream().map_err(Error::transport);
        Ok(converted.body(Body::from_stream(stream))?)
    }
}
