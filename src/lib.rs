#![warn(missing_docs)]

//! # Streamline-HTTP: a fluent, streaming HTTP client
//!
//! This crate wraps a base HTTP transport with a fluent request builder, a
//! composable interceptor chain, and memory-bounded streaming uploads.
//!
//! ## Key Features
//!
//! - **Fluent builders**: path placeholders, typed query parameters, headers, cookies
//! - **Streaming bodies**: JSON and multipart bodies are produced while the
//!   transport reads them, through an unbuffered [`pipe`]
//! - **Timeouts that outlive the call**: the cancellation guard of a
//!   [`timeout`](RequestBuilder::timeout) is attached to the response body and
//!   released when the body is closed or dropped
//! - **Interceptors**: any `tower::Layer` over a [`BoxTransport`](transport::BoxTransport),
//!   plus ready-made logging, concurrency-limit, and progress layers
//! - **Cancellation**: every call runs under a [`Context`]; cancelling it
//!   aborts the call and any body still being produced
//!
//! ## Client Usage
//!
//! ```no_run
//! use streamline_http::{Client, Context};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("https://api.example.com/v1")?;
//!     let ctx = Context::background();
//!
//!     let response = client
//!         .post(&ctx, "/projects/{id}/tasks")
//!         .path_int("id", 7)
//!         .json(json!({ "title": "write docs" }))
//!         .timeout(Duration::from_secs(10))
//!         .send()
//!         .await?;
//!
//!     println!("{}", response.status());
//!     println!("{}", response.into_body().text().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming Uploads
//!
//! ```no_run
//! use streamline_http::{Client, Context};
//!
//! # async fn run() -> streamline_http::Result<()> {
//! let client = Client::new("https://uploads.example.com")?;
//! let video = tokio::fs::File::open("talk.mp4").await?;
//!
//! // The file is never held in memory; it is copied through a 32 KiB buffer.
//! client
//!     .multipart(&Context::background(), "/media")
//!     .field("title", "Conference talk")
//!     .file("video", "talk.mp4", video)
//!     .send()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - **[client]** - Client, request builders, and configuration
//! - **[transport]** - Transport trait, interceptor chain, and built-in layers
//! - **[context]** - Cancellation and deadline propagation
//! - **[body]** - Request and response bodies
//! - **[pipe]** - Unbuffered producer/consumer byte channel
//! - **[error]** - Error types and result handling

pub mod body;
pub mod client;
pub mod context;
pub mod error;
pub mod pipe;
pub mod transport;

pub use body::Body;
pub use client::{Client, ClientBuilder, ClientConfig, MultipartBuilder, RequestBuilder};
pub use context::{CancelFn, Context};
pub use error::{Error, Result};

/// A request as seen by transports and middleware.
pub type Request = http::Request<Body>;

/// A response as produced by transports and middleware.
pub type Response = http::Response<Body>;

#[cfg(test)]
mod tests;
