//! HTTP client and request builders.
//!
//! This module provides the fluent client surface:
//!
//! - **Resolve paths** against a base URL, with `{name}` placeholders
//! - **Build requests** with typed query, header, and cookie setters
//! - **Encode bodies** as JSON, url-encoded forms, or raw bytes
//! - **Stream multipart uploads** with memory bounded by one copy buffer
//! - **Bound calls** by a timeout whose guard lives as long as the response body
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── fetch     - Client, ClientBuilder, and verb constructors
//! ├── request   - RequestBuilder and the shared send path
//! ├── multipart - MultipartBuilder and the streaming form encoder
//! ├── config    - Client configuration
//! └── utils     - Utility functions
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Base URL plus composed transport |
//! | [`RequestBuilder`] | Fluent builder for JSON, form, raw, and empty bodies |
//! | [`MultipartBuilder`] | Fluent builder for streaming multipart uploads |
//! | [`ClientConfig`] | Client configuration options |
//!
//! # Examples
//!
//! ## Creating a Client
//!
//! ```
//! use streamline_http::client::{Client, ClientConfig};
//!
//! // Default configuration
//! let client = Client::new("https://api.example.com").unwrap();
//!
//! // Custom configuration
//! let config = ClientConfig {
//!     max_concurrent_requests: 16,
//!     enable_logging: true,
//!     ..ClientConfig::new("https://api.example.com")
//! };
//! let client = Client::with_config(config).unwrap();
//! # let _ = client;
//! ```
//!
//! ## Utility Functions
//!
//! ```
//! use streamline_http::client::{join_path, substitute_placeholder};
//!
//! let path = join_path("/v1/", "/users/{id}");
//! assert_eq!(substitute_placeholder(&path, "id", "42"), "/v1/users/42");
//! ```

mod config;
mod fetch;
mod multipart;
mod request;
mod utils;

pub use config::ClientConfig;
pub use fetch::{Client, ClientBuilder};
pub use multipart::{MultipartBuilder, MultipartForm, FILE_CONTENT_TYPE};
pub use request::{Payload, RequestBuilder, APPLICATION_FORM, APPLICATION_JSON};
pub use utils::*;
