//! Streaming `multipart/form-data` uploads.
//!
//! Parts are never assembled in memory. On `send`, a producer task encodes
//! the ordered fields straight into a [`pipe`](crate::pipe), while the
//! transport streams the read side as the request body. File contents are
//! copied through a single [`COPY_BUFFER_SIZE`] buffer, so memory stays
//! bounded regardless of file size.
//!
//! The producer stops at the first failure (an unreadable source, an ended
//! context) and closes the pipe with that error, which `send` then returns.

use super::request::RequestBuilder;
use super::utils::{escape_quotes, format_float};
use crate::body::{Body, COPY_BUFFER_SIZE};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::pipe::{pipe, PipeWriter};
use crate::Response;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use std::fmt;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

/// Content type of every file part.
pub const FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Builder for a streaming multipart request.
///
/// Shares every path, query, header, cookie, timeout, and interceptor setter
/// with [`RequestBuilder`]; adds ordered text fields and file parts.
///
/// # Examples
///
/// ```no_run
/// use streamline_http::{Client, Context};
///
/// # async fn run() -> streamline_http::Result<()> {
/// let client = Client::new("https://uploads.example.com")?;
/// let file = tokio::fs::File::open("report.pdf").await?;
///
/// let response = client
///     .multipart(&Context::background(), "/documents")
///     .field("title", "Quarterly report")
///     .field_int("revision", 3)
///     .file("document", "report.pdf", file)
///     .send()
///     .await?;
/// # let _ = response;
/// # Ok(())
/// # }
/// ```
pub type MultipartBuilder = RequestBuilder<MultipartForm>;

/// Ordered multipart fields, encoded lazily on send.
#[derive(Default)]
pub struct MultipartForm {
    fields: Vec<Field>,
}

enum Field {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        source: Pin<Box<dyn AsyncRead + Send>>,
    },
}

impl MultipartForm {
    /// Number of fields added so far.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when no field was added.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode every field into `writer`, then close or fail the pipe.
    async fn produce(self, ctx: Context, mut writer: MultipartWriter) {
        let count = self.fields.len();
        let result = self.encode(&ctx, &mut writer).await;
        let pipe = writer.into_pipe();

        match result {
            Ok(()) => {
                tracing::debug!(fields = count, "multipart producer finished");
                pipe.close();
            }
            Err(Error::ClosedPipe) => tracing::debug!("multipart consumer stopped reading"),
            Err(err) => {
                tracing::warn!(error = %err, "multipart producer aborted");
                pipe.close_with_error(err).await;
            }
        }
    }

    async fn encode(self, ctx: &Context, writer: &mut MultipartWriter) -> Result<()> {
        for field in self.fields {
            if let Some(err) = ctx.err() {
                return Err(err);
            }
            match field {
                Field::Text { name, value } => writer.write_field(&name, &value).await?,
                Field::File {
                    name,
                    filename,
                    mut source,
                } => {
                    writer.create_form_file(&name, &filename).await?;
                    let copied = writer.copy_from(&mut source).await?;
                    tracing::trace!(field = %name, bytes = copied, "file part written");
                }
            }
        }
        writer.close().await
    }
}

impl fmt::Debug for MultipartForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .fields
            .iter()
            .map(|field| match field {
                Field::Text { name, .. } | Field::File { name, .. } => name.as_str(),
            })
            .collect();
        f.debug_struct("MultipartForm").field("fields", &names).finish()
    }
}

impl RequestBuilder<MultipartForm> {
    /// Append a text field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload_mut().fields.push(Field::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Append an integer field.
    pub fn field_int(self, name: impl Into<String>, value: i64) -> Self {
        self.field(name, value.to_string())
    }

    /// Append a boolean field.
    pub fn field_bool(self, name: impl Into<String>, value: bool) -> Self {
        self.field(name, value.to_string())
    }

    /// Append a floating-point field.
    pub fn field_float(self, name: impl Into<String>, value: f64) -> Self {
        self.field(name, format_float(value))
    }

    /// Append a file part whose contents are read from `source` during send.
    pub fn file<R>(mut self, name: impl Into<String>, filename: impl Into<String>, source: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        self.payload_mut().fields.push(Field::File {
            name: name.into(),
            filename: filename.into(),
            source: Box::pin(source),
        });
        self
    }

    /// Perform the call, streaming the encoded form as the request body.
    pub async fn send(self) -> Result<Response> {
        let boundary = new_boundary();
        let content_type = format!("multipart/form-data; boundary={boundary}");
        let (call, form) = self.header(CONTENT_TYPE, content_type).into_call()?;

        let (writer, reader) = pipe();
        let monitor = reader.monitor();
        tokio::spawn(form.produce(call.context().clone(), MultipartWriter::new(writer, boundary)));

        call.dispatch(Body::from_stream(reader), Some(monitor)).await
    }
}

fn new_boundary() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Encodes parts onto a pipe in `multipart/form-data` framing.
struct MultipartWriter {
    pipe: PipeWriter,
    boundary: String,
    wrote_part: bool,
    buffer: Box<[u8]>,
}

impl MultipartWriter {
    fn new(pipe: PipeWriter, boundary: String) -> Self {
        Self {
            pipe,
            boundary,
            wrote_part: false,
            buffer: vec![0; COPY_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    fn part_header(&mut self, disposition: &str, content_type: Option<&str>) -> String {
        let mut head = String::new();
        if self.wrote_part {
            head.push_str("\r\n");
        }
        self.wrote_part = true;
        head.push_str(&format!("--{}\r\n", self.boundary));
        head.push_str(&format!("Content-Disposition: {disposition}\r\n"));
        if let Some(content_type) = content_type {
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        head.push_str("\r\n");
        head
    }

    async fn write_field(&mut self, name: &str, value: &str) -> Result<()> {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(name));
        let mut part = self.part_header(&disposition, None);
        part.push_str(value);
        self.pipe.write(Bytes::from(part)).await
    }

    async fn create_form_file(&mut self, name: &str, filename: &str) -> Result<()> {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(name),
            escape_quotes(filename)
        );
        let head = self.part_header(&disposition, Some(FILE_CONTENT_TYPE));
        self.pipe.write(Bytes::from(head)).await
    }

    /// Copy `source` to the pipe until end of input.
    async fn copy_from(&mut self, source: &mut Pin<Box<dyn AsyncRead + Send>>) -> Result<u64> {
        let mut copied = 0u64;
        loop {
            let n = source.read(&mut self.buffer).await.map_err(Error::io)?;
            if n == 0 {
                return Ok(copied);
            }
            self.pipe
                .write(Bytes::copy_from_slice(&self.buffer[..n]))
                .await?;
            copied += n as u64;
        }
    }

    async fn close(&mut self) -> Result<()> {
        let tail = if self.wrote_part {
            format!("\r\n--{}--\r\n", self.boundary)
        } else {
            format!("--{}--\r\n", self.boundary)
        };
        self.pipe.write(Bytes::from(tail)).await
    }

    fn into_pipe(self) -> PipeWriter {
        self.pipe
    }
}
