//! HTTP/1.1 response builder.
//!
//! Every response starts from [`default_headers`], so it always carries
//! `Content-Length`, `Connection: close` and `Content-Type: text/plain`
//! unless the caller overrides them.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::headers::canonical_name;
use super::{Headers, StatusCode};

/// Returns the headers every response starts with.
pub fn default_headers(content_length: usize) -> Headers {
    let mut headers = Headers::new();
    headers.set("Content-Length", content_length.to_string());
    headers.set("Connection", "close");
    headers.set("Content-Type", "text/plain");
    headers
}

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use tcphttp::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// assert!(text.contains("Content-Type: application/json\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Sets a response header, overriding a default or earlier value of the same name.
    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Sets the response body from a string.
    ///
    /// `Content-Length` is derived from the body by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the body bytes.
    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    pub fn into_bytes(self) -> BytesMut {
        let mut headers = default_headers(self.body.len());
        for (name, value) in self.headers.iter() {
            headers.set(name, value);
        }

        let estimated_size = 128 + headers.len() * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in headers.iter() {
            buf.put(format!("{}: {value}\r\n", canonical_name(name)).as_bytes());
        }

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        buf.put(self.body.as_slice());
        buf
    }

    /// Serializes the response and writes it to `writer`, flushing afterwards.
    ///
    /// # Errors
    ///
    /// Propagates any write error from `writer`.
    pub async fn write_to<W>(self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.into_bytes()).await?;
        writer.flush().await
    }
}
