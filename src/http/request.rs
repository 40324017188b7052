//! Incremental HTTP/1.1 request parsing.
//!
//! [`RequestParser`] is a push parser: hand it whatever bytes have arrived
//! so far and it reports how many it consumed. Bytes it did not consume must
//! be presented again, together with newly read data, on the next call.
//! [`Request::from_reader`] drives a parser from any [`AsyncRead`].

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use super::headers::{decode_latin1, find_crlf};
use super::{Headers, Method, Version};

/// Number of bytes requested from the stream per read.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Errors that can occur while parsing an HTTP/1.1 request.
///
/// Every variant is fatal to the request being parsed. Use
/// [`is_malformed`](Self::is_malformed), [`is_incomplete`](Self::is_incomplete)
/// and [`is_io`](Self::is_io) to tell the three failure classes apart.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid request line: expected 3 parts, got {0}")]
    RequestLineParts(usize),

    #[error("invalid method '{0}': must be all uppercase alphabetic characters")]
    InvalidMethod(String),

    #[error("invalid http version '{0}': only HTTP/1.1 and HTTP/1.0 are supported")]
    UnsupportedVersion(String),

    #[error("invalid header line: missing colon")]
    MissingColon,

    #[error("invalid header line: space before colon")]
    SpaceBeforeColon,

    #[error("invalid header line: empty key")]
    EmptyHeaderName,

    #[error("invalid character '{0}' in header key")]
    InvalidHeaderCharacter(char),

    #[error("invalid Content-Length '{0}': must be a non-negative integer")]
    InvalidContentLength(String),

    #[error("body longer than Content-Length: expected {expected} bytes, got {actual}")]
    BodyOverrun { expected: usize, actual: usize },

    #[error("incomplete request: stream ended before request was fully parsed")]
    Incomplete,

    #[error("failed to read from stream: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// The peer sent bytes that do not form a valid request.
    pub fn is_malformed(&self) -> bool {
        !self.is_incomplete() && !self.is_io()
    }

    /// The stream ended before a full request arrived.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }

    /// Reading from the underlying stream failed.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Where a [`RequestParser`] is in the request grammar.
///
/// Stages only ever move forward, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    AwaitingRequestLine,
    AwaitingHeaders,
    AwaitingBody,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestLine {
    method: Method,
    target: String,
    version: Version,
}

// Each stage past the first carries the request line parsed on entry.
#[derive(Debug)]
enum State {
    RequestLine,
    Headers(RequestLine),
    Body(RequestLine),
    Complete(RequestLine),
}

/// A fully parsed HTTP/1.1 request.
///
/// Only ever produced complete: a parse that fails or runs out of input
/// yields a [`ParseError`] instead.
///
/// # Examples
///
/// ```
/// use tcphttp::http::{Method, Request};
///
/// let raw = b"POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
/// let (request, consumed) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method(), &Method::Post);
/// assert_eq!(request.target(), "/submit");
/// assert_eq!(request.version().as_str(), "1.1");
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// assert_eq!(&request.body()[..], b"hello");
/// assert_eq!(consumed, raw.len());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    target: String,
    version: Version,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Reads exactly one request from `reader`.
    ///
    /// Reads are fed to a [`RequestParser`] as they arrive; bytes following
    /// the declared body are left unread or discarded.
    ///
    /// # Errors
    ///
    /// - [`ParseError::Incomplete`] — the stream ended before the request was complete.
    /// - [`ParseError::Io`] — the read itself failed.
    /// - any other variant — the request is malformed.
    pub async fn from_reader<R>(mut reader: R) -> Result<Self, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        let mut parser = RequestParser::new();
        let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);

        loop {
            buf.reserve(READ_CHUNK_SIZE);
            let bytes_read = reader.read_buf(&mut buf).await?;

            let consumed = parser.feed(&buf)?;
            buf.advance(consumed);
            trace!(bytes_read, consumed, stage = ?parser.stage(), "fed request parser");

            if parser.is_complete() {
                return parser.finish().ok_or(ParseError::Incomplete);
            }
            if bytes_read == 0 {
                return Err(ParseError::Incomplete);
            }
        }
    }

    /// Parses a request held entirely in `buf`.
    ///
    /// Returns the request and the number of bytes it occupied; anything
    /// after that offset is not part of the request.
    ///
    /// # Errors
    ///
    /// [`ParseError::Incomplete`] if `buf` ends before the request does, or
    /// the malformed-input variant describing what is wrong with it.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        let mut parser = RequestParser::new();
        let consumed = parser.feed(buf)?;
        let request = parser.finish().ok_or(ParseError::Incomplete)?;
        Ok((request, consumed))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request target exactly as sent, one `char` per byte.
    ///
    /// The target is not validated; bytes outside ASCII decode as Latin-1,
    /// so every code point is below U+0100 and the original bytes can be
    /// recovered with `target().chars().map(|c| c as u8)`.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        parse_content_length(self.headers.get("content-length")?).ok()
    }
}

/// Incremental state machine turning bytes into a [`Request`].
///
/// ```
/// use tcphttp::http::request::{RequestParser, Stage};
///
/// let mut parser = RequestParser::new();
/// assert_eq!(parser.feed(b"GET / HT").unwrap(), 0);
/// assert_eq!(parser.feed(b"GET / HTTP/1.1\r\nHo").unwrap(), 16);
/// assert_eq!(parser.stage(), Stage::AwaitingHeaders);
/// assert_eq!(parser.feed(b"Host: a\r\n\r\n").unwrap(), 11);
/// assert!(parser.is_complete());
/// ```
#[derive(Debug)]
pub struct RequestParser {
    state: State,
    headers: Headers,
    body: BytesMut,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    /// Creates a parser awaiting a request line.
    pub fn new() -> Self {
        Self {
            state: State::RequestLine,
            headers: Headers::new(),
            body: BytesMut::new(),
        }
    }

    /// Returns the current stage.
    pub fn stage(&self) -> Stage {
        match self.state {
            State::RequestLine => Stage::AwaitingRequestLine,
            State::Headers(_) => Stage::AwaitingHeaders,
            State::Body(_) => Stage::AwaitingBody,
            State::Complete(_) => Stage::Complete,
        }
    }

    /// Returns `true` once a whole request has been parsed.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Complete(_))
    }

    /// Parses as much of `data` as possible and returns how many bytes were consumed.
    ///
    /// The caller must drop the consumed prefix and present the rest again
    /// with any newly received bytes. Once complete, no further bytes are
    /// consumed.
    ///
    /// # Errors
    ///
    /// Any malformed input aborts the parse; the parser must then be discarded.
    pub fn feed(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let mut consumed = 0;
        while !self.is_complete() {
            let before = self.stage();
            let n = self.step(&data[consumed..])?;
            consumed += n;
            // A step that neither consumes nor moves stage is waiting for data.
            if n == 0 && self.stage() == before {
                break;
            }
        }
        Ok(consumed)
    }

    /// Takes the parsed request. Returns `None` unless [`is_complete`](Self::is_complete).
    pub fn finish(self) -> Option<Request> {
        let State::Complete(line) = self.state else {
            return None;
        };
        Some(Request {
            method: line.method,
            target: line.target,
            version: line.version,
            headers: self.headers,
            body: self.body.freeze(),
        })
    }

    fn step(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        match self.stage() {
            Stage::AwaitingRequestLine => {
                let Some((line, n)) = parse_request_line(data)? else {
                    return Ok(0);
                };
                self.state = State::Headers(line);
                Ok(n)
            }
            Stage::AwaitingHeaders => {
                let (n, done) = self.headers.parse_line(data)?;
                if done {
                    self.advance();
                }
                Ok(n)
            }
            Stage::AwaitingBody => self.parse_body(data),
            Stage::Complete => Ok(0),
        }
    }

    fn parse_body(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let expected = match self.headers.get("content-length") {
            Some(value) => parse_content_length(value)?,
            None => 0,
        };

        let remaining = expected.saturating_sub(self.body.len());
        let n = remaining.min(data.len());
        self.body.extend_from_slice(&data[..n]);

        if self.body.len() > expected {
            return Err(ParseError::BodyOverrun {
                expected,
                actual: self.body.len(),
            });
        }
        if self.body.len() == expected {
            self.advance();
        }
        Ok(n)
    }

    // Moves to the next stage, carrying the request line along.
    fn advance(&mut self) {
        self.state = match std::mem::replace(&mut self.state, State::RequestLine) {
            State::Headers(line) => State::Body(line),
            State::Body(line) => State::Complete(line),
            other => other,
        };
    }
}

/// Parses `METHOD SP TARGET SP HTTP-VERSION CRLF` from the front of `data`.
///
/// Returns `None` if no full line has arrived yet.
fn parse_request_line(data: &[u8]) -> Result<Option<(RequestLine, usize)>, ParseError> {
    let Some(end) = find_crlf(data) else {
        return Ok(None);
    };
    let parts: Vec<&[u8]> = data[..end].split(|&b| b == b' ').collect();
    let [method, target, version] = parts[..] else {
        return Err(ParseError::RequestLineParts(parts.len()));
    };

    let method = decode_latin1(method);
    if !Method::is_valid_token(&method) {
        return Err(ParseError::InvalidMethod(method));
    }
    let version: Version = decode_latin1(version).parse()?;
    let method = match method.parse() {
        Ok(m) => m,
        Err(never) => match never {},
    };

    let request_line = RequestLine {
        method,
        target: decode_latin1(target),
        version,
    };
    Ok(Some((request_line, end + 2)))
}

fn parse_content_length(value: &str) -> Result<usize, ParseError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidContentLength(value.to_owned()));
    }
    value
        .parse()
        .map_err(|_| ParseError::InvalidContentLength(value.to_owned()))
}
