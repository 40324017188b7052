//! HTTP header map with case-insensitive name lookup.
//!
//! Names are folded to lowercase on the way in, so lookup is case-insensitive
//! per [RFC 9110 §5.1]. A name that appears more than once keeps a single
//! entry whose values are joined with `,` (RFC 9110 §5.3). Values are
//! decoded byte-for-byte as Latin-1, so no input byte is rejected or lost.

use std::collections::HashMap;
use std::fmt;

use super::request::ParseError;

const CRLF: &[u8] = b"\r\n";

/// A case-insensitive HTTP header map.
///
/// # Examples
///
/// ```
/// use tcphttp::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Accept", "text/html");
/// headers.insert("accept", "application/json");
///
/// assert_eq!(headers.get("ACCEPT"), Some("text/html,application/json"));
/// assert_eq!(headers.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses at most one header line from the front of `data`.
    ///
    /// Returns `(consumed, done)`:
    ///
    /// - `(0, false)` — no complete line yet, call again with more bytes.
    /// - `(2, true)` — the blank line that ends the header section.
    /// - `(n, false)` — one field line of `n` bytes (CRLF included) was merged.
    ///
    /// # Errors
    ///
    /// Any malformed field line is reported as a [`ParseError`] and nothing is
    /// inserted for it.
    pub fn parse_line(&mut self, data: &[u8]) -> Result<(usize, bool), ParseError> {
        let Some(end) = find_crlf(data) else {
            return Ok((0, false));
        };
        if end == 0 {
            return Ok((CRLF.len(), true));
        }

        let line = &data[..end];
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(ParseError::MissingColon)?;

        let raw_name = &line[..colon];
        if raw_name.last().is_some_and(u8::is_ascii_whitespace) {
            return Err(ParseError::SpaceBeforeColon);
        }

        let name = raw_name.trim_ascii();
        if name.is_empty() {
            return Err(ParseError::EmptyHeaderName);
        }
        if let Some(&bad) = name.iter().find(|&&b| !is_token_char(b)) {
            return Err(ParseError::InvalidHeaderCharacter(char::from(bad)));
        }

        let value = decode_latin1(line[colon + 1..].trim_ascii());
        self.insert(decode_latin1(name), value);
        Ok((end + CRLF.len(), false))
    }

    /// Adds a header, joining onto an existing value with `,` if the name is
    /// already present.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        let key = name.as_ref().to_ascii_lowercase();
        let value = value.as_ref();
        self.inner
            .entry(key)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }

    /// Sets a header, replacing any existing value.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.inner
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Returns the value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Removes the header with the given name. Returns the removed value, if any.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.inner.remove(&name.to_ascii_lowercase())
    }

    /// Returns `true` if the map contains the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_ascii_lowercase())
    }

    /// Returns the number of distinct header names.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over `(lowercase name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{}: {value}\r\n", canonical_name(name))?;
        }
        Ok(())
    }
}

/// Returns `true` if `b` is an RFC 9110 `tchar`.
pub fn is_token_char(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'|' | b'~' | b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z'
    )
}

/// Renders a header name in `Title-Case`, e.g. `content-type` → `Content-Type`.
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

/// Decodes bytes as Latin-1: each byte becomes the `char` of the same value.
///
/// Field values may carry `obs-text` (0x80-0xFF), which has no UTF-8 meaning.
pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_single_header() {
        let mut h = Headers::new();
        let data = b"Host: localhost:42069\r\n\r\n";
        let (n, done) = h.parse_line(data).unwrap();
        assert_eq!(h.get("host"), Some("localhost:42069"));
        assert_eq!(n, 23);
        assert!(!done);
    }

    #[test]
    fn surrounding_whitespace_trimmed() {
        let mut h = Headers::new();
        let (n, done) = h.parse_line(b"       Host:   localhost:42069    \r\n\r\n").unwrap();
        assert_eq!(h.get("Host"), Some("localhost:42069"));
        assert_eq!(n, 36);
        assert!(!done);
    }

    #[test]
    fn internal_value_whitespace_kept() {
        let mut h = Headers::new();
        h.parse_line(b"User-Agent: curl/8.0  (x86_64)\r\n").unwrap();
        assert_eq!(h.get("user-agent"), Some("curl/8.0  (x86_64)"));
    }

    #[test]
    fn existing_headers_kept() {
        let mut h = Headers::new();
        h.insert("host", "existing");
        h.parse_line(b"User-Agent: curl\r\n").unwrap();
        assert_eq!(h.get("host"), Some("existing"));
        assert_eq!(h.get("user-agent"), Some("curl"));
    }

    #[test]
    fn blank_line_is_done() {
        let mut h = Headers::new();
        let (n, done) = h.parse_line(b"\r\nbody").unwrap();
        assert_eq!(n, 2);
        assert!(done);
        assert!(h.is_empty());
    }

    #[test]
    fn incomplete_line_needs_more() {
        let mut h = Headers::new();
        assert_eq!(h.parse_line(b"Host: local").unwrap(), (0, false));
        assert_eq!(h.parse_line(b"").unwrap(), (0, false));
        assert_eq!(h.parse_line(b"\r").unwrap(), (0, false));
        assert!(h.is_empty());
    }

    #[test]
    fn space_before_colon_rejected() {
        let mut h = Headers::new();
        let err = h.parse_line(b"       Host : localhost:42069       \r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::SpaceBeforeColon));
        assert!(err.to_string().contains("space before colon"));
        assert!(h.is_empty());
    }

    #[test]
    fn missing_colon_rejected() {
        let mut h = Headers::new();
        let err = h.parse_line(b"Host localhost\r\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingColon));
    }

    #[test]
    fn empty_name_rejected() {
        let mut h = Headers::new();
        assert!(matches!(
            h.parse_line(b": value\r\n"),
            Err(ParseError::EmptyHeaderName)
        ));
    }

    #[test]
    fn invalid_character_rejected() {
        let mut h = Headers::new();
        let err = h.parse_line(b"H\xc2\xa9st: localhost:42069\r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidHeaderCharacter(_)));
        assert!(err.to_string().contains("invalid character"));
        assert!(h.is_empty());

        let err = h.parse_line(b"Ho{st: x\r\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidHeaderCharacter('{')));
    }

    #[test]
    fn obs_text_value_decoded_as_latin1() {
        let mut h = Headers::new();
        let (n, done) = h.parse_line(b"X-Name: caf\xe9\r\n").unwrap();
        assert_eq!((n, done), (14, false));
        assert_eq!(h.get("x-name"), Some("caf\u{e9}"));
    }

    #[test]
    fn uppercase_name_folded() {
        let mut h = Headers::new();
        h.parse_line(b"CONTENT-TYPE: text/plain\r\n").unwrap();
        assert_eq!(h.iter().next(), Some(("content-type", "text/plain")));
    }

    #[test]
    fn repeated_name_comma_joined() {
        let mut h = Headers::new();
        let data = b"Set-Person: lane-loves-go\r\nSet-Person: prime-loves-zig\r\nSet-Person: tj-loves-ocaml\r\n\r\n";
        let mut offset = 0;
        loop {
            let (n, done) = h.parse_line(&data[offset..]).unwrap();
            offset += n;
            if done {
                break;
            }
        }
        assert_eq!(offset, data.len());
        assert_eq!(
            h.get("set-person"),
            Some("lane-loves-go,prime-loves-zig,tj-loves-ocaml")
        );
    }

    #[test]
    fn set_replaces() {
        let mut h = Headers::new();
        h.insert("Content-Type", "text/plain");
        h.set("content-type", "text/html");
        assert_eq!(h.get("Content-Type"), Some("text/html"));
        assert_eq!(h.remove("CONTENT-TYPE").as_deref(), Some("text/html"));
        assert!(!h.contains("content-type"));
    }

    #[test]
    fn token_chars() {
        for b in b"azAZ09!#$%&'*+-.^_`|~" {
            assert!(is_token_char(*b), "{} should be a tchar", *b as char);
        }
        for b in b" :\"(),/;<=>?@[\\]{}\t\x7f" {
            assert!(!is_token_char(*b), "{} should not be a tchar", *b as char);
        }
    }

    #[test]
    fn canonical_names() {
        assert_eq!(canonical_name("content-type"), "Content-Type");
        assert_eq!(canonical_name("CONNECTION"), "Connection");
        assert_eq!(canonical_name("x-request-id"), "X-Request-Id");
    }
}
