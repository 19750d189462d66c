//! HTTP/1.1 response builder.
//!
//! Provides a fluent builder API for constructing HTTP responses, in-place
//! setters for handlers that fill a response incrementally, and serialization
//! to a byte buffer for transmission over TCP.

use std::borrow::Cow;

use bytes::{BufMut, BytesMut};

use super::{HTTP_VERSION, Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use radix_httpd::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    reason: Cow<'static, str>,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self::with_reason(status.as_u16(), status.canonical_reason())
    }

    /// Creates a response with an arbitrary status code and reason phrase.
    pub fn with_reason(status: u16, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Sets a response header, replacing an earlier value with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a header in-place.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets the response body from a string.
    ///
    /// `Content-Length` is derived by [`into_bytes`](Self::into_bytes) unless set explicitly.
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

    /// Replaces status code and reason phrase in-place.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status.as_u16();
        self.reason = Cow::Borrowed(status.canonical_reason());
    }

    /// Appends bytes to the body in-place.
    pub fn extend_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    /// Returns the numeric status code of this response.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the reason phrase written on the status line.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns the headers set so far.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body bytes.
    pub fn payload(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Headers are written in the map's iteration order. Two headers are added
    /// only when absent:
    /// - `Content-Length: <body length>`
    /// - `Connection: close` (one exchange is served per connection)
    pub fn into_bytes(mut self) -> BytesMut {
        if !self.headers.contains("content-length") {
            self.headers
                .insert("Content-Length", self.body.len().to_string());
        }
        if !self.headers.contains("connection") {
            self.headers.insert("Connection", "close");
        }

        let estimated_size = 128 + self.headers.len() * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Status line
        buf.put(format!("{HTTP_VERSION} {} {}\r\n", self.status, self.reason).as_bytes());

        // Headers
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        // Body
        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn simple_ok_response() {
        let r = Response::new(StatusCode::Ok).body("Hello");
        let s = to_string(r.into_bytes());
        assert_eq!(
            s,
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nHello"
        );
    }

    #[test]
    fn headers_keep_handler_order() {
        let r = Response::new(StatusCode::Ok)
            .header("X-B", "2")
            .header("X-A", "1")
            .body("ok");
        let s = to_string(r.into_bytes());
        let b = s.find("X-B: 2\r\n").unwrap();
        let a = s.find("X-A: 1\r\n").unwrap();
        assert!(b < a);
    }

    #[test]
    fn explicit_content_length_is_not_recomputed() {
        let r = Response::new(StatusCode::Ok)
            .header("content-length", "99")
            .body("abc");
        let s = to_string(r.into_bytes());
        assert!(s.contains("content-length: 99\r\n"));
        assert!(!s.contains("Content-Length: 3"));
    }

    #[test]
    fn empty_body_still_declares_length() {
        let s = to_string(Response::new(StatusCode::NoContent).into_bytes());
        assert!(s.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(s.contains("Content-Length: 0\r\n"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn custom_reason_phrase() {
        let r = Response::with_reason(299, "Mostly Fine");
        assert_eq!(r.status(), 299);
        assert!(to_string(r.into_bytes()).starts_with("HTTP/1.1 299 Mostly Fine\r\n"));
    }

    #[test]
    fn in_place_setters() {
        let mut r = Response::default();
        r.set_status(StatusCode::MethodNotAllowed);
        r.add_header("Allow", "GET");
        r.extend_body(b"no");
        r.extend_body(b"pe");
        assert_eq!(r.status(), 405);
        assert_eq!(r.reason(), "Method Not Allowed");
        assert_eq!(r.headers().get("allow"), Some("GET"));
        assert_eq!(r.payload(), b"nope");
    }
}
