//! HTTP/1.1 request representation.
//!
//! A [`Request`] starts empty and is filled field by field as the
//! [`Parser`](super::Parser) emits events; handlers only ever see it read-only.

use std::collections::HashMap;

use bytes::BytesMut;

use super::{Headers, Method};

/// An HTTP/1.1 request assembled from parse events.
///
/// # Examples
///
/// ```
/// use radix_httpd::http::{Method, Request};
///
/// let mut request = Request::new(Method::Get, "/hello?name=world", "HTTP/1.1");
/// request.insert_header("Host", "localhost");
///
/// assert_eq!(request.method(), Method::Get);
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name"), Some("world"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    query: Option<String>,
    params: HashMap<String, String>,
    version: String,
    headers: Headers,
    body: BytesMut,
}

impl Request {
    /// Creates a request from its request line.
    ///
    /// `target` is the raw request-target; it is split into path and query
    /// string here.
    pub fn new(method: Method, target: impl Into<String>, version: impl Into<String>) -> Self {
        let mut request = Self {
            method,
            version: version.into(),
            ..Self::default()
        };
        request.set_target(target);
        request
    }

    pub(crate) fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub(crate) fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    pub(crate) fn set_target(&mut self, target: impl Into<String>) {
        let target = target.into();
        let (path, query) = match target.find('?') {
            Some(pos) => (
                target[..pos].to_owned(),
                Some(target[pos + 1..].to_owned()),
            ),
            None => (target.clone(), None),
        };
        self.params = query.as_deref().map(parse_query_string).unwrap_or_default();
        self.path = path;
        self.query = query;
        self.target = target;
    }

    /// Stores a header, replacing any earlier value with the same name.
    pub fn insert_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Appends a chunk of body bytes.
    pub fn append_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the raw request-target exactly as received.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the request path (the target without its query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the version token from the request line, e.g. `HTTP/1.1`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns a parsed query parameter value by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns the body bytes appended so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Parses a URL query string (`key=value&key2=value2`) into a `HashMap`.
///
/// Keys and values have `+` decoded as a space; percent-escapes are left as is.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.replace('+', " ");
            let value = parts.next().unwrap_or("").replace('+', " ");
            Some((key, value))
        })
        .collect()
}
