//! Incremental HTTP/1.1 request parser.
//!
//! [`Parser`] is an explicit state machine that accepts the request byte
//! stream in arbitrarily sized pieces and reports what it recognised as a
//! sequence of [`ParseEvent`]s:
//!
//! ```text
//!   REQUEST_LINE ──line──▶ HEADERS ──blank line──▶ BODY_CONTENT_LENGTH ──N bytes──▶ COMPLETE
//!        │                    │  └──Content-Length: 0────────────────────────────────▲
//!        └──malformed─────────┴──malformed / no length──▶ ERROR
//! ```
//!
//! Delimiters may be split across [`feed`](Parser::feed) calls; the events
//! produced for a byte stream do not depend on how it was chunked, except that
//! body bytes may arrive in a different number of [`ParseEvent::Body`] pieces.
//!
//! Each [`ParseEvent::Header`] is emitted as soon as its own line is complete,
//! not after the whole header block has arrived. A malformed line later in the
//! block therefore follows the headers already reported with an
//! [`ParseEvent::Error`]. [`ParseEvent::HeadersComplete`] is only emitted once
//! the body framing has been validated, so a request that cannot be framed
//! ends in an error without ever completing its head.
//!
//! A parser handles exactly one request. Bodies must be framed by
//! `Content-Length`; chunked transfer coding is rejected.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use super::StatusCode;

/// Default upper bound on buffered request-line and header bytes (64 KiB).
pub const DEFAULT_MAX_HEAD_SIZE: usize = 64 * 1024;

/// A structural failure detected while parsing a request.
///
/// Every variant maps to the status code the peer should receive, see
/// [`ParseError::status`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed request line: {reason}")]
    MalformedRequestLine { reason: &'static str },

    #[error("malformed header line: {reason}")]
    MalformedHeaderLine { reason: &'static str },

    #[error("invalid Content-Length value {value:?}")]
    InvalidContentLength { value: String },

    #[error("Content-Length header is required")]
    LengthRequired,

    #[error("chunked transfer coding is not supported, Content-Length is required")]
    ChunkedNotSupported,

    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },
}

impl ParseError {
    /// The response status that reports this error.
    ///
    /// Malformed input is `400`-class; well-formed input the server cannot
    /// handle (no length framing) is `501`.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedRequestLine { .. }
            | Self::MalformedHeaderLine { .. }
            | Self::InvalidContentLength { .. } => StatusCode::BadRequest,
            Self::HeadTooLarge { .. } => StatusCode::RequestHeaderFieldsTooLarge,
            Self::LengthRequired | Self::ChunkedNotSupported => StatusCode::NotImplemented,
        }
    }

    /// Numeric form of [`status`](Self::status).
    pub fn code(&self) -> u16 {
        self.status().as_u16()
    }
}

/// Something the parser recognised in the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// A complete request line.
    RequestLine {
        method: String,
        target: String,
        version: String,
    },
    /// One header line, value trimmed of surrounding whitespace.
    Header { name: String, value: String },
    /// The blank line ending the header block was seen and the body length is known.
    HeadersComplete,
    /// The next piece of the body. Never empty.
    Body(Bytes),
    /// The request line, headers and the declared body have all been consumed.
    MessageComplete,
    /// Parsing stopped; no further events follow.
    Error(ParseError),
}

/// Where the parser is within the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    RequestLine,
    Headers,
    BodyContentLength,
    /// Reserved for chunked bodies. Never entered: chunked requests are
    /// rejected at the end of the header block, and feeding here is a no-op.
    BodyChunked,
    Complete,
    Error,
}

/// Incremental, event-emitting request parser. One instance per connection.
///
/// # Examples
///
/// ```
/// use radix_httpd::http::{ParseEvent, Parser};
///
/// let mut parser = Parser::new();
/// let mut events = Vec::new();
/// parser.feed(b"POST /a HTTP/1.1\r\nContent-Le", |e| events.push(e));
/// parser.feed(b"ngth: 2\r\n\r\nhi", |e| events.push(e));
///
/// assert!(parser.is_complete());
/// assert_eq!(events.last(), Some(&ParseEvent::MessageComplete));
/// ```
#[derive(Debug)]
pub struct Parser {
    state: ParserState,
    buffer: BytesMut,
    // Bytes of `buffer` already searched for CRLF without success.
    scanned: usize,
    head_bytes: usize,
    max_head_size: usize,
    declared_length: Option<String>,
    chunked: bool,
    content_length: usize,
    body_delivered: usize,
    error: Option<ParseError>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Creates a parser with the default head size limit.
    pub fn new() -> Self {
        Self::with_max_head_size(DEFAULT_MAX_HEAD_SIZE)
    }

    /// Creates a parser that rejects request heads larger than `max_head_size` bytes.
    pub fn with_max_head_size(max_head_size: usize) -> Self {
        Self {
            state: ParserState::RequestLine,
            buffer: BytesMut::new(),
            scanned: 0,
            head_bytes: 0,
            max_head_size,
            declared_length: None,
            chunked: false,
            content_length: 0,
            body_delivered: 0,
            error: None,
        }
    }

    /// Consumes `data` and passes every event it completes to `emit`, in wire order.
    ///
    /// Never blocks and never needs the caller to reassemble lines. Once the
    /// parser is complete or failed, further input is ignored.
    pub fn feed<F>(&mut self, data: &[u8], mut emit: F)
    where
        F: FnMut(ParseEvent),
    {
        if self.is_finished() {
            return;
        }
        self.buffer.extend_from_slice(data);

        loop {
            let step = match self.state {
                ParserState::RequestLine => self.parse_request_line(&mut emit),
                ParserState::Headers => self.parse_header_line(&mut emit),
                ParserState::BodyContentLength => Ok(self.parse_body(&mut emit)),
                ParserState::BodyChunked | ParserState::Complete | ParserState::Error => {
                    Ok(false)
                }
            };

            match step {
                Ok(true) => continue,
                Ok(false) => return,
                Err(err) => {
                    self.fail(err, &mut emit);
                    return;
                }
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// `true` once the whole message has been consumed.
    pub fn is_complete(&self) -> bool {
        self.state == ParserState::Complete
    }

    /// `true` when further input will be ignored.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            ParserState::Complete | ParserState::Error | ParserState::BodyChunked
        )
    }

    /// The error that stopped the parser, if any.
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Status code of the error that stopped the parser, if any.
    pub fn error_code(&self) -> Option<u16> {
        self.error.as_ref().map(ParseError::code)
    }

    /// Descriptive message of the error that stopped the parser, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// The declared body length, once the header block has been parsed.
    pub fn content_length(&self) -> Option<usize> {
        match self.state {
            ParserState::BodyContentLength | ParserState::Complete => Some(self.content_length),
            _ => None,
        }
    }

    /// Body bytes delivered so far.
    pub fn body_delivered(&self) -> usize {
        self.body_delivered
    }

    fn parse_request_line<F>(&mut self, emit: &mut F) -> Result<bool, ParseError>
    where
        F: FnMut(ParseEvent),
    {
        let Some(line) = self.take_line()? else {
            return Ok(false);
        };

        // Request-Line = Method SP Request-Target SP HTTP-Version
        let (method, rest) = split_once_byte(&line, b' ').ok_or(
            ParseError::MalformedRequestLine {
                reason: "missing method",
            },
        )?;
        let (target, version) = split_once_byte(rest, b' ').ok_or(
            ParseError::MalformedRequestLine {
                reason: "missing request-target",
            },
        )?;
        if method.is_empty() {
            return Err(ParseError::MalformedRequestLine {
                reason: "empty method",
            });
        }
        if target.is_empty() {
            return Err(ParseError::MalformedRequestLine {
                reason: "empty request-target",
            });
        }
        if !method.iter().copied().all(is_token_byte) {
            return Err(ParseError::MalformedRequestLine {
                reason: "method is not a token",
            });
        }
        if !target.iter().all(u8::is_ascii_graphic) {
            return Err(ParseError::MalformedRequestLine {
                reason: "request-target is not visible ASCII",
            });
        }

        emit(ParseEvent::RequestLine {
            method: String::from_utf8_lossy(method).into_owned(),
            target: String::from_utf8_lossy(target).into_owned(),
            version: String::from_utf8_lossy(version).into_owned(),
        });
        self.state = ParserState::Headers;
        Ok(true)
    }

    fn parse_header_line<F>(&mut self, emit: &mut F) -> Result<bool, ParseError>
    where
        F: FnMut(ParseEvent),
    {
        let Some(line) = self.take_line()? else {
            return Ok(false);
        };
        if line.is_empty() {
            // Framing is settled before the head is reported complete.
            let length = self.body_length()?;
            emit(ParseEvent::HeadersComplete);
            return Ok(self.start_body(length, emit));
        }

        let (name, value) = split_once_byte(&line, b':').ok_or(
            ParseError::MalformedHeaderLine {
                reason: "missing colon",
            },
        )?;
        let name = trim_ows(name);
        if name.is_empty() {
            return Err(ParseError::MalformedHeaderLine {
                reason: "empty header name",
            });
        }
        if !name.iter().copied().all(is_token_byte) {
            return Err(ParseError::MalformedHeaderLine {
                reason: "header name is not a token",
            });
        }
        // Values may carry obs-text (0x80..=0xFF); decode without rejecting.
        let name = String::from_utf8_lossy(name).into_owned();
        let value = String::from_utf8_lossy(trim_ows(value)).into_owned();

        if name.eq_ignore_ascii_case("content-length") {
            self.declared_length = Some(value.clone());
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            self.chunked = value.to_ascii_lowercase().contains("chunked");
        }

        emit(ParseEvent::Header { name, value });
        Ok(true)
    }

    // The declared body length, or the reason the request cannot be framed.
    fn body_length(&mut self) -> Result<usize, ParseError> {
        let Some(raw) = self.declared_length.take() else {
            return Err(if self.chunked {
                ParseError::ChunkedNotSupported
            } else {
                ParseError::LengthRequired
            });
        };
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidContentLength { value: raw });
        }
        raw.parse()
            .map_err(|_| ParseError::InvalidContentLength { value: raw.clone() })
    }

    fn start_body<F>(&mut self, length: usize, emit: &mut F) -> bool
    where
        F: FnMut(ParseEvent),
    {
        self.content_length = length;
        self.body_delivered = 0;
        if length == 0 {
            self.finish(emit);
            return false;
        }
        self.state = ParserState::BodyContentLength;
        true
    }

    fn parse_body<F>(&mut self, emit: &mut F) -> bool
    where
        F: FnMut(ParseEvent),
    {
        let wanted = self.content_length - self.body_delivered;
        let available = wanted.min(self.buffer.len());
        if available > 0 {
            let chunk = self.buffer.split_to(available).freeze();
            self.body_delivered += available;
            emit(ParseEvent::Body(chunk));
        }
        if self.body_delivered == self.content_length {
            self.finish(emit);
        }
        false
    }

    fn finish<F>(&mut self, emit: &mut F)
    where
        F: FnMut(ParseEvent),
    {
        self.state = ParserState::Complete;
        // Anything past the declared body belongs to no request we will serve.
        self.buffer.clear();
        emit(ParseEvent::MessageComplete);
    }

    fn fail<F>(&mut self, err: ParseError, emit: &mut F)
    where
        F: FnMut(ParseEvent),
    {
        self.state = ParserState::Error;
        self.buffer.clear();
        self.error = Some(err.clone());
        emit(ParseEvent::Error(err));
    }

    /// Splits the next CRLF-terminated line off the buffer, without the CRLF.
    ///
    /// Returns `Ok(None)` when no terminator has arrived yet.
    fn take_line(&mut self) -> Result<Option<BytesMut>, ParseError> {
        // Back up one byte so a CR left at the end of the last search still pairs.
        let start = self.scanned.saturating_sub(1);
        match find_crlf(&self.buffer[start..]) {
            Some(pos) => {
                let end = start + pos;
                self.head_bytes += end + 2;
                if self.head_bytes > self.max_head_size {
                    return Err(ParseError::HeadTooLarge {
                        limit: self.max_head_size,
                    });
                }
                let mut line = self.buffer.split_to(end + 2);
                line.truncate(end);
                self.scanned = 0;
                Ok(Some(line))
            }
            None => {
                if self.head_bytes + self.buffer.len() > self.max_head_size {
                    return Err(ParseError::HeadTooLarge {
                        limit: self.max_head_size,
                    });
                }
                self.scanned = self.buffer.len();
                Ok(None)
            }
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn split_once_byte(bytes: &[u8], delimiter: u8) -> Option<(&[u8], &[u8])> {
    let pos = bytes.iter().position(|&b| b == delimiter)?;
    Some((&bytes[..pos], &bytes[pos + 1..]))
}

// tchar from RFC 9110 section 5.6.2.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

// Strips optional whitespace (SP / HTAB) from both ends.
fn trim_ows(bytes: &[u8]) -> &[u8] {
    let is_ows = |b: &u8| *b == b' ' || *b == b'\t';
    let start = bytes.iter().position(|b| !is_ows(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_ows(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_chunks(parser: &mut Parser, chunks: &[&[u8]]) -> Vec<ParseEvent> {
        let mut events = Vec::new();
        for chunk in chunks {
            parser.feed(chunk, |e| events.push(e));
        }
        events
    }

    fn feed_all(raw: &[u8]) -> Vec<ParseEvent> {
        feed_chunks(&mut Parser::new(), &[raw])
    }

    fn feed_bytewise(raw: &[u8]) -> Vec<ParseEvent> {
        let mut parser = Parser::new();
        let mut events = Vec::new();
        for byte in raw {
            parser.feed(std::slice::from_ref(byte), |e| events.push(e));
        }
        events
    }

    // Merges adjacent body pieces so event streams from different chunkings compare equal.
    fn coalesce(events: Vec<ParseEvent>) -> Vec<ParseEvent> {
        let mut out: Vec<ParseEvent> = Vec::new();
        for event in events {
            match (out.last_mut(), event) {
                (Some(ParseEvent::Body(prev)), ParseEvent::Body(next)) => {
                    let mut joined = BytesMut::from(&prev[..]);
                    joined.extend_from_slice(&next);
                    *prev = joined.freeze();
                }
                (_, event) => out.push(event),
            }
        }
        out
    }

    fn request_line(method: &str, target: &str, version: &str) -> ParseEvent {
        ParseEvent::RequestLine {
            method: method.into(),
            target: target.into(),
            version: version.into(),
        }
    }

    fn header(name: &str, value: &str) -> ParseEvent {
        ParseEvent::Header {
            name: name.into(),
            value: value.into(),
        }
    }

    const SAMPLES: &[&[u8]] = &[
        b"GET /a HTTP/1.1\r\nHost: x\r\nContent-Length: 3\r\n\r\nabc",
        b"POST /upload HTTP/1.1\r\nContent-Length: 10\r\nX-Trace:  t1 \r\n\r\n0123456789trailing",
        b"GET / HTTP/1.1\r\nContent-Length: 0\r\n\r\n",
        b"GET /only HTTP/1.1\r\n\r\n",
        b"GET /bad HTTP/1.1\r\nno colon here\r\n\r\n",
        b"BROKEN\r\n",
        b"PUT /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
    ];

    #[test]
    fn five_way_split_scenario() {
        let mut parser = Parser::new();
        let events = feed_chunks(
            &mut parser,
            &[
                b"GET /a HT",
                b"TP/1.1\r",
                b"\nHost: x\r\nContent-Len",
                b"gth: 3\r\n\r\na",
                b"bc",
            ],
        );

        assert_eq!(
            coalesce(events),
            vec![
                request_line("GET", "/a", "HTTP/1.1"),
                header("Host", "x"),
                header("Content-Length", "3"),
                ParseEvent::HeadersComplete,
                ParseEvent::Body(Bytes::from_static(b"abc")),
                ParseEvent::MessageComplete,
            ]
        );
        assert!(parser.is_complete());
        assert_eq!(parser.error(), None);
    }

    #[test]
    fn byte_at_a_time_matches_single_chunk() {
        for raw in SAMPLES {
            assert_eq!(
                coalesce(feed_bytewise(raw)),
                coalesce(feed_all(raw)),
                "input {:?}",
                String::from_utf8_lossy(raw)
            );
        }
    }

    #[test]
    fn every_two_way_split_matches_single_chunk() {
        for raw in SAMPLES {
            let whole = coalesce(feed_all(raw));
            for at in 0..=raw.len() {
                let (a, b) = raw.split_at(at);
                let split = coalesce(feed_chunks(&mut Parser::new(), &[a, b]));
                assert_eq!(split, whole, "split at {at}");
            }
        }
    }

    #[test]
    fn missing_content_length_is_501() {
        let mut parser = Parser::new();
        let events = feed_chunks(&mut parser, &[b"GET /only HTTP/1.1\r\n\r\n"]);

        assert_eq!(
            events,
            vec![
                request_line("GET", "/only", "HTTP/1.1"),
                ParseEvent::Error(ParseError::LengthRequired),
            ]
        );
        assert_eq!(parser.state(), ParserState::Error);
        assert_eq!(parser.error_code(), Some(501));
        assert!(!events.contains(&ParseEvent::MessageComplete));
    }

    #[test]
    fn framing_errors_precede_headers_complete() {
        for raw in [
            &b"GET /only HTTP/1.1\r\nHost: x\r\n\r\n"[..],
            b"PUT /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n",
            b"POST /x HTTP/1.1\r\nContent-Length: ten\r\n\r\n",
        ] {
            let events = feed_all(raw);
            assert!(
                !events.contains(&ParseEvent::HeadersComplete),
                "input {:?}",
                String::from_utf8_lossy(raw)
            );
            assert!(matches!(events.last(), Some(ParseEvent::Error(_))));
        }
    }

    #[test]
    fn obs_text_header_value_is_accepted() {
        let events = feed_all(b"GET / HTTP/1.1\r\nX-Name: caf\xe9\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(events[1], header("X-Name", "caf\u{fffd}"));
        assert_eq!(events.last(), Some(&ParseEvent::MessageComplete));
    }

    #[test]
    fn header_name_must_be_a_token() {
        for raw in [
            &b"GET / HTTP/1.1\r\nX Name: v\r\n\r\n"[..],
            b"GET / HTTP/1.1\r\nX-N\xe4me: v\r\n\r\n",
        ] {
            let events = feed_all(raw);
            assert_eq!(
                events.last(),
                Some(&ParseEvent::Error(ParseError::MalformedHeaderLine {
                    reason: "header name is not a token"
                }))
            );
        }
    }

    #[test]
    fn chunked_request_is_rejected_not_mishandled() {
        let events = feed_all(SAMPLES[6]);
        assert_eq!(
            events.last(),
            Some(&ParseEvent::Error(ParseError::ChunkedNotSupported))
        );
        assert_eq!(ParseError::ChunkedNotSupported.code(), 501);
    }

    #[test]
    fn zero_length_completes_without_body_events() {
        let events = feed_all(b"GET / HTTP/1.1\r\nContent-Length: 0\r\n\r\nignored");
        assert_eq!(
            events,
            vec![
                request_line("GET", "/", "HTTP/1.1"),
                header("Content-Length", "0"),
                ParseEvent::HeadersComplete,
                ParseEvent::MessageComplete,
            ]
        );
    }

    #[test]
    fn completes_exactly_when_declared_length_arrives() {
        let mut parser = Parser::new();
        let mut events = Vec::new();
        parser.feed(b"PUT /upload HTTP/1.1\r\nContent-Length: 10\r\n\r\n", |e| {
            events.push(e)
        });
        assert_eq!(events.last(), Some(&ParseEvent::HeadersComplete));
        assert_eq!(parser.content_length(), Some(10));

        parser.feed(b"12345", |e| events.push(e));
        assert_eq!(parser.body_delivered(), 5);
        assert!(!parser.is_complete());

        parser.feed(b"6789", |e| events.push(e));
        assert_eq!(parser.body_delivered(), 9);
        assert!(!parser.is_complete());

        parser.feed(b"0EXTRA", |e| events.push(e));
        assert!(parser.is_complete());

        let body: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::Body(b) => Some(b.to_vec()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(body, b"1234567890");
        assert_eq!(events.last(), Some(&ParseEvent::MessageComplete));
    }

    #[test]
    fn crlf_split_across_feeds() {
        let mut parser = Parser::new();
        let mut events = Vec::new();

        parser.feed(b"GE", |e| events.push(e));
        parser.feed(b"T /abc HT", |e| events.push(e));
        parser.feed(b"TP/1.1\r", |e| events.push(e));
        assert!(events.is_empty());
        parser.feed(b"\n", |e| events.push(e));
        assert_eq!(events, vec![request_line("GET", "/abc", "HTTP/1.1")]);

        parser.feed(b"Host: 127.0.0.1\r", |e| events.push(e));
        assert_eq!(events.len(), 1);
        parser.feed(b"\n", |e| events.push(e));
        assert_eq!(events.last(), Some(&header("Host", "127.0.0.1")));

        parser.feed(b"Content-Length: 0\r\n\r", |e| events.push(e));
        assert_ne!(events.last(), Some(&ParseEvent::HeadersComplete));
        parser.feed(b"\n", |e| events.push(e));
        assert!(parser.is_complete());
    }

    #[test]
    fn header_values_are_trimmed() {
        let events = feed_all(
            b"GET / HTTP/1.1\r\nKey-1:Value1\r\nKey-2: Value2\r\nKey-3:    Value3 \t\r\nKey-4 : v\r\nContent-Length: 0\r\n\r\n",
        );
        assert_eq!(
            events[1..5],
            [
                header("Key-1", "Value1"),
                header("Key-2", "Value2"),
                header("Key-3", "Value3"),
                header("Key-4", "v"),
            ]
        );
    }

    #[test]
    fn malformed_request_lines() {
        for raw in [
            &b"GET\r\n"[..],
            b"GET /path\r\n",
            b" /path HTTP/1.1\r\n",
            b"GET  HTTP/1.1\r\n",
            b"GET /\xff HTTP/1.1\r\n",
        ] {
            let mut parser = Parser::new();
            let events = feed_chunks(&mut parser, &[raw]);
            assert_eq!(events.len(), 1, "input {raw:?}");
            assert!(matches!(
                &events[0],
                ParseEvent::Error(ParseError::MalformedRequestLine { .. })
            ));
            assert_eq!(parser.error_code(), Some(400));
        }
    }

    #[test]
    fn header_without_colon_is_400() {
        let mut parser = Parser::new();
        let events = feed_chunks(&mut parser, &[SAMPLES[4]]);
        assert_eq!(
            events.last(),
            Some(&ParseEvent::Error(ParseError::MalformedHeaderLine {
                reason: "missing colon"
            }))
        );
        assert!(!events.contains(&ParseEvent::HeadersComplete));
        assert_eq!(
            parser.error_message().as_deref(),
            Some("malformed header line: missing colon")
        );
    }

    #[test]
    fn invalid_content_length_is_400() {
        for value in ["abc", "-1", "+5", "", "99999999999999999999999999"] {
            let raw = format!("POST / HTTP/1.1\r\nContent-Length: {value}\r\n\r\n");
            let events = feed_all(raw.as_bytes());
            match events.last() {
                Some(ParseEvent::Error(err @ ParseError::InvalidContentLength { .. })) => {
                    assert_eq!(err.code(), 400)
                }
                other => panic!("value {value:?}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn duplicate_content_length_last_wins() {
        let events = feed_all(b"POST / HTTP/1.1\r\nContent-Length: 9\r\ncontent-length: 2\r\n\r\nhi");
        assert_eq!(events.last(), Some(&ParseEvent::MessageComplete));
    }

    #[test]
    fn oversized_head_is_431_regardless_of_chunking() {
        let mut raw = b"GET / HTTP/1.1\r\nX-Big: ".to_vec();
        raw.extend(std::iter::repeat_n(b'a', 200));
        raw.extend_from_slice(b"\r\nContent-Length: 0\r\n\r\n");

        let whole = feed_chunks(&mut Parser::with_max_head_size(128), &[&raw]);
        let mut bytewise_parser = Parser::with_max_head_size(128);
        let mut bytewise = Vec::new();
        for byte in &raw {
            bytewise_parser.feed(std::slice::from_ref(byte), |e| bytewise.push(e));
        }

        let expected = ParseEvent::Error(ParseError::HeadTooLarge { limit: 128 });
        assert_eq!(whole.last(), Some(&expected));
        assert_eq!(whole, bytewise);
        assert_eq!(expected_status(&whole), Some(431));
    }

    fn expected_status(events: &[ParseEvent]) -> Option<u16> {
        events.iter().find_map(|e| match e {
            ParseEvent::Error(err) => Some(err.code()),
            _ => None,
        })
    }

    #[test]
    fn terminal_states_ignore_further_input() {
        let mut parser = Parser::new();
        let mut events = feed_chunks(&mut parser, &[b"GET / HTTP/1.1\r\nContent-Length: 0\r\n\r\n"]);
        let seen = events.len();
        parser.feed(b"GET /again HTTP/1.1\r\n", |e| events.push(e));
        assert_eq!(events.len(), seen);

        let mut failed = Parser::new();
        let mut errors = feed_chunks(&mut failed, &[b"NOPE\r\n"]);
        failed.feed(b"GET / HTTP/1.1\r\n", |e| errors.push(e));
        assert_eq!(errors.len(), 1);
        assert_eq!(failed.state(), ParserState::Error);
    }

    #[test]
    fn body_events_are_never_empty() {
        let mut parser = Parser::new();
        let mut events = Vec::new();
        parser.feed(b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\n", |e| events.push(e));
        parser.feed(b"", |e| events.push(e));
        parser.feed(b"ab", |e| events.push(e));
        parser.feed(b"", |e| events.push(e));
        parser.feed(b"cd", |e| events.push(e));
        assert!(
            events
                .iter()
                .all(|e| !matches!(e, ParseEvent::Body(b) if b.is_empty()))
        );
        assert_eq!(events.last(), Some(&ParseEvent::MessageComplete));
    }
}
