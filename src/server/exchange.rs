//! One request/response exchange: routes parse events to a handler.
//!
//! An [`Exchange`] consumes the [`ParseEvent`]s of a single request in wire
//! order. It assembles the [`Request`], asks the [`Router`] for a handler once
//! the headers are in, streams the body into that handler and, at the end of
//! the message, serializes the handler's [`Response`]. Router misses and parse
//! errors are turned into responses here and never escape as errors.
//!
//! The exchange does no I/O: the serialized response is picked up with
//! [`take_outbound`](Exchange::take_outbound) by whoever owns the socket.

use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::context::RouteParams;
use crate::handler::Handler;
use crate::http::{Method, ParseError, ParseEvent, Request, Response, StatusCode};
use crate::router::Router;

/// Per-connection mediator between the parser, the router and a handler.
pub struct Exchange<'r> {
    router: &'r Router,
    request: Request,
    params: RouteParams,
    handler: Option<Box<dyn Handler>>,
    outbound: Option<BytesMut>,
    done: bool,
}

impl<'r> Exchange<'r> {
    pub fn new(router: &'r Router) -> Self {
        Self {
            router,
            request: Request::default(),
            params: RouteParams::new(),
            handler: None,
            outbound: None,
            done: false,
        }
    }

    /// Handles the next parse event. Events arriving after the exchange is
    /// done are ignored.
    pub fn on_event(&mut self, event: ParseEvent) {
        if self.done {
            return;
        }
        match event {
            ParseEvent::RequestLine {
                method,
                target,
                version,
            } => {
                self.request.set_method(Method::from(method.as_str()));
                self.request.set_target(target);
                self.request.set_version(version);
            }
            ParseEvent::Header { name, value } => self.request.insert_header(name, value),
            ParseEvent::HeadersComplete => self.dispatch(),
            ParseEvent::Body(chunk) => {
                if let Some(handler) = self.handler.as_mut() {
                    handler.on_body(&chunk);
                }
            }
            ParseEvent::MessageComplete => self.finish(),
            ParseEvent::Error(err) => self.reject(&err),
        }
    }

    /// `true` once a response has been produced.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The serialized response, once. Returns `None` before the exchange is
    /// done and on every call after the first.
    pub fn take_outbound(&mut self) -> Option<BytesMut> {
        self.outbound.take()
    }

    /// The request as assembled so far.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Gives up waiting for the rest of the request and answers `408`.
    pub fn time_out(&mut self) {
        if self.done {
            return;
        }
        info!(path = %self.request.path(), "request timed out");
        self.handler = None;
        self.respond(Response::new(StatusCode::RequestTimeout).body("Request Timeout"));
    }

    fn dispatch(&mut self) {
        let method = self.request.method();
        let path = self.request.path();

        let Some(mut handler) = self.router.route(method, path, &mut self.params) else {
            self.not_routed();
            return;
        };
        debug!(%method, path, "route matched");
        handler.on_request(&self.request, &self.params);
        self.handler = Some(handler);
    }

    fn not_routed(&mut self) {
        let method = self.request.method();
        let path = self.request.path();

        if self.router.method_not_allowed() {
            let allowed = self.router.allowed_methods(path);
            if !allowed.is_empty() {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                info!(%method, path, %allow, status = 405, "method not allowed");
                self.respond(Response::new(StatusCode::MethodNotAllowed).header("Allow", allow));
                return;
            }
        }

        info!(%method, path, status = 404, "no route");
        self.respond(Response::new(StatusCode::NotFound));
    }

    fn finish(&mut self) {
        let Some(mut handler) = self.handler.take() else {
            // Headers completed without a handler only when a response
            // has already been produced.
            return;
        };
        handler.on_eom();
        let response = handler.take_response();
        debug!(
            method = %self.request.method(),
            path = %self.request.path(),
            status = response.status(),
            "handler responded"
        );
        self.respond(response);
    }

    fn reject(&mut self, err: &ParseError) {
        warn!(
            status = err.code(),
            error = %err,
            path = %self.request.path(),
            "rejecting malformed request"
        );
        self.handler = None;
        self.respond(Response::new(err.status()).body(err.to_string()));
    }

    fn respond(&mut self, response: Response) {
        self.outbound = Some(response.into_bytes());
        self.done = true;
    }
}
