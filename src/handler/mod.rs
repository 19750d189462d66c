//! Request handlers, the per-request units the router constructs.
//!
//! A [`Handler`] is created fresh for every matched request by the
//! [`HandlerFactory`] stored in the router, receives the request and its body
//! as they are parsed, and finally gives up exactly one [`Response`].
//!
//! Most routes do not need streaming; [`FnHandler`] adapts a plain closure
//! `Fn(&Context) -> Response` by buffering the body and calling the closure
//! once the message is complete.

use std::sync::Arc;

use crate::context::{Context, RouteParams};
use crate::http::{Request, Response};

/// A stateful, single-use request handler.
///
/// Call order is fixed: [`on_request`](Self::on_request) once, then
/// [`on_body`](Self::on_body) for each body chunk in arrival order, then
/// [`on_eom`](Self::on_eom) and [`take_response`](Self::take_response).
///
/// Failures (method not permitted, unavailable resources, ...) are reported
/// by the response the handler builds, never by panicking.
pub trait Handler: Send {
    /// The request line and headers are complete.
    fn on_request(&mut self, request: &Request, params: &RouteParams);

    /// A piece of the request body.
    fn on_body(&mut self, _chunk: &[u8]) {}

    /// The whole body has been delivered.
    fn on_eom(&mut self) {}

    /// Hands over the finished response, consuming the handler.
    fn take_response(self: Box<Self>) -> Response;
}

/// Builds a new handler instance for each matched request.
///
/// Factories are shared by all connections, handlers never are.
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn Handler> + Send + Sync + 'static>;

/// Conversion trait for closure handlers.
///
/// Any `Fn(&Context) -> Response` that is also `Send + Sync + 'static`
/// implements this trait automatically via the blanket impl below.
pub trait IntoResponder: Send + Sync + 'static {
    /// Produce the response for a fully received request.
    fn respond(&self, ctx: &Context) -> Response;
}

impl<T> IntoResponder for T
where
    T: Fn(&Context) -> Response + Send + Sync + 'static,
{
    fn respond(&self, ctx: &Context) -> Response {
        (self)(ctx)
    }
}

/// Buffers the request body and calls a closure at end-of-message.
pub struct FnHandler<R: ?Sized> {
    responder: Arc<R>,
    request: Request,
    params: RouteParams,
    response: Option<Response>,
}

impl<R> FnHandler<R>
where
    R: IntoResponder + ?Sized,
{
    pub fn new(responder: Arc<R>) -> Self {
        Self {
            responder,
            request: Request::default(),
            params: RouteParams::new(),
            response: None,
        }
    }
}

impl<R> Handler for FnHandler<R>
where
    R: IntoResponder + ?Sized,
{
    fn on_request(&mut self, request: &Request, params: &RouteParams) {
        self.request = request.clone();
        self.params = params.clone();
    }

    fn on_body(&mut self, chunk: &[u8]) {
        self.request.append_body(chunk);
    }

    fn on_eom(&mut self) {
        let ctx = Context::new(
            std::mem::take(&mut self.request),
            std::mem::take(&mut self.params),
        );
        self.response = Some(self.responder.respond(&ctx));
    }

    fn take_response(self: Box<Self>) -> Response {
        self.response.unwrap_or_default()
    }
}

/// Wraps a closure into a [`HandlerFactory`] producing [`FnHandler`]s.
pub fn responder_factory(responder: impl IntoResponder) -> HandlerFactory {
    let responder: Arc<dyn IntoResponder> = Arc::new(responder);
    Arc::new(move || Box::new(FnHandler::new(Arc::clone(&responder))) as Box<dyn Handler>)
}
