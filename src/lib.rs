//! # radix-httpd
//!
//! A small HTTP/1.1 server core: an incremental request parser, a radix-tree
//! router and a per-connection mediator that ties the two to a handler.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use radix_httpd::{Response, Router, Server, StatusCode};
//! use radix_httpd::context::Context;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     router.get("/users/:id", |ctx: &Context| {
//!         Response::new(StatusCode::Ok).body(format!("user {}", ctx.param("id").unwrap_or("?")))
//!     })?;
//!
//!     let server = Server::bind("127.0.0.1:7788", router).await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! Each connection carries exactly one request. Request bodies must be framed
//! by `Content-Length`; chunked uploads are answered with `501`.

pub mod config;
pub mod context;
pub mod handler;
pub mod http;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{ConfigError, ServerConfig};
pub use context::{Context, RouteParams};
pub use handler::{Handler, HandlerFactory};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{RouteError, Router};
pub use server::{Server, ServerError};
