//! Minimal radix-httpd server.
//!
//! ```text
//! cargo run --example hello_world
//! curl http://127.0.0.1:7788/users/42
//! curl -X POST --data 'hi there' http://127.0.0.1:7788/echo
//! curl -X PUT --data-binary @Cargo.toml http://127.0.0.1:7788/upload/Cargo.toml
//! ```
//!
//! Settings come from `RADIX_HTTPD_*` environment variables, logging from `RUST_LOG`.

use radix_httpd::context::Context;
use radix_httpd::handler::Handler;
use radix_httpd::http::{Method, Request, Response, StatusCode};
use radix_httpd::{RouteParams, Router, Server, ServerConfig};
use tracing_subscriber::EnvFilter;

/// Counts upload bytes as they stream in instead of buffering them.
#[derive(Default)]
struct UploadCounter {
    name: String,
    received: usize,
}

impl Handler for UploadCounter {
    fn on_request(&mut self, _request: &Request, params: &RouteParams) {
        self.name = params.get("file").unwrap_or_default().to_owned();
    }

    fn on_body(&mut self, chunk: &[u8]) {
        self.received += chunk.len();
    }

    fn take_response(self: Box<Self>) -> Response {
        Response::new(StatusCode::Created)
            .header("Content-Type", "text/plain")
            .body(format!("stored {} ({} bytes)\n", self.name, self.received))
    }
}

fn build_router() -> Result<Router, radix_httpd::RouteError> {
    let mut router = Router::new();
    router.set_method_not_allowed(true);

    router.get("/", |_ctx: &Context| {
        Response::new(StatusCode::Ok)
            .header("Content-Type", "text/plain")
            .body("Hello, World!\n")
    })?;

    router.get("/users/new", |_ctx: &Context| {
        Response::new(StatusCode::Ok).body("new user form\n")
    })?;

    router.get("/users/:id", |ctx: &Context| {
        let id = ctx.param("id").unwrap_or_default();
        Response::new(StatusCode::Ok)
            .header("Content-Type", "application/json")
            .body(format!(r#"{{"id":"{id}"}}"#))
    })?;

    router.post("/echo", |ctx: &Context| {
        Response::new(StatusCode::Ok).body_bytes(ctx.body().to_vec())
    })?;

    router.get("/static/*", |ctx: &Context| {
        let file = ctx.params().wildcard().unwrap_or_default();
        Response::new(StatusCode::Ok).body(format!("would serve static/{file}\n"))
    })?;

    router.add_route(Method::Put, "/upload/*file", || {
        Box::new(UploadCounter::default()) as Box<dyn Handler>
    })?;

    Ok(router)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let router = build_router()?;
    if let Some(tree) = router.render_tree(Method::Get) {
        tracing::debug!("GET routes:\n{tree}");
    }

    let server = Server::bind_with(ServerConfig::from_env()?, router).await?;
    println!("Listening on http://{}", server.local_addr());
    server.run().await?;
    Ok(())
}
