//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and serves one HTTP/1.1 request per connection
//! through the shared, read-only [`Router`]. At most
//! [`max_connections`](ServerConfig::max_connections) connections are served
//! at a time; further accepts wait until a slot frees up.

mod connection;
mod exchange;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, debug_span, error, info, warn};

use crate::config::{ConfigError, ServerConfig};
use crate::router::Router;

pub use connection::serve_connection;
pub use exchange::Exchange;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use radix_httpd::{Response, Router, Server, StatusCode};
/// use radix_httpd::context::Context;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::new();
///     router.get("/", |_ctx: &Context| Response::new(StatusCode::Ok).body("Hello!"))?;
///
///     let server = Server::bind("127.0.0.1:7788", router).await?;
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Arc<Router>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Binds the server to `addr` with default limits.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>, router: Router) -> Result<Self, ServerError> {
        let config = ServerConfig {
            addr: addr.as_ref().to_owned(),
            ..ServerConfig::default()
        };
        Self::bind_with(config, router).await
    }

    /// Validates `config` and binds to `config.addr`.
    ///
    /// # Errors
    ///
    /// [`ServerError::Config`] for an invalid configuration and
    /// [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind_with(config: ServerConfig, router: Router) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(config.addr.as_str())
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.addr.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            router: Arc::new(router),
            config: Arc::new(config),
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves connections until Ctrl-C.
    ///
    /// # Errors
    ///
    /// See [`run_until`](Self::run_until).
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => {
                    error!(error = %e, "cannot listen for Ctrl-C, serving until killed");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
    }

    /// Serves connections until `shutdown` resolves.
    ///
    /// On shutdown the listener stops accepting, in-flight connections get
    /// [`shutdown_grace_ms`](ServerConfig::shutdown_grace_ms) to finish and
    /// are aborted after that. Accept failures are logged and do not stop
    /// the server.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let slots = Arc::new(Semaphore::new(self.config.max_connections));
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        info!(
            address = %self.local_addr,
            max_connections = self.config.max_connections,
            routes = self.router.len(),
            "radix-httpd listening"
        );

        loop {
            // Take a slot before accepting so a full pool applies backpressure
            // to the listen queue.
            let permit = tokio::select! {
                () = &mut shutdown => break,
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, peer) = tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            while let Some(finished) = tasks.try_join_next() {
                log_task_result(finished);
            }

            debug!(
                peer = %peer,
                available = slots.available_permits(),
                "connection accepted"
            );
            let router = Arc::clone(&self.router);
            let config = Arc::clone(&self.config);
            tasks.spawn(
                async move {
                    let _permit = permit;
                    match serve_connection(stream, &router, &config).await {
                        Ok(()) => debug!("connection closed"),
                        Err(e) => warn!(error = %e, "connection closed with error"),
                    }
                }
                .instrument(debug_span!("connection", peer = %peer)),
            );
        }

        drop(self.listener);
        info!(in_flight = tasks.len(), "shutting down");

        let grace = self.config.shutdown_grace();
        let drained = tokio::time::timeout(grace, async {
            while let Some(finished) = tasks.join_next().await {
                log_task_result(finished);
            }
        })
        .await
        .is_ok();

        if !drained {
            warn!(
                aborted = tasks.len(),
                grace_ms = self.config.shutdown_grace_ms,
                "grace period elapsed, aborting connections"
            );
            tasks.shutdown().await;
        }
        info!("server stopped");
        Ok(())
    }
}

fn log_task_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "connection task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::context::Context;
    use crate::http::{Response, StatusCode};

    fn router() -> Router {
        let mut router = Router::new();
        router
            .get("/users/:id", |ctx: &Context| {
                Response::new(StatusCode::Ok).body(format!("user {}", ctx.param("id").unwrap_or("?")))
            })
            .unwrap();
        router
            .get("/slow", |_ctx: &Context| {
                std::thread::sleep(Duration::from_millis(200));
                Response::new(StatusCode::Ok).body("slow")
            })
            .unwrap();
        router
    }

    async fn request(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    type Running = (
        SocketAddr,
        oneshot::Sender<()>,
        tokio::task::JoinHandle<Result<(), ServerError>>,
    );

    async fn start(config: ServerConfig) -> Running {
        let server = Server::bind_with(config, router()).await.unwrap();
        let addr = server.local_addr();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));
        (addr, tx, handle)
    }

    fn local_config() -> ServerConfig {
        ServerConfig {
            addr: "127.0.0.1:0".into(),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn serves_requests_over_tcp() {
        let (addr, shutdown, handle) = start(local_config()).await;

        let out = request(addr, b"GET /users/7 HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n").await;
        assert_eq!(
            out,
            "HTTP/1.1 200 OK\r\nContent-Length: 6\r\nConnection: close\r\n\r\nuser 7"
        );

        let out = request(addr, b"GET /nope HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));

        shutdown.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn pool_limit_still_serves_every_connection() {
        let config = ServerConfig {
            max_connections: 1,
            ..local_config()
        };
        let (addr, shutdown, handle) = start(config).await;

        let mut clients = JoinSet::new();
        for id in 0..4 {
            clients.spawn(async move {
                let raw = format!("GET /users/{id} HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
                request(addr, raw.as_bytes()).await
            });
        }
        let mut served = 0;
        while let Some(out) = clients.join_next().await {
            assert!(out.unwrap().starts_with("HTTP/1.1 200 OK\r\n"));
            served += 1;
        }
        assert_eq!(served, 4);

        shutdown.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_waits_for_in_flight_connections() {
        let (addr, shutdown, handle) = start(local_config()).await;

        let client = tokio::spawn(request(
            addr,
            b"GET /slow HTTP/1.1\r\nContent-Length: 0\r\n\r\n",
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.send(()).unwrap();

        handle.await.unwrap().unwrap();
        assert!(client.await.unwrap().ends_with("\r\n\r\nslow"));
    }

    #[tokio::test]
    async fn bind_rejects_invalid_config() {
        let config = ServerConfig {
            max_connections: 0,
            ..local_config()
        };
        assert!(matches!(
            Server::bind_with(config, Router::new()).await,
            Err(ServerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn bind_reports_address_in_use() {
        let first = Server::bind("127.0.0.1:0", Router::new()).await.unwrap();
        let taken = first.local_addr().to_string();
        match Server::bind(&taken, Router::new()).await {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr, taken),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("second bind to {taken} succeeded"),
        }
    }
}
