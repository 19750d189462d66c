//! Drives one connection: read, parse, route, respond, close.
//!
//! Works over any `AsyncRead + AsyncWrite` stream so the full lifecycle can be
//! exercised in memory with [`tokio::io::duplex`].

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::exchange::Exchange;
use crate::config::ServerConfig;
use crate::http::Parser;
use crate::router::Router;

/// Serves the single request/response exchange of `stream`, then shuts it down.
///
/// Returns once a response has been written, or early when the peer closes
/// its side first. A read that times out produces a `408` response.
///
/// # Errors
///
/// Any read or write failure other than an interrupted call. The connection
/// is not usable afterwards.
pub async fn serve_connection<S>(
    mut stream: S,
    router: &Router,
    config: &ServerConfig,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut parser = Parser::with_max_head_size(config.max_head_size);
    let mut exchange = Exchange::new(router);
    let mut buf = BytesMut::with_capacity(config.read_buffer_size);

    while !exchange.is_done() {
        buf.clear();
        buf.reserve(config.read_buffer_size);

        let read = match config.read_timeout() {
            Some(limit) => match tokio::time::timeout(limit, stream.read_buf(&mut buf)).await {
                Ok(read) => read,
                Err(_) => {
                    exchange.time_out();
                    break;
                }
            },
            None => stream.read_buf(&mut buf).await,
        };

        match read {
            Ok(0) => {
                debug!("peer closed connection before a response was produced");
                break;
            }
            Ok(n) => parser.feed(&buf[..n], |event| exchange.on_event(event)),
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                warn!(error = %e, "read failed");
                return Err(e);
            }
        }
    }

    if let Some(response) = exchange.take_outbound() {
        if let Err(e) = write_fully(&mut stream, &response).await {
            warn!(error = %e, "write failed");
            return Err(e);
        }
    }

    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "shutdown after response failed");
    }
    Ok(())
}

/// Writes all of `bytes`, retrying partial and interrupted writes.
pub(crate) async fn write_fully<S>(stream: &mut S, mut bytes: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    while !bytes.is_empty() {
        match stream.write(bytes).await {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "connection stopped accepting response bytes",
                ));
            }
            Ok(n) => bytes = &bytes[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    stream.flush().await
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}
