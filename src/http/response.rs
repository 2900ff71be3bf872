//! Response body handling.
//!
//! # Responsibilities
//! - Stream upstream bodies to the client through a pooled buffer
//! - Fully buffer bodies that the interceptor has to rewrite
//! - Detect a client that went away mid-stream and stop copying
//!
//! # Design Decisions
//! - The copy loop runs on its own task and feeds the client body through a
//!   capacity-1 channel; a slow client therefore slows the upstream read
//! - A closed channel is the disconnect signal: the loop exits, the buffer
//!   goes back to the pool and the upstream body is dropped
//! - Chunks are copied out of the pooled buffer before being sent, so the
//!   buffer can be reused on the next read

use std::io;

use axum::body::{Body, Bytes};
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

use crate::buffer::PooledBuffer;
use crate::observability::metrics;

/// `AsyncRead` view of an upstream response body.
pub type UpstreamReader = StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>;

pub fn upstream_reader(response: reqwest::Response) -> UpstreamReader {
    StreamReader::new(response.bytes_stream().map_err(io::Error::other).boxed())
}

/// Read `reader` to the end, `buf` at a time.
pub async fn read_fully<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        let n = reader.read(buf).await?;
        if n == 0 {
            return Ok(body);
        }
        body.extend_from_slice(&buf[..n]);
    }
}

/// How a streaming copy ended.
#[derive(Debug)]
pub enum CopyOutcome {
    Completed { bytes: u64 },
    ClientDisconnected { bytes: u64 },
    UpstreamFailed { bytes: u64, error: io::Error },
}

/// Copy `reader` into `tx` chunk by chunk until EOF, upstream failure, or the
/// receiving side is dropped.
pub async fn pump_body<R>(
    mut reader: R,
    mut buffer: PooledBuffer,
    tx: mpsc::Sender<io::Result<Bytes>>,
) -> CopyOutcome
where
    R: AsyncRead + Unpin,
{
    let mut total = 0u64;

    loop {
        let read = tokio::select! {
            biased;
            _ = tx.closed() => return CopyOutcome::ClientDisconnected { bytes: total },
            read = reader.read(&mut buffer[..]) => read,
        };

        match read {
            Ok(0) => return CopyOutcome::Completed { bytes: total },
            Ok(n) => {
                let chunk = Bytes::copy_from_slice(&buffer[..n]);
                if tx.send(Ok(chunk)).await.is_err() {
                    return CopyOutcome::ClientDisconnected { bytes: total };
                }
                total += n as u64;
            }
            Err(error) => {
                // Abort the client body so the truncation is visible.
                let _ = tx
                    .send(Err(io::Error::new(error.kind(), error.to_string())))
                    .await;
                return CopyOutcome::UpstreamFailed {
                    bytes: total,
                    error,
                };
            }
        }
    }
}

/// Client body that streams `reader` through `buffer` on a background task.
pub fn streaming_body<R>(reader: R, buffer: PooledBuffer, path: String) -> Body
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        match pump_body(reader, buffer, tx).await {
            CopyOutcome::Completed { bytes } => {
                tracing::debug!(path = %path, bytes, "Response body streamed");
            }
            CopyOutcome::ClientDisconnected { bytes } => {
                tracing::info!(
                    path = %path,
                    bytes,
                    "Client connection closed prematurely during proxying"
                );
                metrics::record_client_disconnect();
            }
            CopyOutcome::UpstreamFailed { bytes, error } => {
                tracing::error!(path = %path, bytes, error = %error, "Proxying failed");
            }
        }
    });

    Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}
