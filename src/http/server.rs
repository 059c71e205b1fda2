//! Listener, acceptor, and per-connection control flow
//!
//! Each accepted socket gets its own task. A connection carries exactly one
//! request: a CORS preflight, a direct resource GET, a one-shot JSON-RPC
//! exchange, or an upgrade to one of the two streaming flavors. Upgraded
//! connections hand their write half to a stream registry and then sit in a
//! one-byte read loop whose only purpose is noticing the disconnect.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::http::request::{read_request, HttpRequest};
use crate::http::response::{
    chunked_stream_head, empty_response, event_stream_head, payload_response, preflight_response,
};
use crate::rpc::router::{dispatch, RouterOutcome};
use crate::stream::registry::{StreamEntry, StreamRegistry};
use crate::ServerHandle;

const RPC_PATHS: [&str; 3] = ["/", "/message", "/mcp"];

pub struct Server {
    handle: ServerHandle,
}

impl Server {
    pub fn new(handle: ServerHandle) -> Self {
        Self { handle }
    }

    /// Accept connections until the listener fails fatally. Handling is
    /// handed off immediately; the accept loop never awaits a connection.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        loop {
            let (socket, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(error) => {
                    warn!(error = %error, "accept failed");
                    continue;
                }
            };

            let _ = socket.set_nodelay(true);
            let handle = self.handle.clone();
            let spawner = Arc::clone(handle.spawner());
            spawner.spawn(Box::pin(async move {
                handle_connection(handle, socket, peer).await;
            }));
        }
    }
}

fn is_rpc_path(path: &str) -> bool {
    RPC_PATHS.contains(&path)
}

async fn handle_connection(handle: ServerHandle, socket: TcpStream, peer: SocketAddr) {
    let started_at = Instant::now();
    let (read_half, write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    let request = match read_request(&mut reader).await {
        Ok(Some(request)) => request,
        // Malformed request line or raw socket failure: the client only
        // observes a closed socket.
        Ok(None) | Err(_) => return,
    };

    let method = request.method.clone();
    let path = request.path().to_string();
    let mut writer = write_half;

    let status = match (method.as_str(), path.as_str()) {
        ("OPTIONS", _) => {
            write_and_close(&mut writer, &preflight_response()).await;
            204
        }
        ("GET", path) if is_rpc_path(path) && request.accepts_event_stream() => {
            run_stream(
                &handle,
                handle.streams().sse(),
                reader,
                writer,
                event_stream_head(),
            )
            .await;
            return;
        }
        ("GET", "/read") => {
            let (status, response) = direct_read_response(&handle, &request).await;
            write_and_close(&mut writer, &response).await;
            status
        }
        ("POST", path) if is_rpc_path(path) => {
            let body = request.body.as_deref().unwrap_or("");
            match dispatch(&handle, body).await {
                RouterOutcome::Reply(reply) => {
                    let response = match &reply.envelope {
                        Some(envelope) => payload_response(
                            reply.status,
                            "application/json",
                            envelope.to_json().as_bytes(),
                        ),
                        None => empty_response(reply.status),
                    };
                    write_and_close(&mut writer, &response).await;
                    reply.status
                }
                RouterOutcome::StreamUpgrade => {
                    run_stream(
                        &handle,
                        handle.streams().chunked(),
                        reader,
                        writer,
                        chunked_stream_head(),
                    )
                    .await;
                    return;
                }
            }
        }
        _ => {
            write_and_close(&mut writer, &empty_response(404)).await;
            404
        }
    };

    info!(
        method = %method,
        path = %path,
        peer = %peer,
        status,
        duration_ms = started_at.elapsed().as_millis() as u64,
        "request summary"
    );
}

async fn write_and_close(writer: &mut OwnedWriteHalf, response: &[u8]) {
    if writer.write_all(response).await.is_ok() {
        let _ = writer.shutdown().await;
    }
}

/// Direct resource read outside JSON-RPC framing: raw JSON on success, a 400
/// with a plain-text error otherwise.
async fn direct_read_response(handle: &ServerHandle, request: &HttpRequest) -> (u16, Vec<u8>) {
    let Some(uri) = request.query_param("uri") else {
        let failure = AppError::invalid_argument("uri query parameter is required");
        failure.log_to(handle.log(), "http");
        return (
            400,
            payload_response(400, "text/plain", failure.message.as_bytes()),
        );
    };

    match handle.resources().read(&uri).await {
        Ok(value) => (
            200,
            payload_response(200, "application/json", value.to_string().as_bytes()),
        ),
        Err(error) => {
            error.log_to(handle.log(), "http");
            (
                400,
                payload_response(400, "text/plain", error.message.as_bytes()),
            )
        }
    }
}

/// Upgrade the connection: write the streaming response head, register the
/// write half, push the snapshot notification, then watch for disconnect.
async fn run_stream(
    handle: &ServerHandle,
    registry: &Arc<StreamRegistry>,
    mut reader: BufReader<OwnedReadHalf>,
    mut writer: OwnedWriteHalf,
    head: &'static [u8],
) {
    if writer.write_all(head).await.is_err() {
        return;
    }

    let entry = registry.register(writer);
    info!(
        stream_id = entry.id,
        flavor = registry.flavor().as_str(),
        "stream opened"
    );

    push_snapshot(handle, &entry).await;

    // One byte at a time; no inbound data is expected once upgraded, and
    // idle time alone never tears the stream down.
    let mut probe = [0u8; 1];
    loop {
        match reader.read(&mut probe).await {
            Ok(0) | Err(_) => break,
            Ok(_) => continue,
        }
    }

    registry.remove(entry.id);
    info!(stream_id = entry.id, "stream closed");
}

async fn push_snapshot(handle: &ServerHandle, entry: &Arc<StreamEntry>) {
    match handle.resources().read(handle.snapshot_uri()).await {
        Ok(payload) => handle
            .streams()
            .deliver_to(entry, handle.snapshot_event(), payload),
        Err(error) => error.log_to(handle.log(), "stream"),
    }
}
