use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Bytes};
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::{BufMut, BytesMut};
use log::{error, info};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorCode, RelayError, Result};
use crate::hookrelay::broadcaster::Publisher;

/// Largest request body the listener buffers
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Single catch-all route: any method, any path
pub fn router(publisher: Arc<Publisher>) -> Router {
    Router::new().fallback(relay_request).with_state(publisher)
}

/// Serves the ingress endpoint until `shutdown` is cancelled
pub async fn run_ingress(addr: SocketAddr, publisher: Arc<Publisher>, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| RelayError::new(ErrorCode::BindFailed, format!("Failed to bind {}: {}", addr, e)))?;
    info!("Ingress listening on {}", addr);

    axum::serve(listener, router(publisher))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Ingress stopped");
    Ok(())
}

async fn relay_request(State(publisher): State<Arc<Publisher>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large\n").into_response();
        }
    };

    let dump = dump_request(&parts, &body);
    let payload = String::from_utf8_lossy(&dump).into_owned();
    info!("{}", payload);

    // The caller gets its echo without waiting on delivery
    tokio::spawn(async move {
        publisher.publish(&payload).await;
    });

    (StatusCode::OK, dump).into_response()
}

/// Serializes a request in HTTP/1.x wire form: request line, headers, blank line, body
pub fn dump_request(parts: &Parts, body: &[u8]) -> Bytes {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut out = BytesMut::with_capacity(256 + body.len());
    out.put_slice(format!("{} {} {:?}\r\n", parts.method, target, parts.version).as_bytes());
    for (name, value) in parts.headers.iter() {
        out.put_slice(name.as_str().as_bytes());
        out.put_slice(b": ");
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"\r\n");
    out.put_slice(body);
    out.freeze()
}
