//! HTTP listener.
//!
//! Every request, whatever its method or path, lands in one axum fallback
//! that converts it into a [`cosy_core::Request`] and hands it to the
//! [`RequestHandler`]. Routing happens on the other side of that seam.
//!
//! ```text
//! TcpListener ─► axum fallback ─► into_request ─► RequestHandler::handle_request
//!                      ▲                                   │
//!                      └──────────── into_response ◄───────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{ConnectInfo, Request as WireRequest, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response as WireResponse},
};
use cosy_core::{BoxedRequestHandler, Request, Response};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{TransportError, TransportResult};

/// Default cap on buffered request bodies.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

// ─── Shared state ─────────────────────────────────────────────────────────────

struct ServerState {
    handler: BoxedRequestHandler,
    body_limit: usize,
    /// Parent of every per-request cancellation token.
    shutdown: CancellationToken,
}

// ─── Server builder ───────────────────────────────────────────────────────────

/// Binds a listener that feeds every request into a [`RequestHandler`].
///
/// [`RequestHandler`]: cosy_core::RequestHandler
pub struct HttpServer {
    handler: BoxedRequestHandler,
    body_limit: usize,
}

impl HttpServer {
    pub fn new(handler: BoxedRequestHandler) -> Self {
        Self {
            handler,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Maximum request body size in bytes. Larger bodies are answered with
    /// 413 before reaching the handler.
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Binds `addr` and starts serving in the background.
    pub async fn bind(self, addr: &str) -> TransportResult<ServerHandle> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let state = Arc::new(ServerState {
            handler: self.handler,
            body_limit: self.body_limit,
            shutdown: shutdown.clone(),
        });
        let router = Router::new().fallback(dispatch).with_state(state);

        info!(addr = %local_addr, "HTTP server listening");

        let signal = shutdown.clone().cancelled_owned();
        let task = tokio::spawn(async move {
            let server = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(signal);

            if let Err(e) = server.await {
                error!(error = %e, "HTTP server error");
            }
            info!(addr = %local_addr, "HTTP server stopped");
        });

        Ok(ServerHandle {
            local_addr,
            shutdown,
            task,
        })
    }
}

// ─── Handle ───────────────────────────────────────────────────────────────────

/// Handle to a running listener.
///
/// Dropping the handle does not stop the server; call
/// [`shutdown`](Self::shutdown).
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address actually bound (resolves port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops accepting connections and cancels in-flight requests, then
    /// waits for the serve loop to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "HTTP server task ended abnormally");
        }
    }
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

async fn dispatch(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: WireRequest,
) -> WireResponse {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.body_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(remote_addr = %remote, error = %e, "Rejecting request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    debug!(method = %parts.method, url, remote_addr = %remote, "Incoming request");

    let request = into_request(parts.method, url, parts.headers, &body, remote);
    let response = state
        .handler
        .handle_request(request, state.shutdown.child_token())
        .await;

    into_response(response)
}

/// Builds a framework request from wire parts.
pub(crate) fn into_request(
    method: axum::http::Method,
    url: &str,
    headers: HeaderMap,
    body: &Bytes,
    remote: SocketAddr,
) -> Request {
    let body = parse_body(&headers, body);
    Request::builder()
        .with_method(method)
        .url(url)
        .headers(headers)
        .body(body)
        .ip(remote.ip().to_string())
        .build()
}

/// JSON and urlencoded bodies become structured values, any other non-empty
/// UTF-8 body a string.
fn parse_body(headers: &HeaderMap, body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Null;
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.contains("json") {
        match serde_json::from_slice(body) {
            Ok(value) => return value,
            Err(e) => debug!(error = %e, "Request body is not valid JSON"),
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let form: Map<String, Value> = url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        return Value::Object(form);
    }

    match std::str::from_utf8(body) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::Null,
    }
}

fn into_response(response: Response) -> WireResponse {
    let (status, headers, body) = response.into_parts();
    let mut wire = WireResponse::new(Body::from(body));
    *wire.status_mut() = status;
    *wire.headers_mut() = headers;
    wire
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::http::{HeaderValue, Method};
    use cosy_core::RequestHandler;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;

    fn remote() -> SocketAddr {
        "10.0.0.7:5555".parse().unwrap()
    }

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_into_request_json_body() {
        let body = Bytes::from_static(br#"{"name":"ada"}"#);
        let request = into_request(
            Method::POST,
            "/users?page=2",
            headers("application/json"),
            &body,
            remote(),
        );

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.path(), "/users");
        assert_eq!(request.query("page"), Some(&json!("2")));
        assert_eq!(request.body(), &json!({ "name": "ada" }));
        assert_eq!(request.ip(), Some("10.0.0.7"));
        assert!(request.is_json());
    }

    #[test]
    fn test_into_request_form_body() {
        let body = Bytes::from_static(b"a=1&b=two+words");
        let request = into_request(
            Method::POST,
            "/form",
            headers("application/x-www-form-urlencoded"),
            &body,
            remote(),
        );

        assert_eq!(request.input("b"), Some(&json!("two words")));
        assert_eq!(request.input("a"), Some(&json!("1")));
    }

    #[test]
    fn test_parse_body_fallbacks() {
        assert_eq!(parse_body(&HeaderMap::new(), &Bytes::new()), Value::Null);
        assert_eq!(
            parse_body(&headers("text/plain"), &Bytes::from_static(b"hi")),
            json!("hi")
        );
        assert_eq!(
            parse_body(&headers("application/json"), &Bytes::from_static(b"{oops")),
            json!("{oops")
        );
    }

    #[test]
    fn test_into_response_keeps_cookies() {
        let mut response = Response::new();
        response
            .status(StatusCode::CREATED)
            .cookie(cosy_core::Cookie::new("sid", "abc"));
        response.html("<p>hi</p>").unwrap();

        let wire = into_response(response);
        assert_eq!(wire.status(), StatusCode::CREATED);
        assert_eq!(wire.headers()[header::SET_COOKIE], "sid=abc");
    }

    struct Echo;

    #[async_trait]
    impl RequestHandler for Echo {
        async fn handle_request(&self, request: Request, _: CancellationToken) -> Response {
            let mut response = Response::new();
            response
                .header("X-Path", request.path())
                .json(&json!({ "method": request.method().as_str() }))
                .unwrap();
            response
        }
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        let handle = HttpServer::new(Arc::new(Echo))
            .bind("127.0.0.1:0")
            .await
            .unwrap();
        assert!(handle.is_running());

        let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();
        stream
            .write_all(b"GET /ping?x=1 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.to_ascii_lowercase().contains("x-path: /ping"));
        assert!(raw.contains(r#""method": "GET""#));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_error() {
        let first = HttpServer::new(Arc::new(Echo))
            .bind("127.0.0.1:0")
            .await
            .unwrap();
        let taken = first.local_addr().to_string();

        let err = HttpServer::new(Arc::new(Echo)).bind(&taken).await.unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));

        first.shutdown().await;
    }
}
