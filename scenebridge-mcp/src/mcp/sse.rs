//! HTTP + Server-Sent Events transport
//!
//! Legacy MCP HTTP transport: `GET /sse` opens an event stream whose first
//! event names the endpoint to post messages to. `POST /messages` accepts one
//! JSON-RPC message per request and answers `202 Accepted`; the JSON-RPC
//! response arrives later as an `event: message` on the session's stream.
//!
//! Posted messages from every session go through one worker in arrival
//! order, so tool calls reach the bridge in the order they were posted.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scenebridge_utils::SseConfig;

use super::error::McpError;
use super::service::McpService;

/// Path of the event stream
pub const SSE_PATH: &str = "/sse";

/// Path messages are posted to
pub const MESSAGES_PATH: &str = "/messages";

/// Events buffered per session; a session that stops reading loses replies
const SESSION_BUFFER: usize = 64;

/// Posted messages waiting for the worker
const INBOX_BUFFER: usize = 256;

type Body = UnsyncBoxBody<Bytes, Infallible>;

/// One server-sent event
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: &'static str,
    pub data: String,
}

impl SseEvent {
    pub fn endpoint(session_id: Uuid) -> Self {
        Self {
            event: "endpoint",
            data: format!("{}?session_id={}", MESSAGES_PATH, session_id),
        }
    }

    pub fn message(json: String) -> Self {
        Self {
            event: "message",
            data: json,
        }
    }

    /// Wire form: an `event:` line, one `data:` line per data line, blank line
    pub fn encode(&self) -> Bytes {
        let mut out = format!("event: {}\n", self.event);
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        Bytes::from(out)
    }
}

/// A posted message and the session its reply goes to
struct Inbound {
    session: Uuid,
    message: String,
    reply: mpsc::Sender<SseEvent>,
}

struct SseState {
    inbox: mpsc::Sender<Inbound>,
    sessions: DashMap<Uuid, mpsc::Sender<SseEvent>>,
    keepalive: Duration,
}

/// Removes the session when its event stream is dropped
struct SessionGuard {
    id: Uuid,
    state: Arc<SseState>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.sessions.remove(&self.id);
        info!(session = %self.id, "SSE session closed");
    }
}

/// Bound SSE server, not yet accepting
pub struct SseTransport {
    listener: TcpListener,
    state: Arc<SseState>,
}

impl SseTransport {
    /// Bind the configured address and start the message worker
    ///
    /// The worker stops once the transport and every open session are gone.
    pub async fn bind(config: &SseConfig, service: Arc<McpService>) -> Result<Self, McpError> {
        let addr = config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| McpError::Bind { addr, source })?;

        let (inbox, inbox_rx) = mpsc::channel(INBOX_BUFFER);
        tokio::spawn(process_messages(service, inbox_rx));

        Ok(Self {
            listener,
            state: Arc::new(SseState {
                inbox,
                sessions: DashMap::new(),
                keepalive: config.keepalive(),
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, McpError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped
    pub async fn run(self) -> Result<(), McpError> {
        info!(addr = %self.local_addr()?, "MCP SSE transport listening");

        loop {
            let (stream, remote_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("SSE accept error: {}", e);
                    continue;
                }
            };

            let io = TokioIo::new(stream);
            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { handle_request(req, state).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    // Clients hanging up on an open stream is the normal way out
                    if !e.is_incomplete_message() {
                        debug!("SSE connection error from {}: {}", remote_addr, e);
                    }
                }
            });
        }
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<SseState>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (&method, path.as_str()) {
        (&Method::GET, SSE_PATH) => open_stream(state),
        (&Method::POST, MESSAGES_PATH) => post_message(req, state).await,
        (&Method::GET, "/health") => plain(StatusCode::OK, "OK"),
        (_, SSE_PATH) | (_, MESSAGES_PATH) | (_, "/health") => {
            plain(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        _ => plain(StatusCode::NOT_FOUND, "Not found"),
    };
    Ok(response)
}

fn open_stream(state: Arc<SseState>) -> Response<Body> {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(SESSION_BUFFER);

    // The channel is fresh, so the first event always fits
    if tx.try_send(SseEvent::endpoint(id)).is_err() {
        return plain(StatusCode::INTERNAL_SERVER_ERROR, "Failed to open session");
    }
    state.sessions.insert(id, tx);
    info!(session = %id, "SSE session opened");

    let keepalive = state.keepalive;
    let guard = SessionGuard { id, state };
    let ticker = tokio::time::interval_at(tokio::time::Instant::now() + keepalive, keepalive);

    let events = futures::stream::unfold(
        (rx, ticker, guard),
        |(mut rx, mut ticker, guard)| async move {
            let chunk = tokio::select! {
                event = rx.recv() => event?.encode(),
                _ = ticker.tick() => Bytes::from_static(b": keepalive\n\n"),
            };
            Some((Ok::<_, Infallible>(Frame::data(chunk)), (rx, ticker, guard)))
        },
    );

    let mut response = Response::new(StreamBody::new(events).boxed_unsync());
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

async fn post_message(req: Request<Incoming>, state: Arc<SseState>) -> Response<Body> {
    let Some(id) = session_id(req.uri().query()) else {
        return plain(StatusCode::BAD_REQUEST, "Missing or invalid session_id");
    };
    // Clone the sender out so no map guard is held across an await
    let Some(tx) = state.sessions.get(&id).map(|entry| entry.value().clone()) else {
        return plain(StatusCode::NOT_FOUND, "Unknown session");
    };

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(session = %id, error = %e, "Failed to read message body");
            return plain(StatusCode::BAD_REQUEST, "Failed to read body");
        }
    };
    let inbound = Inbound {
        session: id,
        message: String::from_utf8_lossy(&body).into_owned(),
        reply: tx,
    };
    if state.inbox.send(inbound).await.is_err() {
        warn!(session = %id, "Message worker is gone");
        return plain(StatusCode::SERVICE_UNAVAILABLE, "Server shutting down");
    }

    plain(StatusCode::ACCEPTED, "Accepted")
}

/// Handle posted messages one at a time, in the order they were accepted
async fn process_messages(service: Arc<McpService>, mut inbox: mpsc::Receiver<Inbound>) {
    while let Some(inbound) = inbox.recv().await {
        let Some(response) = service.handle_message(&inbound.message).await else {
            continue;
        };
        let json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                warn!(session = %inbound.session, error = %e, "Failed to serialize response");
                continue;
            }
        };
        // Never wait on one session's stream while others queue up behind it
        match inbound.reply.try_send(SseEvent::message(json)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session = %inbound.session, "Session closed before response was delivered");
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session = %inbound.session, "Session stream is not being read, response dropped");
            }
        }
    }
    debug!("SSE message worker stopped");
}

/// `session_id` from a query string
fn session_id(query: Option<&str>) -> Option<Uuid> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "session_id")
        .and_then(|(_, value)| Uuid::parse_str(&value).ok())
}

fn plain(status: StatusCode, text: &'static str) -> Response<Body> {
    let mut response = Response::new(Full::new(Bytes::from_static(text.as_bytes())).boxed_unsync());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use crate::test_support::offline_service;

    const WAIT: Duration = Duration::from_secs(5);

    async fn start_transport(keepalive_secs: u64) -> SocketAddr {
        let service = Arc::new(offline_service().await);
        let config = SseConfig {
            host: "127.0.0.1".into(),
            port: 0,
            keepalive_secs,
        };

        let transport = SseTransport::bind(&config, service).await.unwrap();
        let addr = transport.local_addr().unwrap();
        tokio::spawn(transport.run());
        addr
    }

    /// Raw HTTP request; returns the whole response text
    async fn request(addr: SocketAddr, method: &str, target: &str, body: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let head = format!(
            "{} {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            method,
            target,
            body.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(body.as_bytes()).await.unwrap();

        let mut out = Vec::new();
        tokio::time::timeout(WAIT, stream.read_to_end(&mut out))
            .await
            .unwrap()
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Open event stream that accumulates raw bytes
    struct EventReader {
        stream: TcpStream,
        seen: String,
    }

    impl EventReader {
        async fn open(addr: SocketAddr) -> Self {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET /sse HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
                .await
                .unwrap();
            Self {
                stream,
                seen: String::new(),
            }
        }

        /// Read until `needle` followed by a line end has been seen; returns
        /// the rest of that line
        async fn line_after(&mut self, needle: &str) -> String {
            let deadline = tokio::time::Instant::now() + WAIT;
            loop {
                if let Some(start) = self.seen.find(needle) {
                    let rest = &self.seen[start + needle.len()..];
                    if let Some(end) = rest.find('\n') {
                        let line = rest[..end].trim_end().to_string();
                        self.seen = rest[end..].to_string();
                        return line;
                    }
                }
                let mut buf = [0u8; 4096];
                let n = tokio::time::timeout_at(deadline, self.stream.read(&mut buf))
                    .await
                    .expect("timed out waiting for event")
                    .unwrap();
                assert!(n > 0, "stream closed");
                self.seen.push_str(&String::from_utf8_lossy(&buf[..n]));
            }
        }
    }

    #[test]
    fn test_event_encoding() {
        let event = SseEvent::message("{\"a\":1}".into());
        assert_eq!(&event.encode()[..], b"event: message\ndata: {\"a\":1}\n\n");

        let event = SseEvent {
            event: "message",
            data: "one\ntwo".into(),
        };
        assert_eq!(&event.encode()[..], b"event: message\ndata: one\ndata: two\n\n");
    }

    #[test]
    fn test_session_id_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(session_id(Some(&format!("session_id={}", id))), Some(id));
        assert_eq!(session_id(Some(&format!("x=1&session_id={}", id))), Some(id));
        assert_eq!(session_id(Some("session_id=nope")), None);
        assert_eq!(session_id(None), None);
    }

    #[tokio::test]
    async fn test_endpoint_event_and_message_delivery() {
        let addr = start_transport(15).await;
        let mut events = EventReader::open(addr).await;

        let endpoint = events.line_after("event: endpoint\ndata: ").await;
        assert!(endpoint.starts_with("/messages?session_id="));

        let body = r#"{"jsonrpc":"2.0","id":42,"method":"initialize","params":{}}"#;
        let reply = request(addr, "POST", &endpoint, body).await;
        assert!(reply.starts_with("HTTP/1.1 202"), "got {}", reply);

        let data = events.line_after("event: message\ndata: ").await;
        let response: Value = serde_json::from_str(&data).unwrap();
        assert_eq!(response["id"], 42);
        assert_eq!(response["result"]["serverInfo"]["name"], "scenebridge");
    }

    #[tokio::test]
    async fn test_tool_error_delivered_as_event() {
        let addr = start_transport(15).await;
        let mut events = EventReader::open(addr).await;
        let endpoint = events.line_after("event: endpoint\ndata: ").await;

        let body = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"get_layers"}}"#;
        let reply = request(addr, "POST", &endpoint, body).await;
        assert!(reply.starts_with("HTTP/1.1 202"));

        let data = events.line_after("event: message\ndata: ").await;
        let response: Value = serde_json::from_str(&data).unwrap();
        assert_eq!(response["result"]["isError"], true);
    }

    #[tokio::test]
    async fn test_posts_answered_in_arrival_order() {
        let addr = start_transport(15).await;
        let mut events = EventReader::open(addr).await;
        let endpoint = events.line_after("event: endpoint\ndata: ").await;

        // The tool call waits on an unreachable backend; the ping posted
        // after it must not overtake it
        let call = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"get_layers"}}"#;
        let ping = r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#;
        assert!(request(addr, "POST", &endpoint, call).await.starts_with("HTTP/1.1 202"));
        assert!(request(addr, "POST", &endpoint, ping).await.starts_with("HTTP/1.1 202"));

        let first: Value = serde_json::from_str(&events.line_after("event: message\ndata: ").await).unwrap();
        let second: Value = serde_json::from_str(&events.line_after("event: message\ndata: ").await).unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let addr = start_transport(15).await;
        let target = format!("/messages?session_id={}", Uuid::new_v4());
        let reply = request(addr, "POST", &target, "{}").await;
        assert!(reply.starts_with("HTTP/1.1 404"), "got {}", reply);
    }

    #[tokio::test]
    async fn test_bad_query_is_400() {
        let addr = start_transport(15).await;
        let reply = request(addr, "POST", "/messages?session_id=abc", "{}").await;
        assert!(reply.starts_with("HTTP/1.1 400"), "got {}", reply);

        let reply = request(addr, "POST", "/messages", "{}").await;
        assert!(reply.starts_with("HTTP/1.1 400"), "got {}", reply);
    }

    #[tokio::test]
    async fn test_health_and_unknown_paths() {
        let addr = start_transport(15).await;
        let reply = request(addr, "GET", "/health", "").await;
        assert!(reply.starts_with("HTTP/1.1 200"));
        assert!(reply.ends_with("OK"));

        let reply = request(addr, "GET", "/nowhere", "").await;
        assert!(reply.starts_with("HTTP/1.1 404"));

        let reply = request(addr, "GET", "/messages", "").await;
        assert!(reply.starts_with("HTTP/1.1 405"));
    }

    #[tokio::test]
    async fn test_keepalive_comments() {
        let addr = start_transport(1).await;
        let mut events = EventReader::open(addr).await;
        events.line_after("event: endpoint").await;

        // Next line after the keepalive marker is the blank separator
        let rest = events.line_after(": keepalive").await;
        assert!(rest.is_empty());
    }
}
