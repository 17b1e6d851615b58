//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Each connection is split into a sink half and a stream half, each behind
//! its own lock, so one task can wait in `recv` while another sends.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{
    Connection, ConnectionId, Dialer, Frame, Incoming, Transport,
    TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Upper bound on the upgrade handshake of one inbound socket.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A browser-facing connection accepted by [`WebSocketTransport`].
pub type InboundConnection = WebSocketConnection<TcpStream>;

/// A node-facing connection opened by [`WebSocketDialer`].
pub type OutboundConnection = WebSocketConnection<MaybeTlsStream<TcpStream>>;

fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

fn io_error(kind: std::io::ErrorKind, e: WsError) -> std::io::Error {
    std::io::Error::new(kind, e)
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// `accept` hands out [`PendingUpgrade`]s. When a path prefix is set,
/// upgrade requests for any other path are answered with `404 Not Found`
/// and never become connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    path_prefix: Option<String>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            path_prefix: None,
        })
    }

    /// Only accept upgrades whose request path starts with `prefix`.
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }
}

impl Transport for WebSocketTransport {
    type Incoming = PendingUpgrade;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(PendingUpgrade {
            stream,
            peer,
            path_prefix: self.path_prefix.clone(),
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A TCP socket taken off the listener whose WebSocket upgrade has not run
/// yet.
pub struct PendingUpgrade {
    stream: TcpStream,
    peer: SocketAddr,
    path_prefix: Option<String>,
}

impl Incoming for PendingUpgrade {
    type Connection = InboundConnection;
    type Error = TransportError;

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Runs the upgrade, bounded by [`HANDSHAKE_TIMEOUT`].
    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let Self {
            stream,
            peer,
            path_prefix,
        } = self;
        let prefix = path_prefix.as_deref();
        let mut path = String::new();
        let callback = |req: &Request,
                        resp: Response|
         -> Result<Response, ErrorResponse> {
            let target = req.uri().path();
            if let Some(prefix) = prefix {
                if !target.starts_with(prefix) {
                    let mut err =
                        ErrorResponse::new(Some("not found".to_owned()));
                    *err.status_mut() = StatusCode::NOT_FOUND;
                    return Err(err);
                }
            }
            path = target.to_owned();
            Ok(resp)
        };

        let ws = tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            tokio_tungstenite::accept_hdr_async(stream, callback),
        )
        .await
        .map_err(|_| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "websocket handshake timed out",
            ))
        })?
        .map_err(|e| {
            TransportError::AcceptFailed(io_error(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let conn = WebSocketConnection::new(ws, path);
        tracing::debug!(id = %conn.id, %peer, path = %conn.path, "accepted WebSocket connection");
        Ok(conn)
    }
}

/// Dials node endpoints (`ws://` or `wss://`).
///
/// Node daemons check the `Origin` header against the panel URL, so the
/// dialer can be given an origin to present.
#[derive(Debug, Clone, Default)]
pub struct WebSocketDialer {
    origin: Option<String>,
}

impl WebSocketDialer {
    /// Creates a dialer that sends no `Origin` header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `origin` as the `Origin` header on every dial.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

impl Dialer for WebSocketDialer {
    type Connection = OutboundConnection;

    async fn dial(
        &self,
        endpoint: &str,
    ) -> Result<Self::Connection, TransportError> {
        let mut request = endpoint
            .into_client_request()
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;

        if let Some(origin) = &self.origin {
            let value = HeaderValue::from_str(origin).map_err(|e| {
                TransportError::InvalidEndpoint(format!("origin header: {e}"))
            })?;
            request.headers_mut().insert("Origin", value);
        }

        let path = request.uri().path().to_owned();
        let (ws, _) =
            tokio_tungstenite::connect_async(request).await.map_err(|e| {
                TransportError::ConnectFailed {
                    endpoint: endpoint.to_owned(),
                    source: io_error(std::io::ErrorKind::ConnectionRefused, e),
                }
            })?;

        let conn = WebSocketConnection::new(ws, path);
        tracing::debug!(id = %conn.id, "dialed WebSocket endpoint");
        Ok(conn)
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection<S = TcpStream> {
    id: ConnectionId,
    path: String,
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
    closed: AtomicBool,
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn new(ws: WebSocketStream<S>, path: String) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id: next_connection_id(),
            path,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
        }
    }

    /// The request path this connection was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Error = TransportError;

    async fn send(&self, frame: Frame) -> Result<(), Self::Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }
        let msg = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data.into()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(io_error(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Frame>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Frame::Binary(data.to_vec())));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    return Ok(None);
                }
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io_error(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.sink.lock().await.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(TransportError::SendFailed(io_error(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))),
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
