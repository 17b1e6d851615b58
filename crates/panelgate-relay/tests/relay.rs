//! End-to-end tests for `RelaySession`.
//!
//! Each test runs a real relay listener, a real browser-side client and a
//! fake node daemon, all over WebSockets on random local ports. Tests that
//! need the relay parked in its dialing phase use a node that holds every
//! upgrade until the test releases it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use panelgate_issuer::{
    Authority, CredentialIssuer, UpstreamError, UpstreamPanelClient,
};
use panelgate_protocol::{Codec, EventFrame, JsonCodec, ProtocolError};
use panelgate_registry::CredentialRegistry;
use panelgate_relay::{RelayConfig, RelayContext, RelayOutcome, RelaySession};
use panelgate_transport::{
    Connection, ConnectionId, Frame, Incoming, Transport, TransportError,
    WebSocketDialer, WebSocketTransport,
};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type ClientWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
type NodeWs = WebSocketStream<TcpStream>;

const RESOURCE: &str = "srv-1";
const CREDENTIAL: &str = "cred-abcdef123456";
const STEP: Duration = Duration::from_secs(5);

/// Panel double that issues `refreshed-credential-N` on demand.
struct MockPanel {
    endpoint: String,
    fail: bool,
    fixed_token: Option<String>,
    issued: AtomicUsize,
}

impl MockPanel {
    fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            fail: false,
            fixed_token: None,
            issued: AtomicUsize::new(0),
        }
    }

    fn failing(endpoint: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(endpoint)
        }
    }

    /// Always issues `token`.
    fn issuing(endpoint: &str, token: &str) -> Self {
        Self {
            fixed_token: Some(token.to_owned()),
            ..Self::new(endpoint)
        }
    }
}

impl UpstreamPanelClient for MockPanel {
    async fn issue_console_credential(
        &self,
        _resource_id: &str,
        _authority: Authority,
    ) -> Result<Value, UpstreamError> {
        if self.fail {
            return Err(UpstreamError::InvalidResponse("panel offline".into()));
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self
            .fixed_token
            .clone()
            .unwrap_or_else(|| format!("refreshed-credential-{n}"));
        Ok(json!({
            "data": {
                "token": token,
                "socket": self.endpoint,
            }
        }))
    }
}

/// Decodes like [`JsonCodec`] but cannot encode anything.
struct EncodeFailingCodec;

impl Codec for EncodeFailingCodec {
    fn encode(&self, _event: &EventFrame) -> Result<Frame, ProtocolError> {
        let err = serde_json::from_str::<Value>("{").unwrap_err();
        Err(ProtocolError::Encode(err))
    }

    fn decode(&self, frame: &Frame) -> Result<EventFrame, ProtocolError> {
        JsonCodec.decode(frame)
    }
}

/// A fake node daemon.
///
/// Every TCP connection is reported on `dialed` as soon as it lands, but
/// its upgrade waits until the gate is open.
struct Node {
    endpoint: String,
    dialed: mpsc::UnboundedReceiver<()>,
    upgraded: mpsc::UnboundedReceiver<NodeWs>,
    gate: watch::Sender<bool>,
}

impl Node {
    /// A node that answers upgrades right away.
    async fn open() -> Self {
        Self::start(true).await
    }

    /// A node that holds every upgrade until [`release`](Self::release).
    async fn held() -> Self {
        Self::start(false).await
    }

    async fn start(open: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (gate, gate_rx) = watch::channel(open);
        let (dialed_tx, dialed) = mpsc::unbounded_channel();
        let (upgraded_tx, upgraded) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let _ = dialed_tx.send(());
                let upgraded_tx = upgraded_tx.clone();
                let mut gate_rx = gate_rx.clone();
                tokio::spawn(async move {
                    let _ = gate_rx.wait_for(|open| *open).await;
                    if let Ok(ws) = tokio_tungstenite::accept_async(stream).await
                    {
                        let _ = upgraded_tx.send(ws);
                    }
                });
            }
        });

        Self {
            endpoint: format!("ws://{addr}/api/servers/{RESOURCE}/ws"),
            dialed,
            upgraded,
            gate,
        }
    }

    fn release(&self) {
        let _ = self.gate.send(true);
    }

    /// Waits until the relay has opened a TCP connection to the node.
    async fn wait_dialed(&mut self) {
        tokio::time::timeout(STEP, self.dialed.recv())
            .await
            .expect("relay never dialed the node")
            .expect("node listener gone");
    }

    /// The next connection whose upgrade completed.
    async fn next(&mut self) -> NodeWs {
        tokio::time::timeout(STEP, self.upgraded.recv())
            .await
            .expect("relay never connected to the node")
            .expect("node listener gone")
    }
}

/// An in-memory browser connection.
///
/// Frames fed through the channel are handed out by `recv`. `idle` is
/// signalled every time `recv` finds nothing left to hand out.
struct MemoryClient {
    id: ConnectionId,
    incoming: Mutex<mpsc::UnboundedReceiver<Frame>>,
    idle: Arc<Notify>,
}

impl MemoryClient {
    fn new() -> (Self, mpsc::UnboundedSender<Frame>, Arc<Notify>) {
        let (feed, incoming) = mpsc::unbounded_channel();
        let idle = Arc::new(Notify::new());
        let client = Self {
            id: ConnectionId::new(u64::MAX),
            incoming: Mutex::new(incoming),
            idle: Arc::clone(&idle),
        };
        (client, feed, idle)
    }
}

impl Connection for MemoryClient {
    type Error = TransportError;

    async fn send(&self, _frame: Frame) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Frame>, Self::Error> {
        let mut incoming = self.incoming.lock().await;
        match incoming.try_recv() {
            Ok(frame) => return Ok(Some(frame)),
            Err(TryRecvError::Disconnected) => return Ok(None),
            Err(TryRecvError::Empty) => self.idle.notify_one(),
        }
        Ok(incoming.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// An endpoint nobody is listening on.
async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}/ws")
}

fn context(
    panel: Arc<MockPanel>,
    config: RelayConfig,
) -> RelayContext<MockPanel, WebSocketDialer> {
    RelayContext {
        registry: Arc::new(CredentialRegistry::new()),
        issuer: Arc::new(CredentialIssuer::new(panel)),
        dialer: Arc::new(WebSocketDialer::new()),
        config,
    }
}

/// Accepts one client and runs a JSON session for `resource` on it.
async fn start_relay(
    ctx: RelayContext<MockPanel, WebSocketDialer>,
    resource: &str,
) -> (ClientWs, JoinHandle<RelayOutcome>) {
    start_relay_with_codec(ctx, resource, JsonCodec).await
}

async fn start_relay_with_codec<C: Codec>(
    ctx: RelayContext<MockPanel, WebSocketDialer>,
    resource: &str,
    codec: C,
) -> (ClientWs, JoinHandle<RelayOutcome>) {
    let mut transport = WebSocketTransport::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_path_prefix("/ws/console/");
    let addr = transport.local_addr().unwrap();
    let resource = resource.to_owned();

    let handle = tokio::spawn(async move {
        let pending = transport.accept().await.expect("should accept");
        let conn = pending.upgrade().await.expect("should upgrade");
        RelaySession::with_codec(resource, ctx, conn, codec).run().await
    });

    let url = format!("ws://{addr}/ws/console/{RESOURCE}");
    let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    (client, handle)
}

fn event(name: &str, args: Value) -> Message {
    Message::Text(json!({"event": name, "args": args}).to_string().into())
}

fn event_frame(name: &str, args: Value) -> Frame {
    Frame::Text(json!({"event": name, "args": args}).to_string())
}

async fn next_message<S>(ws: &mut WebSocketStream<S>) -> Message
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    tokio::time::timeout(STEP, ws.next())
        .await
        .expect("timed out waiting for a message")
        .expect("stream ended")
        .expect("websocket error")
}

async fn next_event<S>(ws: &mut WebSocketStream<S>) -> Value
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let msg = next_message(ws).await;
    serde_json::from_str(msg.to_text().expect("text frame")).expect("json")
}

/// The next thing on the stream must be its end: a close frame, a
/// dropped socket or a protocol error.
async fn expect_closed<S>(ws: &mut WebSocketStream<S>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let next = tokio::time::timeout(STEP, ws.next())
        .await
        .expect("stream should close");
    match next {
        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {}
        Some(Ok(other)) => panic!("expected the stream to close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_relay_forwards_both_ways_after_valid_auth() {
    let mut node_side = Node::open().await;
    let endpoint = node_side.endpoint.clone();
    let ctx = context(Arc::new(MockPanel::new(&endpoint)), RelayConfig::default());
    ctx.registry.register(CREDENTIAL, RESOURCE, &endpoint, None);
    let (mut client, relay) = start_relay(ctx, RESOURCE).await;

    client.send(event("auth", json!([CREDENTIAL]))).await.unwrap();
    let mut node = node_side.next().await;
    assert_eq!(
        next_event(&mut node).await,
        json!({"event": "auth", "args": [CREDENTIAL]})
    );

    client
        .send(event("send command", json!(["say hi"])))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut node).await,
        json!({"event": "send command", "args": ["say hi"]})
    );

    node.send(event("console output", json!(["[Server] hi"])))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut client).await,
        json!({"event": "console output", "args": ["[Server] hi"]})
    );

    client.close(None).await.unwrap();
    expect_closed(&mut node).await;
    assert_eq!(relay.await.unwrap(), RelayOutcome::Completed);
}

#[tokio::test]
async fn test_relay_auth_timeout_sends_error_and_closes() {
    let mut node_side = Node::open().await;
    let endpoint = node_side.endpoint.clone();
    let config = RelayConfig {
        auth_timeout: Duration::from_millis(150),
        ..RelayConfig::default()
    };
    let ctx = context(Arc::new(MockPanel::new(&endpoint)), config);
    let (mut client, relay) = start_relay(ctx, RESOURCE).await;

    assert_eq!(
        next_event(&mut client).await,
        json!({"event": "error", "args": ["authentication timeout"]})
    );
    expect_closed(&mut client).await;
    assert_eq!(relay.await.unwrap(), RelayOutcome::AuthTimeout);
    assert!(node_side.dialed.try_recv().is_err());
}

#[tokio::test]
async fn test_relay_rejects_credential_for_other_resource() {
    let mut node_side = Node::open().await;
    let endpoint = node_side.endpoint.clone();
    let ctx = context(Arc::new(MockPanel::new(&endpoint)), RelayConfig::default());
    ctx.registry.register(CREDENTIAL, "srv-2", &endpoint, None);
    let (mut client, relay) = start_relay(ctx, RESOURCE).await;

    client.send(event("auth", json!([CREDENTIAL]))).await.unwrap();
    assert_eq!(
        next_event(&mut client).await,
        json!({"event": "error", "args": ["invalid or expired credential"]})
    );
    expect_closed(&mut client).await;
    assert_eq!(relay.await.unwrap(), RelayOutcome::AuthRejected);
    assert!(node_side.dialed.try_recv().is_err());
}

#[tokio::test]
async fn test_relay_rejects_unknown_credential() {
    let node_side = Node::open().await;
    let endpoint = node_side.endpoint.clone();
    let ctx = context(Arc::new(MockPanel::new(&endpoint)), RelayConfig::default());
    let (mut client, relay) = start_relay(ctx, RESOURCE).await;

    client.send(event("auth", json!(["never-issued"]))).await.unwrap();
    let reply = next_event(&mut client).await;
    assert_eq!(reply["event"], "error");
    assert_eq!(relay.await.unwrap(), RelayOutcome::AuthRejected);
}

#[tokio::test]
async fn test_relay_ignores_non_auth_frames_before_auth() {
    let mut node_side = Node::open().await;
    let endpoint = node_side.endpoint.clone();
    let ctx = context(Arc::new(MockPanel::new(&endpoint)), RelayConfig::default());
    ctx.registry.register(CREDENTIAL, RESOURCE, &endpoint, None);
    let (mut client, relay) = start_relay(ctx, RESOURCE).await;

    client.send(Message::Text("not json".into())).await.unwrap();
    client
        .send(Message::Binary(vec![0xde, 0xad].into()))
        .await
        .unwrap();
    client
        .send(event("send command", json!(["too early"])))
        .await
        .unwrap();
    client.send(event("auth", json!([]))).await.unwrap();
    client
        .send(event("auth", json!([format!("  {CREDENTIAL}  ")])))
        .await
        .unwrap();

    let mut node = node_side.next().await;
    assert_eq!(
        next_event(&mut node).await,
        json!({"event": "auth", "args": [CREDENTIAL]})
    );

    client
        .send(event("send command", json!(["in time"])))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut node).await,
        json!({"event": "send command", "args": ["in time"]})
    );

    node.close(None).await.unwrap();
    expect_closed(&mut client).await;
    assert_eq!(relay.await.unwrap(), RelayOutcome::Completed);
}

#[tokio::test]
async fn test_relay_flushes_queued_frames_in_order() {
    let mut node_side = Node::held().await;
    let ctx = context(
        Arc::new(MockPanel::new(&node_side.endpoint)),
        RelayConfig::default(),
    );
    ctx.registry
        .register(CREDENTIAL, RESOURCE, &node_side.endpoint, None);
    let (mut client, _relay) = start_relay(ctx, RESOURCE).await;

    client.send(event("auth", json!([CREDENTIAL]))).await.unwrap();
    node_side.wait_dialed().await;
    for n in 0..5 {
        client
            .send(event("send command", json!([format!("cmd-{n}")])))
            .await
            .unwrap();
    }
    node_side.release();

    let mut node = node_side.next().await;
    assert_eq!(next_event(&mut node).await["event"], "auth");
    for n in 0..5 {
        assert_eq!(
            next_event(&mut node).await["args"][0],
            format!("cmd-{n}")
        );
    }
}

#[tokio::test]
async fn test_relay_queue_overflow_keeps_newest_frames() {
    let mut node_side = Node::held().await;
    let config = RelayConfig {
        queue_capacity: 3,
        ..RelayConfig::default()
    };
    let ctx = context(Arc::new(MockPanel::new(&node_side.endpoint)), config);
    ctx.registry
        .register(CREDENTIAL, RESOURCE, &node_side.endpoint, None);

    let (client, feed, idle) = MemoryClient::new();
    feed.send(event_frame("auth", json!([CREDENTIAL]))).unwrap();
    for n in 0..6 {
        feed.send(event_frame("send command", json!([format!("cmd-{n}")])))
            .unwrap();
    }
    let _relay =
        tokio::spawn(RelaySession::new(RESOURCE, ctx, client).run());

    // Every fed frame has been read while the dial is still pending.
    tokio::time::timeout(STEP, idle.notified())
        .await
        .expect("relay should read every client frame");
    node_side.wait_dialed().await;
    node_side.release();

    let mut node = node_side.next().await;
    assert_eq!(next_event(&mut node).await["event"], "auth");
    for n in 3..6 {
        assert_eq!(
            next_event(&mut node).await["args"][0],
            format!("cmd-{n}")
        );
    }
    drop(feed);
    expect_closed(&mut node).await;
}

#[tokio::test]
async fn test_relay_client_close_while_dialing_abandons_node() {
    let mut node_side = Node::held().await;
    let ctx = context(
        Arc::new(MockPanel::new(&node_side.endpoint)),
        RelayConfig::default(),
    );
    ctx.registry
        .register(CREDENTIAL, RESOURCE, &node_side.endpoint, None);
    let (mut client, relay) = start_relay(ctx, RESOURCE).await;

    client.send(event("auth", json!([CREDENTIAL]))).await.unwrap();
    node_side.wait_dialed().await;
    client.close(None).await.unwrap();

    let outcome = tokio::time::timeout(STEP, relay)
        .await
        .expect("session should end while the dial is pending")
        .unwrap();
    assert_eq!(outcome, RelayOutcome::ClientClosed);

    // The relay dropped its half of the dial. An upgrade that still
    // completes on the node side only finds a dead socket.
    node_side.release();
    let late = Duration::from_millis(300);
    match tokio::time::timeout(late, node_side.upgraded.recv()).await {
        Err(_) | Ok(None) => {}
        Ok(Some(mut node)) => expect_closed(&mut node).await,
    }
}

#[tokio::test]
async fn test_relay_refreshes_credential_on_same_node_connection() {
    let mut node_side = Node::open().await;
    let endpoint = node_side.endpoint.clone();
    let panel = Arc::new(MockPanel::new(&endpoint));
    let ctx = context(Arc::clone(&panel), RelayConfig::default());
    let registry = Arc::clone(&ctx.registry);
    registry.register(CREDENTIAL, RESOURCE, &endpoint, None);
    let (mut client, _relay) = start_relay(ctx, RESOURCE).await;

    client.send(event("auth", json!([CREDENTIAL]))).await.unwrap();
    let mut node = node_side.next().await;
    assert_eq!(next_event(&mut node).await["event"], "auth");

    node.send(event("token expiring", json!([]))).await.unwrap();

    assert_eq!(
        next_event(&mut node).await,
        json!({"event": "auth", "args": ["refreshed-credential-1"]})
    );
    assert_eq!(
        next_event(&mut client).await,
        json!({"event": "token refreshed", "args": ["refreshe"]})
    );
    assert_eq!(
        next_event(&mut client).await,
        json!({"event": "token expiring", "args": []})
    );

    assert_eq!(panel.issued.load(Ordering::SeqCst), 1);
    let record = registry.get("refreshed-credential-1").unwrap();
    assert_eq!(record.resource_id, RESOURCE);
    assert!(record.expires_at.is_some());
    node_side.wait_dialed().await;
    assert!(node_side.dialed.try_recv().is_err(), "no second node connection");

    // The session keeps relaying on the same connection.
    client
        .send(event("send command", json!(["after refresh"])))
        .await
        .unwrap();
    assert_eq!(next_event(&mut node).await["args"][0], "after refresh");
}

#[tokio::test]
async fn test_relay_refresh_failure_reports_error_and_keeps_session() {
    let mut node_side = Node::open().await;
    let endpoint = node_side.endpoint.clone();
    let ctx = context(
        Arc::new(MockPanel::failing(&endpoint)),
        RelayConfig::default(),
    );
    ctx.registry.register(CREDENTIAL, RESOURCE, &endpoint, None);
    let (mut client, _relay) = start_relay(ctx, RESOURCE).await;

    client.send(event("auth", json!([CREDENTIAL]))).await.unwrap();
    let mut node = node_side.next().await;
    assert_eq!(next_event(&mut node).await["event"], "auth");

    node.send(event("token expired", json!([]))).await.unwrap();
    assert_eq!(
        next_event(&mut client).await,
        json!({"event": "error", "args": ["credential refresh failed"]})
    );
    assert_eq!(next_event(&mut client).await["event"], "token expired");

    node.send(event("console output", json!(["still here"])))
        .await
        .unwrap();
    assert_eq!(next_event(&mut client).await["args"][0], "still here");
}

#[tokio::test]
async fn test_relay_node_close_closes_client() {
    let mut node_side = Node::open().await;
    let endpoint = node_side.endpoint.clone();
    let ctx = context(Arc::new(MockPanel::new(&endpoint)), RelayConfig::default());
    ctx.registry.register(CREDENTIAL, RESOURCE, &endpoint, None);
    let (mut client, relay) = start_relay(ctx, RESOURCE).await;

    client.send(event("auth", json!([CREDENTIAL]))).await.unwrap();
    let mut node = node_side.next().await;
    next_event(&mut node).await;

    node.close(None).await.unwrap();
    expect_closed(&mut client).await;
    assert_eq!(relay.await.unwrap(), RelayOutcome::Completed);
}

#[tokio::test]
async fn test_relay_unreachable_node_reports_backend_failure() {
    let endpoint = dead_endpoint().await;
    let ctx = context(Arc::new(MockPanel::new(&endpoint)), RelayConfig::default());
    ctx.registry.register(CREDENTIAL, RESOURCE, &endpoint, None);
    let (mut client, relay) = start_relay(ctx, RESOURCE).await;

    client.send(event("auth", json!([CREDENTIAL]))).await.unwrap();
    assert_eq!(
        next_event(&mut client).await,
        json!({"event": "error", "args": ["backend connection failed"]})
    );
    expect_closed(&mut client).await;
    assert_eq!(relay.await.unwrap(), RelayOutcome::BackendUnavailable);
}

#[tokio::test]
async fn test_relay_forwards_opaque_frames_verbatim() {
    let mut node_side = Node::open().await;
    let endpoint = node_side.endpoint.clone();
    let ctx = context(Arc::new(MockPanel::new(&endpoint)), RelayConfig::default());
    ctx.registry.register(CREDENTIAL, RESOURCE, &endpoint, None);
    let (mut client, _relay) = start_relay(ctx, RESOURCE).await;

    client.send(event("auth", json!([CREDENTIAL]))).await.unwrap();
    let mut node = node_side.next().await;
    next_event(&mut node).await;

    node.send(Message::Text("plain text, not json".into()))
        .await
        .unwrap();
    node.send(Message::Binary(vec![1, 2, 3, 255].into()))
        .await
        .unwrap();
    assert_eq!(
        next_message(&mut client).await,
        Message::Text("plain text, not json".into())
    );
    assert_eq!(
        next_message(&mut client).await,
        Message::Binary(vec![1, 2, 3, 255].into())
    );

    client
        .send(Message::Text(r#"{"event":"send stats"}"#.into()))
        .await
        .unwrap();
    assert_eq!(
        next_message(&mut node).await,
        Message::Text(r#"{"event":"send stats"}"#.into())
    );
}

#[tokio::test]
async fn test_relay_refresh_never_reveals_short_credential() {
    let mut node_side = Node::open().await;
    let endpoint = node_side.endpoint.clone();
    let ctx = context(
        Arc::new(MockPanel::issuing(&endpoint, "k3y9")),
        RelayConfig::default(),
    );
    ctx.registry.register(CREDENTIAL, RESOURCE, &endpoint, None);
    let (mut client, _relay) = start_relay(ctx, RESOURCE).await;

    client.send(event("auth", json!([CREDENTIAL]))).await.unwrap();
    let mut node = node_side.next().await;
    next_event(&mut node).await;

    node.send(event("token expiring", json!([]))).await.unwrap();
    assert_eq!(
        next_event(&mut node).await,
        json!({"event": "auth", "args": ["k3y9"]})
    );

    let notice = next_event(&mut client).await;
    assert_eq!(notice["event"], "token refreshed");
    let shown = notice["args"][0].as_str().unwrap();
    assert_ne!(shown, "k3y9");
    assert_eq!(shown, "k3");
}

#[tokio::test]
async fn test_relay_codec_encode_failure_fails_node_auth() {
    let mut node_side = Node::open().await;
    let endpoint = node_side.endpoint.clone();
    let ctx = context(Arc::new(MockPanel::new(&endpoint)), RelayConfig::default());
    ctx.registry.register(CREDENTIAL, RESOURCE, &endpoint, None);
    let (mut client, relay) =
        start_relay_with_codec(ctx, RESOURCE, EncodeFailingCodec).await;

    client.send(event("auth", json!([CREDENTIAL]))).await.unwrap();

    // The node never sees an auth frame, and the client's error frame
    // cannot be encoded either.
    let mut node = node_side.next().await;
    expect_closed(&mut node).await;
    expect_closed(&mut client).await;
    assert_eq!(relay.await.unwrap(), RelayOutcome::TransportFailed);
}
