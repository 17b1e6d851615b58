//! `GatewayServer` builder and server loops.
//!
//! This is the entry point for running Panelgate. It ties together all the
//! layers: the HTTP front door on one listener and the console relay on
//! another, sharing one credential registry.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use panelgate_issuer::{CredentialIssuer, UpstreamPanelClient};
use panelgate_registry::CredentialRegistry;
use panelgate_relay::{RelayConfig, RelayContext, RelaySession};
use panelgate_transport::{
    Connection, InboundConnection, Incoming, PendingUpgrade, Transport,
    WebSocketDialer, WebSocketTransport,
};
use tokio::net::TcpListener;

use crate::http::{ApiState, router};
use crate::{GatewayConfig, GatewayError};

/// Path prefix of relay connections: `/ws/console/{resourceId}`.
pub const RELAY_PATH_PREFIX: &str = "/ws/console/";

/// Extracts the percent-decoded resource id from a relay request path.
///
/// The id is kept exactly as decoded, surrounding whitespace included.
/// Returns `None` for paths outside [`RELAY_PATH_PREFIX`], for nested
/// paths, and for an empty id.
pub fn resource_id_from_path(path: &str) -> Option<String> {
    let raw = path.strip_prefix(RELAY_PATH_PREFIX)?;
    let raw = raw.strip_suffix('/').unwrap_or(raw);
    if raw.is_empty() || raw.contains('/') {
        return None;
    }
    let id = urlencoding::decode(raw).ok()?;
    (!id.is_empty()).then(|| id.into_owned())
}

/// Builder for configuring and starting a Panelgate server.
///
/// # Example
///
/// ```rust,ignore
/// use panelgate::prelude::*;
///
/// let config = GatewayConfig::from_env();
/// let panel = HttpPanelClient::new(config.panel.clone())?;
/// let server = GatewayServerBuilder::from_config(&config)
///     .build(panel)
///     .await?;
/// server.run().await
/// ```
pub struct GatewayServerBuilder {
    http_addr: String,
    relay_addr: String,
    relay_config: RelayConfig,
    diagnostics_enabled: bool,
    origin: Option<String>,
}

impl GatewayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            http_addr: GatewayConfig::DEFAULT_HTTP_ADDR.to_owned(),
            relay_addr: GatewayConfig::DEFAULT_RELAY_ADDR.to_owned(),
            relay_config: RelayConfig::default(),
            diagnostics_enabled: false,
            origin: None,
        }
    }

    /// Creates a builder from a loaded configuration. The panel URL, when
    /// set, becomes the `Origin` presented to nodes.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            http_addr: config.http_addr.clone(),
            relay_addr: config.relay_addr.clone(),
            relay_config: config.relay.clone(),
            diagnostics_enabled: config.diagnostics_enabled,
            origin: config.panel.base_url.clone(),
        }
    }

    /// Sets the address of the HTTP front door.
    pub fn http_addr(mut self, addr: &str) -> Self {
        self.http_addr = addr.to_owned();
        self
    }

    /// Sets the address of the relay listener.
    pub fn relay_addr(mut self, addr: &str) -> Self {
        self.relay_addr = addr.to_owned();
        self
    }

    /// Sets the relay configuration.
    pub fn relay_config(mut self, config: RelayConfig) -> Self {
        self.relay_config = config;
        self
    }

    /// Enables or disables `GET /debug/credentials`.
    pub fn diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics_enabled = enabled;
        self
    }

    /// Sets the `Origin` header sent when dialing nodes.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Binds both listeners and wires the shared state around `panel`.
    pub async fn build<P: UpstreamPanelClient>(
        self,
        panel: P,
    ) -> Result<GatewayServer<P>, GatewayError> {
        let transport = WebSocketTransport::bind(&self.relay_addr)
            .await?
            .with_path_prefix(RELAY_PATH_PREFIX);
        let http_listener = TcpListener::bind(&self.http_addr).await?;
        tracing::info!(addr = %self.http_addr, "HTTP front door listening");

        let mut dialer = WebSocketDialer::new();
        if let Some(origin) = self.origin {
            dialer = dialer.with_origin(origin);
        }

        let ctx = RelayContext {
            registry: Arc::new(CredentialRegistry::new()),
            issuer: Arc::new(CredentialIssuer::new(Arc::new(panel))),
            dialer: Arc::new(dialer),
            config: self.relay_config,
        };

        Ok(GatewayServer {
            transport,
            http_listener,
            ctx,
            diagnostics_enabled: self.diagnostics_enabled,
        })
    }
}

impl Default for GatewayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Panelgate server.
///
/// Call [`run()`](Self::run) to start serving.
pub struct GatewayServer<P> {
    transport: WebSocketTransport,
    http_listener: TcpListener,
    ctx: RelayContext<P, WebSocketDialer>,
    diagnostics_enabled: bool,
}

impl<P: UpstreamPanelClient> GatewayServer<P> {
    /// Creates a new builder.
    pub fn builder() -> GatewayServerBuilder {
        GatewayServerBuilder::new()
    }

    /// Returns the address the HTTP front door is bound to.
    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http_listener.local_addr()
    }

    /// Returns the address the relay listener is bound to.
    pub fn relay_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry shared by the front door and every relay session.
    pub fn registry(&self) -> &Arc<CredentialRegistry> {
        &self.ctx.registry
    }

    /// The front door router, sharing this server's state.
    pub fn router(&self) -> Router {
        let state = Arc::new(ApiState {
            registry: Arc::clone(&self.ctx.registry),
            issuer: Arc::clone(&self.ctx.issuer),
            credential_ttl: self.ctx.config.credential_ttl,
        });
        router(state, self.diagnostics_enabled)
    }

    /// Runs the front door and the relay accept loop.
    ///
    /// Each relay connection gets its own task. Returns only if the HTTP
    /// listener fails.
    pub async fn run(self) -> Result<(), GatewayError> {
        let app = self.router();
        let Self {
            mut transport,
            http_listener,
            ctx,
            ..
        } = self;
        tracing::info!("Panelgate server running");

        tokio::select! {
            result = axum::serve(http_listener, app).into_future() => {
                result.map_err(GatewayError::Io)
            }
            () = accept_relays(&mut transport, ctx) => Ok(()),
        }
    }
}

/// Pause after a failed accept before polling the listener again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Takes sockets off the relay listener and hands each one to its own
/// task, which runs the upgrade and then the session.
async fn accept_relays<T, P>(
    transport: &mut T,
    ctx: RelayContext<P, WebSocketDialer>,
) where
    T: Transport<Incoming = PendingUpgrade>,
    P: UpstreamPanelClient,
{
    loop {
        let pending = match transport.accept().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "relay accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let ctx = ctx.clone();
        tokio::spawn(async move {
            let peer = pending.peer_addr();
            match pending.upgrade().await {
                Ok(conn) => serve_relay(conn, ctx).await,
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "relay upgrade failed");
                }
            }
        });
    }
}

async fn serve_relay<P: UpstreamPanelClient>(
    conn: InboundConnection,
    ctx: RelayContext<P, WebSocketDialer>,
) {
    let Some(resource_id) = resource_id_from_path(conn.path()) else {
        tracing::debug!(
            conn_id = %conn.id(),
            path = %conn.path(),
            "relay connection without resource id"
        );
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "closing relay connection failed");
        }
        return;
    };

    tracing::debug!(conn_id = %conn.id(), %resource_id, "relay connection");
    RelaySession::new(resource_id, ctx, conn).run().await;
}
