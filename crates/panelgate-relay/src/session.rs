//! One relay session: a browser connection paired with a node connection.
//!
//! The flow is:
//!   1. Wait (bounded) for an `auth` frame and validate its credential
//!   2. Dial the node, queueing client frames until it answers
//!   3. Authenticate to the node and flush the queue
//!   4. Pump frames both ways, refreshing the credential when the node
//!      says it is expiring
//!   5. Close both sides
//!
//! ```text
//! AwaitingAuth ──(valid auth)──→ Authenticated ──(node open)──→ Relaying
//!      │                              │                            │
//!      └──────────────(error / close / timeout)────────────────────┴──→ Closed
//! ```

use std::fmt;
use std::sync::Arc;

use panelgate_issuer::{CredentialIssuer, IssueOutcome, UpstreamPanelClient};
use panelgate_protocol::{Codec, EventFrame, JsonCodec};
use panelgate_registry::{CredentialRecord, CredentialRegistry, redact};
use panelgate_transport::{Connection, Dialer, Frame};

use crate::{PendingQueue, RelayConfig};

/// Sent when the client never authenticates in time.
pub const AUTH_TIMEOUT_MESSAGE: &str = "authentication timeout";
/// Sent when the presented credential is unknown, expired, or for another
/// resource.
pub const INVALID_CREDENTIAL_MESSAGE: &str = "invalid or expired credential";
/// Sent when the node cannot be reached.
pub const BACKEND_UNAVAILABLE_MESSAGE: &str = "backend connection failed";
/// Sent when the node connection breaks mid-session.
pub const BACKEND_LOST_MESSAGE: &str = "backend connection lost";
/// Sent when a credential refresh could not be completed.
pub const REFRESH_FAILED_MESSAGE: &str = "credential refresh failed";

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    AwaitingAuth,
    Authenticated,
    Relaying,
    Closed,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayState::AwaitingAuth => "awaiting-auth",
            RelayState::Authenticated => "authenticated",
            RelayState::Relaying => "relaying",
            RelayState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How a session ended. Sessions never fail with an error; every path
/// ends in one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// One side closed after the session was established.
    Completed,
    /// The client left before the node connection was established.
    ClientClosed,
    /// No valid `auth` frame arrived in time.
    AuthTimeout,
    /// The credential was unknown, expired, or for another resource.
    AuthRejected,
    /// The node could not be reached.
    BackendUnavailable,
    /// A send to the node failed mid-session.
    TransportFailed,
}

/// Shared collaborators handed to every session.
pub struct RelayContext<P, D> {
    pub registry: Arc<CredentialRegistry>,
    pub issuer: Arc<CredentialIssuer<P>>,
    pub dialer: Arc<D>,
    pub config: RelayConfig,
}

impl<P, D> Clone for RelayContext<P, D> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            issuer: Arc::clone(&self.issuer),
            dialer: Arc::clone(&self.dialer),
            config: self.config.clone(),
        }
    }
}

/// A single relay session, owned by the task that runs it.
///
/// The codec decodes `auth` and expiry frames and encodes the frames the
/// relay itself emits. Forwarded frames never pass through it.
pub struct RelaySession<P, D, I, C = JsonCodec> {
    resource_id: String,
    ctx: RelayContext<P, D>,
    inbound: I,
    state: RelayState,
    queue: PendingQueue,
    codec: C,
}

impl<P, D, I> RelaySession<P, D, I>
where
    P: UpstreamPanelClient,
    D: Dialer,
    I: Connection,
{
    /// Creates a session for `resource_id` over an accepted client
    /// connection, speaking JSON.
    pub fn new(
        resource_id: impl Into<String>,
        ctx: RelayContext<P, D>,
        inbound: I,
    ) -> Self {
        Self::with_codec(resource_id, ctx, inbound, JsonCodec)
    }
}

impl<P, D, I, C> RelaySession<P, D, I, C>
where
    P: UpstreamPanelClient,
    D: Dialer,
    I: Connection,
    C: Codec,
{
    /// Creates a session that uses `codec` for the frames it inspects or
    /// emits.
    pub fn with_codec(
        resource_id: impl Into<String>,
        ctx: RelayContext<P, D>,
        inbound: I,
        codec: C,
    ) -> Self {
        let queue = PendingQueue::new(ctx.config.queue_capacity);
        Self {
            resource_id: resource_id.into(),
            ctx,
            inbound,
            state: RelayState::AwaitingAuth,
            queue,
            codec,
        }
    }

    /// The resource this session was opened for.
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// The current lifecycle state.
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Drives the session to completion.
    pub async fn run(mut self) -> RelayOutcome {
        let (credential, record) = match self.await_auth().await {
            Ok(found) => found,
            Err(outcome) => return self.finish(None, outcome).await,
        };
        self.transition(RelayState::Authenticated);

        let outbound = match self.connect_backend(&record).await {
            Ok(conn) => conn,
            Err(outcome) => return self.finish(None, outcome).await,
        };

        if let Err(outcome) = self.open_backend(&outbound, &credential).await
        {
            return self.finish(Some(&outbound), outcome).await;
        }
        self.transition(RelayState::Relaying);

        let outcome = self.pump(&outbound).await;
        self.finish(Some(&outbound), outcome).await
    }

    fn transition(&mut self, next: RelayState) {
        tracing::debug!(
            resource_id = %self.resource_id,
            conn_id = %self.inbound.id(),
            from = %self.state,
            to = %next,
            "relay state change"
        );
        self.state = next;
    }

    // -----------------------------------------------------------------
    // AwaitingAuth
    // -----------------------------------------------------------------

    /// Waits for a valid `auth` frame. Anything else is ignored until the
    /// deadline fires, which it does at most once.
    async fn await_auth(
        &self,
    ) -> Result<(String, CredentialRecord), RelayOutcome> {
        let deadline = tokio::time::sleep(self.ctx.config.auth_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                () = &mut deadline => {
                    tracing::info!(
                        resource_id = %self.resource_id,
                        conn_id = %self.inbound.id(),
                        "client did not authenticate in time"
                    );
                    self.send_error(AUTH_TIMEOUT_MESSAGE).await;
                    return Err(RelayOutcome::AuthTimeout);
                }
                received = self.inbound.recv() => {
                    let frame = match received {
                        Ok(Some(frame)) => frame,
                        Ok(None) => return Err(RelayOutcome::ClientClosed),
                        Err(e) => {
                            tracing::debug!(error = %e, "client recv failed before auth");
                            return Err(RelayOutcome::ClientClosed);
                        }
                    };
                    let Some(credential) = self.auth_credential(&frame) else {
                        continue;
                    };
                    return match self.validate(&credential) {
                        Some(record) => Ok((credential, record)),
                        None => {
                            tracing::info!(
                                resource_id = %self.resource_id,
                                credential = %redact(&credential),
                                "credential rejected"
                            );
                            self.send_error(INVALID_CREDENTIAL_MESSAGE).await;
                            Err(RelayOutcome::AuthRejected)
                        }
                    };
                }
            }
        }
    }

    /// Extracts the trimmed credential from an `auth` frame.
    fn auth_credential(&self, frame: &Frame) -> Option<String> {
        let event = self.codec.decode(frame).ok()?;
        let credential = event.auth_credential()?.trim();
        (!credential.is_empty()).then(|| credential.to_owned())
    }

    /// The credential must exist and belong to this session's resource.
    fn validate(&self, credential: &str) -> Option<CredentialRecord> {
        self.ctx
            .registry
            .get(credential)
            .filter(|record| record.resource_id == self.resource_id)
    }

    // -----------------------------------------------------------------
    // Authenticated
    // -----------------------------------------------------------------

    /// Dials the node while queueing whatever the client sends meanwhile.
    async fn connect_backend(
        &mut self,
        record: &CredentialRecord,
    ) -> Result<D::Connection, RelayOutcome> {
        let dial = self.ctx.dialer.dial(&record.backend_endpoint);
        tokio::pin!(dial);

        loop {
            tokio::select! {
                result = &mut dial => {
                    return match result {
                        Ok(conn) => Ok(conn),
                        Err(e) => {
                            tracing::warn!(
                                resource_id = %self.resource_id,
                                error = %e,
                                "backend dial failed"
                            );
                            self.send_error(BACKEND_UNAVAILABLE_MESSAGE).await;
                            Err(RelayOutcome::BackendUnavailable)
                        }
                    };
                }
                received = self.inbound.recv() => match received {
                    Ok(Some(frame)) => {
                        if self.queue.push(frame).is_some() {
                            tracing::debug!(
                                resource_id = %self.resource_id,
                                evicted = self.queue.evicted(),
                                "pending queue full, dropped oldest frame"
                            );
                        }
                    }
                    Ok(None) | Err(_) => return Err(RelayOutcome::ClientClosed),
                },
            }
        }
    }

    /// Authenticates to the node, then flushes queued frames in order.
    async fn open_backend(
        &mut self,
        outbound: &D::Connection,
        credential: &str,
    ) -> Result<(), RelayOutcome> {
        if self
            .send_event(outbound, &EventFrame::auth(credential))
            .await
            .is_err()
        {
            self.send_error(BACKEND_LOST_MESSAGE).await;
            return Err(RelayOutcome::TransportFailed);
        }

        let queued: Vec<Frame> = self.queue.drain().collect();
        if !queued.is_empty() {
            tracing::debug!(
                resource_id = %self.resource_id,
                count = queued.len(),
                "flushing pending frames"
            );
        }
        for frame in queued {
            if let Err(e) = outbound.send(frame).await {
                tracing::warn!(error = %e, "flushing to backend failed");
                self.send_error(BACKEND_LOST_MESSAGE).await;
                return Err(RelayOutcome::TransportFailed);
            }
        }

        tracing::info!(
            resource_id = %self.resource_id,
            conn_id = %self.inbound.id(),
            backend_conn_id = %outbound.id(),
            "relay established"
        );
        Ok(())
    }

    // -----------------------------------------------------------------
    // Relaying
    // -----------------------------------------------------------------

    async fn pump(&self, outbound: &D::Connection) -> RelayOutcome {
        loop {
            tokio::select! {
                received = self.inbound.recv() => match received {
                    Ok(Some(frame)) => {
                        if let Err(e) = outbound.send(frame).await {
                            tracing::warn!(error = %e, "send to backend failed");
                            self.send_error(BACKEND_LOST_MESSAGE).await;
                            return RelayOutcome::TransportFailed;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(resource_id = %self.resource_id, "client closed");
                        return RelayOutcome::Completed;
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "client recv failed");
                        return RelayOutcome::Completed;
                    }
                },
                received = outbound.recv() => match received {
                    Ok(Some(frame)) => {
                        if self.signals_expiry(&frame) {
                            self.refresh(outbound).await;
                        }
                        if let Err(e) = self.inbound.send(frame).await {
                            tracing::debug!(error = %e, "send to client failed");
                            return RelayOutcome::Completed;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(resource_id = %self.resource_id, "backend closed");
                        return RelayOutcome::Completed;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "backend recv failed");
                        self.send_error(BACKEND_LOST_MESSAGE).await;
                        return RelayOutcome::TransportFailed;
                    }
                },
            }
        }
    }

    fn signals_expiry(&self, frame: &Frame) -> bool {
        self.codec.decode(frame)
            .is_ok_and(|event| event.signals_credential_expiry())
    }

    /// Replaces the node credential in place: issue, register,
    /// re-authenticate the existing node connection, tell the client.
    async fn refresh(&self, outbound: &D::Connection) {
        let issued = match self.ctx.issuer.issue(&self.resource_id).await {
            IssueOutcome::Issued(issued) => issued,
            IssueOutcome::Failed { error } => {
                tracing::warn!(
                    resource_id = %self.resource_id,
                    %error,
                    "credential refresh failed"
                );
                self.send_error(REFRESH_FAILED_MESSAGE).await;
                return;
            }
        };

        self.ctx.registry.register(
            &issued.credential,
            &self.resource_id,
            &issued.endpoint,
            self.ctx.config.credential_ttl,
        );

        if self
            .send_event(outbound, &EventFrame::auth(&issued.credential))
            .await
            .is_err()
        {
            self.send_error(REFRESH_FAILED_MESSAGE).await;
            return;
        }

        let prefix = redact(&issued.credential);
        tracing::info!(
            resource_id = %self.resource_id,
            credential = %prefix,
            "credential refreshed"
        );
        self.send_to_client(&EventFrame::token_refreshed(&prefix)).await;
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    async fn send_event(
        &self,
        outbound: &D::Connection,
        event: &EventFrame,
    ) -> Result<(), ()> {
        let frame = self.codec.encode(event).map_err(|e| {
            tracing::error!(error = %e, "failed to encode frame");
        })?;
        outbound.send(frame).await.map_err(|e| {
            tracing::warn!(
                resource_id = %self.resource_id,
                error = %e,
                "send to backend failed"
            );
        })
    }

    /// Best-effort send to the client; a closed client is not an error.
    async fn send_to_client(&self, event: &EventFrame) {
        match self.codec.encode(event) {
            Ok(frame) => {
                if let Err(e) = self.inbound.send(frame).await {
                    tracing::debug!(error = %e, "send to client failed");
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to encode frame"),
        }
    }

    async fn send_error(&self, message: &str) {
        self.send_to_client(&EventFrame::error(message)).await;
    }

    /// Closes both sides (each close is idempotent) and records the end.
    async fn finish(
        mut self,
        outbound: Option<&D::Connection>,
        outcome: RelayOutcome,
    ) -> RelayOutcome {
        if let Some(outbound) = outbound {
            if let Err(e) = outbound.close().await {
                tracing::debug!(error = %e, "closing backend failed");
            }
        }
        if let Err(e) = self.inbound.close().await {
            tracing::debug!(error = %e, "closing client failed");
        }
        self.transition(RelayState::Closed);
        tracing::info!(
            resource_id = %self.resource_id,
            conn_id = %self.inbound.id(),
            ?outcome,
            "relay session ended"
        );
        outcome
    }
}
