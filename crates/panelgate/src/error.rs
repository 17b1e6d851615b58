//! Unified error types for the Panelgate gateway.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use panelgate_issuer::UpstreamError;
use panelgate_transport::TransportError;
use serde_json::json;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A transport-level error (bind, accept, dial).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The panel could not be configured or reached.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The HTTP listener failed.
    #[error("http listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by front door handlers.
///
/// Every variant renders as `{"success": false, "error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The issuer could not obtain a console credential.
    #[error("{0}")]
    Issuance(String),

    /// A pass-through call to the panel failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Issuance(_) => StatusCode::BAD_GATEWAY,
            Self::Upstream(UpstreamError::NotConfigured(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Upstream(UpstreamError::Unsupported(_)) => {
                StatusCode::NOT_IMPLEMENTED
            }
            // Client errors from the panel (bad login, unknown server)
            // keep their status; anything else is the gateway's problem.
            Self::Upstream(UpstreamError::Status { status, .. }) => {
                StatusCode::from_u16(*status)
                    .ok()
                    .filter(StatusCode::is_client_error)
                    .unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        tracing::warn!(%status, error = %message, "request failed");
        (status, Json(json!({ "success": false, "error": message })))
            .into_response()
    }
}
