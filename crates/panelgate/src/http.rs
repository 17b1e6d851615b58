//! The HTTP front door.
//!
//! Issues console credentials and passes a handful of panel operations
//! through, so the browser never holds a panel API key.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use panelgate_issuer::{
    CredentialIssuer, PanelCredentials, PowerAction, Resource,
    ResourceDetail, UpstreamPanelClient,
};
use panelgate_registry::{CredentialRegistry, CredentialSummary, redact};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::ApiError;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared across all front door handlers.
pub struct ApiState<P> {
    pub registry: Arc<CredentialRegistry>,
    pub issuer: Arc<CredentialIssuer<P>>,
    /// Lifetime of credentials issued over HTTP. `None` never expires.
    pub credential_ttl: Option<Duration>,
}

// ---------------------------------------------------------------------------
// Request / Response DTOs
// ---------------------------------------------------------------------------

/// Response of `POST /api/servers/{id}/console-credential`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialResponse {
    pub success: bool,
    pub credential: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/servers/{id}/power`.
#[derive(Debug, Deserialize)]
pub struct PowerRequest {
    pub action: PowerAction,
}

#[derive(Debug, Serialize)]
struct Data<T> {
    success: bool,
    data: T,
}

impl<T> Data<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /api/servers/{id}/console-credential`: issue and register a
/// console credential.
async fn issue_credential<P: UpstreamPanelClient>(
    State(state): State<Arc<ApiState<P>>>,
    Path(resource_id): Path<String>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let issued = state
        .issuer
        .issue(&resource_id)
        .await
        .into_result()
        .map_err(ApiError::Issuance)?;

    let record = state.registry.register(
        &issued.credential,
        &resource_id,
        &issued.endpoint,
        state.credential_ttl,
    );
    tracing::info!(
        %resource_id,
        credential = %redact(&issued.credential),
        authority = %issued.authority,
        "console credential issued"
    );

    Ok(Json(CredentialResponse {
        success: true,
        credential: issued.credential,
        expires_at: record.expires_at,
    }))
}

/// `GET /api/servers`
async fn list_servers<P: UpstreamPanelClient>(
    State(state): State<Arc<ApiState<P>>>,
) -> Result<Json<Data<Vec<Resource>>>, ApiError> {
    let resources = state.issuer.panel().list_resources().await?;
    Ok(Data::ok(resources))
}

/// `GET /api/servers/{id}`
async fn server_detail<P: UpstreamPanelClient>(
    State(state): State<Arc<ApiState<P>>>,
    Path(resource_id): Path<String>,
) -> Result<Json<Data<ResourceDetail>>, ApiError> {
    let detail = state
        .issuer
        .panel()
        .get_resource_detail(&resource_id)
        .await?;
    Ok(Data::ok(detail))
}

/// `POST /api/servers/{id}/power`
async fn send_power<P: UpstreamPanelClient>(
    State(state): State<Arc<ApiState<P>>>,
    Path(resource_id): Path<String>,
    Json(req): Json<PowerRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .issuer
        .panel()
        .send_control_action(&resource_id, req.action)
        .await?;
    tracing::info!(%resource_id, action = %req.action, "power action sent");
    Ok(Json(json!({ "success": true })))
}

/// `POST /api/login`: forwards `{email, password}` to the panel.
async fn login<P: UpstreamPanelClient>(
    State(state): State<Arc<ApiState<P>>>,
    Json(credentials): Json<PanelCredentials>,
) -> Result<Json<Data<Value>>, ApiError> {
    let session = state.issuer.panel().authenticate(&credentials).await?;
    Ok(Data::ok(session))
}

/// `GET /debug/credentials`: live registry contents, prefixes only.
async fn list_credentials<P: UpstreamPanelClient>(
    State(state): State<Arc<ApiState<P>>>,
) -> Json<Data<Vec<CredentialSummary>>> {
    Data::ok(state.registry.list())
}

/// `GET /health`
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Builds the front door router.
///
/// `/debug/credentials` only exists when `diagnostics_enabled` is set.
pub fn router<P: UpstreamPanelClient>(
    state: Arc<ApiState<P>>,
    diagnostics_enabled: bool,
) -> Router {
    let mut router = Router::new()
        .route(
            "/api/servers/{id}/console-credential",
            post(issue_credential::<P>),
        )
        .route("/api/servers", get(list_servers::<P>))
        .route("/api/servers/{id}", get(server_detail::<P>))
        .route("/api/servers/{id}/power", post(send_power::<P>))
        .route("/api/login", post(login::<P>))
        .route("/health", get(health));

    if diagnostics_enabled {
        router =
            router.route("/debug/credentials", get(list_credentials::<P>));
    }

    router.with_state(state)
}
