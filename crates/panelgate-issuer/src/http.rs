//! [`UpstreamPanelClient`] over the panel's REST API, via `reqwest`.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde_json::{Value, json};

use crate::{
    Authority, PanelCredentials, PowerAction, Resource, ResourceDetail,
    UpstreamError, UpstreamPanelClient,
};

/// How long any single panel request may take.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error body kept from a failed panel response.
const MAX_ERROR_BODY: usize = 256;

/// Where the panel is and which keys to present.
///
/// Every field is optional so a half-configured gateway still starts; the
/// missing piece is reported as [`UpstreamError::NotConfigured`] the first
/// time it is needed.
#[derive(Clone, Default)]
pub struct PanelConfig {
    /// Base URL, e.g. `https://panel.example.com`.
    pub base_url: Option<String>,
    /// User-level client API key.
    pub client_key: Option<String>,
    /// Admin-level application API key (enables fallback issuance).
    pub application_key: Option<String>,
}

impl std::fmt::Debug for PanelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelConfig")
            .field("base_url", &self.base_url)
            .field("client_key", &self.client_key.as_ref().map(|_| "<set>"))
            .field(
                "application_key",
                &self.application_key.as_ref().map(|_| "<set>"),
            )
            .finish()
    }
}

/// Talks to the panel over HTTPS with bearer API keys.
#[derive(Debug, Clone)]
pub struct HttpPanelClient {
    http: reqwest::Client,
    config: PanelConfig,
}

impl HttpPanelClient {
    /// Creates a client for the given panel.
    pub fn new(config: PanelConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, config })
    }

    /// The configured panel URL without a trailing slash.
    pub fn base_url(&self) -> Result<&str, UpstreamError> {
        self.config
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .ok_or_else(|| UpstreamError::NotConfigured("panel URL".into()))
    }

    fn key_for(&self, authority: Authority) -> Result<&str, UpstreamError> {
        let (key, name) = match authority {
            Authority::Client => (&self.config.client_key, "client API key"),
            Authority::Application => {
                (&self.config.application_key, "application API key")
            }
        };
        key.as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| UpstreamError::NotConfigured(name.into()))
    }

    /// Builds an authenticated request for `/api/{scope}{path}`.
    fn api_request(
        &self,
        method: Method,
        authority: Authority,
        path: &str,
    ) -> Result<RequestBuilder, UpstreamError> {
        let url = format!("{}/api/{}{path}", self.base_url()?, authority.api_scope());
        let key = self.key_for(authority)?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(key)
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    async fn json_body(request: RequestBuilder) -> Result<Value, UpstreamError> {
        let response = checked(request.send().await?).await?;
        Ok(response.json().await?)
    }
}

/// Turns a non-2xx response into [`UpstreamError::Status`].
async fn checked(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

fn server_path(resource_id: &str, suffix: &str) -> String {
    format!("/servers/{}{suffix}", urlencoding::encode(resource_id))
}

impl UpstreamPanelClient for HttpPanelClient {
    async fn issue_console_credential(
        &self,
        resource_id: &str,
        authority: Authority,
    ) -> Result<Value, UpstreamError> {
        let request = self.api_request(
            Method::GET,
            authority,
            &server_path(resource_id, "/websocket"),
        )?;
        Self::json_body(request).await
    }

    fn has_elevated_authority(&self) -> bool {
        self.key_for(Authority::Application).is_ok()
    }

    async fn authenticate(
        &self,
        credentials: &PanelCredentials,
    ) -> Result<Value, UpstreamError> {
        let url = format!("{}/auth/login", self.base_url()?);
        let request = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({
                "user": credentials.user,
                "password": credentials.password,
            }));
        Self::json_body(request).await
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, UpstreamError> {
        let request = self.api_request(Method::GET, Authority::Client, "")?;
        let body = Self::json_body(request).await?;
        let items = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                UpstreamError::InvalidResponse("missing data array".into())
            })?;
        Ok(items.iter().filter_map(Resource::from_panel_object).collect())
    }

    async fn get_resource_detail(
        &self,
        resource_id: &str,
    ) -> Result<ResourceDetail, UpstreamError> {
        let request = self.api_request(
            Method::GET,
            Authority::Client,
            &server_path(resource_id, ""),
        )?;
        let body = Self::json_body(request).await?;
        let resource = Resource::from_panel_object(&body).ok_or_else(|| {
            UpstreamError::InvalidResponse("resource has no identifier".into())
        })?;
        let attributes = body.get("attributes").cloned().unwrap_or(body);
        Ok(ResourceDetail {
            resource,
            attributes,
        })
    }

    async fn send_control_action(
        &self,
        resource_id: &str,
        action: PowerAction,
    ) -> Result<(), UpstreamError> {
        let request = self
            .api_request(
                Method::POST,
                Authority::Client,
                &server_path(resource_id, "/power"),
            )?
            .json(&json!({ "signal": action.as_str() }));
        checked(request.send().await?).await?;
        Ok(())
    }
}
