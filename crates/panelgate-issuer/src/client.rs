//! The upstream panel seam.
//!
//! Panelgate never talks to the panel directly from the relay. Everything
//! goes through [`UpstreamPanelClient`], which lets production use
//! [`HttpPanelClient`](crate::HttpPanelClient) and tests use a scripted
//! mock.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::UpstreamError;
use crate::extract::first_string;

/// Which panel API key an issuance attempt runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    /// The user-level client API key. Always tried first.
    Client,
    /// The admin-level application API key. Fallback only.
    Application,
}

impl Authority {
    /// The panel API namespace for this authority (`/api/{scope}/...`).
    pub fn api_scope(self) -> &'static str {
        match self {
            Authority::Client => "client",
            Authority::Application => "application",
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_scope())
    }
}

/// A power signal for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    Start,
    Stop,
    Restart,
    Kill,
}

impl PowerAction {
    /// The signal name the panel expects.
    pub fn as_str(self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Stop => "stop",
            PowerAction::Restart => "restart",
            PowerAction::Kill => "kill",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login details forwarded to the panel.
#[derive(Clone, Deserialize)]
pub struct PanelCredentials {
    #[serde(alias = "email")]
    pub user: String,
    pub password: String,
}

impl fmt::Debug for PanelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A resource (game server) as listed by the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub node: Option<String>,
    pub description: Option<String>,
}

impl Resource {
    /// Builds a resource from a panel object, looking inside `attributes`
    /// when present.
    ///
    /// Returns `None` when no identifier can be found.
    pub fn from_panel_object(object: &Value) -> Option<Self> {
        let attributes = object.get("attributes").unwrap_or(object);
        let id = first_string(attributes, &["identifier", "id", "uuid"])?;
        let name = first_string(attributes, &["name"]).unwrap_or(id);
        Some(Self {
            id: id.to_owned(),
            name: name.to_owned(),
            node: first_string(attributes, &["node"]).map(str::to_owned),
            description: first_string(attributes, &["description"])
                .map(str::to_owned),
        })
    }
}

/// One resource plus everything else the panel said about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDetail {
    #[serde(flatten)]
    pub resource: Resource,
    pub attributes: Value,
}

/// Everything Panelgate needs from the upstream panel.
///
/// Only [`issue_console_credential`](Self::issue_console_credential) is
/// required; the pass-through operations default to
/// [`UpstreamError::Unsupported`].
pub trait UpstreamPanelClient: Send + Sync + 'static {
    /// Asks the panel for a console credential for `resource_id` using the
    /// given authority.
    ///
    /// The response is returned raw: its shape varies between deployments
    /// and is normalized by the issuer.
    fn issue_console_credential(
        &self,
        resource_id: &str,
        authority: Authority,
    ) -> impl Future<Output = Result<Value, UpstreamError>> + Send;

    /// Whether an application-level key is configured, enabling the
    /// fallback issuance attempt.
    fn has_elevated_authority(&self) -> bool {
        false
    }

    /// Logs in to the panel and returns its session data.
    fn authenticate(
        &self,
        _credentials: &PanelCredentials,
    ) -> impl Future<Output = Result<Value, UpstreamError>> + Send {
        async { Err(UpstreamError::Unsupported("authenticate")) }
    }

    /// Lists the resources visible to the client key.
    fn list_resources(
        &self,
    ) -> impl Future<Output = Result<Vec<Resource>, UpstreamError>> + Send {
        async { Err(UpstreamError::Unsupported("list_resources")) }
    }

    /// Fetches one resource.
    fn get_resource_detail(
        &self,
        _resource_id: &str,
    ) -> impl Future<Output = Result<ResourceDetail, UpstreamError>> + Send {
        async { Err(UpstreamError::Unsupported("get_resource_detail")) }
    }

    /// Sends a power signal.
    fn send_control_action(
        &self,
        _resource_id: &str,
        _action: PowerAction,
    ) -> impl Future<Output = Result<(), UpstreamError>> + Send {
        async { Err(UpstreamError::Unsupported("send_control_action")) }
    }
}
