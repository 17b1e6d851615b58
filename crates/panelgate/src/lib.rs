//! # Panelgate
//!
//! A console gateway for game-server management panels.
//!
//! Browsers never see panel API keys. They ask Panelgate's HTTP front door
//! for a short-lived console credential, then open a WebSocket to the relay
//! at `/ws/console/{resourceId}` and authenticate with it. The relay dials
//! the node daemon behind the resource and forwards console traffic both
//! ways, refreshing the node credential when it is about to expire.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use panelgate::prelude::*;
//!
//! # async fn start() -> Result<(), GatewayError> {
//! let config = GatewayConfig::from_env();
//! let panel = HttpPanelClient::new(config.panel.clone())?;
//! let server = GatewayServerBuilder::from_config(&config)
//!     .build(panel)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
pub mod http;
mod server;

pub use config::GatewayConfig;
pub use error::{ApiError, GatewayError};
pub use server::{
    GatewayServer, GatewayServerBuilder, RELAY_PATH_PREFIX,
    resource_id_from_path,
};

/// Everything needed to configure and run a gateway.
pub mod prelude {
    pub use crate::{
        ApiError, GatewayConfig, GatewayError, GatewayServer,
        GatewayServerBuilder,
    };
    pub use panelgate_issuer::{
        Authority, CredentialIssuer, HttpPanelClient, IssueOutcome,
        PanelConfig, UpstreamError, UpstreamPanelClient,
    };
    pub use panelgate_protocol::{EventFrame, events};
    pub use panelgate_registry::{CredentialRecord, CredentialRegistry};
    pub use panelgate_relay::{RelayConfig, RelayOutcome};
}
