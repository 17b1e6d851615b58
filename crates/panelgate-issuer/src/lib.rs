//! Upstream panel access and console credential issuance for Panelgate.
//!
//! - [`UpstreamPanelClient`]: the seam to the panel, with
//!   [`HttpPanelClient`] as the `reqwest` implementation.
//! - [`CredentialIssuer`]: asks the panel for a console credential,
//!   falling back to the application key when the client key is refused.
//! - [`extract`]: pulls credentials and endpoints out of whatever shape
//!   the panel responds with.

mod client;
mod error;
pub mod extract;
mod http;
mod issuer;

pub use client::{
    Authority, PanelCredentials, PowerAction, Resource, ResourceDetail,
    UpstreamPanelClient,
};
pub use error::UpstreamError;
pub use http::{HttpPanelClient, PanelConfig};
pub use issuer::{CredentialIssuer, IssueOutcome, IssuedCredential};
