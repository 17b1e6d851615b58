//! The console relay for Panelgate.
//!
//! A [`RelaySession`] owns one browser connection. It waits for the browser
//! to present a console credential, dials the node the credential belongs
//! to, and then forwards frames in both directions until either side goes
//! away. When the node warns that its credential is expiring, the session
//! obtains a fresh one through the [`CredentialIssuer`] and re-authenticates
//! the node connection without dropping it.
//!
//! [`CredentialIssuer`]: panelgate_issuer::CredentialIssuer

mod config;
mod queue;
mod session;

pub use config::RelayConfig;
pub use queue::PendingQueue;
pub use session::{
    AUTH_TIMEOUT_MESSAGE, BACKEND_LOST_MESSAGE, BACKEND_UNAVAILABLE_MESSAGE,
    INVALID_CREDENTIAL_MESSAGE, REFRESH_FAILED_MESSAGE, RelayContext,
    RelayOutcome, RelaySession, RelayState,
};
