//! Console credential registry for Panelgate.
//!
//! The panel hands out short-lived console credentials. This crate keeps
//! track of which credential unlocks which resource, where that resource's
//! node lives, and when the credential stops being valid.
//!
//! # How it fits in the stack
//!
//! ```text
//! Relay (above)   ← looks credentials up during the handshake and refresh
//!     ↕
//! Registry (this crate)  ← owns every CredentialRecord
//!     ↕
//! Issuer (beside) ← its callers register freshly issued credentials here
//! ```
//!
//! The registry is a plain value: construct one, wrap it in an `Arc`, and
//! hand it to whoever needs it. There is no global instance.

mod record;
mod registry;

pub use record::{CredentialRecord, CredentialSummary, REDACTED_PREFIX_LEN, redact};
pub use registry::CredentialRegistry;
