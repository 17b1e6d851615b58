//! Credential records: what the registry knows about one credential.
//!
//! A record answers three questions for the relay:
//! - WHICH resource the credential unlocks (`resource_id`)
//! - WHERE that resource's node is (`backend_endpoint`)
//! - WHEN the credential stops working (`expires_at`)

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Upper bound on how many leading characters of a credential may appear
/// in logs, diagnostics and client notifications.
pub const REDACTED_PREFIX_LEN: usize = 8;

/// Returns a leading slice of a credential that is safe to show.
///
/// The prefix is at most [`REDACTED_PREFIX_LEN`] characters and never more
/// than half of the trimmed credential, so a short credential is never
/// revealed whole. Counts characters, not bytes, so multi-byte input never
/// splits a code point.
pub fn redact(credential: &str) -> String {
    let credential = credential.trim();
    let shown = REDACTED_PREFIX_LEN.min(credential.chars().count() / 2);
    credential.chars().take(shown).collect()
}

// ---------------------------------------------------------------------------
// CredentialRecord
// ---------------------------------------------------------------------------

/// Metadata stored against one console credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    /// The resource (game server) this credential authorizes.
    ///
    /// A relay opened for a different resource must reject the credential
    /// even though it exists.
    pub resource_id: String,

    /// The node WebSocket this credential is valid against.
    pub backend_endpoint: String,

    /// When the record was registered.
    pub created_at: DateTime<Utc>,

    /// When the record stops being valid. `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    /// Creates a record stamped with the current time.
    pub fn new(
        resource_id: impl Into<String>,
        backend_endpoint: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            backend_endpoint: backend_endpoint.into(),
            created_at: Utc::now(),
            expires_at,
        }
    }

    /// `true` once `expires_at` is in the past relative to `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

// ---------------------------------------------------------------------------
// CredentialSummary
// ---------------------------------------------------------------------------

/// A diagnostics view of one record. Never carries the full credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    /// First [`REDACTED_PREFIX_LEN`] characters of the credential.
    pub credential_prefix: String,
    pub resource_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}
