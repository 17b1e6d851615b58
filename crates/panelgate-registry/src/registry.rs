//! The credential registry: every console credential the gateway knows.
//!
//! Responsibilities:
//! - Storing records keyed by the trimmed credential string
//! - Lazily dropping records once they expire (no background sweep)
//! - Producing a redacted listing for diagnostics
//!
//! # Concurrency note
//!
//! Every relay session shares one registry, so the map lives behind a
//! `std::sync::Mutex`. No operation awaits while holding the lock, which
//! keeps a blocking mutex safe to use from async tasks.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{CredentialRecord, CredentialSummary, redact};

/// In-memory map from credential to [`CredentialRecord`].
///
/// ## Lifecycle
///
/// ```text
/// issue ──→ register()/put() ──→ get() ... get() ──→ (expired) evicted
///                                   │
///                                   └──→ remove()
/// ```
///
/// Credentials stay valid for repeated lookups until they expire.
#[derive(Debug, Default)]
pub struct CredentialRegistry {
    records: Mutex<HashMap<String, CredentialRecord>>,
}

impl CredentialRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A panicking holder cannot leave the map half-written (every
    /// mutation is a single `HashMap` call), so a poisoned lock is still
    /// safe to use.
    fn records(&self) -> MutexGuard<'_, HashMap<String, CredentialRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `record` under the trimmed `credential`, replacing any
    /// existing entry.
    pub fn put(&self, credential: &str, record: CredentialRecord) {
        let key = credential.trim().to_owned();
        tracing::debug!(
            credential = %redact(&key),
            resource_id = %record.resource_id,
            "credential registered"
        );
        self.records().insert(key, record);
    }

    /// Builds a record stamped now, valid for `ttl` (forever if `None`),
    /// and stores it.
    ///
    /// Returns a copy of what was stored.
    pub fn register(
        &self,
        credential: &str,
        resource_id: &str,
        backend_endpoint: &str,
        ttl: Option<Duration>,
    ) -> CredentialRecord {
        let created_at = Utc::now();
        let record = CredentialRecord {
            resource_id: resource_id.to_owned(),
            backend_endpoint: backend_endpoint.to_owned(),
            created_at,
            expires_at: ttl.and_then(|ttl| expiry_after(created_at, ttl)),
        };
        self.put(credential, record.clone());
        record
    }

    /// Looks up the trimmed `credential`.
    ///
    /// An expired record is removed and reported as absent.
    pub fn get(&self, credential: &str) -> Option<CredentialRecord> {
        let key = credential.trim();
        let mut records = self.records();
        let record = records.get(key)?;

        if record.is_expired_at(Utc::now()) {
            records.remove(key);
            tracing::debug!(credential = %redact(key), "credential expired");
            return None;
        }

        Some(record.clone())
    }

    /// Removes the trimmed `credential`. Removing an unknown credential is
    /// a no-op.
    pub fn remove(&self, credential: &str) {
        self.records().remove(credential.trim());
    }

    /// Lists every live record with its credential redacted.
    ///
    /// Expired records found along the way are evicted.
    pub fn list(&self) -> Vec<CredentialSummary> {
        let now = Utc::now();
        let mut records = self.records();
        records.retain(|_, record| !record.is_expired_at(now));

        let mut summaries: Vec<CredentialSummary> = records
            .iter()
            .map(|(credential, record)| CredentialSummary {
                credential_prefix: redact(credential),
                resource_id: record.resource_id.clone(),
                created_at: record.created_at,
                expires_at: record.expires_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    /// Number of stored records, expired or not.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// `created_at + ttl`, or `None` when the sum does not fit (treated as
/// never expiring).
fn expiry_after(created_at: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| created_at.checked_add_signed(ttl))
}

// =========================================================================
// Tests
// =========================================================================
