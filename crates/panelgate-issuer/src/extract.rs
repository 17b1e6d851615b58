//! Pulling fields out of loosely shaped panel responses.
//!
//! Different panel versions (and reverse proxies in front of them) wrap the
//! same data differently: `{"data":{"token":..}}`, `{"token":..}`,
//! `{"data":{"attributes":{"token":..}}}`. Rather than sprinkling optional
//! lookups around, every caller hands a list of dotted paths to
//! [`first_string`] and gets the first one that is present.

use serde_json::Value;

/// Where a console credential may live, in priority order.
pub const CREDENTIAL_PATHS: &[&str] = &[
    "data.token",
    "token",
    "data.attributes.token",
    "attributes.token",
    "data.credential",
    "credential",
];

/// Where the node WebSocket URL may live, in priority order.
pub const ENDPOINT_PATHS: &[&str] = &[
    "data.socket",
    "socket",
    "data.attributes.socket",
    "attributes.socket",
    "data.endpoint",
    "endpoint",
    "data.url",
    "url",
];

/// A credential and the endpoint it is valid against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleCredential {
    pub credential: String,
    pub endpoint: String,
}

/// Follows a dotted path (`"data.attributes.token"`) through nested
/// objects.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

/// Returns the first path that holds a non-blank string, trimmed.
pub fn first_string<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path)?.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Extracts a console credential and endpoint from an issuance response.
///
/// Both must be present; a response with only one is unusable.
pub fn extract_console_credential(value: &Value) -> Option<ConsoleCredential> {
    let credential = first_string(value, CREDENTIAL_PATHS)?;
    let endpoint = first_string(value, ENDPOINT_PATHS)?;
    Some(ConsoleCredential {
        credential: credential.to_owned(),
        endpoint: endpoint.to_owned(),
    })
}
