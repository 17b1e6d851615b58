//! Relay configuration.

use std::time::Duration;

/// Tunables for every relay session.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// How long a client has to send a valid `auth` frame.
    ///
    /// Default: 15 seconds.
    pub auth_timeout: Duration,

    /// How many client frames to hold while the node connection opens.
    /// Once full, the oldest frame is dropped.
    ///
    /// Default: 200.
    pub queue_capacity: usize,

    /// Lifetime given to credentials registered during a refresh.
    /// `None` registers them without expiry.
    ///
    /// Default: 15 minutes.
    pub credential_ttl: Option<Duration>,
}

impl RelayConfig {
    /// Default authentication window.
    pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(15);
    /// Default pending queue bound.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 200;
    /// Default credential lifetime.
    pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(15 * 60);
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            auth_timeout: Self::DEFAULT_AUTH_TIMEOUT,
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            credential_ttl: Some(Self::DEFAULT_CREDENTIAL_TTL),
        }
    }
}
