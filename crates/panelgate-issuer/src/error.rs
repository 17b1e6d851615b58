//! Error types for talking to the upstream panel.

/// Errors that can occur while calling the upstream panel.
///
/// These never cross the [`CredentialIssuer`](crate::CredentialIssuer)
/// boundary as-is: the issuer folds them into
/// [`IssueOutcome::Failed`](crate::IssueOutcome::Failed).
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// A required setting (panel URL, API key) is missing. No request was
    /// made.
    #[error("panel not configured: {0}")]
    NotConfigured(String),

    /// The HTTP call failed at the transport level.
    #[error("failed to reach panel: {0}")]
    Http(#[from] reqwest::Error),

    /// The panel answered with a non-success status.
    #[error("panel returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The panel answered, but not with anything we could use.
    #[error("unexpected panel response: {0}")]
    InvalidResponse(String),

    /// This client does not implement the operation.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}
