//! Console credential issuance with authority fallback.
//!
//! The issuer is a pure upstream component: it asks the panel for a
//! credential and normalizes the answer. Registering the result in the
//! [`CredentialRegistry`](panelgate_registry::CredentialRegistry) is the
//! caller's job, since only the caller knows which TTL applies.

use std::sync::Arc;

use panelgate_registry::redact;

use crate::extract::extract_console_credential;
use crate::{Authority, UpstreamError, UpstreamPanelClient};

/// A credential the panel handed out.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    /// The opaque credential the client echoes back in its `auth` frame.
    pub credential: String,
    /// The node WebSocket the credential is valid against.
    pub endpoint: String,
    /// Which authority produced it.
    pub authority: Authority,
}

impl std::fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("credential", &redact(&self.credential))
            .field("endpoint", &self.endpoint)
            .field("authority", &self.authority)
            .finish()
    }
}

/// The result of an issuance. Never an `Err`: failures are data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// The panel issued a usable credential.
    Issued(IssuedCredential),
    /// Every attempt failed; `error` describes each one.
    Failed { error: String },
}

impl IssueOutcome {
    /// Converts into a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> Result<IssuedCredential, String> {
        match self {
            IssueOutcome::Issued(issued) => Ok(issued),
            IssueOutcome::Failed { error } => Err(error),
        }
    }

    /// `true` for [`IssueOutcome::Issued`].
    pub fn is_issued(&self) -> bool {
        matches!(self, IssueOutcome::Issued(_))
    }
}

/// Mints console credentials through an [`UpstreamPanelClient`].
pub struct CredentialIssuer<P> {
    panel: Arc<P>,
}

impl<P: UpstreamPanelClient> CredentialIssuer<P> {
    /// Creates an issuer backed by `panel`.
    pub fn new(panel: Arc<P>) -> Self {
        Self { panel }
    }

    /// The panel client this issuer talks to.
    pub fn panel(&self) -> &Arc<P> {
        &self.panel
    }

    /// Issues a console credential for `resource_id`.
    ///
    /// Tries the client authority first. If that fails and the panel has
    /// an application key, tries once more with it.
    pub async fn issue(&self, resource_id: &str) -> IssueOutcome {
        let primary = match self.attempt(resource_id, Authority::Client).await {
            Ok(issued) => return IssueOutcome::Issued(issued),
            Err(e) => e,
        };

        if !self.panel.has_elevated_authority() {
            return IssueOutcome::Failed {
                error: primary.to_string(),
            };
        }

        match self.attempt(resource_id, Authority::Application).await {
            Ok(issued) => IssueOutcome::Issued(issued),
            Err(fallback) => IssueOutcome::Failed {
                error: format!(
                    "client authority: {primary}; application authority: {fallback}"
                ),
            },
        }
    }

    async fn attempt(
        &self,
        resource_id: &str,
        authority: Authority,
    ) -> Result<IssuedCredential, UpstreamError> {
        let result = self
            .panel
            .issue_console_credential(resource_id, authority)
            .await
            .and_then(|body| {
                extract_console_credential(&body).ok_or_else(|| {
                    UpstreamError::InvalidResponse(
                        "no credential and endpoint in issuance response".into(),
                    )
                })
            });

        match result {
            Ok(found) => {
                tracing::info!(
                    %resource_id,
                    %authority,
                    credential = %redact(&found.credential),
                    "console credential issued"
                );
                Ok(IssuedCredential {
                    credential: found.credential,
                    endpoint: found.endpoint,
                    authority,
                })
            }
            Err(e) => {
                tracing::warn!(
                    %resource_id,
                    %authority,
                    error = %e,
                    "console credential issuance failed"
                );
                Err(e)
            }
        }
    }
}
