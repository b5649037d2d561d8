use std::time::Duration;

use thiserror::Error;

/// Failure talking to the content store or the ledger service.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("bad response: {0}")]
    Decode(String),
}

impl CollaboratorError {
    /// Worth another attempt (network blips, 5xx, timeouts).
    pub fn is_transient(&self) -> bool {
        matches!(self, CollaboratorError::Unavailable(_) | CollaboratorError::Timeout(_))
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return CollaboratorError::Decode(e.to_string());
        }
        match e.status() {
            Some(s) if s.is_client_error() => CollaboratorError::Rejected(e.to_string()),
            _ => CollaboratorError::Unavailable(e.to_string()),
        }
    }
}

/// Publication step that did not go through. The attestation itself stays valid.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("attestation upload failed: {0}")]
    UploadFailed(CollaboratorError),

    #[error("ledger record failed: {0}")]
    LedgerFailed(CollaboratorError),

    #[error("attestation could not be encoded: {0}")]
    Encode(String),
}

/// Run-level failures. A negative verdict is not one of these.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("content {locator} unavailable: {source}")]
    ContentUnavailable {
        locator: String,
        #[source]
        source: CollaboratorError,
    },

    #[error("run cancelled during {0}")]
    Cancelled(crate::types::RunPhase),

    #[error("attestation could not be built: {0}")]
    Attestation(#[from] attest::AttestError),

    #[error("task failed: {0}")]
    Join(String),
}
