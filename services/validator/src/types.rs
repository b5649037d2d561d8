use std::fmt;

use attest::{Attestation, TokenId, ValidationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::pipeline::RunOutcome;

pub const MAX_LOCATOR_LEN: usize = 512;

/// Untrusted request body. Token ids arrive as strings or plain numbers.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequestBody {
    pub locator: String,
    pub token_id: RawTokenId,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawTokenId {
    Text(String),
    Number(u64),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("{0}")]
    InvalidTokenId(String),
}

/// Validated pipeline input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationRequest {
    pub locator: String,
    pub token_id: TokenId,
}

impl ValidationRequest {
    pub fn new(locator: &str, token_id: &str) -> Result<Self, RequestError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(RequestError::InvalidLocator("empty".into()));
        }
        if locator.len() > MAX_LOCATOR_LEN {
            return Err(RequestError::InvalidLocator(format!("longer than {MAX_LOCATOR_LEN} bytes")));
        }
        // content ids only; the locator ends up in gateway URL paths
        if !locator.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) || locator.contains("..") {
            return Err(RequestError::InvalidLocator(format!("{locator:?} is not a content id")));
        }
        let token_id = TokenId::parse(token_id).map_err(|e| RequestError::InvalidTokenId(e.to_string()))?;
        Ok(Self { locator: locator.to_string(), token_id })
    }
}

impl TryFrom<ValidationRequestBody> for ValidationRequest {
    type Error = RequestError;

    fn try_from(body: ValidationRequestBody) -> Result<Self, Self::Error> {
        let token = match body.token_id {
            RawTokenId::Text(s) => s,
            RawTokenId::Number(n) => n.to_string(),
        };
        ValidationRequest::new(&body.locator, &token)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Queued,
    Fetching,
    Checking,
    Deciding,
    Building,
    Publishing,
    Done,
    Aborted,
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Aborted | RunPhase::Cancelled)
    }

    /// Cancellation is honoured up to the end of Checking.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, RunPhase::Queued | RunPhase::Fetching | RunPhase::Checking)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Queued => "queued",
            RunPhase::Fetching => "fetching",
            RunPhase::Checking => "checking",
            RunPhase::Deciding => "deciding",
            RunPhase::Building => "building",
            RunPhase::Publishing => "publishing",
            RunPhase::Done => "done",
            RunPhase::Aborted => "aborted",
            RunPhase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API view of a finished run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub status: ValidationStatus,
    pub publication: String, // "complete" | "partial"
    pub attestation_locator: Option<String>,
    pub transaction_hash: Option<String>,
    pub publish_error: Option<String>,
    pub attestation: Attestation,
}

impl From<&RunOutcome> for RunReport {
    fn from(outcome: &RunOutcome) -> Self {
        match outcome {
            RunOutcome::Published { attestation, attestation_locator, receipt } => RunReport {
                status: attestation.status,
                publication: "complete".into(),
                attestation_locator: Some(attestation_locator.clone()),
                transaction_hash: Some(receipt.transaction_hash.clone()),
                publish_error: None,
                attestation: attestation.clone(),
            },
            RunOutcome::PublishedPartially { attestation, attestation_locator, failure } => RunReport {
                status: attestation.status,
                publication: "partial".into(),
                attestation_locator: attestation_locator.clone(),
                transaction_hash: None,
                publish_error: Some(failure.to_string()),
                attestation: attestation.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub token_id: TokenId,
    pub locator: String,
    pub phase: RunPhase,
    pub created_at: DateTime<Utc>,
    pub outcome: Option<RunReport>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
