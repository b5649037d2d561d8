//! Versioned, signed attestation document

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AttestError, IntegrityReport, QualityMetrics, SchemaReport, TokenId, ValidationOutcome, ValidationStatus,
    ValidatorKey,
};

pub const ATTESTATION_VERSION: &str = "1.0";

// Prefix for signed bytes so an attestation signature can never be replayed
// as a signature over some other message kind.
const DOMAIN_ATTESTATION: &[u8] = b"dataset-attestation/v1\0";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReports {
    pub integrity: IntegrityReport,
    pub schema: SchemaReport,
    pub quality: QualityMetrics,
}

/// Published verdict about one dataset. Unique per `(token_id, timestamp)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub version: String,
    pub validator: String,
    pub timestamp: DateTime<Utc>,
    pub token_id: TokenId,
    pub cid: String,
    pub validation: ValidationReports,
    pub status: ValidationStatus,
    pub signature: String,
}

impl Attestation {
    /// Bytes covered by the signature: every field except `signature` itself.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, AttestError> {
        // IMPORTANT: signature must not sign itself, so encode a copy with it blanked
        let mut tmp = self.clone();
        tmp.signature = String::new();
        let body = bincode::serialize(&tmp).map_err(|e| AttestError::Serialization(e.to_string()))?;

        let mut out = Vec::with_capacity(DOMAIN_ATTESTATION.len() + body.len());
        out.extend_from_slice(DOMAIN_ATTESTATION);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// BLAKE3 of the canonical bytes, hex. Stable content id for logs and events.
    pub fn document_hash(&self) -> Result<String, AttestError> {
        Ok(blake3::hash(&self.canonical_bytes()?).to_hex().to_string())
    }

    /// `attestation:<token_id>:<unix_ms>`
    pub fn key(&self) -> String {
        format!("attestation:{}:{}", self.token_id, self.timestamp.timestamp_millis())
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>, AttestError> {
        serde_json::to_vec_pretty(self).map_err(|e| AttestError::Serialization(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, AttestError> {
        serde_json::from_slice(bytes).map_err(|e| AttestError::Serialization(e.to_string()))
    }
}

/// Assembles attestations and signs them under one validator key.
pub struct AttestationBuilder<'k> {
    key: &'k ValidatorKey,
}

impl<'k> AttestationBuilder<'k> {
    pub fn new(key: &'k ValidatorKey) -> Self {
        Self { key }
    }

    pub fn build(&self, token_id: TokenId, cid: &str, outcome: ValidationOutcome) -> Result<Attestation, AttestError> {
        self.build_at(token_id, cid, outcome, Utc::now())
    }

    /// Timestamps are kept at millisecond precision, like ISO-8601 strings in JS land.
    pub fn build_at(
        &self,
        token_id: TokenId,
        cid: &str,
        outcome: ValidationOutcome,
        issued: DateTime<Utc>,
    ) -> Result<Attestation, AttestError> {
        let mut att = Attestation {
            version: ATTESTATION_VERSION.to_string(),
            validator: self.key.identity(),
            timestamp: issued.trunc_subsecs(3),
            token_id,
            cid: cid.to_string(),
            validation: outcome.reports,
            status: outcome.status,
            signature: String::new(),
        };
        att.signature = self.key.sign(&att)?;
        Ok(att)
    }
}
