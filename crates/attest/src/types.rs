//! Report types shared by the checks and the attestation document

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::AttestError;

/// Longest accepted token id (decimal uint256 has 78 digits).
pub const MAX_TOKEN_ID_LEN: usize = 78;

/// Identifier of the ownership token a dataset is listed under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    pub fn parse(raw: &str) -> Result<Self, AttestError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AttestError::TokenId("empty".into()));
        }
        if raw.len() > MAX_TOKEN_ID_LEN {
            return Err(AttestError::TokenId(format!("longer than {MAX_TOKEN_ID_LEN} chars")));
        }
        if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(AttestError::TokenId(format!("{raw:?} has characters outside [A-Za-z0-9_-]")));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
}

impl Check {
    pub fn new(name: &str, passed: bool) -> Self {
        Self { name: name.to_string(), passed }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub valid_digest: bool,
    pub digest_value: String,   // sha256, lowercase hex
    pub byte_size: u64,
    pub checks: Vec<Check>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaReport {
    pub valid: bool,
    pub header_fields: Vec<String>,
    pub row_count: u64,
    pub checks: Vec<Check>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub completeness: u8,   // 0..100
    pub consistency: u8,    // 0..100
    pub accuracy: u8,       // 0..100
    pub score: u8,          // rounded mean of the three
    pub details: QualityDetails,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityDetails {
    pub total_rows: u64,
    pub complete_rows: u64,
    pub unique_category_count: u64,
    pub inferred_types: BTreeMap<String, ColumnKind>,
}

/// Semantic kind of a dataset column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    String,
    Categorical,
}

/// Overall verdict of a validation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Verified,
    PartiallyVerified,
    Failed,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Verified => "verified",
            ValidationStatus::PartiallyVerified => "partially_verified",
            ValidationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
