//! Ledger service collaborator: records attestation locators against tokens

use async_trait::async_trait;
use attest::TokenId;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use tokio::sync::Mutex;

use crate::error::CollaboratorError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub token_id: TokenId,
    #[serde(rename = "attestationCID")]
    pub attestation_cid: String,
    pub validator: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub explorer_url: Option<String>,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn record_attestation(&self, record: &LedgerRecord) -> Result<LedgerReceipt, CollaboratorError>;
}

/// Marketplace backend, `POST /api/mint/attestation`.
pub struct HttpLedger {
    base_url: String,
    hmac_secret: Option<String>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordResponse {
    #[serde(default)]
    success: bool,
    transaction_hash: Option<String>,
    explorer_url: Option<String>,
    error: Option<String>,
}

impl HttpLedger {
    pub fn new(base_url: String, hmac_secret: Option<String>) -> Self {
        Self {
            base_url,
            hmac_secret,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn record_attestation(&self, record: &LedgerRecord) -> Result<LedgerReceipt, CollaboratorError> {
        let body = serde_json::to_string(record).map_err(|e| CollaboratorError::Decode(e.to_string()))?;
        let url = format!("{}/api/mint/attestation", self.base_url.trim_end_matches('/'));

        let mut req = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Idempotency-Key", format!("{}:{}", record.token_id, record.attestation_cid));

        if let Some(secret) = &self.hmac_secret {
            let ts = Utc::now().timestamp();
            req = req
                .header("X-Timestamp", ts.to_string())
                .header("X-Signature", sign_payload(secret, ts, &body));
        }

        let resp = req
            .body(body)
            .send()
            .await
            .map_err(CollaboratorError::from_reqwest)?
            .error_for_status()
            .map_err(CollaboratorError::from_reqwest)?;

        let parsed: RecordResponse = resp.json().await.map_err(CollaboratorError::from_reqwest)?;
        match (parsed.success, parsed.transaction_hash) {
            (true, Some(transaction_hash)) => Ok(LedgerReceipt {
                transaction_hash,
                explorer_url: parsed.explorer_url,
            }),
            _ => Err(CollaboratorError::Rejected(
                parsed.error.unwrap_or_else(|| "ledger did not confirm the record".into()),
            )),
        }
    }
}

/// hex(HMAC-SHA256(secret, "<ts>.<body>"))
pub fn sign_payload(secret: &str, ts: i64, body: &str) -> String {
    let payload = format!("{}.{}", ts, body);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Ledger stand-in (tests, demos). Failures can be scripted per call.
#[derive(Default)]
pub struct InMemoryLedger {
    records: Mutex<Vec<LedgerRecord>>,
    failures: Mutex<VecDeque<CollaboratorError>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<LedgerRecord> {
        self.records.lock().await.clone()
    }

    pub async fn fail_next(&self, errs: impl IntoIterator<Item = CollaboratorError>) {
        self.failures.lock().await.extend(errs);
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn record_attestation(&self, record: &LedgerRecord) -> Result<LedgerReceipt, CollaboratorError> {
        if let Some(e) = self.failures.lock().await.pop_front() {
            return Err(e);
        }
        let mut records = self.records.lock().await;
        let mut h = Sha256::new();
        h.update(records.len().to_le_bytes());
        h.update(record.token_id.as_str().as_bytes());
        h.update(record.attestation_cid.as_bytes());
        records.push(record.clone());
        Ok(LedgerReceipt {
            transaction_hash: format!("0x{}", hex::encode(h.finalize())),
            explorer_url: None,
        })
    }
}
