//! Uploads signed attestations and records them on the ledger

use std::sync::Arc;
use std::time::Duration;

use attest::Attestation;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CollaboratorError, PublishError};
use crate::events::{EventSink, PipelineEvent};
use crate::ledger::{Ledger, LedgerReceipt, LedgerRecord};
use crate::retry::{retry, with_timeout, RetryPolicy};
use crate::store::ContentStore;

#[derive(Debug, Clone)]
pub enum Publication {
    Complete {
        attestation_locator: String,
        receipt: LedgerReceipt,
    },
    /// Upload or ledger step gave up. `attestation_locator` is set when the upload went through.
    Partial {
        attestation_locator: Option<String>,
        failure: PublishError,
    },
}

pub struct Publisher {
    store: Arc<dyn ContentStore>,
    ledger: Arc<dyn Ledger>,
    policy: RetryPolicy,
    timeout: Duration,
    events: Arc<dyn EventSink>,
}

/// `attestation_<tokenId>_<unix-ms>.json`
pub fn document_name(att: &Attestation) -> String {
    format!("attestation_{}_{}.json", att.token_id, att.timestamp.timestamp_millis())
}

impl Publisher {
    pub fn new(
        store: Arc<dyn ContentStore>,
        ledger: Arc<dyn Ledger>,
        policy: RetryPolicy,
        timeout: Duration,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self { store, ledger, policy, timeout, events }
    }

    /// Never fails outright: a step that gives up comes back as `Publication::Partial`.
    pub async fn publish(&self, run_id: Uuid, att: &Attestation) -> Publication {
        let doc = match att.to_json_pretty() {
            Ok(json) => Bytes::from(json),
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "attestation could not be encoded");
                return Publication::Partial {
                    attestation_locator: None,
                    failure: PublishError::Encode(e.to_string()),
                };
            }
        };
        let name = document_name(att);

        let uploaded = retry(
            &self.policy,
            |_| with_timeout(self.timeout, self.store.upload(doc.clone(), &name)),
            |attempt, delay, err| self.retry_event(run_id, "upload", attempt, delay, err),
        )
        .await;
        let attestation_locator = match uploaded {
            Ok(loc) => loc,
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "attestation upload gave up");
                return Publication::Partial {
                    attestation_locator: None,
                    failure: PublishError::UploadFailed(e),
                };
            }
        };
        info!(run_id = %run_id, locator = %attestation_locator, "attestation uploaded");

        let record = LedgerRecord {
            token_id: att.token_id.clone(),
            attestation_cid: attestation_locator.clone(),
            validator: att.validator.clone(),
        };
        let recorded = retry(
            &self.policy,
            |_| with_timeout(self.timeout, self.ledger.record_attestation(&record)),
            |attempt, delay, err| self.retry_event(run_id, "ledger", attempt, delay, err),
        )
        .await;

        match recorded {
            Ok(receipt) => Publication::Complete { attestation_locator, receipt },
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "ledger record gave up");
                Publication::Partial {
                    attestation_locator: Some(attestation_locator),
                    failure: PublishError::LedgerFailed(e),
                }
            }
        }
    }

    fn retry_event(&self, run_id: Uuid, operation: &str, attempt: u32, delay: Duration, err: &CollaboratorError) {
        self.events.emit(PipelineEvent::RetryScheduled {
            run_id,
            operation: operation.to_string(),
            attempt,
            delay_ms: delay.as_millis() as u64,
            error: err.to_string(),
        });
    }
}
