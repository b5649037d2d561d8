//! Retrieves dataset bytes from the content store

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::events::{EventSink, PipelineEvent};
use crate::retry::{retry, with_timeout, RetryPolicy};
use crate::store::ContentStore;

pub struct Fetcher {
    store: Arc<dyn ContentStore>,
    policy: RetryPolicy,
    timeout: Duration,
    events: Arc<dyn EventSink>,
}

impl Fetcher {
    pub fn new(store: Arc<dyn ContentStore>, policy: RetryPolicy, timeout: Duration, events: Arc<dyn EventSink>) -> Self {
        Self { store, policy, timeout, events }
    }

    /// Empty content is returned as-is; only an unreachable store aborts a run.
    pub async fn fetch(&self, run_id: Uuid, locator: &str) -> Result<Bytes, PipelineError> {
        let bytes = retry(
            &self.policy,
            |attempt| {
                debug!(run_id = %run_id, locator, attempt, "fetching dataset");
                with_timeout(self.timeout, self.store.fetch(locator))
            },
            |attempt, delay, err| {
                self.events.emit(PipelineEvent::RetryScheduled {
                    run_id,
                    operation: "fetch".into(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    error: err.to_string(),
                })
            },
        )
        .await
        .map_err(|source| PipelineError::ContentUnavailable {
            locator: locator.to_string(),
            source,
        })?;

        debug!(run_id = %run_id, locator, size = bytes.len(), "dataset fetched");
        Ok(bytes)
    }
}
