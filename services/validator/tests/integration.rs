use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use attest::{fixtures::sample_csv, verify, Attestation, ValidationStatus, ValidatorKey};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use validator::error::{CollaboratorError, PipelineError, PublishError};
use validator::events::MemoryEventSink;
use validator::ledger::{InMemoryLedger, Ledger, LedgerReceipt, LedgerRecord};
use validator::pipeline::{Pipeline, RunContext, RunOutcome};
use validator::retry::RetryPolicy;
use validator::state::AppState;
use validator::store::{ContentStore, InMemoryContentStore};
use validator::types::{RunPhase, ValidationRequest};

struct Harness {
    store: Arc<InMemoryContentStore>,
    ledger: Arc<InMemoryLedger>,
    events: Arc<MemoryEventSink>,
    pipeline: Arc<Pipeline>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryContentStore::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let events = Arc::new(MemoryEventSink::new());
    let pipeline = validator::build_pipeline(
        store.clone(),
        ledger.clone(),
        ValidatorKey::generate(),
        RetryPolicy::immediate(3),
        Duration::from_secs(5),
        events.clone(),
    );
    Harness { store, ledger, events, pipeline }
}

async fn run(h: &Harness, locator: &str) -> (Result<RunOutcome, PipelineError>, RunPhase, Uuid) {
    let run_id = Uuid::new_v4();
    let (ctx, phase) = RunContext::new(run_id);
    let req = ValidationRequest::new(locator, "42").unwrap();
    let out = h.pipeline.run(req, ctx).await;
    let last = *phase.borrow();
    (out, last, run_id)
}

#[tokio::test]
async fn test_clean_dataset_is_verified_and_published() {
    let h = harness();
    h.store.insert("QmSample", sample_csv(1000, 7)).await;

    let (out, phase, run_id) = run(&h, "QmSample").await;
    let out = out.unwrap();
    assert_eq!(phase, RunPhase::Done);

    let RunOutcome::Published { attestation, attestation_locator, receipt } = &out else {
        panic!("expected a complete publication, got {out:?}");
    };
    assert_eq!(attestation.status, ValidationStatus::Verified);
    assert_eq!(attestation.cid, "QmSample");
    assert_eq!(attestation.token_id.as_str(), "42");
    assert!(verify(attestation).is_ok());
    assert!(receipt.transaction_hash.starts_with("0x"));

    // uploaded document is the signed attestation
    let doc = h.store.get(attestation_locator).await.unwrap();
    let uploaded = Attestation::from_json(&doc).unwrap();
    assert_eq!(&uploaded, attestation);

    let records = h.ledger.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(&records[0].attestation_cid, attestation_locator);
    assert_eq!(records[0].validator, attestation.validator);

    let kinds = h.events.kinds(run_id);
    assert_eq!(kinds.first(), Some(&"run_started"));
    assert!(kinds.contains(&"attestation_built"));
    assert_eq!(kinds.last(), Some(&"phase_changed"));
    assert!(kinds.contains(&"published"));
}

#[tokio::test]
async fn test_malformed_row_gives_failed_verdict() {
    let h = harness();
    let mut csv = sample_csv(50, 3);
    csv.push_str("\n51,item_51,B,3.00,4.00,extra");
    h.store.insert("QmBad", csv).await;

    let (out, phase, _) = run(&h, "QmBad").await;
    let out = out.unwrap();
    assert_eq!(phase, RunPhase::Done);
    assert!(out.is_complete());
    assert_eq!(out.attestation().status, ValidationStatus::Failed);
    assert!(!out.attestation().validation.schema.valid);
}

#[tokio::test]
async fn test_empty_content_is_a_verdict_not_an_abort() {
    let h = harness();
    h.store.insert("QmEmpty", Bytes::new()).await;

    let (out, phase, _) = run(&h, "QmEmpty").await;
    let out = out.unwrap();
    assert_eq!(phase, RunPhase::Done);
    assert_eq!(out.attestation().status, ValidationStatus::Failed);
    assert!(!out.attestation().validation.integrity.valid_digest);
}

#[tokio::test]
async fn test_ledger_failure_keeps_attestation() {
    let h = harness();
    h.store.insert("QmSample", sample_csv(100, 1)).await;
    h.ledger.fail_next([CollaboratorError::Rejected("token unknown".into())]).await;

    let (out, phase, run_id) = run(&h, "QmSample").await;
    let out = out.unwrap();
    assert_eq!(phase, RunPhase::Done);

    let RunOutcome::PublishedPartially { attestation, attestation_locator, failure } = &out else {
        panic!("expected partial publication, got {out:?}");
    };
    assert!(verify(attestation).is_ok());
    assert!(attestation_locator.is_some());
    assert!(matches!(failure, PublishError::LedgerFailed(_)));
    assert!(h.ledger.records().await.is_empty());
    assert!(h.events.kinds(run_id).contains(&"publish_incomplete"));
}

#[tokio::test]
async fn test_upload_retries_then_gives_up() {
    let h = harness();
    h.store.insert("QmSample", sample_csv(10, 1)).await;
    h.store
        .fail_uploads((0..3).map(|_| CollaboratorError::Unavailable("503".into())))
        .await;

    let (out, _, run_id) = run(&h, "QmSample").await;
    let RunOutcome::PublishedPartially { attestation_locator, failure, .. } = out.unwrap() else {
        panic!("expected partial publication");
    };
    assert!(attestation_locator.is_none());
    assert!(matches!(failure, PublishError::UploadFailed(_)));
    let retries = h.events.kinds(run_id).iter().filter(|k| **k == "retry_scheduled").count();
    assert_eq!(retries, 2);
    assert!(h.ledger.records().await.is_empty());
}

#[tokio::test]
async fn test_transient_fetch_errors_are_retried() {
    let h = harness();
    h.store.insert("QmSample", sample_csv(10, 9)).await;
    h.store
        .fail_fetches([
            CollaboratorError::Unavailable("reset".into()),
            CollaboratorError::Timeout(Duration::from_secs(1)),
        ])
        .await;

    let (out, phase, run_id) = run(&h, "QmSample").await;
    assert!(out.is_ok());
    assert_eq!(phase, RunPhase::Done);
    let retries = h.events.kinds(run_id).iter().filter(|k| **k == "retry_scheduled").count();
    assert_eq!(retries, 2);
}

#[tokio::test]
async fn test_unreachable_content_aborts() {
    let h = harness();
    h.store
        .fail_fetches((0..3).map(|_| CollaboratorError::Unavailable("down".into())))
        .await;

    let (out, phase, run_id) = run(&h, "QmSample").await;
    assert!(matches!(out, Err(PipelineError::ContentUnavailable { .. })));
    assert_eq!(phase, RunPhase::Aborted);
    assert!(h.events.kinds(run_id).contains(&"aborted"));
    assert!(h.store.uploads().await.is_empty());
    assert!(h.ledger.records().await.is_empty());
}

#[tokio::test]
async fn test_missing_content_is_not_retried() {
    let h = harness();
    let (out, phase, run_id) = run(&h, "QmMissing").await;
    assert!(matches!(out, Err(PipelineError::ContentUnavailable { .. })));
    assert_eq!(phase, RunPhase::Aborted);
    assert!(!h.events.kinds(run_id).contains(&"retry_scheduled"));
}

#[tokio::test]
async fn test_cancelled_before_fetch() {
    let h = harness();
    h.store.insert("QmSample", sample_csv(10, 9)).await;

    let (ctx, phase) = RunContext::new(Uuid::new_v4());
    ctx.cancel.cancel();
    let out = h.pipeline.run(ValidationRequest::new("QmSample", "1").unwrap(), ctx).await;

    assert!(matches!(out, Err(PipelineError::Cancelled(RunPhase::Fetching))));
    assert_eq!(*phase.borrow(), RunPhase::Cancelled);
    assert!(h.ledger.records().await.is_empty());
}

/// Fetches never complete.
struct StalledStore;

#[async_trait]
impl ContentStore for StalledStore {
    async fn fetch(&self, _locator: &str) -> Result<Bytes, CollaboratorError> {
        std::future::pending().await
    }

    async fn upload(&self, _bytes: Bytes, _name: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Rejected("read only".into()))
    }
}

fn stalled_state(max_concurrent: usize) -> AppState {
    let pipeline = validator::build_pipeline(
        Arc::new(StalledStore),
        Arc::new(InMemoryLedger::new()),
        ValidatorKey::generate(),
        RetryPolicy::immediate(1),
        Duration::from_secs(60),
        Arc::new(MemoryEventSink::new()),
    );
    AppState::new(pipeline, max_concurrent)
}

async fn wait_for_phase(state: &AppState, run_id: Uuid, want: RunPhase) {
    for _ in 0..200 {
        if state.snapshot(run_id).await.map(|s| s.phase) == Some(want) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {run_id} never reached {want}");
}

#[tokio::test]
async fn test_cancel_while_fetching_and_queued() {
    let state = Arc::new(stalled_state(1));

    let (first, _) = state.submit(ValidationRequest::new("QmA", "1").unwrap()).await;
    wait_for_phase(&state, first, RunPhase::Fetching).await;
    let (second, phase) = state.submit(ValidationRequest::new("QmB", "2").unwrap()).await;
    assert_eq!(phase, RunPhase::Queued);

    assert_eq!(state.cancel(second).await, Some(true));
    wait_for_phase(&state, second, RunPhase::Cancelled).await;

    assert_eq!(state.cancel(first).await, Some(true));
    wait_for_phase(&state, first, RunPhase::Cancelled).await;

    // terminal runs cannot be cancelled again
    assert_eq!(state.cancel(first).await, Some(false));
    assert_eq!(state.cancel(Uuid::new_v4()).await, None);
}

/// Ledger that takes its time, so a run sits in Publishing for a while.
struct SlowLedger {
    inner: InMemoryLedger,
    delay: Duration,
}

#[async_trait]
impl Ledger for SlowLedger {
    async fn record_attestation(&self, record: &LedgerRecord) -> Result<LedgerReceipt, CollaboratorError> {
        tokio::time::sleep(self.delay).await;
        self.inner.record_attestation(record).await
    }
}

#[tokio::test]
async fn test_run_finishes_after_caller_drops_it() {
    let store = Arc::new(InMemoryContentStore::new());
    store.insert("QmSample", sample_csv(100, 5)).await;
    let ledger = Arc::new(SlowLedger { inner: InMemoryLedger::new(), delay: Duration::from_millis(200) });
    let pipeline = validator::build_pipeline(
        store,
        ledger.clone(),
        ValidatorKey::generate(),
        RetryPolicy::immediate(3),
        Duration::from_secs(5),
        Arc::new(MemoryEventSink::new()),
    );

    let (ctx, mut phase) = RunContext::new(Uuid::new_v4());
    let req = ValidationRequest::new("QmSample", "8").unwrap();
    let caller = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run(req, ctx).await }
    });

    tokio::time::timeout(Duration::from_secs(5), phase.wait_for(|p| *p == RunPhase::Publishing))
        .await
        .unwrap()
        .unwrap();
    caller.abort();

    tokio::time::timeout(Duration::from_secs(5), phase.wait_for(|p| *p == RunPhase::Done))
        .await
        .unwrap()
        .unwrap();
    let records = ledger.inner.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].token_id.as_str(), "8");
}

#[tokio::test]
async fn test_cancel_during_checking_is_honoured() {
    let h = harness();
    h.store.insert("QmLarge", sample_csv(200_000, 3)).await;

    let (ctx, mut phase) = RunContext::new(Uuid::new_v4());
    let handle = ctx.clone();
    let req = ValidationRequest::new("QmLarge", "4").unwrap();
    let run = tokio::spawn({
        let pipeline = h.pipeline.clone();
        async move { pipeline.run(req, ctx).await }
    });

    tokio::time::timeout(Duration::from_secs(5), phase.wait_for(|p| *p == RunPhase::Checking))
        .await
        .unwrap()
        .unwrap();
    let requested = handle.request_cancel();
    let out = run.await.unwrap();

    // an accepted cancel always wins; a refused one means the verdict was already in
    if requested {
        assert!(matches!(out, Err(PipelineError::Cancelled(RunPhase::Checking))));
        assert_eq!(*phase.borrow(), RunPhase::Cancelled);
        assert!(h.ledger.records().await.is_empty());
    } else {
        assert!(out.is_ok());
        assert_eq!(*phase.borrow(), RunPhase::Done);
    }
}

#[tokio::test]
async fn test_finished_runs_are_evicted_after_retention() {
    let h = harness();
    h.store.insert("QmSample", sample_csv(10, 2)).await;
    let state = Arc::new(AppState::new(h.pipeline.clone(), 4).with_retention(Duration::ZERO));

    let (first, _) = state.submit(ValidationRequest::new("QmSample", "1").unwrap()).await;
    wait_for_phase(&state, first, RunPhase::Done).await;
    for _ in 0..200 {
        if state.snapshot(first).await.and_then(|s| s.outcome).is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // the next submission sweeps the finished run away
    let (second, _) = state.submit(ValidationRequest::new("QmSample", "2").unwrap()).await;
    assert!(state.snapshot(first).await.is_none());
    assert!(state.snapshot(second).await.is_some());
}

#[tokio::test]
async fn test_running_runs_are_never_evicted() {
    let state = Arc::new(stalled_state(1).with_retention(Duration::ZERO));
    let (run_id, _) = state.submit(ValidationRequest::new("QmA", "1").unwrap()).await;
    wait_for_phase(&state, run_id, RunPhase::Fetching).await;

    assert_eq!(state.prune_finished().await, 0);
    assert!(state.snapshot(run_id).await.is_some());
}

// --- HTTP ---

async fn call(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let resp = validator::app(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn in_memory_state(h: &Harness) -> Arc<AppState> {
    Arc::new(AppState::new(h.pipeline.clone(), 4))
}

#[tokio::test]
async fn test_http_health_reports_identity() {
    let h = harness();
    let state = in_memory_state(&h);
    let (status, body) = call(&state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["validator"], h.pipeline.identity());
}

#[tokio::test]
async fn test_http_submit_and_poll() {
    let h = harness();
    h.store.insert("QmSample", sample_csv(200, 4)).await;
    let state = in_memory_state(&h);

    let (status, body) = call(&state, "POST", "/validations", Some(json!({"locator": "QmSample", "tokenId": 9}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["phase"], "queued");
    let run_id = body["runId"].as_str().unwrap().to_string();

    let mut snapshot = Value::Null;
    for _ in 0..200 {
        let (status, body) = call(&state, "GET", &format!("/validations/{run_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        if !body["outcome"].is_null() {
            snapshot = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(snapshot["phase"], "done");
    assert_eq!(snapshot["tokenId"], "9");
    assert_eq!(snapshot["outcome"]["status"], "verified");
    assert_eq!(snapshot["outcome"]["publication"], "complete");

    // the published document verifies through the API
    let doc = snapshot["outcome"]["attestation"].clone();
    let (status, body) = call(&state, "POST", "/attestations/verify", Some(doc.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let mut tampered = doc;
    tampered["status"] = json!("failed");
    let (_, body) = call(&state, "POST", "/attestations/verify", Some(tampered)).await;
    assert_eq!(body["valid"], false);
    assert!(body["error"].is_string());

    let (_, body) = call(&state, "POST", &format!("/validations/{run_id}/cancel"), None).await;
    assert_eq!(body["status"], "noop");
}

#[tokio::test]
async fn test_http_rejects_bad_input() {
    let h = harness();
    let state = in_memory_state(&h);

    let (status, body) = call(&state, "POST", "/validations", Some(json!({"locator": "../etc", "tokenId": "1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("locator"));

    let (status, _) = call(&state, "POST", "/validations", Some(json!({"locator": "QmA", "tokenId": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&state, "GET", &format!("/validations/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
