//! Per-run orchestration: fetch, check, decide, build, publish

use std::sync::Arc;

use attest::{validate_bytes, Attestation, AttestationBuilder, ValidatorKey};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PublishError};
use crate::events::{EventSink, PipelineEvent};
use crate::fetcher::Fetcher;
use crate::ledger::LedgerReceipt;
use crate::publisher::{Publication, Publisher};
use crate::types::{RunPhase, ValidationRequest};

/// A run that got as far as a signed attestation.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Published {
        attestation: Attestation,
        attestation_locator: String,
        receipt: LedgerReceipt,
    },
    PublishedPartially {
        attestation: Attestation,
        attestation_locator: Option<String>,
        failure: PublishError,
    },
}

impl RunOutcome {
    pub fn attestation(&self) -> &Attestation {
        match self {
            RunOutcome::Published { attestation, .. } | RunOutcome::PublishedPartially { attestation, .. } => attestation,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, RunOutcome::Published { .. })
    }
}

/// Handle shared between a run and whoever tracks it.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub cancel: CancellationToken,
    phase: Arc<watch::Sender<RunPhase>>,
}

impl RunContext {
    pub fn new(run_id: Uuid) -> (Self, watch::Receiver<RunPhase>) {
        let (tx, rx) = watch::channel(RunPhase::Queued);
        let ctx = Self {
            run_id,
            cancel: CancellationToken::new(),
            phase: Arc::new(tx),
        };
        (ctx, rx)
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: RunPhase) {
        self.phase.send_replace(phase);
    }

    /// Cancel if the run is still in a cancellable phase. Decided under the
    /// phase lock, so it cannot interleave with `advance_unless_cancelled`.
    pub fn request_cancel(&self) -> bool {
        let mut requested = false;
        self.phase.send_if_modified(|phase| {
            if phase.is_cancellable() && !self.cancel.is_cancelled() {
                self.cancel.cancel();
                requested = true;
            }
            false
        });
        requested
    }

    /// Move to `next` unless a cancel request got in first.
    fn advance_unless_cancelled(&self, next: RunPhase) -> bool {
        let mut advanced = false;
        self.phase.send_if_modified(|phase| {
            if self.cancel.is_cancelled() {
                return false;
            }
            *phase = next;
            advanced = true;
            true
        });
        advanced
    }
}

pub struct Pipeline {
    fetcher: Fetcher,
    publisher: Publisher,
    key: Arc<ValidatorKey>,
    events: Arc<dyn EventSink>,
}

impl Pipeline {
    pub fn new(fetcher: Fetcher, publisher: Publisher, key: Arc<ValidatorKey>, events: Arc<dyn EventSink>) -> Self {
        Self { fetcher, publisher, key, events }
    }

    pub fn identity(&self) -> String {
        self.key.identity()
    }

    pub async fn run(self: &Arc<Self>, req: ValidationRequest, ctx: RunContext) -> Result<RunOutcome, PipelineError> {
        let run_id = ctx.run_id;
        self.events.emit(PipelineEvent::RunStarted {
            run_id,
            token_id: req.token_id.to_string(),
            locator: req.locator.clone(),
        });
        info!(run_id = %run_id, token_id = %req.token_id, locator = %req.locator, "validation run started");

        // Fetching
        self.enter(&ctx, RunPhase::Fetching);
        let fetched = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(self.mark_cancelled(&ctx)),
            r = self.fetcher.fetch(run_id, &req.locator) => r,
        };
        let bytes = match fetched {
            Ok(b) => b,
            Err(e) => {
                self.enter(&ctx, RunPhase::Aborted);
                self.events.emit(PipelineEvent::Aborted { run_id, error: e.to_string() });
                warn!(run_id = %run_id, error = %e, "validation run aborted");
                return Err(e);
            }
        };

        // Checking
        self.enter(&ctx, RunPhase::Checking);
        let checks = tokio::task::spawn_blocking(move || validate_bytes(&bytes));
        let outcome = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(self.mark_cancelled(&ctx)),
            r = checks => r.map_err(|e| PipelineError::Join(e.to_string()))?,
        };
        // Deciding; past this point cancel requests are refused
        if !ctx.advance_unless_cancelled(RunPhase::Deciding) {
            return Err(self.mark_cancelled(&ctx));
        }
        self.events.emit(PipelineEvent::PhaseChanged { run_id, phase: RunPhase::Deciding });
        self.report_stages(run_id, &outcome);
        info!(run_id = %run_id, status = %outcome.status, score = outcome.reports.quality.score, "verdict");

        // From here on the run finishes even if the caller stops waiting.
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.build_and_publish(req, ctx, outcome).await });
        task.await.map_err(|e| PipelineError::Join(e.to_string()))?
    }

    async fn build_and_publish(
        &self,
        req: ValidationRequest,
        ctx: RunContext,
        outcome: attest::ValidationOutcome,
    ) -> Result<RunOutcome, PipelineError> {
        let run_id = ctx.run_id;

        self.enter(&ctx, RunPhase::Building);
        let attestation = match AttestationBuilder::new(&self.key).build(req.token_id, &req.locator, outcome) {
            Ok(a) => a,
            Err(e) => {
                self.enter(&ctx, RunPhase::Aborted);
                self.events.emit(PipelineEvent::Aborted { run_id, error: e.to_string() });
                return Err(e.into());
            }
        };
        match attestation.document_hash() {
            Ok(document_hash) => self.events.emit(PipelineEvent::AttestationBuilt {
                run_id,
                status: attestation.status,
                document_hash,
            }),
            Err(e) => warn!(run_id = %run_id, error = %e, "attestation hash unavailable"),
        }

        self.enter(&ctx, RunPhase::Publishing);
        let publication = self.publisher.publish(run_id, &attestation).await;
        let result = match publication {
            Publication::Complete { attestation_locator, receipt } => {
                self.events.emit(PipelineEvent::Published {
                    run_id,
                    attestation_locator: attestation_locator.clone(),
                    transaction_hash: receipt.transaction_hash.clone(),
                });
                info!(run_id = %run_id, tx = %receipt.transaction_hash, "attestation published");
                RunOutcome::Published { attestation, attestation_locator, receipt }
            }
            Publication::Partial { attestation_locator, failure } => {
                self.events.emit(PipelineEvent::PublishIncomplete {
                    run_id,
                    attestation_locator: attestation_locator.clone(),
                    error: failure.to_string(),
                });
                RunOutcome::PublishedPartially { attestation, attestation_locator, failure }
            }
        };

        self.enter(&ctx, RunPhase::Done);
        Ok(result)
    }

    /// Move to `Cancelled` from wherever the run currently is.
    pub(crate) fn mark_cancelled(&self, ctx: &RunContext) -> PipelineError {
        let at = ctx.phase();
        ctx.set_phase(RunPhase::Cancelled);
        self.events.emit(PipelineEvent::Cancelled { run_id: ctx.run_id, phase: at });
        info!(run_id = %ctx.run_id, phase = %at, "validation run cancelled");
        PipelineError::Cancelled(at)
    }

    fn enter(&self, ctx: &RunContext, phase: RunPhase) {
        ctx.set_phase(phase);
        self.events.emit(PipelineEvent::PhaseChanged { run_id: ctx.run_id, phase });
    }

    fn report_stages(&self, run_id: Uuid, outcome: &attest::ValidationOutcome) {
        let r = &outcome.reports;
        let stages = [
            ("integrity", r.integrity.valid_digest, format!("sha256 {}", r.integrity.digest_value)),
            ("schema", r.schema.valid, format!("{} rows", r.schema.row_count)),
            ("quality", r.quality.score >= attest::VERIFIED_THRESHOLD, format!("score {}", r.quality.score)),
        ];
        for (stage, passed, detail) in stages {
            info!(run_id = %run_id, stage, passed, %detail, "stage complete");
            self.events.emit(PipelineEvent::StageCompleted {
                run_id,
                stage: stage.to_string(),
                passed,
                detail,
            });
        }
    }
}
