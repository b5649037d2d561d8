use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::{Pipeline, RunContext, RunOutcome};
use crate::types::{RunPhase, RunReport, RunSnapshot, ValidationRequest};

pub type SharedState = Arc<AppState>;

/// How long a finished run stays visible to `GET /validations/:id`.
pub const DEFAULT_RUN_RETENTION: Duration = Duration::from_secs(3600);

struct RunEntry {
    request: ValidationRequest,
    created_at: DateTime<Utc>,
    ctx: RunContext,
    report: Option<RunReport>,
    error: Option<String>,
    finished_at: Option<DateTime<Utc>>,
}

pub struct AppState {
    runs: Arc<RwLock<HashMap<Uuid, RunEntry>>>,
    limiter: Arc<Semaphore>,
    retention: Duration,
    pub pipeline: Arc<Pipeline>,
    pub identity: String,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, max_concurrent_runs: usize) -> Self {
        let identity = pipeline.identity();
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            limiter: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            retention: DEFAULT_RUN_RETENTION,
            pipeline,
            identity,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Register a run and start it in the background once a slot frees up.
    pub async fn submit(self: &Arc<Self>, req: ValidationRequest) -> (Uuid, RunPhase) {
        self.prune_finished().await;

        let run_id = Uuid::new_v4();
        let (ctx, _) = RunContext::new(run_id);

        self.runs.write().await.insert(
            run_id,
            RunEntry {
                request: req.clone(),
                created_at: Utc::now(),
                ctx: ctx.clone(),
                report: None,
                error: None,
                finished_at: None,
            },
        );

        let state = Arc::clone(self);
        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    let err = state.pipeline.mark_cancelled(&ctx);
                    state.finish_run(run_id, Err(err)).await;
                    return;
                }
                p = Arc::clone(&state.limiter).acquire_owned() => p,
            };
            let Ok(_permit) = permit else {
                warn!(run_id = %run_id, "run limiter closed");
                return;
            };
            let result = state.pipeline.run(req, ctx).await;
            state.finish_run(run_id, result).await;
        });

        (run_id, RunPhase::Queued)
    }

    pub async fn snapshot(&self, run_id: Uuid) -> Option<RunSnapshot> {
        let runs = self.runs.read().await;
        let entry = runs.get(&run_id)?;
        let phase = entry.ctx.phase();
        Some(RunSnapshot {
            run_id,
            token_id: entry.request.token_id.clone(),
            locator: entry.request.locator.clone(),
            phase,
            created_at: entry.created_at,
            outcome: entry.report.clone(),
            error: entry.error.clone(),
        })
    }

    /// `None` for an unknown run, `Some(false)` when it is past the point of cancellation.
    pub async fn cancel(&self, run_id: Uuid) -> Option<bool> {
        let runs = self.runs.read().await;
        let entry = runs.get(&run_id)?;
        Some(entry.ctx.request_cancel())
    }

    async fn finish_run(&self, run_id: Uuid, result: Result<RunOutcome, PipelineError>) {
        if let Some(entry) = self.runs.write().await.get_mut(&run_id) {
            match result {
                Ok(outcome) => entry.report = Some(RunReport::from(&outcome)),
                Err(e) => entry.error = Some(e.to_string()),
            }
            entry.finished_at = Some(Utc::now());
        }
    }

    /// Drop finished runs older than the retention window. Returns how many went.
    pub async fn prune_finished(&self) -> usize {
        let cutoff = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|r| Utc::now().checked_sub_signed(r));
        let Some(cutoff) = cutoff else {
            return 0;
        };
        let mut runs = self.runs.write().await;
        let before = runs.len();
        runs.retain(|_, e| e.finished_at.map_or(true, |at| at > cutoff));
        let pruned = before - runs.len();
        if pruned > 0 {
            debug!(pruned, remaining = runs.len(), "pruned finished runs");
        }
        pruned
    }
}
