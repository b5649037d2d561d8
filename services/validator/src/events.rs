//! Structured pipeline events, emitted through an injected sink

use std::sync::Mutex;

use attest::ValidationStatus;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::RunPhase;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted { run_id: Uuid, token_id: String, locator: String },

    PhaseChanged { run_id: Uuid, phase: RunPhase },

    StageCompleted { run_id: Uuid, stage: String, passed: bool, detail: String },

    RetryScheduled { run_id: Uuid, operation: String, attempt: u32, delay_ms: u64, error: String },

    AttestationBuilt { run_id: Uuid, status: ValidationStatus, document_hash: String },

    Published { run_id: Uuid, attestation_locator: String, transaction_hash: String },

    PublishIncomplete { run_id: Uuid, attestation_locator: Option<String>, error: String },

    Aborted { run_id: Uuid, error: String },

    Cancelled { run_id: Uuid, phase: RunPhase },
}

impl PipelineEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            PipelineEvent::RunStarted { run_id, .. }
            | PipelineEvent::PhaseChanged { run_id, .. }
            | PipelineEvent::StageCompleted { run_id, .. }
            | PipelineEvent::RetryScheduled { run_id, .. }
            | PipelineEvent::AttestationBuilt { run_id, .. }
            | PipelineEvent::Published { run_id, .. }
            | PipelineEvent::PublishIncomplete { run_id, .. }
            | PipelineEvent::Aborted { run_id, .. }
            | PipelineEvent::Cancelled { run_id, .. } => *run_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::RunStarted { .. } => "run_started",
            PipelineEvent::PhaseChanged { .. } => "phase_changed",
            PipelineEvent::StageCompleted { .. } => "stage_completed",
            PipelineEvent::RetryScheduled { .. } => "retry_scheduled",
            PipelineEvent::AttestationBuilt { .. } => "attestation_built",
            PipelineEvent::Published { .. } => "published",
            PipelineEvent::PublishIncomplete { .. } => "publish_incomplete",
            PipelineEvent::Aborted { .. } => "aborted",
            PipelineEvent::Cancelled { .. } => "cancelled",
        }
    }

    fn is_warning(&self) -> bool {
        matches!(
            self,
            PipelineEvent::RetryScheduled { .. } | PipelineEvent::PublishIncomplete { .. } | PipelineEvent::Aborted { .. }
        )
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Writes every event as one structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: PipelineEvent) {
        let body = serde_json::to_string(&event).unwrap_or_default();
        let run_id = event.run_id();
        let kind = event.kind();
        if event.is_warning() {
            warn!(target: "validator::events", run_id = %run_id, kind, event = %body);
        } else {
            info!(target: "validator::events", run_id = %run_id, kind, event = %body);
        }
    }
}

/// Keeps events in memory (tests, demos).
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn for_run(&self, run_id: Uuid) -> Vec<PipelineEvent> {
        self.events().into_iter().filter(|e| e.run_id() == run_id).collect()
    }

    pub fn kinds(&self, run_id: Uuid) -> Vec<&'static str> {
        self.for_run(run_id).iter().map(PipelineEvent::kind).collect()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut g) = self.events.lock() {
            g.push(event);
        }
    }
}
