//! Dataset validation service: fetches datasets, runs the attest checks,
//! signs the verdict and publishes it to the content store and the ledger.

pub mod config;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod ledger;
pub mod pipeline;
pub mod publisher;
pub mod retry;
pub mod routes_attestations;
pub mod routes_validations;
pub mod state;
pub mod store;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use attest::ValidatorKey;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::events::EventSink;
use crate::fetcher::Fetcher;
use crate::ledger::Ledger;
use crate::pipeline::Pipeline;
use crate::publisher::Publisher;
use crate::retry::RetryPolicy;
use crate::state::SharedState;
use crate::store::ContentStore;

pub fn app(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(routes_attestations::health))
        .route("/validations", post(routes_validations::submit_validation))
        .route("/validations/:id", get(routes_validations::get_validation))
        .route("/validations/:id/cancel", post(routes_validations::cancel_validation))
        .route("/attestations/verify", post(routes_attestations::verify_attestation))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wire a pipeline from its collaborators.
pub fn build_pipeline(
    store: Arc<dyn ContentStore>,
    ledger: Arc<dyn Ledger>,
    key: ValidatorKey,
    policy: RetryPolicy,
    timeout: Duration,
    events: Arc<dyn EventSink>,
) -> Arc<Pipeline> {
    let fetcher = Fetcher::new(store.clone(), policy.clone(), timeout, events.clone());
    let publisher = Publisher::new(store, ledger, policy, timeout, events.clone());
    Arc::new(Pipeline::new(fetcher, publisher, Arc::new(key), events))
}
