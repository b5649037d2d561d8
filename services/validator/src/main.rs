use std::sync::Arc;

use anyhow::{Context, Result};
use attest::ValidatorKey;
use tracing::{info, warn};

use validator::config::AppConfig;
use validator::events::TracingEventSink;
use validator::ledger::HttpLedger;
use validator::state::AppState;
use validator::store::HttpContentStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env().context("Invalid configuration")?;
    let key = ValidatorKey::from_seed_hex(&cfg.signing_key_hex).context("Bad VALIDATOR_SIGNING_KEY")?;
    info!(validator = %key.identity(), "validator identity loaded");

    startup_checks(&cfg).await;

    let store = Arc::new(HttpContentStore::new(
        cfg.content_gateway_url.clone(),
        cfg.content_upload_url.clone(),
        cfg.content_api_key.clone(),
    ));
    let ledger = Arc::new(HttpLedger::new(cfg.ledger_url.clone(), cfg.ledger_hmac_secret.clone()));
    let pipeline = validator::build_pipeline(
        store,
        ledger,
        key,
        cfg.retry.clone(),
        cfg.collaborator_timeout,
        Arc::new(TracingEventSink),
    );
    let state = Arc::new(AppState::new(pipeline, cfg.max_concurrent_runs).with_retention(cfg.run_retention));

    let app = validator::app(state);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.bind_addr))?;
    info!("validator listening on http://{}", cfg.bind_addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

// Collaborators may come up after us; runs retry on their own.
async fn startup_checks(cfg: &AppConfig) {
    match probe(&cfg.content_gateway_url).await {
        Ok(()) => info!("content gateway: ok"),
        Err(e) => warn!(error = %e, "content gateway not reachable"),
    }
    match probe(&cfg.ledger_url).await {
        Ok(()) => info!("ledger: ok"),
        Err(e) => warn!(error = %e, "ledger not reachable"),
    }
}

async fn probe(base: &str) -> Result<()> {
    let resp = reqwest::get(base).await.context("request failed")?;
    if resp.status().is_server_error() {
        anyhow::bail!("unhealthy: HTTP {}", resp.status());
    }
    Ok(())
}
