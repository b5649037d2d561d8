use attest::{verify, Attestation};
use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::SharedState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    pub document_hash: Option<String>,
    pub error: Option<String>,
}

pub async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({ "status": "ok", "validator": state.identity }))
}

/// Checks a document's signature against the validator identity it names.
pub async fn verify_attestation(Json(att): Json<Attestation>) -> Json<VerifyResponse> {
    let document_hash = att.document_hash().ok();
    let resp = match verify(&att) {
        Ok(()) => VerifyResponse { valid: true, document_hash, error: None },
        Err(e) => VerifyResponse { valid: false, document_hash, error: Some(e.to_string()) },
    };
    Json(resp)
}
