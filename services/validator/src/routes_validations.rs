use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::state::SharedState;
use crate::types::{ApiError, RunPhase, RunSnapshot, ValidationRequest, ValidationRequestBody};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedResponse {
    pub run_id: Uuid,
    pub phase: RunPhase,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub status: &'static str,
}

pub async fn submit_validation(
    State(state): State<SharedState>,
    Json(body): Json<ValidationRequestBody>,
) -> ApiResult<(StatusCode, Json<SubmittedResponse>)> {
    let req = ValidationRequest::try_from(body)
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiError::new(e.to_string()))))?;
    let (run_id, phase) = state.submit(req).await;
    Ok((StatusCode::ACCEPTED, Json(SubmittedResponse { run_id, phase })))
}

pub async fn get_validation(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Json<RunSnapshot>> {
    state.snapshot(id).await.map(Json).ok_or_else(|| not_found(id))
}

pub async fn cancel_validation(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Json<CancelResponse>> {
    match state.cancel(id).await {
        Some(true) => Ok(Json(CancelResponse { status: "cancel_requested" })),
        Some(false) => Ok(Json(CancelResponse { status: "noop" })),
        None => Err(not_found(id)),
    }
}

fn not_found(id: Uuid) -> (StatusCode, Json<ApiError>) {
    (StatusCode::NOT_FOUND, Json(ApiError::new(format!("run {id} not found"))))
}
