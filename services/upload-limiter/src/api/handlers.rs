use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info};

use crate::tracker::{ProviderRecord, UsageError, UsageTracker};

use super::types::{
    CheckLimitParams, ErrorResponse, ProviderListResponse, RecordLimitParams, RecordSizeParams,
};
use super::ApiState;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn record_upload_limit(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<RecordLimitParams>,
) -> ApiResult<ProviderRecord> {
    let miner = required(params.miner, "miner")?;
    let limit = parse_integer(params.limit.as_deref(), "Invalid upload limit")?;

    let provider_id = miner.clone();
    let record =
        with_tracker(&state, move |tracker| tracker.record_limit(&provider_id, limit)).await?;

    info!(provider_id = %miner, limit, "upload limit recorded");
    Ok(Json(record))
}

pub async fn record_upload_size(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<RecordSizeParams>,
) -> ApiResult<ProviderRecord> {
    let miner = required(params.miner, "miner")?;
    let size = parse_integer(params.size.as_deref(), "Invalid upload size")?;

    with_tracker(&state, move |tracker| tracker.record_usage(&miner, size))
        .await
        .map(Json)
}

pub async fn check_upload_limit(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<CheckLimitParams>,
) -> ApiResult<ProviderRecord> {
    let address = required(params.address, "address")?;

    with_tracker(&state, move |tracker| tracker.enforce_limit(&address))
        .await
        .map(Json)
}

pub async fn list_providers(State(state): State<Arc<ApiState>>) -> ApiResult<ProviderListResponse> {
    let providers = with_tracker(&state, |tracker| tracker.cached_records()).await?;

    Ok(Json(ProviderListResponse {
        count: providers.len(),
        providers,
    }))
}

pub async fn get_provider(
    State(state): State<Arc<ApiState>>,
    Path(provider_id): Path<String>,
) -> ApiResult<ProviderRecord> {
    with_tracker(&state, move |tracker| tracker.get_record(&provider_id))
        .await
        .map(Json)
}

pub async fn health_check() -> ApiResult<serde_json::Value> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": "sp-upload-limiter"
    })))
}

/// Runs a tracker call on the blocking pool; ledger writes and record locks
/// never yield, and the request timeout can only fire at an await point.
async fn with_tracker<T, F>(state: &Arc<ApiState>, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&UsageTracker) -> Result<T, UsageError> + Send + 'static,
{
    let tracker = Arc::clone(&state.tracker);
    tokio::task::spawn_blocking(move || op(tracker.as_ref()))
        .await
        .map_err(internal_error)?
        .map_err(error_response)
}

/// Provider ids are passed through verbatim, the same as library callers.
fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(bad_request(
            "invalid_input",
            &format!("missing required parameter: {name}"),
        )),
    }
}

fn parse_integer(value: Option<&str>, message: &str) -> Result<i64, ApiError> {
    value
        .map(str::trim)
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| bad_request("invalid_input", message))
}

fn error_response(err: UsageError) -> ApiError {
    match err {
        UsageError::InvalidInput(message) => bad_request("invalid_input", &message),
        UsageError::NotFound(_) => not_found("provider_not_found", "Storage provider not found"),
        UsageError::QuotaExceeded {
            provider_id,
            hour,
            usage,
            limit,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse {
                error: "Upload limit exceeded".to_string(),
                code: "quota_exceeded".to_string(),
                details: Some(serde_json::json!({
                    "provider_id": provider_id,
                    "hour": hour.value(),
                    "usage": usage,
                    "limit": limit,
                })),
            }),
        ),
        err @ UsageError::StorageFailure(_) => internal_error(err),
    }
}

fn bad_request(code: &str, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
            details: None,
        }),
    )
}

fn not_found(code: &str, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
            details: None,
        }),
    )
}

fn internal_error<E: std::fmt::Display>(err: E) -> (StatusCode, Json<ErrorResponse>) {
    error!(error = %err, "upload limiter API internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal server error".to_string(),
            code: "internal_error".to_string(),
            details: Some(serde_json::json!({ "message": err.to_string() })),
        }),
    )
}
