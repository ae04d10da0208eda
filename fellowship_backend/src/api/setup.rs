use super::{ApiError, ApiResult, AppState};
use crate::setup::{InitializeInput, InitializeOutcome, SetupStatus};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    initialized: bool,
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let initialized = state.setup().is_initialized()?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        initialized,
    }))
}

pub(crate) async fn status_handler(State(state): State<AppState>) -> ApiResult<SetupStatus> {
    Ok(Json(state.setup().status()?))
}

pub(crate) async fn initialize_handler(
    State(state): State<AppState>,
    Json(input): Json<InitializeInput>,
) -> Result<(StatusCode, Json<InitializeOutcome>), ApiError> {
    let outcome = state.setup().initialize(input)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
