use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::database::models::{AdminRequestRecord, FamilyRequestRecord, RequestStatus};
use crate::requests::{ApprovedFamily, FamilyOverrides, FamilyRequestInput, ReviewDecision};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct StatusFilter {
    #[serde(default)]
    status: Option<RequestStatus>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminRequestBody {
    #[serde(default)]
    phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewBody {
    decision: ReviewDecision,
    #[serde(default)]
    reason: Option<String>,
}

pub(crate) async fn list_family_requests_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Vec<FamilyRequestRecord>> {
    Ok(Json(
        state
            .requests()
            .list_family_requests(&current.actor, filter.status)?,
    ))
}

pub(crate) async fn submit_family_request_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<FamilyRequestInput>,
) -> Result<(StatusCode, Json<FamilyRequestRecord>), ApiError> {
    let request = state
        .requests()
        .submit_family_request(&current.actor, input)?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub(crate) async fn approve_family_request_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(request_id): Path<String>,
    overrides: Option<Json<FamilyOverrides>>,
) -> ApiResult<ApprovedFamily> {
    let overrides = overrides.map(|Json(overrides)| overrides);
    Ok(Json(state.requests().approve_family_request(
        &current.actor,
        &request_id,
        overrides,
    )?))
}

pub(crate) async fn reject_family_request_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(request_id): Path<String>,
) -> ApiResult<FamilyRequestRecord> {
    Ok(Json(
        state
            .requests()
            .reject_family_request(&current.actor, &request_id)?,
    ))
}

pub(crate) async fn list_admin_requests_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Vec<AdminRequestRecord>> {
    Ok(Json(
        state
            .requests()
            .list_admin_requests(&current.actor, filter.status)?,
    ))
}

pub(crate) async fn submit_admin_request_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Option<Json<AdminRequestBody>>,
) -> Result<(StatusCode, Json<AdminRequestRecord>), ApiError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let request = state
        .requests()
        .submit_admin_request(&current.actor, body.phone_number)?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub(crate) async fn review_admin_request_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(request_id): Path<String>,
    Json(body): Json<ReviewBody>,
) -> ApiResult<AdminRequestRecord> {
    Ok(Json(state.requests().review_admin_request(
        &current.actor,
        &request_id,
        body.decision,
        body.reason,
    )?))
}
