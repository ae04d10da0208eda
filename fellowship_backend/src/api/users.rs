use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::accounts::UpdateProfileInput;
use crate::database::models::UserRecord;
use crate::membership::JoinOutcome;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

pub(crate) async fn list_users_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Vec<UserRecord>> {
    Ok(Json(state.accounts().list_users(&current.actor)?))
}

pub(crate) async fn get_user_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<UserRecord> {
    Ok(Json(state.accounts().get_user(&current.actor, &user_id)?))
}

pub(crate) async fn update_user_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    Json(input): Json<UpdateProfileInput>,
) -> ApiResult<UserRecord> {
    Ok(Json(
        state
            .accounts()
            .update_profile(&current.actor, &user_id, input)?,
    ))
}

pub(crate) async fn delete_user_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.accounts().delete_user(&current.actor, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn promote_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<UserRecord> {
    Ok(Json(state.membership().promote(&current.actor, &user_id)?))
}

pub(crate) async fn demote_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<UserRecord> {
    Ok(Json(state.membership().demote(&current.actor, &user_id)?))
}

pub(crate) async fn remove_member_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<JoinOutcome> {
    Ok(Json(
        state
            .membership()
            .remove_member_from_family(&current.actor, &user_id)?,
    ))
}
