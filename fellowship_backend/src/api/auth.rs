use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::accounts::{SignUpInput, SignUpOutcome};
use crate::database::models::{FamilyRecord, UserRecord};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub(crate) struct LoginResponse {
    token: String,
    user: UserRecord,
}

#[derive(Serialize)]
pub(crate) struct MeResponse {
    user: UserRecord,
    family: Option<FamilyRecord>,
}

pub(crate) async fn signup_handler(
    State(state): State<AppState>,
    Json(input): Json<SignUpInput>,
) -> Result<(StatusCode, Json<SignUpOutcome>), ApiError> {
    let outcome = state.accounts().sign_up(input)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let session = state.identity.authenticate(&req.email, &req.password).await?;
    let accounts = state.accounts();
    let actor = accounts.actor(&session.user_id)?;
    let user = accounts.get_user(&actor, &session.user_id)?;
    Ok(Json(LoginResponse {
        token: session.token,
        user,
    }))
}

pub(crate) async fn logout_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.identity.sign_out(&current.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn me_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<MeResponse> {
    let user = state
        .accounts()
        .get_user(&current.actor, &current.actor.user_id)?;
    let family = match user.family_id.as_deref() {
        Some(family_id) => Some(state.membership().get_family(family_id)?),
        None => None,
    };
    Ok(Json(MeResponse { user, family }))
}
