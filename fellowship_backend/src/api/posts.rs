use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::content::{PostInput, PostView};
use crate::database::models::CommentRecord;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Deserialize)]
pub(crate) struct CommentRequest {
    content: String,
}

pub(crate) async fn list_family_posts_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
) -> ApiResult<Vec<PostView>> {
    Ok(Json(state.content().list_posts(&current.actor, &family_id)?))
}

/// Dashboard feed; see `ContentService::list_posts_for_actor`.
pub(crate) async fn list_posts_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Vec<PostView>> {
    Ok(Json(state.content().list_posts_for_actor(&current.actor)?))
}

pub(crate) async fn create_post_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
    Json(input): Json<PostInput>,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let post = state
        .content()
        .create_post(&current.actor, &family_id, input)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub(crate) async fn get_post_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(post_id): Path<String>,
) -> ApiResult<PostView> {
    Ok(Json(state.content().get_post(&current.actor, &post_id)?))
}

pub(crate) async fn delete_post_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(post_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.content().delete_post(&current.actor, &post_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn like_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(post_id): Path<String>,
) -> ApiResult<PostView> {
    Ok(Json(state.content().like_post(&current.actor, &post_id)?))
}

pub(crate) async fn unlike_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(post_id): Path<String>,
) -> ApiResult<PostView> {
    Ok(Json(state.content().unlike_post(&current.actor, &post_id)?))
}

pub(crate) async fn add_comment_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(post_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentRecord>), ApiError> {
    let comment = state
        .content()
        .add_comment(&current.actor, &post_id, &req.content)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub(crate) async fn delete_comment_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .content()
        .delete_comment(&current.actor, &post_id, &comment_id)?;
    Ok(StatusCode::NO_CONTENT)
}
