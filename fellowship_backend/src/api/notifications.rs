use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::database::models::NotificationRecord;
use crate::notifications::NotificationInput;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NotificationList {
    notifications: Vec<NotificationRecord>,
    unread: usize,
}

pub(crate) async fn list_notifications_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
) -> ApiResult<NotificationList> {
    let service = state.notifications();
    let notifications = service.list_notifications(&current.actor, &family_id)?;
    let unread = service.unread_count(&current.actor, &family_id)?;
    Ok(Json(NotificationList {
        notifications,
        unread,
    }))
}

pub(crate) async fn create_notification_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
    Json(input): Json<NotificationInput>,
) -> Result<(StatusCode, Json<NotificationRecord>), ApiError> {
    let record = state
        .notifications()
        .create_notification(&current.actor, &family_id, input)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn mark_read_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(notification_id): Path<String>,
) -> ApiResult<NotificationRecord> {
    Ok(Json(
        state
            .notifications()
            .mark_read(&current.actor, &notification_id)?,
    ))
}
