use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::authz::{authorize, is_allowed, Action, Scope};
use crate::database::models::{FamilyRecord, UserRecord};
use crate::events::{ChangeEvent, ChangeFilter, Collection, Subscription};
use crate::identity::AuthEvent;
use crate::membership::{CreateFamilyInput, JoinOutcome, UpdateFamilyInput};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JoinRequest {
    /// Defaults to the caller.
    user_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FamilyDetail {
    #[serde(flatten)]
    family: FamilyRecord,
    admin_count: usize,
}

pub(crate) async fn list_families_handler(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> ApiResult<Vec<FamilyRecord>> {
    Ok(Json(state.membership().list_families()?))
}

pub(crate) async fn create_family_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<CreateFamilyInput>,
) -> Result<(StatusCode, Json<FamilyRecord>), ApiError> {
    let family = state.membership().create_family(&current.actor, input)?;
    Ok((StatusCode::CREATED, Json(family)))
}

pub(crate) async fn get_family_handler(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(family_id): Path<String>,
) -> ApiResult<FamilyDetail> {
    let membership = state.membership();
    let family = membership.get_family(&family_id)?;
    let admin_count = membership.admin_count(&family_id)?;
    Ok(Json(FamilyDetail {
        family,
        admin_count,
    }))
}

pub(crate) async fn update_family_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
    Json(input): Json<UpdateFamilyInput>,
) -> ApiResult<FamilyRecord> {
    Ok(Json(
        state
            .membership()
            .update_family(&current.actor, &family_id, input)?,
    ))
}

pub(crate) async fn delete_family_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.membership().delete_family(&current.actor, &family_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_members_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
) -> ApiResult<Vec<UserRecord>> {
    Ok(Json(
        state.membership().list_members(&current.actor, &family_id)?,
    ))
}

pub(crate) async fn join_family_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
    body: Option<Json<JoinRequest>>,
) -> ApiResult<JoinOutcome> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let user_id = req.user_id.unwrap_or_else(|| current.actor.user_id.clone());
    let outcome = state
        .membership()
        .join_family(&current.actor, &user_id, Some(&family_id))?;
    Ok(Json(outcome))
}

pub(crate) async fn leave_family_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<JoinOutcome> {
    let outcome = state
        .membership()
        .join_family(&current.actor, &current.actor.user_id, None)?;
    Ok(Json(outcome))
}

pub(crate) async fn reconcile_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
) -> ApiResult<FamilyRecord> {
    Ok(Json(
        state
            .membership()
            .reconcile_member_count(&current.actor, &family_id)?,
    ))
}

/// Streams change events scoped to one family as server-sent events. The
/// stream ends when the client disconnects, when the session token stops
/// resolving, or when the caller may no longer read the family.
pub(crate) async fn events_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    authorize(&current.actor, Action::ReadFamily, &Scope::family(&family_id))?;
    tracing::debug!(%family_id, user_id = %current.actor.user_id, "change stream opened");
    let stream = FamilyStream {
        changes: state.feed.subscribe(ChangeFilter::default()),
        auth: state.identity.on_auth_change(),
        state,
        token: current.token,
        user_id: current.actor.user_id,
        family_id,
    };

    let events = stream::unfold(stream, |mut stream| async move {
        let event = stream.next_event().await?;
        Some((to_sse(&event), stream))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

struct FamilyStream {
    state: AppState,
    token: String,
    user_id: String,
    family_id: String,
    changes: Subscription,
    auth: broadcast::Receiver<AuthEvent>,
}

enum Wake {
    Auth(Result<AuthEvent, RecvError>),
    Change(Option<ChangeEvent>),
}

impl FamilyStream {
    async fn next_event(&mut self) -> Option<ChangeEvent> {
        loop {
            let wake = tokio::select! {
                auth = self.auth.recv() => Wake::Auth(auth),
                change = self.changes.next() => Wake::Change(change),
            };
            match wake {
                Wake::Auth(Ok(AuthEvent::SignedOut { user_id })) if user_id == self.user_id => {
                    if !self.still_allowed().await {
                        return self.close();
                    }
                }
                Wake::Auth(Ok(_)) => {}
                Wake::Auth(Err(RecvError::Lagged(_))) => {
                    if !self.still_allowed().await {
                        return self.close();
                    }
                }
                Wake::Auth(Err(RecvError::Closed)) | Wake::Change(None) => return None,
                Wake::Change(Some(event)) => {
                    let in_family = event.family_id.as_deref() == Some(self.family_id.as_str());
                    let about_caller =
                        event.collection == Collection::Users && event.id == self.user_id;
                    if !in_family && !about_caller {
                        continue;
                    }
                    if !self.still_allowed().await {
                        return self.close();
                    }
                    if in_family {
                        return Some(event);
                    }
                }
            }
        }
    }

    /// Re-resolves the session and the caller's stored role and family.
    async fn still_allowed(&self) -> bool {
        let resolved = self.state.identity.resolve(&self.token).await;
        if resolved.as_deref() != Some(self.user_id.as_str()) {
            return false;
        }
        match self.state.accounts().actor(&self.user_id) {
            Ok(actor) => is_allowed(&actor, Action::ReadFamily, &Scope::family(&self.family_id)),
            Err(_) => false,
        }
    }

    fn close(&self) -> Option<ChangeEvent> {
        tracing::debug!(
            family_id = %self.family_id,
            user_id = %self.user_id,
            "change stream closed; access revoked"
        );
        None
    }
}

fn to_sse(event: &ChangeEvent) -> Result<Event, axum::Error> {
    Event::default()
        .event(event.collection.as_str())
        .id(event.id.clone())
        .json_data(event)
}
