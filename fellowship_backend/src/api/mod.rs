mod auth;
mod families;
mod media;
mod notifications;
mod posts;
mod requests;
mod setup;
mod users;

use crate::accounts::AccountService;
use crate::authz::Actor;
use crate::blobs::FsBlobStore;
use crate::config::FellowshipConfig;
use crate::content::ContentService;
use crate::database::Database;
use crate::error::ServiceError;
use crate::events::ChangeFeed;
use crate::identity::IdentityProvider;
use crate::media::MediaService;
use crate::membership::MembershipService;
use crate::notifications::NotificationService;
use crate::requests::RequestService;
use crate::setup::SetupService;
use anyhow::Result;
use axum::async_trait;
use axum::extract::{DefaultBodyLimit, FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart form fields on top of the file itself.
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: FellowshipConfig,
    pub database: Database,
    pub feed: ChangeFeed,
    pub identity: IdentityProvider,
    pub blobs: FsBlobStore,
}

impl AppState {
    pub fn setup(&self) -> SetupService {
        SetupService::new(self.database.clone(), self.feed.clone(), self.identity.clone())
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(self.database.clone(), self.feed.clone(), self.identity.clone())
    }

    pub fn membership(&self) -> MembershipService {
        MembershipService::new(
            self.database.clone(),
            self.feed.clone(),
            self.config.membership.clone(),
        )
    }

    pub fn requests(&self) -> RequestService {
        RequestService::new(self.database.clone(), self.feed.clone())
    }

    pub fn content(&self) -> ContentService {
        ContentService::new(self.database.clone(), self.feed.clone())
    }

    pub fn media(&self) -> MediaService<FsBlobStore> {
        MediaService::new(
            self.database.clone(),
            self.feed.clone(),
            self.blobs.clone(),
            self.config.file.clone(),
        )
    }

    pub fn notifications(&self) -> NotificationService {
        NotificationService::new(self.database.clone(), self.feed.clone())
    }
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Service(ServiceError),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    code: "bad_request",
                    message,
                },
            ),
            ApiError::Service(err) => {
                let (status, code) = classify(&err);
                (
                    status,
                    ErrorResponse {
                        code,
                        message: err.to_string(),
                    },
                )
            }
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        code: "internal",
                        message: "internal server error".into(),
                    },
                )
            }
        }
    }
}

fn classify(err: &ServiceError) -> (StatusCode, &'static str) {
    match err {
        ServiceError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "permission_denied"),
        ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        ServiceError::AlreadyInitialized => (StatusCode::CONFLICT, "already_initialized"),
        ServiceError::InvalidTransition(_) => (StatusCode::CONFLICT, "invalid_transition"),
        ServiceError::AdminLimitReached { .. } => (StatusCode::CONFLICT, "admin_limit_reached"),
        ServiceError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
        ServiceError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
        ServiceError::SetupRequired => (StatusCode::SERVICE_UNAVAILABLE, "setup_required"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ServiceError>() {
            Ok(service) => ApiError::Service(service),
            Err(err) => ApiError::Internal(err),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

/// The signed-in caller, resolved from an `Authorization: Bearer` token.
pub(crate) struct CurrentUser {
    pub actor: Actor,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or(ServiceError::Unauthenticated)?;
        let user_id = state
            .identity
            .resolve(&token)
            .await
            .ok_or(ServiceError::Unauthenticated)?;
        let actor = state.accounts().actor(&user_id)?;
        Ok(Self { actor, token })
    }
}

/// Answers 503 on everything but the setup flow until the deployment has
/// been initialized.
async fn require_setup(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if path == "/health" || path == "/setup" {
        return next.run(request).await;
    }
    match state.setup().ensure_initialized() {
        Ok(()) => next.run(request).await,
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.file.max_upload_bytes + FORM_OVERHEAD_BYTES;
    let timeout = state.config.http.request_timeout;

    Router::new()
        .route("/health", get(setup::health_handler))
        .route("/setup", get(setup::status_handler).post(setup::initialize_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/me", get(auth::me_handler))
        .route("/me/leave", post(families::leave_family_handler))
        .route(
            "/families",
            get(families::list_families_handler).post(families::create_family_handler),
        )
        .route(
            "/families/:id",
            get(families::get_family_handler)
                .patch(families::update_family_handler)
                .delete(families::delete_family_handler),
        )
        .route("/families/:id/members", get(families::list_members_handler))
        .route("/families/:id/join", post(families::join_family_handler))
        .route("/families/:id/reconcile", post(families::reconcile_handler))
        .route("/families/:id/events", get(families::events_handler))
        .route(
            "/families/:id/posts",
            get(posts::list_family_posts_handler).post(posts::create_post_handler),
        )
        .route(
            "/families/:id/media",
            get(media::list_media_handler).post(media::upload_media_handler),
        )
        .route(
            "/families/:id/notifications",
            get(notifications::list_notifications_handler)
                .post(notifications::create_notification_handler),
        )
        .route("/users", get(users::list_users_handler))
        .route(
            "/users/:id",
            get(users::get_user_handler)
                .patch(users::update_user_handler)
                .delete(users::delete_user_handler),
        )
        .route("/users/:id/promote", post(users::promote_handler))
        .route("/users/:id/demote", post(users::demote_handler))
        .route("/users/:id/remove", post(users::remove_member_handler))
        .route("/posts", get(posts::list_posts_handler))
        .route(
            "/posts/:id",
            get(posts::get_post_handler).delete(posts::delete_post_handler),
        )
        .route("/posts/:id/like", post(posts::like_handler))
        .route("/posts/:id/unlike", post(posts::unlike_handler))
        .route("/posts/:id/comments", post(posts::add_comment_handler))
        .route(
            "/posts/:id/comments/:comment_id",
            axum::routing::delete(posts::delete_comment_handler),
        )
        .route("/media/:id", axum::routing::delete(media::delete_media_handler))
        .route("/media/:id/file", get(media::download_media_handler))
        .route("/blobs/*path", get(media::blob_handler))
        .route("/notifications/:id/read", post(notifications::mark_read_handler))
        .route(
            "/family-requests",
            get(requests::list_family_requests_handler).post(requests::submit_family_request_handler),
        )
        .route("/family-requests/:id/approve", post(requests::approve_family_request_handler))
        .route("/family-requests/:id/reject", post(requests::reject_family_request_handler))
        .route(
            "/admin-requests",
            get(requests::list_admin_requests_handler).post(requests::submit_admin_request_handler),
        )
        .route("/admin-requests/:id/review", post(requests::review_admin_request_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_setup))
        .layer(DefaultBodyLimit::max(body_limit as usize))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on an already bound listener until the server stops.
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    let router = build_router(state);
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

pub async fn serve_http(state: AppState) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.api_port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        ?addr,
        max_upload_mb = state.config.file.max_upload_bytes / (1024 * 1024),
        timeout_secs = state.config.http.request_timeout.as_secs(),
        "HTTP server listening"
    );
    serve_on(listener, state).await
}
