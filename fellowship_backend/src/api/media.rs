use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::database::models::{MediaRecord, MediaType};
use crate::media::UploadMediaInput;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub(crate) struct ListMediaParams {
    #[serde(rename = "type", default)]
    media_type: Option<MediaType>,
}

pub(crate) async fn list_media_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
    Query(params): Query<ListMediaParams>,
) -> ApiResult<Vec<MediaRecord>> {
    Ok(Json(state.media().list_media(
        &current.actor,
        &family_id,
        params.media_type,
    )?))
}

/// Multipart fields: `file`, `type` (`photo` or `audio`), `title`, and
/// optional `description` and comma-separated `tags`.
pub(crate) async fn upload_media_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MediaRecord>), ApiError> {
    let mut data = None;
    let mut file_name = None;
    let mut media_type = None;
    let mut title = None;
    let mut description = None;
    let mut tags = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.body_text()))?;
                data = Some(bytes.to_vec());
            }
            "type" | "title" | "description" | "tags" => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.body_text()))?;
                match name.as_str() {
                    "type" => {
                        let parsed = text
                            .trim()
                            .parse::<MediaType>()
                            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                        media_type = Some(parsed);
                    }
                    "title" => title = Some(text),
                    "description" => description = Some(text),
                    _ => tags.extend(text.split(',').map(str::to_string)),
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown upload field"),
        }
    }

    let data = data.ok_or_else(|| ApiError::BadRequest("missing file field".into()))?;
    let media_type = media_type.ok_or_else(|| ApiError::BadRequest("missing type field".into()))?;
    let record = state
        .media()
        .upload_media(
            &current.actor,
            &family_id,
            UploadMediaInput {
                media_type,
                title: title.unwrap_or_default(),
                description,
                tags,
                file_name,
                data,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn download_media_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(media_id): Path<String>,
) -> Result<Response, ApiError> {
    let download = state
        .media()
        .get_media_bytes(&current.actor, &media_id)
        .await?;
    let mime = download.record.mime.as_deref().unwrap_or(FALLBACK_MIME);
    let file_name = download
        .record
        .blob_path
        .rsplit('/')
        .next()
        .unwrap_or("download")
        .to_string();
    Ok(bytes_response(download.data, mime, Some(&file_name)))
}

pub(crate) async fn blob_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let data = state.media().read_blob(&current.actor, &path).await?;
    let mime = infer::get(&data)
        .map(|kind| kind.mime_type())
        .unwrap_or(FALLBACK_MIME);
    Ok(bytes_response(data, mime, None))
}

pub(crate) async fn delete_media_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(media_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.media().delete_media(&current.actor, &media_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn bytes_response(data: Vec<u8>, mime: &str, file_name: Option<&str>) -> Response {
    let length = data.len();
    let mut response = data.into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    if let Some(name) = file_name {
        if let Ok(value) = HeaderValue::from_str(&format!("inline; filename=\"{name}\"")) {
            headers.insert(CONTENT_DISPOSITION, value);
        }
    }
    response
}
