use super::{ApiError, AppState};
use crate::database::models::UploadRecord;
use crate::database::repositories::UploadRepository;
use crate::storage::{
    classify_content_id, sniff_mime, validate_content_id, validate_upload, StorageError,
};
use crate::upload_client::StorageStatusReport;
use crate::utils::now_utc_iso;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{
    header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    HeaderValue, StatusCode,
};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";
const IMMUTABLE_CACHE: &str = "public, max-age=31536000";
const STORAGE_UNAVAILABLE: &str = "Storage service temporarily unavailable";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadResponse {
    success: bool,
    piece_cid: String,
    root_hash: String,
    size: u64,
    file_name: String,
}

fn multipart_error(err: MultipartError, state: &AppState) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let max = state.storage.limits().max_bytes;
        return ApiError::BadRequest(
            StorageError::TooLarge { size: max, max }.to_string(),
        );
    }
    ApiError::BadRequest(err.body_text())
}

fn upload_error(err: StorageError) -> ApiError {
    match err {
        err if err.is_validation() => ApiError::BadRequest(err.to_string()),
        StorageError::InsufficientFunds | StorageError::Unavailable(_) => {
            tracing::warn!(error = %err, "storage backend unavailable");
            ApiError::Unavailable(STORAGE_UNAVAILABLE.into())
        }
        other => ApiError::internal("Upload failed", other),
    }
}

pub(crate) async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, &state))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let mime = field.content_type().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|err| multipart_error(err, &state))?;
            upload = Some((file_name, mime, bytes));
            break;
        }
    }

    let (file_name, declared_mime, bytes) =
        upload.ok_or_else(|| upload_error(StorageError::MissingFile))?;
    tracing::info!(file_name = %file_name, size = bytes.len(), "received upload");

    let mime = validate_upload(&bytes, declared_mime.as_deref(), state.storage.limits())
        .map_err(upload_error)?;
    let stored = state
        .storage
        .put(bytes, &file_name)
        .await
        .map_err(upload_error)?;

    tracing::info!(
        content_id = %stored.content_id,
        kind = ?classify_content_id(&stored.content_id),
        size = stored.size,
        "upload stored"
    );
    let record = UploadRecord {
        content_id: stored.content_id.clone(),
        backend: state.storage.kind().to_string(),
        file_name: Some(file_name.clone()),
        mime: Some(mime),
        size_bytes: stored.size as i64,
        uploaded_at: now_utc_iso(),
    };
    if let Err(err) = state
        .database
        .with_repositories(|repos| repos.uploads().record(&record))
    {
        tracing::warn!(error = ?err, content_id = %stored.content_id, "failed to record upload");
    }

    Ok(Json(UploadResponse {
        success: true,
        piece_cid: stored.content_id.clone(),
        root_hash: stored.content_id,
        size: stored.size,
        file_name,
    }))
}

pub(crate) async fn download_handler(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> Result<Response, ApiError> {
    validate_content_id(&content_id).map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let bytes = match state.storage.get(&content_id).await {
        Ok(bytes) => bytes,
        Err(StorageError::NotFound) => return Err(ApiError::NotFound("Image not found".into())),
        Err(err) => return Err(ApiError::internal("Download failed", err)),
    };

    let recorded_mime = state
        .database
        .with_repositories(|repos| repos.uploads().get(&content_id))
        .unwrap_or_else(|err| {
            tracing::warn!(error = ?err, %content_id, "upload ledger lookup failed");
            None
        })
        .and_then(|record| record.mime);
    let content_type = recorded_mime
        .or_else(|| sniff_mime(&bytes))
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.into());

    let length = bytes.len();
    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CONTENT_TYPE)),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE_CACHE));
    Ok(response)
}

pub(crate) async fn storage_status_handler(State(state): State<AppState>) -> Response {
    match state.storage.status().await {
        Ok(status) => Json(StorageStatusReport::from(&status)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "storage status check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "message": "Storage service unavailable",
                })),
            )
                .into_response()
        }
    }
}
