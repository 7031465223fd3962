//! Source video upload.

use std::path::PathBuf;

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use serde::Serialize;

use crate::error::HttpError;
use crate::state::AppState;
use crate::uploads::UploadError;

/// Multipart field carrying the video file.
pub const VIDEO_FIELD: &str = "video";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Absolute path to pass back as `videoPath` / `sourcePath`.
    pub server_path: PathBuf,
}

/// Store the first file in the `video` field. Other fields are ignored.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), HttpError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };

        let server_path = state.uploads.store(&file_name, field).await?;
        return Ok((StatusCode::CREATED, Json(UploadResponse { server_path })));
    }

    Err(UploadError::Missing.into())
}
