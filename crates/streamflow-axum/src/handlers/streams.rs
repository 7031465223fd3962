//! Stream handlers: start, stop, list, inspect.

use std::path::PathBuf;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use streamflow_core::{
    BroadcastRequest, Destination, StopOutcome, StreamId, StreamSnapshot,
};

use crate::error::HttpError;
use crate::state::AppState;

/// Body of `POST /api/stream/start`.
///
/// A body carrying `sourcePath` or `destinations` is a destination list and
/// its parse errors are reported as such; anything else is read as the
/// legacy single-YouTube shape.
#[derive(Debug)]
pub enum StartStreamBody {
    Destinations(BroadcastRequest),
    Legacy(LegacyStartBody),
}

/// `{videoPath, youtubeKey, facebookKey?}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyStartBody {
    pub video_path: Option<PathBuf>,
    pub youtube_key: Option<String>,
    pub facebook_key: Option<String>,
}

impl StartStreamBody {
    pub fn from_json(body: Value) -> Result<Self, HttpError> {
        let parsed = if body.get("sourcePath").is_some() || body.get("destinations").is_some() {
            serde_json::from_value(body).map(Self::Destinations)
        } else {
            serde_json::from_value(body).map(Self::Legacy)
        };
        parsed.map_err(|e| HttpError::BadRequest(format!("Invalid stream request: {e}")))
    }

    pub fn into_request(self) -> Result<BroadcastRequest, HttpError> {
        match self {
            Self::Destinations(request) => Ok(request),
            Self::Legacy(legacy) => legacy.into_request(),
        }
    }
}

impl LegacyStartBody {
    fn into_request(self) -> Result<BroadcastRequest, HttpError> {
        let video_path = self.video_path.filter(|p| !p.as_os_str().is_empty());
        let youtube_key = self.youtube_key.filter(|k| !k.is_empty());
        let (Some(video_path), Some(youtube_key)) = (video_path, youtube_key) else {
            return Err(HttpError::BadRequest(
                "Server video path and YouTube key are required.".to_string(),
            ));
        };

        let mut request =
            BroadcastRequest::new(video_path).with_destination(Destination::youtube(youtube_key));
        if let Some(key) = self.facebook_key.filter(|k| !k.is_empty()) {
            request = request.with_destination(Destination::facebook(key));
        }
        Ok(request)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStreamResponse {
    pub message: String,
    pub stream_id: StreamId,
}

#[derive(Debug, Serialize)]
pub struct StopStreamResponse {
    pub message: String,
    pub outcome: StopOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveStreams {
    pub active_streams: Vec<StreamId>,
}

/// Start a looped broadcast. Answers once the process is launched.
pub async fn start(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<StartStreamResponse>), HttpError> {
    let request = StartStreamBody::from_json(body)?.into_request()?;
    let stream_id = state.supervisor.start(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartStreamResponse {
            message: "Streaming process started successfully!".to_string(),
            stream_id,
        }),
    ))
}

/// Stop a broadcast. Unknown and malformed ids are reported as already
/// stopped; the request itself never fails.
pub async fn stop(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Json<StopStreamResponse> {
    let outcome = match StreamId::parse(&raw_id) {
        Ok(id) => state.supervisor.stop(&id).await,
        Err(_) => StopOutcome::AlreadyStopped,
    };
    info!(stream_id = %raw_id, ?outcome, "Stop requested");

    let message = match outcome {
        StopOutcome::Stopping => format!("Stream {raw_id} is stopping."),
        StopOutcome::AlreadyStopped => "Stream not found or already stopped.".to_string(),
    };
    Json(StopStreamResponse { message, outcome })
}

/// Ids of active broadcasts.
pub async fn list(State(state): State<AppState>) -> Json<ActiveStreams> {
    Json(ActiveStreams {
        active_streams: state.supervisor.list().await,
    })
}

pub async fn get(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<StreamSnapshot>, HttpError> {
    StreamId::parse(&raw_id)
        .ok()
        .and_then(|id| state.supervisor.get(&id))
        .map(Json)
        .ok_or_else(|| HttpError::NotFound(format!("Stream {raw_id} not found")))
}
