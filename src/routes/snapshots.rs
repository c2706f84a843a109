//! Snapshot routes: hand room configuration between devices by short code.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::snapshot::SnapshotError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateSnapshotBody {
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateSnapshotResponse {
    pub code: String,
}

/// JSON `{error}` body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

/// `POST /api/snapshots`: store a payload and return its code.
pub async fn create_snapshot(
    State(state): State<AppState>,
    body: Result<Json<CreateSnapshotBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateSnapshotResponse>), ApiError> {
    let Json(body) = body.map_err(rejection_to_error)?;
    let Some(data) = body.data.filter(|d| !d.is_null()) else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "data required"));
    };

    let code = state.snapshots.create(data).map_err(snapshot_error_to_api)?;
    Ok((StatusCode::CREATED, Json(CreateSnapshotResponse { code })))
}

/// `GET /api/snapshots/{code}`: fetch a stored payload.
pub async fn get_snapshot(State(state): State<AppState>, Path(code): Path<String>) -> Result<Json<Value>, ApiError> {
    state.snapshots.get(&code).map(Json).map_err(snapshot_error_to_api)
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StatusCode::PAYLOAD_TOO_LARGE
    } else {
        StatusCode::BAD_REQUEST
    };
    ApiError::new(status, rejection.body_text())
}

pub(crate) fn snapshot_error_to_api(err: SnapshotError) -> ApiError {
    match err {
        SnapshotError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, "snapshot not found"),
        SnapshotError::CodeExhausted(_) => {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "could not allocate a snapshot code, try again")
        }
    }
}

#[cfg(test)]
#[path = "snapshots_test.rs"]
mod tests;
