use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pickmirror_common::error::MirrorError;
use pickmirror_engine::SyncError;

pub struct ApiError(pub SyncError);

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        Self(err)
    }
}

impl From<MirrorError> for ApiError {
    fn from(err: MirrorError) -> Self {
        Self(SyncError::Storage(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            err if err.is_client_error() => StatusCode::BAD_REQUEST,
            SyncError::Storage(MirrorError::Validation(_)) => StatusCode::BAD_REQUEST,
            SyncError::Storage(MirrorError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}
