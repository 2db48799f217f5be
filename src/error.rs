//! Error handling for the HTTP API.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::generation::GenerationFailure;
use crate::session::SessionError;
use crate::youtube::VideoSourceError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("Bad request: {0}")]
  BadRequest(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Wrong stage: {0}")]
  WrongStage(String),

  #[error("{}", .0.learner_message())]
  GenerationUnavailable(GenerationFailure),

  #[error("No usable content: {0}")]
  NoUsableContent(String),

  #[error("Video source error: {0}")]
  Video(#[from] VideoSourceError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
  error: String,
  message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  kind: Option<&'static str>,
}

impl From<SessionError> for ApiError {
  fn from(e: SessionError) -> Self {
    match e {
      SessionError::WrongStage { .. } | SessionError::NoQuiz | SessionError::NoPractice | SessionError::PracticeDone => {
        ApiError::WrongStage(e.to_string())
      }
      SessionError::NoVideo => ApiError::NotFound(e.to_string()),
      SessionError::Unanswered { .. } | SessionError::BlankAnswer => ApiError::BadRequest(e.to_string()),
    }
  }
}

impl From<GenerationFailure> for ApiError {
  fn from(f: GenerationFailure) -> Self {
    ApiError::GenerationUnavailable(f)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, error_type, kind) = match &self {
      ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
      ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
      ApiError::WrongStage(_) => (StatusCode::CONFLICT, "wrong_stage", None),
      ApiError::GenerationUnavailable(f) => (StatusCode::SERVICE_UNAVAILABLE, "generation_unavailable", Some(f.code())),
      ApiError::NoUsableContent(_) => (StatusCode::BAD_GATEWAY, "no_usable_content", None),
      ApiError::Video(VideoSourceError::InvalidPlaylistId(_)) => (StatusCode::BAD_REQUEST, "invalid_playlist", None),
      ApiError::Video(VideoSourceError::Disabled) => (StatusCode::SERVICE_UNAVAILABLE, "video_source_disabled", None),
      ApiError::Video(_) => (StatusCode::BAD_GATEWAY, "video_source_error", None),
    };

    let body = Json(ErrorResponse {
      error: error_type.to_string(),
      message: self.to_string(),
      kind,
    });

    (status, body).into_response()
  }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
