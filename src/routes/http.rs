//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    ok: true,
    generator: state.generator.name().to_string(),
    videos_enabled: state.videos_enabled,
  })
}

#[instrument(level = "info", skip(state))]
pub async fn http_catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::catalog(&state))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_check(State(state): State<Arc<AppState>>, Json(body): Json<CheckIn>) -> impl IntoResponse {
  let out = logic::check(&state, &body);
  info!(target: "tutor_backend", matched = out.matched, shape = ?out.shape, "Direct answer check");
  Json(out)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(ProgressOut { book: logic::progress(&state).await })
}

#[instrument(level = "info", skip(state, body), fields(subject = %body.subject, grade = %body.grade))]
pub async fn http_create_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CreateSessionIn>,
) -> Result<impl IntoResponse> {
  let out = logic::create_session(&state, &body.subject, &body.grade).await?;
  info!(target: "tutor_backend", id = %out.id, videos = out.video_count, "Session created");
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<SessionOut>> {
  Ok(Json(logic::get_session(&state, id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<StatusCode> {
  logic::end_session(&state, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_rewatch(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<SessionOut>> {
  Ok(Json(logic::rewatch(&state, id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_next_video(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<MoveOut>> {
  Ok(Json(logic::move_video(&state, id, true).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_prev_video(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<MoveOut>> {
  Ok(Json(logic::move_video(&state, id, false).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_theory(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<QuizOut>> {
  Ok(Json(logic::get_theory(&state, id).await?))
}

#[instrument(level = "info", skip(state, body), fields(regenerate = body.as_ref().map(|b| b.regenerate).unwrap_or(false)))]
pub async fn http_post_theory(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  body: Option<Json<GenerateIn>>,
) -> Result<Json<QuizOut>> {
  let regenerate = body.map(|Json(b)| b.regenerate).unwrap_or(false);
  let out = logic::generate_theory(&state, id, regenerate).await?;
  info!(target: "quiz", %id, questions = out.questions.len(), placeholders = out.placeholders, "HTTP quiz served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_theory_answers(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<QuizAnswersIn>,
) -> Result<Json<QuizOut>> {
  Ok(Json(logic::submit_theory(&state, id, &body).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_practice(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  body: Option<Json<GenerateIn>>,
) -> Result<Json<PracticeOut>> {
  let regenerate = body.map(|Json(b)| b.regenerate).unwrap_or(false);
  let out = logic::start_practice(&state, id, regenerate).await?;
  info!(target: "practice", %id, total = out.total, "HTTP practice served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_practice_task(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<PracticeOut>> {
  Ok(Json(logic::practice_task(&state, id).await?))
}

#[instrument(level = "info", skip(state, body), fields(answer_len = body.answer.len()))]
pub async fn http_post_practice_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<PracticeAnswerIn>,
) -> Result<Json<AnswerOut>> {
  Ok(Json(logic::practice_answer(&state, id, &body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_practice_skip(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<PracticeOut>> {
  Ok(Json(logic::practice_skip(&state, id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_practice_finish(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<FinishOut>> {
  Ok(Json(logic::practice_finish(&state, id).await?))
}
