//! Core behaviors behind the HTTP handlers.
//!
//! Session mutations happen under the session-table lock; generation and
//! progress I/O happen outside it, and results are applied only if the
//! session is still on the same topic.

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::ChoiceLetter;
use crate::error::{ApiError, Result};
use crate::generation::{generate_hint, generate_practice, generate_quiz, PracticeRequest, QuizRequest};
use crate::progress::{adaptive_difficulty, ProgressBook};
use crate::protocol::*;
use crate::session::{AnswerResult, SessionError, TutorSession};
use crate::state::AppState;
use crate::util::percent;

fn session_not_found(id: Uuid) -> ApiError {
  ApiError::NotFound(format!("session {}", id))
}

/// Run `f` on the session under the write lock, marking it as recently used.
async fn with_session<T>(state: &AppState, id: Uuid, f: impl FnOnce(&mut TutorSession) -> Result<T>) -> Result<T> {
  let mut sessions = state.sessions.write().await;
  let session = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
  session.touch();
  f(session)
}

fn moved_on() -> ApiError {
  ApiError::WrongStage("the session moved to another topic while content was being generated".into())
}

pub fn catalog(state: &AppState) -> CatalogOut {
  CatalogOut {
    subjects: state
      .config
      .playlists
      .iter()
      .map(|(subject, grades)| (subject.clone(), grades.keys().cloned().collect()))
      .collect(),
  }
}

#[instrument(level = "info", skip(state, body), fields(user_len = body.user_answer.len(), correct_len = body.correct_answer.len()))]
pub fn check(state: &AppState, body: &CheckIn) -> CheckOut {
  let verdict = state.matcher.explain(&body.user_answer, &body.correct_answer);
  CheckOut { matched: verdict.matched, shape: verdict.shape }
}

pub async fn progress(state: &AppState) -> ProgressBook {
  state.progress.load().await
}

#[instrument(level = "info", skip(state), fields(%subject, %grade))]
pub async fn create_session(state: &AppState, subject: &str, grade: &str) -> Result<SessionOut> {
  let subject = subject.trim();
  let grade = grade.trim();
  if subject.is_empty() || grade.is_empty() {
    return Err(ApiError::BadRequest("subject and grade are required".into()));
  }
  let playlist_id = state
    .config
    .playlist_id(subject, grade)
    .ok_or_else(|| ApiError::NotFound(format!("no playlist for {} grade {}", subject, grade)))?;

  let videos = state.videos.playlist_videos(playlist_id).await?;
  if videos.is_empty() {
    return Err(ApiError::NotFound(format!("playlist {} has no videos", playlist_id)));
  }
  let completed = state.progress.completed_topics().await;

  let mut session = TutorSession::new(subject, grade);
  session.start_course(videos, &completed);
  let out = session_out(&session);
  info!(target: "user_action", action = "start_course", id = %session.id, %subject, %grade, video_index = session.cursor, "Course started");
  state.insert_session(session).await;
  Ok(out)
}

pub async fn get_session(state: &AppState, id: Uuid) -> Result<SessionOut> {
  state
    .get_session(id)
    .await
    .map(|s| session_out(&s))
    .ok_or_else(|| session_not_found(id))
}

pub async fn end_session(state: &AppState, id: Uuid) -> Result<()> {
  if state.remove_session(id).await {
    info!(target: "user_action", action = "end_session", %id, "Back to course selection");
    Ok(())
  } else {
    Err(session_not_found(id))
  }
}

#[instrument(level = "info", skip(state), fields(%id, forward))]
pub async fn move_video(state: &AppState, id: Uuid, forward: bool) -> Result<MoveOut> {
  with_session(state, id, |s| {
    let moved = if forward { s.next_video()? } else { s.prev_video()? };
    let action = if forward { "next_video" } else { "previous_video" };
    info!(target: "user_action", action, %id, video_index = s.cursor, moved, "Video cursor moved");
    Ok(MoveOut { moved, session: session_out(s) })
  })
  .await
}

pub async fn rewatch(state: &AppState, id: Uuid) -> Result<SessionOut> {
  with_session(state, id, |s| {
    s.rewatch()?;
    info!(target: "user_action", action = "rewatch_video", %id, video_index = s.cursor, "Back to video");
    Ok(session_out(s))
  })
  .await
}

pub async fn get_theory(state: &AppState, id: Uuid) -> Result<QuizOut> {
  with_session(state, id, |s| {
    s.quiz.as_ref().map(quiz_out).ok_or_else(|| SessionError::NoQuiz.into())
  })
  .await
}

/// Generate (or return the cached) theory quiz for the current video.
#[instrument(level = "info", skip(state), fields(%id, regenerate))]
pub async fn generate_theory(state: &AppState, id: Uuid, regenerate: bool) -> Result<QuizOut> {
  let (topic, subject, grade, cached) = with_session(state, id, |s| {
    let topic = s.theory_topic()?;
    let cached = s.quiz.as_ref().filter(|q| !regenerate && q.topic == topic).map(quiz_out);
    Ok((topic, s.subject.clone(), s.grade.clone(), cached))
  })
  .await?;
  if let Some(out) = cached {
    return Ok(out);
  }

  info!(target: "user_action", action = "start_theory_test", %id, %topic, "Theory quiz requested");
  let req = QuizRequest {
    topic: &topic,
    subject: &subject,
    grade: &grade,
    count: state.config.app.theory_questions_count,
  };
  let batch = generate_quiz(state.generator.as_ref(), &state.config.generation, &state.config.prompts, &req).await?;
  if batch.genuine == 0 && !batch.questions.is_empty() {
    error!(target: "quiz", %topic, "Content service returned no usable questions");
    return Err(ApiError::NoUsableContent("the content service returned no usable questions".into()));
  }

  with_session(state, id, |s| {
    if s.theory_topic()? != topic {
      return Err(moved_on());
    }
    s.set_quiz(topic, batch);
    s.quiz.as_ref().map(quiz_out).ok_or_else(|| SessionError::NoQuiz.into())
  })
  .await
}

fn parse_choice(raw: Option<&str>) -> Result<Option<ChoiceLetter>> {
  let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else { return Ok(None) };
  s.chars()
    .next()
    .and_then(ChoiceLetter::from_char)
    .map(Some)
    .ok_or_else(|| ApiError::BadRequest(format!("not an answer letter: {}", s)))
}

#[instrument(level = "info", skip(state, body), fields(%id, answers = body.answers.len()))]
pub async fn submit_theory(state: &AppState, id: Uuid, body: &QuizAnswersIn) -> Result<QuizOut> {
  let answers = body
    .answers
    .iter()
    .map(|a| parse_choice(a.as_deref()))
    .collect::<Result<Vec<_>>>()?;

  let threshold = state.config.app.theory_pass_threshold;
  let (key, out) = with_session(state, id, |s| {
    s.submit_quiz(&answers, threshold, &state.matcher)?;
    let key = s.topic_key().ok_or(SessionError::NoVideo)?;
    let out = s.quiz.as_ref().map(quiz_out).ok_or(SessionError::NoQuiz)?;
    Ok((key, out))
  })
  .await?;

  if let Some(result) = &out.result {
    info!(target: "user_action", action = "theory_checked", %id, correct = result.correct, total = result.total, score = result.score, passed = result.passed, "Theory quiz graded");
    if let Err(e) = state.progress.save_theory_score(&key, result.score).await {
      error!(target: "progress", %key, error = %e, "Failed to save theory score");
    }
  }
  Ok(out)
}

/// Generate (or return the cached) practice tasks for the current video.
#[instrument(level = "info", skip(state), fields(%id, regenerate))]
pub async fn start_practice(state: &AppState, id: Uuid, regenerate: bool) -> Result<PracticeOut> {
  let max_attempts = state.config.app.max_attempts_per_task;
  let (topic, subject, grade, key, cached) = with_session(state, id, |s| {
    let topic = s.practice_topic()?;
    let key = s.topic_key().ok_or(SessionError::NoVideo)?;
    let cached = s
      .practice
      .as_ref()
      .filter(|p| !regenerate && p.topic == topic)
      .map(|p| practice_out(p, max_attempts));
    Ok((topic, s.subject.clone(), s.grade.clone(), key, cached))
  })
  .await?;
  if let Some(out) = cached {
    return Ok(out);
  }

  let theory_score = state.progress.theory_score(&key).await;
  let req = PracticeRequest {
    topic: &topic,
    subject: &subject,
    grade: &grade,
    theory_score,
    counts: state.config.app.tasks_per_difficulty,
  };
  let tiers = generate_practice(state.generator.as_ref(), &state.config.generation, &state.config.prompts, &req).await?;
  if tiers.is_empty() {
    error!(target: "practice", %topic, "Content service returned no usable tasks");
    return Err(ApiError::NoUsableContent("the content service returned no usable practice tasks".into()));
  }

  with_session(state, id, |s| {
    if s.practice_topic()? != topic {
      return Err(moved_on());
    }
    s.set_practice(topic, tiers);
    info!(target: "user_action", action = "start_practice", %id, ?theory_score, suggested = %adaptive_difficulty(theory_score), "Practice started");
    Ok(practice_out(s.practice()?, max_attempts))
  })
  .await
}

pub async fn practice_task(state: &AppState, id: Uuid) -> Result<PracticeOut> {
  let max_attempts = state.config.app.max_attempts_per_task;
  with_session(state, id, |s| Ok(practice_out(s.practice()?, max_attempts))).await
}

#[instrument(level = "info", skip(state, body), fields(%id, answer_len = body.answer.len()))]
pub async fn practice_answer(state: &AppState, id: Uuid, body: &PracticeAnswerIn) -> Result<AnswerOut> {
  let max_attempts = state.config.app.max_attempts_per_task;
  let (practice_id, check) = with_session(state, id, |s| {
    let practice = s.practice_mut()?;
    Ok((practice.id, practice.check(&body.answer, &state.matcher, max_attempts)?))
  })
  .await?;

  let key = check.key.clone();
  let outcome = match check.result {
    AnswerResult::Correct => {
      info!(target: "user_action", action = "correct_answer", %id, task_key = %key, attempts = check.attempts, "Correct answer");
      CheckOutcome::Correct { attempts: check.attempts }
    }
    AnswerResult::Incorrect { attempts_left } => {
      info!(target: "user_action", action = "incorrect_answer", %id, task_key = %key, attempts = check.attempts, "Incorrect answer");
      let hint = generate_hint(
        state.generator.as_ref(),
        &state.config.generation,
        &state.config.prompts,
        &check.task,
        body.answer.trim(),
      )
      .await;
      CheckOutcome::Incorrect { hint, attempts_left }
    }
    AnswerResult::Exhausted { answer, solution } => {
      info!(target: "user_action", action = "attempts_exhausted", %id, task_key = %key, "Attempts exhausted");
      CheckOutcome::Exhausted { answer, solution }
    }
  };

  let practice = with_session(state, id, |s| {
    let Some(practice) = s.practice.as_mut().filter(|p| p.id == practice_id) else {
      warn!(target: "practice", %id, task_key = %key, "Practice changed during the check; result not applied");
      return Ok(None);
    };
    if let CheckOutcome::Incorrect { hint, .. } = &outcome {
      practice.add_hint(&key, hint.clone());
    }
    Ok(Some(practice_out(practice, max_attempts)))
  })
  .await?;

  Ok(AnswerOut { key, outcome, practice })
}

pub async fn practice_skip(state: &AppState, id: Uuid) -> Result<PracticeOut> {
  let max_attempts = state.config.app.max_attempts_per_task;
  with_session(state, id, |s| {
    let practice = s.practice_mut()?;
    if let Some((key, _)) = practice.current() {
      info!(target: "user_action", action = "skip_task", %id, task_key = %key, "Task skipped");
    }
    practice.advance();
    Ok(practice_out(practice, max_attempts))
  })
  .await
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn practice_finish(state: &AppState, id: Uuid) -> Result<FinishOut> {
  let (key, completed, total, has_next_topic) = with_session(state, id, |s| {
    let (completed, total) = s.finish_practice()?;
    let key = s.topic_key().ok_or(SessionError::NoVideo)?;
    Ok((key, completed, total, s.cursor + 1 < s.videos.len()))
  })
  .await?;

  if let Err(e) = state.progress.save_practice_score(&key, completed, total).await {
    error!(target: "progress", %key, error = %e, "Failed to save practice score");
  }
  if !has_next_topic {
    info!(target: "user_action", action = "course_finished", %id, "All topics of the course are done");
  }
  info!(target: "user_action", action = "practice_finished", %id, completed, total, "Practice finished");

  let report = state.progress.load().await.report(&key);
  Ok(FinishOut { completed, total, percent: percent(completed, total), has_next_topic, report })
}
