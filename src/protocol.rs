//! Public protocol structs for the HTTP API (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.
//!
//! Views never carry correct answers before the learner has earned them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Difficulty, Video};
use crate::matcher::AnswerShape;
use crate::progress::{ProgressBook, ProgressReport};
use crate::session::{PracticeState, QuizResult, QuizState, Stage, TutorSession};

// ---- Requests ----

#[derive(Debug, Deserialize)]
pub struct CheckIn {
  pub user_answer: String,
  pub correct_answer: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionIn {
  pub subject: String,
  pub grade: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateIn {
  #[serde(default)]
  pub regenerate: bool,
}

/// One entry per question, in order. `null` or an empty string means unanswered.
#[derive(Debug, Deserialize)]
pub struct QuizAnswersIn {
  pub answers: Vec<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PracticeAnswerIn {
  pub answer: String,
}

// ---- Responses ----

#[derive(Debug, Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub generator: String,
  pub videos_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct CatalogOut {
  pub subjects: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CheckOut {
  pub matched: bool,
  pub shape: AnswerShape,
}

#[derive(Debug, Serialize)]
pub struct ProgressOut {
  #[serde(flatten)]
  pub book: ProgressBook,
}

#[derive(Debug, Serialize)]
pub struct SessionOut {
  pub id: Uuid,
  pub subject: String,
  pub grade: String,
  pub stage: Stage,
  pub video_index: usize,
  pub video_count: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub video: Option<Video>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub watch_url: Option<String>,
}

pub fn session_out(s: &TutorSession) -> SessionOut {
  let video = s.current_video().cloned();
  SessionOut {
    id: s.id,
    subject: s.subject.clone(),
    grade: s.grade.clone(),
    stage: s.stage,
    video_index: s.cursor,
    video_count: s.videos.len(),
    watch_url: video.as_ref().map(|v| format!("https://www.youtube.com/watch?v={}", v.video_id)),
    video,
  }
}

#[derive(Debug, Serialize)]
pub struct MoveOut {
  pub moved: bool,
  pub session: SessionOut,
}

#[derive(Debug, Serialize)]
pub struct QuizQuestionOut {
  pub index: usize,
  pub question: String,
  pub options: [String; 4],
}

#[derive(Debug, Serialize)]
pub struct QuizOut {
  pub topic: String,
  pub questions: Vec<QuizQuestionOut>,
  /// Number of synthetic questions padding the quiz.
  pub placeholders: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub warning: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<QuizResult>,
}

pub fn quiz_out(q: &QuizState) -> QuizOut {
  QuizOut {
    topic: q.topic.clone(),
    questions: q
      .batch
      .questions
      .iter()
      .enumerate()
      .map(|(index, gq)| QuizQuestionOut { index, question: gq.question.clone(), options: gq.options.clone() })
      .collect(),
    placeholders: q.batch.placeholders,
    warning: (!q.batch.is_complete()).then(|| {
      format!(
        "The content service returned fewer questions than needed; {} placeholder question(s) were added.",
        q.batch.placeholders
      )
    }),
    result: q.result.clone(),
  }
}

#[derive(Debug, Serialize)]
pub struct RevealOut {
  pub answer: String,
  pub solution: String,
}

#[derive(Debug, Serialize)]
pub struct TaskOut {
  pub key: String,
  pub difficulty: Difficulty,
  /// 1-based position within the tier.
  pub number: usize,
  pub tier_size: usize,
  pub question: String,
  pub attempts: u32,
  pub attempts_left: u32,
  pub hints: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reveal: Option<RevealOut>,
}

#[derive(Debug, Serialize)]
pub struct PracticeOut {
  pub topic: String,
  pub completed: usize,
  pub total: usize,
  pub done: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub task: Option<TaskOut>,
}

pub fn practice_out(p: &PracticeState, max_attempts: u32) -> PracticeOut {
  let task = p.current().map(|(key, t)| {
    let attempts = p.attempts_for(&key);
    let exhausted = attempts >= max_attempts && !p.completed.contains(&key);
    TaskOut {
      difficulty: t.difficulty,
      number: p.index + 1,
      tier_size: p.tiers.tier(p.tier).len(),
      question: t.question.clone(),
      attempts,
      attempts_left: max_attempts.saturating_sub(attempts),
      hints: p.hints_for(&key).to_vec(),
      reveal: exhausted.then(|| RevealOut { answer: t.answer.clone(), solution: t.solution.clone() }),
      key,
    }
  });
  PracticeOut {
    topic: p.topic.clone(),
    completed: p.completed_count(),
    total: p.total(),
    done: task.is_none(),
    task,
  }
}

/// Result of checking one practice answer.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
  Correct { attempts: u32 },
  Incorrect { hint: String, attempts_left: u32 },
  Exhausted { answer: String, solution: String },
}

#[derive(Debug, Serialize)]
pub struct AnswerOut {
  pub key: String,
  #[serde(flatten)]
  pub outcome: CheckOutcome,
  /// Absent when the session left this task set while the hint was generated.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub practice: Option<PracticeOut>,
}

#[derive(Debug, Serialize)]
pub struct FinishOut {
  pub completed: usize,
  pub total: usize,
  pub percent: f64,
  pub has_next_topic: bool,
  pub report: ProgressReport,
}
