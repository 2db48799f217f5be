//! One learner's walk through a course: pick a playlist, watch a video, take the
//! theory quiz, solve practice tasks, finish the topic.
//!
//! Everything here is synchronous and owned by the session; generation and
//! persistence happen in `logic` around these transitions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{ChoiceLetter, Difficulty, GeneratedQuestion, GeneratedTask, PracticeTiers, Video};
use crate::matcher::AnswerMatcher;
use crate::progress::{resume_index, topic_key};
use crate::util::percent;
use crate::validator::QuizBatch;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Selection,
  Video,
  Theory,
  Practice,
  Complete,
}

impl Stage {
  pub fn as_str(self) -> &'static str {
    match self {
      Stage::Selection => "selection",
      Stage::Video => "video",
      Stage::Theory => "theory",
      Stage::Practice => "practice",
      Stage::Complete => "complete",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
  #[error("action not allowed in stage {}", .current.as_str())]
  WrongStage { current: Stage },
  #[error("no video selected")]
  NoVideo,
  #[error("no quiz generated yet")]
  NoQuiz,
  #[error("answer every question before checking ({answered} of {total} answered)")]
  Unanswered { answered: usize, total: usize },
  #[error("no practice tasks generated yet")]
  NoPractice,
  #[error("all practice tasks are done")]
  PracticeDone,
  #[error("answer must not be blank")]
  BlankAnswer,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuestionFeedback {
  pub index: usize,
  pub correct: bool,
  pub selected: ChoiceLetter,
  pub expected: ChoiceLetter,
  /// Only for wrong answers.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuizResult {
  pub correct: usize,
  pub total: usize,
  pub score: f64,
  pub passed: bool,
  pub threshold: f64,
  pub feedback: Vec<QuestionFeedback>,
}

/// Grade a quiz. Every question must have an answer.
pub fn grade_quiz(
  questions: &[GeneratedQuestion],
  answers: &[Option<ChoiceLetter>],
  threshold: f64,
  matcher: &AnswerMatcher,
) -> Result<QuizResult, SessionError> {
  let answered = answers.iter().take(questions.len()).flatten().count();
  if answers.len() != questions.len() || answered != questions.len() {
    return Err(SessionError::Unanswered { answered, total: questions.len() });
  }

  let feedback: Vec<QuestionFeedback> = questions
    .iter()
    .zip(answers.iter().flatten())
    .enumerate()
    .map(|(index, (q, &selected))| {
      let correct = matcher.compare(&selected.as_char().to_string(), &q.correct_answer.as_char().to_string());
      QuestionFeedback {
        index,
        correct,
        selected,
        expected: q.correct_answer,
        explanation: (!correct).then(|| q.explanation.clone()),
      }
    })
    .collect();

  let correct = feedback.iter().filter(|f| f.correct).count();
  let score = percent(correct, questions.len());
  Ok(QuizResult { correct, total: questions.len(), score, passed: score >= threshold, threshold, feedback })
}

#[derive(Clone, Debug)]
pub struct QuizState {
  pub topic: String,
  pub batch: QuizBatch,
  pub result: Option<QuizResult>,
}

/// What a single answer check decided, before any hint is attached.
#[derive(Clone, Debug, PartialEq)]
pub enum AnswerResult {
  Correct,
  Incorrect { attempts_left: u32 },
  Exhausted { answer: String, solution: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnswerCheck {
  pub key: String,
  pub attempts: u32,
  pub task: GeneratedTask,
  pub result: AnswerResult,
}

#[derive(Clone, Debug)]
pub struct PracticeState {
  /// Distinguishes this task set from later ones on the same topic.
  pub id: Uuid,
  pub topic: String,
  pub tiers: PracticeTiers,
  pub tier: Difficulty,
  pub index: usize,
  pub attempts: HashMap<String, u32>,
  pub completed: Vec<String>,
  pub hints: HashMap<String, Vec<String>>,
}

impl PracticeState {
  pub fn new(topic: String, tiers: PracticeTiers) -> Self {
    let mut state = Self {
      id: Uuid::new_v4(),
      topic,
      tiers,
      tier: Difficulty::Easy,
      index: 0,
      attempts: HashMap::new(),
      completed: Vec::new(),
      hints: HashMap::new(),
    };
    state.settle();
    state
  }

  /// Move past exhausted tiers so `tier/index` points at a task or past the end.
  fn settle(&mut self) {
    while self.index >= self.tiers.tier(self.tier).len() {
      match self.tier.next() {
        Some(next) => {
          self.tier = next;
          self.index = 0;
        }
        None => return,
      }
    }
  }

  pub fn task_key(tier: Difficulty, index: usize) -> String {
    format!("{}_{}", tier.as_str(), index)
  }

  /// Current task and its key, or `None` when every tier is done.
  pub fn current(&self) -> Option<(String, &GeneratedTask)> {
    self
      .tiers
      .tier(self.tier)
      .get(self.index)
      .map(|task| (Self::task_key(self.tier, self.index), task))
  }

  pub fn is_done(&self) -> bool {
    self.current().is_none()
  }

  pub fn total(&self) -> usize {
    self.tiers.total()
  }

  pub fn completed_count(&self) -> usize {
    self.completed.len()
  }

  pub fn attempts_for(&self, key: &str) -> u32 {
    self.attempts.get(key).copied().unwrap_or(0)
  }

  pub fn hints_for(&self, key: &str) -> &[String] {
    self.hints.get(key).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Skip (or leave) the current task.
  pub fn advance(&mut self) {
    if self.is_done() {
      return;
    }
    self.index += 1;
    self.settle();
  }

  /// Check an answer for the current task. Blank answers do not use an attempt.
  pub fn check(&mut self, answer: &str, matcher: &AnswerMatcher, max_attempts: u32) -> Result<AnswerCheck, SessionError> {
    if answer.trim().is_empty() {
      return Err(SessionError::BlankAnswer);
    }
    let (key, task) = self.current().map(|(k, t)| (k, t.clone())).ok_or(SessionError::PracticeDone)?;

    let used = self.attempts_for(&key);
    if self.completed.contains(&key) {
      return Ok(AnswerCheck { key, attempts: used, task, result: AnswerResult::Correct });
    }
    if used >= max_attempts {
      let result = AnswerResult::Exhausted { answer: task.answer.clone(), solution: task.solution.clone() };
      return Ok(AnswerCheck { key, attempts: used, task, result });
    }

    let attempts = used + 1;
    self.attempts.insert(key.clone(), attempts);

    let result = if matcher.compare(answer, &task.answer) {
      self.completed.push(key.clone());
      AnswerResult::Correct
    } else if attempts < max_attempts {
      AnswerResult::Incorrect { attempts_left: max_attempts - attempts }
    } else {
      AnswerResult::Exhausted { answer: task.answer.clone(), solution: task.solution.clone() }
    };
    Ok(AnswerCheck { key, attempts, task, result })
  }

  pub fn add_hint(&mut self, key: &str, hint: String) {
    self.hints.entry(key.to_string()).or_default().push(hint);
  }
}

#[derive(Clone, Debug)]
pub struct TutorSession {
  pub id: Uuid,
  pub subject: String,
  pub grade: String,
  pub stage: Stage,
  pub videos: Vec<Video>,
  pub cursor: usize,
  pub quiz: Option<QuizState>,
  pub practice: Option<PracticeState>,
  /// Last time a request touched this session.
  pub last_seen: DateTime<Utc>,
}

impl TutorSession {
  pub fn new(subject: &str, grade: &str) -> Self {
    Self {
      id: Uuid::new_v4(),
      subject: subject.to_string(),
      grade: grade.to_string(),
      stage: Stage::Selection,
      videos: Vec::new(),
      cursor: 0,
      quiz: None,
      practice: None,
      last_seen: Utc::now(),
    }
  }

  pub fn touch(&mut self) {
    self.last_seen = Utc::now();
  }

  /// Seconds since the last request, zero if the clock moved backwards.
  pub fn idle_secs(&self, now: DateTime<Utc>) -> u64 {
    u64::try_from(now.signed_duration_since(self.last_seen).num_seconds()).unwrap_or(0)
  }

  /// Load the playlist and jump to the first topic not yet completed.
  pub fn start_course(&mut self, videos: Vec<Video>, completed_topics: &[String]) {
    self.cursor = resume_index(&videos, completed_topics, &self.subject, &self.grade);
    self.videos = videos;
    self.enter_video();
  }

  pub fn current_video(&self) -> Option<&Video> {
    self.videos.get(self.cursor)
  }

  /// Progress key of the current topic.
  pub fn topic_key(&self) -> Option<String> {
    self.current_video().map(|v| topic_key(&self.subject, &self.grade, &v.title))
  }

  fn enter_video(&mut self) {
    self.stage = Stage::Video;
    self.quiz = None;
    self.practice = None;
  }

  fn require(&self, allowed: &[Stage]) -> Result<(), SessionError> {
    if allowed.contains(&self.stage) {
      Ok(())
    } else {
      Err(SessionError::WrongStage { current: self.stage })
    }
  }

  /// Back to the video of the current topic, dropping quiz and practice state.
  pub fn rewatch(&mut self) -> Result<(), SessionError> {
    self.require(&[Stage::Video, Stage::Theory, Stage::Practice, Stage::Complete])?;
    self.enter_video();
    Ok(())
  }

  /// Returns whether the cursor moved. Moving changes the topic.
  pub fn next_video(&mut self) -> Result<bool, SessionError> {
    self.require(&[Stage::Video, Stage::Complete])?;
    if self.cursor + 1 < self.videos.len() {
      self.cursor += 1;
      self.enter_video();
      Ok(true)
    } else {
      Ok(false)
    }
  }

  pub fn prev_video(&mut self) -> Result<bool, SessionError> {
    self.require(&[Stage::Video, Stage::Complete])?;
    if self.cursor > 0 {
      self.cursor -= 1;
      self.enter_video();
      Ok(true)
    } else {
      Ok(false)
    }
  }

  /// Title of the topic a quiz would be generated for.
  pub fn theory_topic(&self) -> Result<String, SessionError> {
    self.require(&[Stage::Video, Stage::Theory])?;
    self.current_video().map(|v| v.title.clone()).ok_or(SessionError::NoVideo)
  }

  pub fn set_quiz(&mut self, topic: String, batch: QuizBatch) {
    self.quiz = Some(QuizState { topic, batch, result: None });
    self.stage = Stage::Theory;
  }

  pub fn submit_quiz(
    &mut self,
    answers: &[Option<ChoiceLetter>],
    threshold: f64,
    matcher: &AnswerMatcher,
  ) -> Result<QuizResult, SessionError> {
    self.require(&[Stage::Theory])?;
    let quiz = self.quiz.as_mut().ok_or(SessionError::NoQuiz)?;
    let result = grade_quiz(&quiz.batch.questions, answers, threshold, matcher)?;
    quiz.result = Some(result.clone());
    Ok(result)
  }

  /// Title of the topic practice would be generated for.
  pub fn practice_topic(&self) -> Result<String, SessionError> {
    self.require(&[Stage::Theory, Stage::Practice])?;
    self.current_video().map(|v| v.title.clone()).ok_or(SessionError::NoVideo)
  }

  pub fn set_practice(&mut self, topic: String, tiers: PracticeTiers) {
    self.quiz = None;
    self.practice = Some(PracticeState::new(topic, tiers));
    self.stage = Stage::Practice;
  }

  pub fn practice_mut(&mut self) -> Result<&mut PracticeState, SessionError> {
    self.require(&[Stage::Practice])?;
    self.practice.as_mut().ok_or(SessionError::NoPractice)
  }

  pub fn practice(&self) -> Result<&PracticeState, SessionError> {
    self.require(&[Stage::Practice, Stage::Complete])?;
    self.practice.as_ref().ok_or(SessionError::NoPractice)
  }

  /// End practice. Returns `(completed, total)` for the progress store.
  pub fn finish_practice(&mut self) -> Result<(usize, usize), SessionError> {
    let practice = self.practice_mut()?;
    let counts = (practice.completed_count(), practice.total());
    self.stage = Stage::Complete;
    Ok(counts)
  }
}
