//! Generation collaborator boundary and the quiz/practice/hint orchestration on top of it.
//!
//! The collaborator returns a tagged outcome instead of failing: structured JSON,
//! raw text (JSON recovered best-effort), or a transport failure kind. Transport
//! failures stay distinct from "the model answered with junk", which the
//! validator turns into zero accepted items.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::{GenerationSettings, Prompts};
use crate::domain::{GeneratedTask, PracticeTiers, TierCounts};
use crate::seeds::FALLBACK_HINT;
use crate::util::{extract_json, fill_template, text_field};
use crate::validator::{backfill, ensure_task_shape, normalize_questions, question_items, QuizBatch};

/// Why the generation service could not produce anything.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GenerationFailure {
  #[error("generation timed out")]
  Timeout,
  #[error("generation refused: rate limited or insufficient balance")]
  RateLimitedOrUnpaid,
  #[error("generation disabled: no API key configured")]
  Disabled,
  #[error("generation transport error: {0}")]
  Transport(String),
}

impl GenerationFailure {
  pub fn code(&self) -> &'static str {
    match self {
      GenerationFailure::Timeout => "timeout",
      GenerationFailure::RateLimitedOrUnpaid => "rate_limited_or_unpaid",
      GenerationFailure::Disabled => "disabled",
      GenerationFailure::Transport(_) => "transport_error",
    }
  }

  /// Message suitable for showing to the learner next to a retry button.
  pub fn learner_message(&self) -> &'static str {
    match self {
      GenerationFailure::Timeout => "The content service did not answer in time. Please try again.",
      GenerationFailure::RateLimitedOrUnpaid | GenerationFailure::Disabled => {
        "Content generation is unavailable right now (no balance or no API key)."
      }
      GenerationFailure::Transport(_) => "Could not reach the content service. Please try again.",
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GenerationOutcome {
  Json(Value),
  Text(String),
  Failed(GenerationFailure),
}

impl GenerationOutcome {
  /// JSON payload of a successful call. Unrecoverable text becomes `Value::Null`,
  /// which validates to zero items rather than an error.
  pub fn into_payload(self) -> Result<Value, GenerationFailure> {
    match self {
      GenerationOutcome::Json(v) => Ok(v),
      GenerationOutcome::Text(t) => Ok(extract_json(&t).unwrap_or(Value::Null)),
      GenerationOutcome::Failed(f) => Err(f),
    }
  }
}

/// Anything that can turn a prompt into model output.
#[async_trait]
pub trait GenerationCollaborator: Send + Sync {
  fn name(&self) -> &str;

  async fn generate(&self, prompt: &str, max_tokens: u32, timeout: Duration) -> GenerationOutcome;
}

/// Stand-in used when no API key is configured.
pub struct DisabledGenerator;

#[async_trait]
impl GenerationCollaborator for DisabledGenerator {
  fn name(&self) -> &str {
    "disabled"
  }

  async fn generate(&self, _prompt: &str, _max_tokens: u32, _timeout: Duration) -> GenerationOutcome {
    GenerationOutcome::Failed(GenerationFailure::Disabled)
  }
}

/// What the quiz is about.
#[derive(Clone, Debug)]
pub struct QuizRequest<'a> {
  pub topic: &'a str,
  pub subject: &'a str,
  pub grade: &'a str,
  pub count: usize,
}

#[derive(Clone, Debug)]
pub struct PracticeRequest<'a> {
  pub topic: &'a str,
  pub subject: &'a str,
  pub grade: &'a str,
  /// Theory score for this topic, steers the difficulty note in the prompt.
  pub theory_score: Option<f64>,
  pub counts: TierCounts,
}

/// Generate exactly `req.count` questions.
///
/// One call for the full count, then up to `topup_retries` calls for the
/// shortfall only, then placeholder backfill. A failure on the first call is
/// returned as-is; a failure on a top-up call ends the top-ups.
#[instrument(level = "info", skip(collab, settings, prompts), fields(topic = %req.topic, count = req.count, generator = collab.name()))]
pub async fn generate_quiz(
  collab: &dyn GenerationCollaborator,
  settings: &GenerationSettings,
  prompts: &Prompts,
  req: &QuizRequest<'_>,
) -> Result<QuizBatch, GenerationFailure> {
  let count = req.count.to_string();
  let prompt = fill_template(
    &prompts.quiz_template,
    &[("topic", req.topic), ("subject", req.subject), ("grade", req.grade), ("count", count.as_str())],
  );
  let payload = collab
    .generate(&prompt, settings.quiz_max_tokens, settings.timeout())
    .await
    .into_payload()
    .inspect_err(|e| warn!(target: "quiz", code = e.code(), error = %e, "Quiz generation failed"))?;

  let mut accepted = normalize_questions(&question_items(&payload));
  info!(target: "quiz", accepted = accepted.len(), "Initial quiz batch validated");

  for attempt in 1..=settings.topup_retries {
    if accepted.len() >= req.count {
      break;
    }
    let shortfall = (req.count - accepted.len()).to_string();
    let existing = accepted
      .iter()
      .map(|q| format!("- {}", q.question))
      .collect::<Vec<_>>()
      .join("\n");
    let prompt = fill_template(
      &prompts.quiz_topup_template,
      &[
        ("topic", req.topic),
        ("subject", req.subject),
        ("grade", req.grade),
        ("count", shortfall.as_str()),
        ("existing", existing.as_str()),
      ],
    );
    match collab.generate(&prompt, settings.quiz_max_tokens, settings.timeout()).await.into_payload() {
      Ok(payload) => {
        let more = normalize_questions(&question_items(&payload));
        info!(target: "quiz", attempt, %shortfall, accepted = more.len(), "Top-up batch validated");
        accepted.extend(more);
      }
      Err(e) => {
        warn!(target: "quiz", attempt, code = e.code(), error = %e, "Top-up call failed; backfilling");
        break;
      }
    }
  }

  let batch = backfill(accepted, req.count, req.topic);
  if batch.is_complete() {
    info!(target: "quiz", genuine = batch.genuine, "Quiz ready");
  } else {
    warn!(target: "quiz", genuine = batch.genuine, placeholders = batch.placeholders, "Quiz backfilled with placeholders");
  }
  Ok(batch)
}

/// Prompt note derived from the learner's theory score.
pub fn performance_note<'p>(prompts: &'p Prompts, theory_score: Option<f64>) -> &'p str {
  match theory_score {
    Some(s) if s < 60.0 => &prompts.performance_low_note,
    Some(s) if s > 85.0 => &prompts.performance_high_note,
    _ => "",
  }
}

/// Generate the three practice tiers in one call. Tiers are not padded; an
/// all-empty result means the service answered with nothing usable.
#[instrument(level = "info", skip(collab, settings, prompts), fields(topic = %req.topic, generator = collab.name()))]
pub async fn generate_practice(
  collab: &dyn GenerationCollaborator,
  settings: &GenerationSettings,
  prompts: &Prompts,
  req: &PracticeRequest<'_>,
) -> Result<PracticeTiers, GenerationFailure> {
  let (easy, medium, hard) = (
    req.counts.easy.to_string(),
    req.counts.medium.to_string(),
    req.counts.hard.to_string(),
  );
  let prompt = fill_template(
    &prompts.practice_template,
    &[
      ("topic", req.topic),
      ("subject", req.subject),
      ("grade", req.grade),
      ("easy", easy.as_str()),
      ("medium", medium.as_str()),
      ("hard", hard.as_str()),
      ("performance", performance_note(prompts, req.theory_score)),
    ],
  );
  let payload = collab
    .generate(&prompt, settings.practice_max_tokens, settings.timeout())
    .await
    .into_payload()
    .inspect_err(|e| warn!(target: "practice", code = e.code(), error = %e, "Practice generation failed"))?;

  let tiers = ensure_task_shape(&payload);
  info!(
    target: "practice",
    easy = tiers.easy.len(),
    medium = tiers.medium.len(),
    hard = tiers.hard.len(),
    "Practice tiers validated"
  );
  Ok(tiers)
}

/// Short hint for a wrong answer. Never fails: falls back to a fixed hint.
#[instrument(level = "info", skip_all, fields(answer_len = user_answer.len(), generator = collab.name()))]
pub async fn generate_hint(
  collab: &dyn GenerationCollaborator,
  settings: &GenerationSettings,
  prompts: &Prompts,
  task: &GeneratedTask,
  user_answer: &str,
) -> String {
  let prompt = fill_template(
    &prompts.hint_template,
    &[("question", task.question.as_str()), ("correct_answer", task.answer.as_str()), ("user_answer", user_answer)],
  );
  let hint = match collab.generate(&prompt, settings.hint_max_tokens, settings.timeout()).await {
    GenerationOutcome::Text(t) => Some(t.trim().to_string()),
    GenerationOutcome::Json(v) => text_field(&v, "hint"),
    GenerationOutcome::Failed(e) => {
      warn!(target: "practice", code = e.code(), "Hint generation failed; using fallback hint");
      None
    }
  };
  hint.filter(|h| !h.is_empty()).unwrap_or_else(|| FALLBACK_HINT.to_string())
}
