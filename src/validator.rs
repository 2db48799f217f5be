//! Boundary between untrusted model output (`serde_json::Value`) and the strict
//! `GeneratedQuestion` / `GeneratedTask` types.
//!
//! Quiz: malformed items are dropped, the rest truncated or padded with
//! placeholders to exactly the requested count.
//! Practice: items without question/answer are dropped, blanks defaulted,
//! tiers never padded.

use serde::Serialize;
use serde_json::Value;

use crate::domain::{ChoiceLetter, Difficulty, GeneratedQuestion, GeneratedTask, PracticeTiers};
use crate::seeds::{placeholder_question, PLACEHOLDER_MARK};
use crate::util::text_field;

/// A quiz of exactly the requested length, with the synthetic share recorded
/// so callers can warn the learner.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuizBatch {
  pub questions: Vec<GeneratedQuestion>,
  pub genuine: usize,
  pub placeholders: usize,
}

impl QuizBatch {
  /// True when every question came from the model.
  pub fn is_complete(&self) -> bool {
    self.placeholders == 0
  }
}

/// Pull the question list out of a quiz payload: `{"questions": [...]}` or a bare array.
pub fn question_items(payload: &Value) -> Vec<Value> {
  match payload {
    Value::Array(items) => items.clone(),
    Value::Object(_) => payload
      .get("questions")
      .and_then(Value::as_array)
      .cloned()
      .unwrap_or_default(),
    _ => Vec::new(),
  }
}

/// Validate one raw quiz item. `None` means the item is dropped.
pub fn normalize_question(raw: &Value) -> Option<GeneratedQuestion> {
  let question = text_field(raw, "question").filter(|q| !q.is_empty())?;

  let raw_options = raw.get("options")?.as_array()?;
  if raw_options.len() != ChoiceLetter::ALL.len() {
    return None;
  }
  let mut options: [String; 4] = Default::default();
  for ((slot, letter), raw_opt) in options.iter_mut().zip(ChoiceLetter::ALL).zip(raw_options) {
    let body = match raw_opt {
      Value::String(s) => s.trim().to_string(),
      Value::Number(n) => n.to_string(),
      _ => return None,
    };
    *slot = with_letter_prefix(letter, &body);
  }

  let correct_answer = text_field(raw, "correct_answer")
    .and_then(|s| s.chars().next())
    .and_then(ChoiceLetter::from_char)?;

  let explanation = text_field(raw, "explanation")
    .filter(|e| !e.is_empty())
    .unwrap_or_else(|| PLACEHOLDER_MARK.to_string());

  Some(GeneratedQuestion { question, options, correct_answer, explanation })
}

fn with_letter_prefix(letter: ChoiceLetter, body: &str) -> String {
  let prefix = format!("{})", letter.as_char());
  if body.to_lowercase().starts_with(&prefix.to_lowercase()) {
    return body.to_string();
  }
  let body = if body.is_empty() { PLACEHOLDER_MARK } else { body };
  format!("{} {}", prefix, body)
}

/// Validate every raw item, keeping accepted ones in their original order.
pub fn normalize_questions(raw_items: &[Value]) -> Vec<GeneratedQuestion> {
  raw_items.iter().filter_map(normalize_question).collect()
}

/// Truncate or pad already-validated questions to exactly `target`.
pub fn backfill(mut accepted: Vec<GeneratedQuestion>, target: usize, topic: &str) -> QuizBatch {
  accepted.truncate(target);
  let genuine = accepted.len();
  let placeholders = target - genuine;
  accepted.extend((0..placeholders).map(|_| placeholder_question(topic)));
  QuizBatch { questions: accepted, genuine, placeholders }
}

/// Exactly `target` well-formed questions: first accepted items, then placeholders.
pub fn ensure_question_count(raw_items: &[Value], target: usize, topic: &str) -> QuizBatch {
  backfill(normalize_questions(raw_items), target, topic)
}

/// Validate one raw practice item for the given tier.
pub fn normalize_task(raw: &Value, difficulty: Difficulty) -> Option<GeneratedTask> {
  let question = text_field(raw, "question").filter(|q| !q.is_empty())?;
  let answer = text_field(raw, "answer").filter(|a| !a.is_empty())?;
  Some(GeneratedTask {
    question,
    answer,
    solution: text_field(raw, "solution").unwrap_or_default(),
    hint: text_field(raw, "hint").unwrap_or_default(),
    difficulty,
  })
}

/// Normalize an `{easy, medium, hard}` payload. Missing tiers become empty.
pub fn ensure_task_shape(payload: &Value) -> PracticeTiers {
  let mut tiers = PracticeTiers::default();
  for difficulty in Difficulty::ALL {
    let items = payload
      .get(difficulty.as_str())
      .and_then(Value::as_array)
      .map(|items| items.iter().filter_map(|raw| normalize_task(raw, difficulty)).collect())
      .unwrap_or_default();
    *tiers.tier_mut(difficulty) = items;
  }
  tiers
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use serde_json::json;

  fn valid_item(n: usize) -> Value {
    json!({
      "question": format!("What is {n} + {n}?"),
      "options": ["A) 1", "B) 2", "C) 3", "D) 4"],
      "correct_answer": "B",
      "explanation": "Addition."
    })
  }

  #[test]
  fn empty_input_yields_all_placeholders() {
    let batch = ensure_question_count(&[], 5, "Topic");
    assert_eq!(batch.questions.len(), 5);
    assert_eq!(batch.genuine, 0);
    assert_eq!(batch.placeholders, 5);
    for q in &batch.questions {
      assert_eq!(q.options.len(), 4);
      assert_eq!(q.correct_answer, ChoiceLetter::A);
      assert!(!q.question.is_empty());
      assert!(!q.explanation.is_empty());
    }
  }

  #[test]
  fn missing_prefixes_are_added_without_reordering() {
    let raw = json!({
      "question": "Pick the prime",
      "options": ["4", "b) 6", "7", "  9 "],
      "correct_answer": "c) 7",
      "explanation": "7 is prime."
    });
    let batch = ensure_question_count(&[raw], 5, "Topic");
    assert_eq!(batch.genuine, 1);
    assert_eq!(batch.placeholders, 4);
    let q = &batch.questions[0];
    assert_eq!(q.options, ["A) 4", "b) 6", "C) 7", "D) 9"].map(String::from));
    assert_eq!(q.correct_answer, ChoiceLetter::C);
    assert!(!batch.is_complete());
  }

  #[test]
  fn surplus_is_truncated_by_position() {
    let raw: Vec<Value> = (0..7).map(valid_item).collect();
    let batch = ensure_question_count(&raw, 5, "Topic");
    assert_eq!(batch.questions.len(), 5);
    assert_eq!(batch.placeholders, 0);
    assert!(batch.is_complete());
    assert_eq!(batch.questions[4].question, "What is 4 + 4?");
  }

  #[test]
  fn malformed_items_are_dropped() {
    let raw = vec![
      json!({"question": "three options", "options": ["a", "b", "c"], "correct_answer": "A"}),
      json!({"question": "bad letter", "options": ["a", "b", "c", "d"], "correct_answer": "E"}),
      json!({"question": "", "options": ["a", "b", "c", "d"], "correct_answer": "A"}),
      json!({"question": "object option", "options": [{}, "b", "c", "d"], "correct_answer": "A"}),
      json!("not an object"),
      valid_item(1),
    ];
    let batch = ensure_question_count(&raw, 2, "Topic");
    assert_eq!(batch.genuine, 1);
    assert_eq!(batch.questions[0].question, "What is 1 + 1?");
  }

  #[test]
  fn blank_explanation_gets_sentinel() {
    let raw = json!({"question": "q", "options": [1, 2, 3, 4], "correct_answer": "d"});
    let q = normalize_question(&raw).expect("accepted");
    assert_eq!(q.explanation, "—");
    assert_eq!(q.options[3], "D) 4");
    assert_eq!(q.correct_answer, ChoiceLetter::D);
  }

  #[test]
  fn normalizing_own_output_is_idempotent() {
    let raw = vec![
      json!({"question": "q1", "options": ["x", "y", "", "w"], "correct_answer": "a", "explanation": ""}),
      valid_item(2),
    ];
    let first = ensure_question_count(&raw, 4, "Topic");
    let replay: Vec<Value> = first
      .questions
      .iter()
      .map(|q| serde_json::to_value(q).expect("serializable"))
      .collect();
    let second = ensure_question_count(&replay, 4, "Topic");
    assert_eq!(first.questions, second.questions);
  }

  #[test]
  fn question_items_accepts_object_or_array() {
    assert_eq!(question_items(&json!({"questions": [1, 2]})).len(), 2);
    assert_eq!(question_items(&json!([1])).len(), 1);
    assert!(question_items(&json!({"other": []})).is_empty());
    assert!(question_items(&Value::Null).is_empty());
  }

  #[test]
  fn empty_tier_is_kept_not_padded() {
    let payload = json!({
      "easy": [
        {"question": "2+2", "answer": 4},
        {"question": "no answer"},
        {"question": "x>1?", "answer": "x > 1", "solution": "…", "hint": "compare"}
      ],
      "medium": []
    });
    let tiers = ensure_task_shape(&payload);
    assert_eq!(tiers.easy.len(), 2);
    assert_eq!(tiers.easy[0].answer, "4");
    assert_eq!(tiers.easy[0].solution, "");
    assert_eq!(tiers.easy[0].difficulty, Difficulty::Easy);
    assert_eq!(tiers.easy[1].hint, "compare");
    assert!(tiers.medium.is_empty());
    assert!(tiers.hard.is_empty());
    assert_eq!(tiers.total(), 2);
  }

  #[test]
  fn garbage_payload_gives_empty_tiers() {
    assert!(ensure_task_shape(&json!("nonsense")).is_empty());
    assert!(ensure_task_shape(&json!({"easy": "not a list"})).is_empty());
  }
}
