//! Free-form answer equivalence.
//!
//! Decides whether a learner's typed answer is the same as the canonical one.
//! Shapes are tried in a fixed order and the first one that applies decides:
//!
//!   letter choice → inequality → interval → value set → numeric → plain text
//!
//! The order matters because shapes overlap: `x>=2,x<5` has both an operator
//! and a comma and must be compared clause-by-clause, not as a set.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::arith;

/// Textual operator synonyms, longest phrases first so "больше или равно"
/// is rewritten before "больше".
pub const DEFAULT_OPERATOR_PHRASES: &[(&str, &str)] = &[
  ("больше или равно", ">="),
  ("меньше или равно", "<="),
  ("больше", ">"),
  ("меньше", "<"),
];

/// Absolute tolerance for numeric answers.
pub const NUMERIC_TOLERANCE: f64 = 1e-6;

static CLAUSE_SPLIT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"and|or|,|;").expect("Invalid regex"));

/// Which comparison rule produced a verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerShape {
  Empty,
  LetterChoice,
  Inequality,
  Interval,
  ValueSet,
  Numeric,
  PlainText,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Verdict {
  pub matched: bool,
  pub shape: AnswerShape,
}

#[derive(Clone, Debug)]
pub struct AnswerMatcher {
  operator_phrases: Vec<(String, String)>,
}

impl Default for AnswerMatcher {
  fn default() -> Self {
    Self::new(
      DEFAULT_OPERATOR_PHRASES
        .iter()
        .map(|(p, s)| (p.to_string(), s.to_string()))
        .collect(),
    )
  }
}

impl AnswerMatcher {
  /// Build a matcher with a custom phrase table. Entries are applied in order.
  pub fn new(operator_phrases: Vec<(String, String)>) -> Self {
    let operator_phrases = operator_phrases
      .into_iter()
      .filter(|(phrase, _)| !phrase.trim().is_empty())
      .map(|(phrase, symbol)| (phrase.to_lowercase(), symbol))
      .collect();
    Self { operator_phrases }
  }

  pub fn compare(&self, user_answer: &str, correct_answer: &str) -> bool {
    self.explain(user_answer, correct_answer).matched
  }

  /// Same as [`compare`](Self::compare) but also reports the rule that decided.
  pub fn explain(&self, user_answer: &str, correct_answer: &str) -> Verdict {
    let user = user_answer.trim().to_lowercase();
    let correct = correct_answer.trim().to_lowercase();
    if user.is_empty() {
      return Verdict { matched: false, shape: AnswerShape::Empty };
    }

    let user = self.replace_textual_operators(&user);
    let correct = self.replace_textual_operators(&correct);

    if let Some(picked) = letter_choice(&user) {
      if let Some(expected) = correct.chars().next().filter(is_choice_letter) {
        return Verdict { matched: picked == expected, shape: AnswerShape::LetterChoice };
      }
    }

    let user = normalize(&user);
    let correct = normalize(&correct);

    if has_operator(&user) || has_operator(&correct) {
      let matched = clauses(&user) == clauses(&correct);
      return Verdict { matched, shape: AnswerShape::Inequality };
    }

    // Interval brackets are significant: "[2,inf)" != "(2,inf)".
    if has_bracket(&user) || has_bracket(&correct) {
      return Verdict { matched: user == correct, shape: AnswerShape::Interval };
    }

    if user.contains(',') || correct.contains(',') {
      return Verdict { matched: value_set(&user) == value_set(&correct), shape: AnswerShape::ValueSet };
    }

    if user.contains('/') || correct.contains('/') {
      if let (Some(u), Some(c)) = (arith::evaluate(&user), arith::evaluate(&correct)) {
        return Verdict { matched: (u - c).abs() < NUMERIC_TOLERANCE, shape: AnswerShape::Numeric };
      }
    }

    let first_of_correct: String = correct.chars().take(1).collect();
    let matched = user == correct || (!first_of_correct.is_empty() && user == first_of_correct);
    Verdict { matched, shape: AnswerShape::PlainText }
  }

  fn replace_textual_operators(&self, text: &str) -> String {
    self
      .operator_phrases
      .iter()
      .fold(text.to_string(), |acc, (phrase, symbol)| acc.replace(phrase.as_str(), symbol))
  }
}

/// Compare with the default phrase table.
pub fn compare_answers(user_answer: &str, correct_answer: &str) -> bool {
  AnswerMatcher::default().compare(user_answer, correct_answer)
}

fn is_choice_letter(c: &char) -> bool {
  matches!(*c, 'a'..='d')
}

/// `a`, `a)`, `a.` and `a) some text` all pick `a`.
fn letter_choice(s: &str) -> Option<char> {
  let mut chars = s.chars();
  let first = chars.next().filter(is_choice_letter)?;
  match chars.next() {
    None | Some(')') | Some('.') => Some(first),
    _ => None,
  }
}

fn normalize(s: &str) -> String {
  let compact: String = s
    .chars()
    .filter(|c| !c.is_whitespace())
    .map(|c| match c {
      '−' | '–' | '—' => '-',
      other => other,
    })
    .collect();
  compact.replace("infinity", "inf").replace('∞', "inf")
}

fn has_operator(s: &str) -> bool {
  s.contains('>') || s.contains('<')
}

fn has_bracket(s: &str) -> bool {
  s.contains(['[', ']', '(', ')'])
}

fn clauses(s: &str) -> Vec<String> {
  let mut parts: Vec<String> = CLAUSE_SPLIT
    .split(s)
    .map(normalize)
    .filter(|p| !p.is_empty())
    .collect();
  parts.sort();
  parts
}

fn value_set(s: &str) -> BTreeSet<&str> {
  s.split(',').filter(|t| !t.is_empty()).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compound_inequalities_ignore_clause_order() {
    assert!(compare_answers("x>=2, x<5", "x<5 and x>=2"));
    assert!(compare_answers("x > 1 or x < -1", "x<-1 ; x>1"));
    assert!(!compare_answers("x>=2, x<5", "x>2, x<5"));
  }

  #[test]
  fn pathological_fraction_falls_back_to_text() {
    let long = format!("1/{}1", "-".repeat(200_000));
    assert!(!compare_answers(&long, "1"));
    assert!(compare_answers(&long, &long));
    let verdict = AnswerMatcher::default().explain(&long, "1/2");
    assert_eq!(verdict.shape, AnswerShape::PlainText);
    assert!(!verdict.matched);
  }

  #[test]
  fn operator_takes_priority_over_comma() {
    let verdict = AnswerMatcher::default().explain("x>=2,x<5", "x<5,x>=2");
    assert_eq!(verdict.shape, AnswerShape::Inequality);
    assert!(verdict.matched);
  }

  #[test]
  fn textual_operators_are_rewritten_first() {
    assert!(compare_answers("больше или равно 3", ">=3"));
    assert!(compare_answers("x меньше 4", "x<4"));
    assert!(compare_answers("Меньше или равно 0", "<= 0"));
  }

  #[test]
  fn custom_phrase_table_is_honored() {
    let m = AnswerMatcher::new(vec![
      ("greater than or equal to".into(), ">=".into()),
      ("less than".into(), "<".into()),
    ]);
    assert!(m.compare("x greater than or equal to 2", "x>=2"));
    assert!(m.compare("x less than 7", "x<7"));
    assert!(!m.compare("x больше 7", "x>7"));
  }

  #[test]
  fn interval_brackets_are_significant() {
    assert!(compare_answers("[2, inf)", "[2,inf)"));
    assert!(!compare_answers("[2, inf)", "(2, inf)"));
    assert!(compare_answers("(-infinity, 3]", "(-inf,3]"));
    assert!(compare_answers("(−∞; 3]", "(-inf;3]"));
  }

  #[test]
  fn fractions_and_decimals_within_tolerance() {
    assert!(compare_answers("1/2", "0.5"));
    assert!(compare_answers("0.75", "3/4"));
    assert!(compare_answers("2^-1", "1/2"));
    assert!(!compare_answers("1/3", "0.34"));
  }

  #[test]
  fn unparsable_fraction_falls_back_to_string_equality() {
    let verdict = AnswerMatcher::default().explain("a/b", "a/b");
    assert!(verdict.matched);
    assert_eq!(verdict.shape, AnswerShape::PlainText);
    assert!(!compare_answers("x/2", "0.5"));
  }

  #[test]
  fn value_sets_ignore_order_and_duplicates() {
    assert!(compare_answers("2,-2", "-2,2"));
    assert!(compare_answers("2, -2, 2", "-2,2"));
    assert!(!compare_answers("2,-2,0", "-2,2"));
    assert!(compare_answers("−2, 2", "2,-2"));
  }

  #[test]
  fn letter_choices_ignore_case_and_punctuation() {
    assert!(compare_answers("A", "a)"));
    assert!(compare_answers("a.", "A"));
    assert!(compare_answers("A)", "a"));
    assert!(compare_answers("c) 42", "C"));
    assert!(!compare_answers("b", "A"));
  }

  #[test]
  fn empty_user_answer_never_matches() {
    assert!(!compare_answers("", "5"));
    assert!(!compare_answers("   ", ""));
    assert_eq!(AnswerMatcher::default().explain("", "5").shape, AnswerShape::Empty);
  }

  #[test]
  fn plain_text_is_whitespace_and_case_insensitive() {
    assert!(compare_answers("  Photo Synthesis ", "photosynthesis"));
    assert!(compare_answers("-5", "−5"));
    assert!(!compare_answers("6", "5"));
  }

  #[test]
  fn bare_first_letter_of_correct_value_is_accepted() {
    assert!(compare_answers("x", "x=3"));
    assert!(!compare_answers("y", "x=3"));
  }
}
