//! Loading tutor configuration (course settings, generation limits, matcher table,
//! prompts, playlist catalog) from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid config.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::TierCounts;
use crate::matcher::{AnswerMatcher, DEFAULT_OPERATOR_PHRASES};
use crate::seeds::default_playlists;

#[derive(Clone, Debug, Deserialize)]
pub struct TutorConfig {
  #[serde(default)]
  pub app: AppSettings,
  #[serde(default)]
  pub generation: GenerationSettings,
  #[serde(default)]
  pub matcher: MatcherSettings,
  #[serde(default)]
  pub prompts: Prompts,
  /// subject → grade → playlist id. Entries from TOML are merged over the built-in catalog.
  #[serde(default)]
  pub playlists: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for TutorConfig {
  fn default() -> Self {
    Self {
      app: AppSettings::default(),
      generation: GenerationSettings::default(),
      matcher: MatcherSettings::default(),
      prompts: Prompts::default(),
      playlists: default_playlists(),
    }
  }
}

impl TutorConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    let mut cfg: TutorConfig = toml::from_str(s)?;
    let mut catalog = default_playlists();
    for (subject, grades) in std::mem::take(&mut cfg.playlists) {
      catalog.entry(subject).or_default().extend(grades);
    }
    cfg.playlists = catalog;
    Ok(cfg)
  }

  pub fn playlist_id(&self, subject: &str, grade: &str) -> Option<&str> {
    self.playlists.get(subject)?.get(grade).map(String::as_str)
  }
}

/// Course flow settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppSettings {
  pub theory_questions_count: usize,
  pub tasks_per_difficulty: TierCounts,
  pub max_attempts_per_task: u32,
  /// Percent needed to pass the theory quiz.
  pub theory_pass_threshold: f64,
  /// JSON progress file; `None` keeps progress in memory only.
  pub progress_file: Option<PathBuf>,
  pub youtube_max_results: u32,
  pub static_dir: String,
  /// Sessions idle longer than this are dropped when a new one starts.
  pub session_idle_secs: u64,
  pub max_sessions: usize,
}

impl Default for AppSettings {
  fn default() -> Self {
    Self {
      theory_questions_count: 5,
      tasks_per_difficulty: TierCounts::default(),
      max_attempts_per_task: 3,
      theory_pass_threshold: 60.0,
      progress_file: Some(PathBuf::from("progress.json")),
      youtube_max_results: 50,
      static_dir: "./static".into(),
      session_idle_secs: 4 * 60 * 60,
      max_sessions: 1000,
    }
  }
}

/// Limits for calls to the chat-completion service.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
  pub model: String,
  pub temperature: f32,
  pub quiz_max_tokens: u32,
  pub practice_max_tokens: u32,
  pub hint_max_tokens: u32,
  pub timeout_secs: u64,
  /// Supplementary "N more questions" calls after a short quiz.
  pub topup_retries: u32,
  /// HTTP-level retries on 429/5xx inside one generation call.
  pub transport_retries: u32,
  pub backoff_ms: u64,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      model: "deepseek-chat".into(),
      temperature: 0.7,
      quiz_max_tokens: 2000,
      practice_max_tokens: 2200,
      hint_max_tokens: 300,
      timeout_secs: 60,
      topup_retries: 2,
      transport_retries: 3,
      backoff_ms: 1500,
    }
  }
}

impl GenerationSettings {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MatcherSettings {
  /// Ordered `[phrase, symbol]` pairs, e.g. `["больше или равно", ">="]`.
  pub operator_phrases: Vec<(String, String)>,
}

impl Default for MatcherSettings {
  fn default() -> Self {
    Self {
      operator_phrases: DEFAULT_OPERATOR_PHRASES
        .iter()
        .map(|(p, s)| (p.to_string(), s.to_string()))
        .collect(),
    }
  }
}

impl MatcherSettings {
  pub fn build(&self) -> AnswerMatcher {
    AnswerMatcher::new(self.operator_phrases.clone())
  }
}

/// Prompt templates. Placeholders: `{topic}`, `{subject}`, `{grade}`, `{count}`,
/// `{existing}`, `{easy}`, `{medium}`, `{hard}`, `{performance}`, `{question}`,
/// `{correct_answer}`, `{user_answer}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub quiz_template: String,
  pub quiz_topup_template: String,
  pub practice_template: String,
  pub hint_template: String,
  pub performance_low_note: String,
  pub performance_high_note: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      quiz_template: r#"Generate EXACTLY {count} theory questions on the topic "{topic}" (grade {grade}, subject "{subject}"). Write all learner-facing text in Russian.

Each question must have:
- 4 options strictly formatted as "A) ...", "B) ...", "C) ...", "D) ..."
- exactly one correct option among A/B/C/D
- a short explanation; formulas in LaTeX: \( ... \) or \[ ... \]

Return STRICTLY VALID JSON with no comments or ellipses:
{"questions": [{"question": "...", "options": ["A) ...", "B) ...", "C) ...", "D) ..."], "correct_answer": "A", "explanation": "..."}]}"#.into(),
      quiz_topup_template: r#"Generate {count} MORE theory questions on the topic "{topic}" (grade {grade}, subject "{subject}"). Write all learner-facing text in Russian.
Do not repeat these questions:
{existing}

Same format: 4 options "A) ".."D) ", one correct letter, short explanation.
Return STRICTLY VALID JSON: {"questions": [{"question": "...", "options": ["A) ...", "B) ...", "C) ...", "D) ..."], "correct_answer": "A", "explanation": "..."}]}"#.into(),
      practice_template: r#"Compose practice problems on the topic "{topic}" for grade {grade}, subject "{subject}". Write all learner-facing text in Russian:
- {easy} easy,
- {medium} medium,
- {hard} hard.

{performance}

For each problem return:
- "question": the statement (LaTeX where needed)
- "answer": the correct answer (text/number; inequalities like "x >= 2, x < 5")
- "solution": step-by-step explanation (LaTeX allowed)
- "hint": a short hint without LaTeX

Return STRICTLY VALID JSON with no comments or ellipses:
{"easy": [{"question": "...", "answer": "...", "solution": "...", "hint": "..."}], "medium": [...], "hard": [...]}"#.into(),
      hint_template: r#"A student is solving: "{question}"
Correct answer: "{correct_answer}"
Student's answer: "{user_answer}"

Give a very short hint (1-2 sentences, in Russian) that points toward the right approach, without LaTeX and without the full solution.
If the answer format is wrong (for example "больше или равно" instead of ">="), point that out."#.into(),
      performance_low_note: "Focus on simple problems with very clear explanations.".into(),
      performance_high_note: "Add harder, non-standard problems.".into(),
    }
  }
}

/// Attempt to load `TutorConfig` from TUTOR_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<TutorConfig> {
  let path = std::env::var("TUTOR_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match TutorConfig::from_toml_str(&s) {
      Ok(cfg) => {
        info!(target: "tutor_backend", %path, "Loaded tutor config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "tutor_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "tutor_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_document_uses_defaults() {
    let cfg = TutorConfig::from_toml_str("").expect("valid");
    assert_eq!(cfg.app.theory_questions_count, 5);
    assert_eq!(cfg.app.tasks_per_difficulty, TierCounts { easy: 3, medium: 3, hard: 2 });
    assert_eq!(cfg.app.max_attempts_per_task, 3);
    assert_eq!(cfg.app.session_idle_secs, 14_400);
    assert_eq!(cfg.app.max_sessions, 1000);
    assert_eq!(cfg.generation.topup_retries, 2);
    assert_eq!(cfg.generation.timeout(), Duration::from_secs(60));
    assert_eq!(cfg.matcher.operator_phrases.len(), 4);
    assert_eq!(cfg.playlist_id("Алгебра", "9"), Some("PLCRqj4jDCIYl7ZP0JefXdLcXcEIh8LY5m"));
  }

  #[test]
  fn partial_sections_override_only_given_fields() {
    let cfg = TutorConfig::from_toml_str(
      r#"
      [app]
      theory_questions_count = 10
      tasks_per_difficulty = { easy = 1, medium = 1, hard = 1 }

      [generation]
      model = "gpt-4o-mini"
      topup_retries = 0

      [matcher]
      operator_phrases = [["at least", ">="]]

      [playlists."Информатика"]
      "8" = "PLinformatics8"

      [playlists."Алгебра"]
      "7" = "PLoverride7"
      "#,
    )
    .expect("valid");
    assert_eq!(cfg.app.theory_questions_count, 10);
    assert_eq!(cfg.app.max_attempts_per_task, 3);
    assert_eq!(cfg.app.tasks_per_difficulty.hard, 1);
    assert_eq!(cfg.generation.model, "gpt-4o-mini");
    assert_eq!(cfg.generation.quiz_max_tokens, 2000);
    assert_eq!(cfg.generation.topup_retries, 0);
    assert!(cfg.matcher.build().compare("x at least 2", "x>=2"));
    assert_eq!(cfg.playlist_id("Информатика", "8"), Some("PLinformatics8"));
    assert_eq!(cfg.playlist_id("Алгебра", "7"), Some("PLoverride7"));
    assert_eq!(cfg.playlist_id("Алгебра", "8"), Some("PLCRqj4jDCIYkk9CMV6wBQR16eHz_SRU1j"));
  }

  #[test]
  fn malformed_document_is_an_error() {
    assert!(TutorConfig::from_toml_str("[app]\ntheory_questions_count = \"five\"").is_err());
  }
}
