//! Learner progress: per-topic theory/practice scores and the list of completed topics.
//!
//! The book is keyed by `"{subject}_{grade}_{video title}"`. Two stores share the
//! same in-memory book: a pretty-printed JSON file and a memory-only variant.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Difficulty, Video};
use crate::util::percent;

#[derive(Debug, Error)]
pub enum ProgressError {
  #[error("progress file I/O failed: {0}")]
  Io(#[from] std::io::Error),
  #[error("progress file is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),
}

/// Key under which a topic's scores are stored.
pub fn topic_key(subject: &str, grade: &str, title: &str) -> String {
  format!("{}_{}_{}", subject, grade, title)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicScores {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub theory_score: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub practice_completed: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub practice_total: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressBook {
  #[serde(default)]
  pub completed_topics: Vec<String>,
  #[serde(default)]
  pub scores: BTreeMap<String, TopicScores>,
}

impl ProgressBook {
  pub fn record_theory(&mut self, key: &str, score: f64) {
    let entry = self.scores.entry(key.to_string()).or_default();
    entry.theory_score = Some(score);
    entry.date = Some(Utc::now());
  }

  /// Also marks the topic as completed (once).
  pub fn record_practice(&mut self, key: &str, completed: usize, total: usize) {
    if !self.completed_topics.iter().any(|t| t == key) {
      self.completed_topics.push(key.to_string());
    }
    let entry = self.scores.entry(key.to_string()).or_default();
    entry.practice_completed = Some(completed);
    entry.practice_total = Some(total);
    entry.date = Some(Utc::now());
  }

  pub fn theory_score(&self, key: &str) -> Option<f64> {
    self.scores.get(key)?.theory_score
  }

  pub fn report(&self, key: &str) -> ProgressReport {
    let scores = self.scores.get(key).cloned().unwrap_or_default();
    let practice = scores.practice_completed.map(|completed| {
      let total = scores.practice_total.unwrap_or(0);
      PracticeSummary { completed, total, percent: percent(completed, total) }
    });
    ProgressReport {
      topic: key.to_string(),
      theory_percent: scores.theory_score,
      practice,
      date: scores.date,
    }
  }
}

/// Per-topic summary shown after practice.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressReport {
  pub topic: String,
  pub theory_percent: Option<f64>,
  pub practice: Option<PracticeSummary>,
  pub date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PracticeSummary {
  pub completed: usize,
  pub total: usize,
  pub percent: f64,
}

/// Practice difficulty suggested by the theory score.
pub fn adaptive_difficulty(theory_score: Option<f64>) -> Difficulty {
  match theory_score {
    None => Difficulty::Medium,
    Some(s) if s < 60.0 => Difficulty::Easy,
    Some(s) if s > 85.0 => Difficulty::Hard,
    Some(_) => Difficulty::Medium,
  }
}

/// Index of the first video whose topic is not yet completed for this course; 0 if all are.
pub fn resume_index(videos: &[Video], completed_topics: &[String], subject: &str, grade: &str) -> usize {
  let prefix = format!("{}_{}_", subject, grade);
  let done: Vec<&str> = completed_topics
    .iter()
    .filter_map(|t| t.strip_prefix(prefix.as_str()))
    .collect();
  videos
    .iter()
    .position(|v| !done.contains(&v.title.as_str()))
    .unwrap_or(0)
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
  async fn load(&self) -> ProgressBook;
  async fn save_theory_score(&self, key: &str, score: f64) -> Result<(), ProgressError>;
  async fn save_practice_score(&self, key: &str, completed: usize, total: usize) -> Result<(), ProgressError>;

  async fn theory_score(&self, key: &str) -> Option<f64> {
    self.load().await.theory_score(key)
  }

  async fn completed_topics(&self) -> Vec<String> {
    self.load().await.completed_topics
  }
}

/// Progress kept for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryProgressStore {
  book: RwLock<ProgressBook>,
}

impl MemoryProgressStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
  async fn load(&self) -> ProgressBook {
    self.book.read().await.clone()
  }

  async fn save_theory_score(&self, key: &str, score: f64) -> Result<(), ProgressError> {
    self.book.write().await.record_theory(key, score);
    Ok(())
  }

  async fn save_practice_score(&self, key: &str, completed: usize, total: usize) -> Result<(), ProgressError> {
    self.book.write().await.record_practice(key, completed, total);
    Ok(())
  }
}

/// Progress persisted as pretty JSON, rewritten after every change.
pub struct JsonFileProgressStore {
  path: PathBuf,
  book: RwLock<ProgressBook>,
}

impl JsonFileProgressStore {
  /// Open the store. A missing or unreadable file starts an empty book.
  #[instrument(level = "info", skip_all)]
  pub async fn open(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let book = match tokio::fs::read_to_string(&path).await {
      Ok(s) => match serde_json::from_str::<ProgressBook>(&s) {
        Ok(book) => {
          info!(target: "progress", topics = book.scores.len(), completed = book.completed_topics.len(), "Loaded progress file");
          book
        }
        Err(e) => {
          warn!(target: "progress", error = %e, "Progress file is corrupt; starting empty");
          ProgressBook::default()
        }
      },
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(target: "progress", "No progress file yet; starting empty");
        ProgressBook::default()
      }
      Err(e) => {
        warn!(target: "progress", error = %e, "Progress file unreadable; starting empty");
        ProgressBook::default()
      }
    };
    Self { path, book: RwLock::new(book) }
  }

  async fn persist(&self, book: &ProgressBook) -> Result<(), ProgressError> {
    let json = serde_json::to_string_pretty(book)?;
    tokio::fs::write(&self.path, json).await?;
    debug!(target: "progress", path = %self.path.display(), "Progress saved");
    Ok(())
  }
}

#[async_trait]
impl ProgressStore for JsonFileProgressStore {
  async fn load(&self) -> ProgressBook {
    self.book.read().await.clone()
  }

  async fn save_theory_score(&self, key: &str, score: f64) -> Result<(), ProgressError> {
    let mut book = self.book.write().await;
    book.record_theory(key, score);
    self.persist(&book).await
  }

  async fn save_practice_score(&self, key: &str, completed: usize, total: usize) -> Result<(), ProgressError> {
    let mut book = self.book.write().await;
    book.record_practice(key, completed, total);
    self.persist(&book).await
  }
}
