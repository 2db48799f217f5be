//! Scripted collaborators for tests and offline demos.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Video;
use crate::generation::{GenerationCollaborator, GenerationFailure, GenerationOutcome};
use crate::youtube::{VideoSource, VideoSourceError};

/// Replays a fixed sequence of outcomes, one per call.
///
/// Once the script is exhausted every call returns the fallback outcome
/// (a transport failure unless configured otherwise).
pub struct ScriptedGenerator {
  script: Mutex<VecDeque<GenerationOutcome>>,
  fallback: GenerationOutcome,
  call_count: AtomicU32,
  prompts: Mutex<Vec<String>>,
  last_timeout: Mutex<Option<Duration>>,
}

impl ScriptedGenerator {
  pub fn new(script: Vec<GenerationOutcome>) -> Self {
    Self {
      script: Mutex::new(script.into()),
      fallback: GenerationOutcome::Failed(GenerationFailure::Transport("script exhausted".into())),
      call_count: AtomicU32::new(0),
      prompts: Mutex::new(Vec::new()),
      last_timeout: Mutex::new(None),
    }
  }

  pub fn with_fallback(mut self, outcome: GenerationOutcome) -> Self {
    self.fallback = outcome;
    self
  }

  /// Number of calls made so far.
  pub fn call_count(&self) -> u32 {
    self.call_count.load(Ordering::Relaxed)
  }

  /// Every prompt received, in call order.
  pub fn prompts(&self) -> Vec<String> {
    self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
  }

  pub fn last_timeout(&self) -> Option<Duration> {
    self.last_timeout.lock().ok().and_then(|t| *t)
  }
}

#[async_trait]
impl GenerationCollaborator for ScriptedGenerator {
  fn name(&self) -> &str {
    "scripted"
  }

  async fn generate(&self, prompt: &str, _max_tokens: u32, timeout: Duration) -> GenerationOutcome {
    self.call_count.fetch_add(1, Ordering::Relaxed);
    if let Ok(mut prompts) = self.prompts.lock() {
      prompts.push(prompt.to_string());
    }
    if let Ok(mut last) = self.last_timeout.lock() {
      *last = Some(timeout);
    }
    self
      .script
      .lock()
      .ok()
      .and_then(|mut s| s.pop_front())
      .unwrap_or_else(|| self.fallback.clone())
  }
}

/// Serves the same video list for every playlist id.
pub struct StaticVideoSource {
  videos: Vec<Video>,
}

impl StaticVideoSource {
  pub fn new(videos: Vec<Video>) -> Self {
    Self { videos }
  }

  /// Videos titled after `titles`, with ids derived from their position.
  pub fn titled(titles: &[&str]) -> Self {
    Self::new(
      titles
        .iter()
        .enumerate()
        .map(|(i, title)| Video {
          title: title.to_string(),
          video_id: format!("video{}", i),
          description: String::new(),
          thumbnail: String::new(),
          published_at: String::new(),
        })
        .collect(),
    )
  }
}

#[async_trait]
impl VideoSource for StaticVideoSource {
  async fn playlist_videos(&self, _playlist_id: &str) -> Result<Vec<Video>, VideoSourceError> {
    Ok(self.videos.clone())
  }
}
