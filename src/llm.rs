//! Minimal OpenAI-compatible chat-completions client (DeepSeek by default).
//!
//! We send one user message and hand the reply back as JSON when it parses,
//! raw text otherwise. Transport problems are folded into `GenerationFailure`
//! so callers branch on a value instead of an error chain.
//!
//! NOTE: We never log the API key and keep payload previews short.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::GenerationSettings;
use crate::generation::{GenerationCollaborator, GenerationFailure, GenerationOutcome};
use crate::util::trunc_for_log;

const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";

/// Statuses worth retrying inside one generation call.
const RETRYABLE: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Clone)]
pub struct ChatClient {
  pub client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
  transport_retries: u32,
  backoff: Duration,
}

impl ChatClient {
  pub fn new(api_key: &str, base_url: &str, settings: &GenerationSettings) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .build()?;
    Ok(Self {
      client,
      api_key: api_key.to_string(),
      base_url: base_url.trim_end_matches('/').to_string(),
      model: settings.model.clone(),
      temperature: settings.temperature,
      transport_retries: settings.transport_retries,
      backoff: Duration::from_millis(settings.backoff_ms),
    })
  }

  /// Construct the client if we find LLM_API_KEY (or DEEPSEEK_API_KEY); otherwise return None.
  pub fn from_env(settings: &GenerationSettings) -> Option<Self> {
    let api_key = std::env::var("LLM_API_KEY")
      .or_else(|_| std::env::var("DEEPSEEK_API_KEY"))
      .ok()
      .filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    match Self::new(&api_key, &base_url, settings) {
      Ok(c) => Some(c),
      Err(e) => {
        warn!(target: "tutor_backend", error = %e, "Failed to build HTTP client; generation disabled");
        None
      }
    }
  }

  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn chat(&self, prompt: &str, max_tokens: u32, timeout: Duration) -> GenerationOutcome {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![ChatMessageReq { role: "user".into(), content: prompt.into() }],
      temperature: self.temperature,
      max_tokens,
    };

    let start = std::time::Instant::now();
    let mut attempt = 0u32;
    let res = loop {
      let sent = self.client.post(&url)
        .header(USER_AGENT, "tutor-backend/0.1")
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
        .timeout(timeout)
        .json(&req).send().await;

      let res = match sent {
        Ok(r) => r,
        Err(e) if e.is_timeout() => return GenerationOutcome::Failed(GenerationFailure::Timeout),
        Err(e) => return GenerationOutcome::Failed(GenerationFailure::Transport(e.to_string())),
      };

      let status = res.status();
      if RETRYABLE.contains(&status.as_u16()) && attempt < self.transport_retries {
        let delay = self.backoff * 2u32.saturating_pow(attempt);
        warn!(%status, attempt, ?delay, "Retryable status from chat service");
        tokio::time::sleep(delay).await;
        attempt += 1;
        continue;
      }
      break res;
    };

    let status = res.status();
    if status == StatusCode::PAYMENT_REQUIRED || status == StatusCode::TOO_MANY_REQUESTS {
      warn!(%status, "Chat service refused: rate limit or balance");
      return GenerationOutcome::Failed(GenerationFailure::RateLimitedOrUnpaid);
    }
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let msg = extract_api_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return GenerationOutcome::Failed(GenerationFailure::Transport(format!("HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = match res.json().await {
      Ok(b) => b,
      Err(e) if e.is_timeout() => return GenerationOutcome::Failed(GenerationFailure::Timeout),
      Err(e) => return GenerationOutcome::Failed(GenerationFailure::Transport(e.to_string())),
    };
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Chat usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Chat response received");
    debug!(preview = %trunc_for_log(&text, 120), "Chat response preview");

    classify_content(text)
  }
}

/// Structured JSON only when the reply is an object or array; anything else stays text.
fn classify_content(text: String) -> GenerationOutcome {
  match serde_json::from_str::<Value>(text.trim()) {
    Ok(v @ (Value::Object(_) | Value::Array(_))) => GenerationOutcome::Json(v),
    _ => GenerationOutcome::Text(text),
  }
}

#[async_trait]
impl GenerationCollaborator for ChatClient {
  fn name(&self) -> &str {
    &self.model
  }

  async fn generate(&self, prompt: &str, max_tokens: u32, timeout: Duration) -> GenerationOutcome {
    self.chat(prompt, max_tokens, timeout).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  max_tokens: u32,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from the provider's error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
