//! Lesson videos from YouTube playlists (Data API v3 `playlistItems`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::Video;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DESCRIPTION_LIMIT: usize = 280;
const UNTITLED: &str = "Без названия";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VideoSourceError {
  #[error("invalid playlist id: {0}")]
  InvalidPlaylistId(String),
  #[error("video listing disabled: no YOUTUBE_API_KEY configured")]
  Disabled,
  #[error("video service timed out")]
  Timeout,
  #[error("video service returned HTTP {0}")]
  Http(u16),
  #[error("video service request failed: {0}")]
  Transport(String),
  #[error("could not decode playlist response: {0}")]
  Decode(String),
}

/// Anything that can list the videos of a playlist.
#[async_trait]
pub trait VideoSource: Send + Sync {
  async fn playlist_videos(&self, playlist_id: &str) -> Result<Vec<Video>, VideoSourceError>;
}

/// Stand-in used when no API key is configured.
pub struct DisabledVideoSource;

#[async_trait]
impl VideoSource for DisabledVideoSource {
  async fn playlist_videos(&self, _playlist_id: &str) -> Result<Vec<Video>, VideoSourceError> {
    Err(VideoSourceError::Disabled)
  }
}

/// Playlist ids we accept: `PL…`, `UU…` or any other `P…` prefix.
pub fn is_valid_playlist_id(id: &str) -> bool {
  id.starts_with("PL") || id.starts_with("UU") || id.starts_with('P')
}

#[derive(Clone)]
pub struct PlaylistClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub max_results: u32,
}

impl PlaylistClient {
  pub fn new(api_key: &str, base_url: &str, max_results: u32) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Self {
      client,
      api_key: api_key.to_string(),
      base_url: base_url.trim_end_matches('/').to_string(),
      max_results,
    })
  }

  /// Construct the client if YOUTUBE_API_KEY is set; otherwise return None.
  pub fn from_env(max_results: u32) -> Option<Self> {
    let api_key = std::env::var("YOUTUBE_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("YOUTUBE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    match Self::new(&api_key, &base_url, max_results) {
      Ok(c) => Some(c),
      Err(e) => {
        warn!(target: "tutor_backend", error = %e, "Failed to build YouTube client; video listing disabled");
        None
      }
    }
  }
}

#[async_trait]
impl VideoSource for PlaylistClient {
  #[instrument(level = "info", skip(self), fields(max_results = self.max_results))]
  async fn playlist_videos(&self, playlist_id: &str) -> Result<Vec<Video>, VideoSourceError> {
    if !is_valid_playlist_id(playlist_id) {
      warn!(target: "user_action", action = "invalid_playlist_id", %playlist_id, "Rejected playlist id");
      return Err(VideoSourceError::InvalidPlaylistId(playlist_id.to_string()));
    }

    let url = format!("{}/playlistItems", self.base_url);
    let max_results = self.max_results.to_string();
    let res = self
      .client
      .get(&url)
      .query(&[
        ("part", "snippet,contentDetails"),
        ("playlistId", playlist_id),
        ("maxResults", max_results.as_str()),
        ("key", self.api_key.as_str()),
      ])
      .send()
      .await
      .map_err(map_reqwest_error)?;

    let status = res.status();
    if !status.is_success() {
      warn!(target: "user_action", action = "playlist_error", %playlist_id, %status, "Playlist request failed");
      return Err(VideoSourceError::Http(status.as_u16()));
    }

    let body: PlaylistItemsResponse = res.json().await.map_err(|e| {
      if e.is_timeout() { VideoSourceError::Timeout } else { VideoSourceError::Decode(e.to_string()) }
    })?;
    let videos: Vec<Video> = body.items.into_iter().filter_map(to_video).collect();
    info!(target: "user_action", action = "playlist_loaded", %playlist_id, count = videos.len(), "Playlist loaded");
    Ok(videos)
  }
}

fn map_reqwest_error(e: reqwest::Error) -> VideoSourceError {
  if e.is_timeout() {
    VideoSourceError::Timeout
  } else {
    VideoSourceError::Transport(e.to_string())
  }
}

fn to_video(item: PlaylistItem) -> Option<Video> {
  let snippet = item.snippet?;
  let video_id = snippet.resource_id.and_then(|r| r.video_id).filter(|id| !id.is_empty())?;
  let thumbnail = snippet
    .thumbnails
    .and_then(|t| t.high.or(t.medium).or(t.default))
    .map(|t| t.url)
    .unwrap_or_default();
  Some(Video {
    title: snippet.title.unwrap_or_else(|| UNTITLED.to_string()),
    video_id,
    description: truncate_description(snippet.description.as_deref().unwrap_or_default()),
    thumbnail,
    published_at: snippet.published_at.unwrap_or_default(),
  })
}

fn truncate_description(s: &str) -> String {
  if s.chars().count() > DESCRIPTION_LIMIT {
    let head: String = s.chars().take(DESCRIPTION_LIMIT).collect();
    format!("{}...", head)
  } else {
    s.to_string()
  }
}

// --- playlistItems DTOs ---

#[derive(Deserialize)]
struct PlaylistItemsResponse {
  #[serde(default)]
  items: Vec<PlaylistItem>,
}

#[derive(Deserialize)]
struct PlaylistItem {
  #[serde(default)]
  snippet: Option<Snippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
  #[serde(default)] title: Option<String>,
  #[serde(default)] description: Option<String>,
  #[serde(default)] published_at: Option<String>,
  #[serde(default)] thumbnails: Option<Thumbnails>,
  #[serde(default)] resource_id: Option<ResourceId>,
}

#[derive(Deserialize)]
struct Thumbnails {
  #[serde(default)] high: Option<Thumbnail>,
  #[serde(default)] medium: Option<Thumbnail>,
  #[serde(default)] default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
  #[serde(default)] url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
  #[serde(default)] video_id: Option<String>,
}
