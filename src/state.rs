//! Application state: config, matcher, collaborators (generation, videos, progress)
//! and the in-memory session table.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_config_from_env, TutorConfig};
use crate::generation::{DisabledGenerator, GenerationCollaborator};
use crate::llm::ChatClient;
use crate::matcher::AnswerMatcher;
use crate::progress::{JsonFileProgressStore, MemoryProgressStore, ProgressStore};
use crate::session::TutorSession;
use crate::youtube::{DisabledVideoSource, PlaylistClient, VideoSource};

pub struct AppState {
    pub config: TutorConfig,
    pub matcher: AnswerMatcher,
    pub generator: Arc<dyn GenerationCollaborator>,
    pub videos: Arc<dyn VideoSource>,
    pub videos_enabled: bool,
    pub progress: Arc<dyn ProgressStore>,
    pub sessions: RwLock<HashMap<Uuid, TutorSession>>,
}

impl AppState {
    /// Build state from env: load config, open the progress store, init the chat and playlist clients.
    #[instrument(level = "info", skip_all)]
    pub async fn from_env() -> Self {
        let config = load_config_from_env().unwrap_or_default();

        let generator: Arc<dyn GenerationCollaborator> = match ChatClient::from_env(&config.generation) {
            Some(client) => {
                info!(target: "tutor_backend", base_url = %client.base_url, model = %client.model, "Generation enabled.");
                Arc::new(client)
            }
            None => {
                warn!(target: "tutor_backend", "Generation disabled (no LLM_API_KEY / DEEPSEEK_API_KEY).");
                Arc::new(DisabledGenerator)
            }
        };

        let (videos, videos_enabled): (Arc<dyn VideoSource>, bool) =
            match PlaylistClient::from_env(config.app.youtube_max_results) {
                Some(client) => {
                    info!(target: "tutor_backend", base_url = %client.base_url, "Video listing enabled.");
                    (Arc::new(client), true)
                }
                None => {
                    warn!(target: "tutor_backend", "Video listing disabled (no YOUTUBE_API_KEY).");
                    (Arc::new(DisabledVideoSource), false)
                }
            };

        let progress: Arc<dyn ProgressStore> = match &config.app.progress_file {
            Some(path) => Arc::new(JsonFileProgressStore::open(path).await),
            None => {
                info!(target: "progress", "No progress_file configured; keeping progress in memory.");
                Arc::new(MemoryProgressStore::new())
            }
        };

        Self::new(config, generator, videos, progress).with_videos_enabled(videos_enabled)
    }

    /// Assemble state from explicit parts.
    pub fn new(
        config: TutorConfig,
        generator: Arc<dyn GenerationCollaborator>,
        videos: Arc<dyn VideoSource>,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        let matcher = config.matcher.build();
        Self {
            config,
            matcher,
            generator,
            videos,
            videos_enabled: true,
            progress,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_videos_enabled(mut self, enabled: bool) -> Self {
        self.videos_enabled = enabled;
        self
    }

    /// Store a new session, first evicting idle ones and, if the table is still full,
    /// the least recently used.
    #[instrument(level = "debug", skip(self, session), fields(id = %session.id))]
    pub async fn insert_session(&self, session: TutorSession) {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let idle_limit = self.config.app.session_idle_secs;
        let before = sessions.len();
        sessions.retain(|_, s| s.idle_secs(now) <= idle_limit);

        let cap = self.config.app.max_sessions.max(1);
        while sessions.len() >= cap {
            let Some(oldest) = sessions.values().min_by_key(|s| s.last_seen).map(|s| s.id) else {
                break;
            };
            sessions.remove(&oldest);
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(target: "tutor_backend", evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        sessions.insert(session.id, session);
    }

    /// Snapshot of a session by id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_session(&self, id: Uuid) -> Option<TutorSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn remove_session(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }
}
