//! Tutor backend: video lessons, generated theory quizzes and practice tasks.
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   TUTOR_CONFIG_PATH : path to TOML config (course settings, prompts, playlists)
//!   LLM_API_KEY       : enables generation (falls back to DEEPSEEK_API_KEY)
//!   LLM_BASE_URL      : default "https://api.deepseek.com/v1"
//!   YOUTUBE_API_KEY   : enables playlist listing
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::info;

use tutor_backend::routes::build_router;
use tutor_backend::state::AppState;
use tutor_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: config, generation/video clients, progress store, sessions.
  let state = Arc::new(AppState::from_env().await);

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "tutor_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "tutor_backend", error = %e, "Failed to listen for shutdown signal");
  }
  info!(target: "tutor_backend", "Shutdown signal received");
}
