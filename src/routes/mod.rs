//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - JSON API under `/api/v1/...`
/// - Static frontend from `static_dir` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.app.static_dir.clone();
    let static_service = ServeDir::new(&static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(format!("{}/index.html", static_dir.trim_end_matches('/'))));

    let api = Router::new()
        .route("/health", get(http::http_health))
        .route("/catalog", get(http::http_catalog))
        .route("/check", post(http::http_post_check))
        .route("/progress", get(http::http_get_progress))
        .route("/sessions", post(http::http_create_session))
        .route("/sessions/:id", get(http::http_get_session).delete(http::http_delete_session))
        .route("/sessions/:id/video", post(http::http_rewatch))
        .route("/sessions/:id/video/next", post(http::http_next_video))
        .route("/sessions/:id/video/prev", post(http::http_prev_video))
        .route("/sessions/:id/theory", get(http::http_get_theory).post(http::http_post_theory))
        .route("/sessions/:id/theory/answers", post(http::http_post_theory_answers))
        .route("/sessions/:id/practice", post(http::http_post_practice))
        .route("/sessions/:id/practice/task", get(http::http_get_practice_task))
        .route("/sessions/:id/practice/answer", post(http::http_post_practice_answer))
        .route("/sessions/:id/practice/skip", post(http::http_post_practice_skip))
        .route("/sessions/:id/practice/finish", post(http::http_post_practice_finish));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
