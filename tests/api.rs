//! End-to-end tests for the `/api/v1` surface, driven through `axum-test`
//! with scripted generation and a fixed playlist.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use tutor_backend::config::TutorConfig;
use async_trait::async_trait;
use tokio::sync::Notify;
use tutor_backend::generation::{GenerationCollaborator, GenerationFailure, GenerationOutcome};
use tutor_backend::mock::{ScriptedGenerator, StaticVideoSource};
use tutor_backend::progress::{topic_key, MemoryProgressStore, ProgressStore};
use tutor_backend::routes::build_router;
use tutor_backend::state::AppState;

const LETTERS: [&str; 4] = ["A", "B", "C", "D"];

fn quiz_payload(count: usize) -> GenerationOutcome {
  let questions: Vec<Value> = (0..count)
    .map(|i| {
      json!({
        "question": format!("Question {}", i + 1),
        "options": ["1", "2", "3", "4"],
        "correct_answer": LETTERS[i % 4],
        "explanation": "because"
      })
    })
    .collect();
  GenerationOutcome::Json(json!({ "questions": questions }))
}

fn practice_payload() -> GenerationOutcome {
  GenerationOutcome::Json(json!({
    "easy": [{"question": "Solve 2x >= 4", "answer": "x >= 2", "solution": "Divide by 2.", "hint": "divide"}],
    "medium": [{"question": "3/4 of 8", "answer": "6"}],
    "hard": []
  }))
}

struct Harness {
  server: TestServer,
  generator: Arc<ScriptedGenerator>,
  progress: Arc<MemoryProgressStore>,
}

fn harness_with(script: Vec<GenerationOutcome>, progress: MemoryProgressStore) -> Harness {
  let generator = Arc::new(ScriptedGenerator::new(script));
  let progress = Arc::new(progress);
  let state = AppState::new(
    TutorConfig::default(),
    generator.clone(),
    Arc::new(StaticVideoSource::titled(&["Линейные неравенства", "Квадратные уравнения"])),
    progress.clone(),
  );
  let server = TestServer::new(build_router(Arc::new(state))).expect("test server");
  Harness { server, generator, progress }
}

fn harness(script: Vec<GenerationOutcome>) -> Harness {
  harness_with(script, MemoryProgressStore::new())
}

async fn create_session(server: &TestServer) -> String {
  let response = server
    .post("/api/v1/sessions")
    .json(&json!({"subject": "Алгебра", "grade": "8"}))
    .await;
  response.assert_status(StatusCode::CREATED);
  let body: Value = response.json();
  body["id"].as_str().expect("session id").to_string()
}

#[tokio::test]
async fn health_and_catalog() {
  let h = harness(vec![]);

  let body: Value = h.server.get("/api/v1/health").await.json();
  assert_eq!(body["ok"], json!(true));
  assert_eq!(body["generator"], json!("scripted"));

  let body: Value = h.server.get("/api/v1/catalog").await.json();
  let grades = body["subjects"]["Алгебра"].as_array().expect("grades");
  assert!(grades.contains(&json!("8")));
}

#[tokio::test]
async fn direct_check_uses_the_matcher() {
  let h = harness(vec![]);
  let response = h
    .server
    .post("/api/v1/check")
    .json(&json!({"user_answer": "x больше или равно 2", "correct_answer": "x>=2"}))
    .await;
  response.assert_status_ok();
  let body: Value = response.json();
  assert_eq!(body, json!({"matched": true, "shape": "inequality"}));
}

#[tokio::test]
async fn full_topic_walkthrough() {
  let h = harness(vec![
    quiz_payload(5),
    practice_payload(),
    GenerationOutcome::Text("Divide both sides by 2.".into()),
  ]);
  let id = create_session(&h.server).await;

  let session: Value = h.server.get(&format!("/api/v1/sessions/{id}")).await.json();
  assert_eq!(session["stage"], json!("video"));
  assert_eq!(session["video_count"], json!(2));
  assert_eq!(session["video"]["title"], json!("Линейные неравенства"));

  // Theory
  let quiz: Value = h.server.post(&format!("/api/v1/sessions/{id}/theory")).await.json();
  assert_eq!(quiz["questions"].as_array().map(Vec::len), Some(5));
  assert_eq!(quiz["questions"][0]["options"][0], json!("A) 1"));
  assert_eq!(quiz["placeholders"], json!(0));
  assert!(quiz["questions"][0].get("correct_answer").is_none());

  // Cached on repeat
  h.server.post(&format!("/api/v1/sessions/{id}/theory")).await.assert_status_ok();
  assert_eq!(h.generator.call_count(), 1);

  let response = h
    .server
    .post(&format!("/api/v1/sessions/{id}/theory/answers"))
    .json(&json!({"answers": ["A", "b", "A", "A", null]}))
    .expect_failure()
    .await;
  response.assert_status(StatusCode::BAD_REQUEST);

  let graded: Value = h
    .server
    .post(&format!("/api/v1/sessions/{id}/theory/answers"))
    .json(&json!({"answers": ["A", "b", "A", "A", "a) 1"]}))
    .await
    .json();
  assert_eq!(graded["result"]["correct"], json!(3));
  assert_eq!(graded["result"]["score"], json!(60.0));
  assert_eq!(graded["result"]["passed"], json!(true));
  assert_eq!(graded["result"]["feedback"][2]["explanation"], json!("because"));

  let key = topic_key("Алгебра", "8", "Линейные неравенства");
  assert_eq!(h.progress.theory_score(&key).await, Some(60.0));

  // Practice
  let practice: Value = h.server.post(&format!("/api/v1/sessions/{id}/practice")).await.json();
  assert_eq!(practice["total"], json!(2));
  assert_eq!(practice["task"]["key"], json!("easy_0"));
  assert!(practice["task"].get("reveal").is_none());

  let response = h
    .server
    .post(&format!("/api/v1/sessions/{id}/practice/answer"))
    .json(&json!({"answer": "  "}))
    .expect_failure()
    .await;
  response.assert_status(StatusCode::BAD_REQUEST);

  let wrong: Value = h
    .server
    .post(&format!("/api/v1/sessions/{id}/practice/answer"))
    .json(&json!({"answer": "x > 2"}))
    .await
    .json();
  assert_eq!(wrong["status"], json!("incorrect"));
  assert_eq!(wrong["hint"], json!("Divide both sides by 2."));
  assert_eq!(wrong["attempts_left"], json!(2));
  assert_eq!(wrong["practice"]["task"]["hints"], json!(["Divide both sides by 2."]));

  let right: Value = h
    .server
    .post(&format!("/api/v1/sessions/{id}/practice/answer"))
    .json(&json!({"answer": "x>=2"}))
    .await
    .json();
  assert_eq!(right["status"], json!("correct"));
  assert_eq!(right["attempts"], json!(2));
  assert_eq!(right["practice"]["completed"], json!(1));

  let next: Value = h.server.post(&format!("/api/v1/sessions/{id}/practice/skip")).await.json();
  assert_eq!(next["task"]["key"], json!("medium_0"));
  assert_eq!(next["task"]["difficulty"], json!("medium"));

  let right: Value = h
    .server
    .post(&format!("/api/v1/sessions/{id}/practice/answer"))
    .json(&json!({"answer": "6"}))
    .await
    .json();
  assert_eq!(right["status"], json!("correct"));

  let done: Value = h.server.post(&format!("/api/v1/sessions/{id}/practice/skip")).await.json();
  assert_eq!(done["done"], json!(true));

  let finish: Value = h.server.post(&format!("/api/v1/sessions/{id}/practice/finish")).await.json();
  assert_eq!(finish["completed"], json!(2));
  assert_eq!(finish["total"], json!(2));
  assert_eq!(finish["percent"], json!(100.0));
  assert_eq!(finish["has_next_topic"], json!(true));
  assert_eq!(finish["report"]["theory_percent"], json!(60.0));

  let progress: Value = h.server.get("/api/v1/progress").await.json();
  assert_eq!(progress["completed_topics"], json!([key]));

  // Next topic
  let moved: Value = h.server.post(&format!("/api/v1/sessions/{id}/video/next")).await.json();
  assert_eq!(moved["moved"], json!(true));
  assert_eq!(moved["session"]["stage"], json!("video"));
  assert_eq!(moved["session"]["video_index"], json!(1));

  assert_eq!(h.generator.call_count(), 3);
}

#[tokio::test]
async fn practice_prompt_reflects_low_theory_score() {
  let h = harness(vec![quiz_payload(5), practice_payload()]);
  let id = create_session(&h.server).await;
  h.server.post(&format!("/api/v1/sessions/{id}/theory")).await.assert_status_ok();
  h.server
    .post(&format!("/api/v1/sessions/{id}/theory/answers"))
    .json(&json!({"answers": ["D", "D", "D", "A", "D"]}))
    .await
    .assert_status_ok();
  h.server.post(&format!("/api/v1/sessions/{id}/practice")).await.assert_status_ok();

  let prompts = h.generator.prompts();
  assert!(prompts[1].contains(&TutorConfig::default().prompts.performance_low_note));
}

#[tokio::test]
async fn generation_failure_is_service_unavailable() {
  let h = harness(vec![GenerationOutcome::Failed(GenerationFailure::Timeout)]);
  let id = create_session(&h.server).await;

  let response = h.server.post(&format!("/api/v1/sessions/{id}/theory")).expect_failure().await;
  response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
  let body: Value = response.json();
  assert_eq!(body["error"], json!("generation_unavailable"));
  assert_eq!(body["kind"], json!("timeout"));

  // Nothing was cached: the stage is still video.
  let session: Value = h.server.get(&format!("/api/v1/sessions/{id}")).await.json();
  assert_eq!(session["stage"], json!("video"));
}

#[tokio::test]
async fn junk_only_quiz_is_bad_gateway() {
  let h = harness(vec![GenerationOutcome::Text("I cannot help with that.".into())]);
  let id = create_session(&h.server).await;

  let response = h.server.post(&format!("/api/v1/sessions/{id}/theory")).expect_failure().await;
  response.assert_status(StatusCode::BAD_GATEWAY);
  let body: Value = response.json();
  assert_eq!(body["error"], json!("no_usable_content"));
}

#[tokio::test]
async fn short_quiz_is_backfilled_with_warning() {
  let h = harness(vec![quiz_payload(2), quiz_payload(1), GenerationOutcome::Text("nothing".into())]);
  let id = create_session(&h.server).await;

  let quiz: Value = h.server.post(&format!("/api/v1/sessions/{id}/theory")).await.json();
  assert_eq!(quiz["questions"].as_array().map(Vec::len), Some(5));
  assert_eq!(quiz["placeholders"], json!(2));
  assert!(quiz["warning"].is_string());
  assert_eq!(quiz["questions"][4]["options"], json!(["A) —", "B) —", "C) —", "D) —"]));
  assert_eq!(h.generator.call_count(), 3);
}

#[tokio::test]
async fn stage_rules_are_enforced() {
  let h = harness(vec![]);
  let id = create_session(&h.server).await;

  let response = h.server.post(&format!("/api/v1/sessions/{id}/practice")).expect_failure().await;
  response.assert_status(StatusCode::CONFLICT);
  let body: Value = response.json();
  assert_eq!(body["error"], json!("wrong_stage"));

  h.server
    .post(&format!("/api/v1/sessions/{id}/practice/skip"))
    .expect_failure()
    .await
    .assert_status(StatusCode::CONFLICT);

  h.server
    .get(&format!("/api/v1/sessions/{id}/theory"))
    .expect_failure()
    .await
    .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_session_and_course_are_not_found() {
  let h = harness(vec![]);

  h.server
    .get("/api/v1/sessions/00000000-0000-0000-0000-000000000000")
    .expect_failure()
    .await
    .assert_status(StatusCode::NOT_FOUND);

  h.server
    .post("/api/v1/sessions")
    .json(&json!({"subject": "Астрономия", "grade": "8"}))
    .expect_failure()
    .await
    .assert_status(StatusCode::NOT_FOUND);

  h.server
    .post("/api/v1/sessions")
    .json(&json!({"subject": " ", "grade": "8"}))
    .expect_failure()
    .await
    .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn course_resumes_after_completed_topic() {
  let progress = MemoryProgressStore::new();
  progress
    .save_practice_score(&topic_key("Алгебра", "8", "Линейные неравенства"), 3, 8)
    .await
    .expect("seed progress");
  let h = harness_with(vec![], progress);

  let id = create_session(&h.server).await;
  let session: Value = h.server.get(&format!("/api/v1/sessions/{id}")).await.json();
  assert_eq!(session["video_index"], json!(1));
  assert_eq!(session["video"]["title"], json!("Квадратные уравнения"));

  let moved: Value = h.server.post(&format!("/api/v1/sessions/{id}/video/next")).await.json();
  assert_eq!(moved["moved"], json!(false));

  h.server
    .delete(&format!("/api/v1/sessions/{id}"))
    .await
    .assert_status(StatusCode::NO_CONTENT);
  h.server
    .get(&format!("/api/v1/sessions/{id}"))
    .expect_failure()
    .await
    .assert_status(StatusCode::NOT_FOUND);
}

/// Replays a script but holds one chosen call until released.
struct PausingGenerator {
  inner: ScriptedGenerator,
  pause_on_call: usize,
  calls: AtomicUsize,
  paused: Notify,
  resume: Notify,
}

#[async_trait]
impl GenerationCollaborator for PausingGenerator {
  fn name(&self) -> &str {
    "pausing"
  }

  async fn generate(&self, prompt: &str, max_tokens: u32, timeout: Duration) -> GenerationOutcome {
    if self.calls.fetch_add(1, Ordering::SeqCst) == self.pause_on_call {
      self.paused.notify_one();
      self.resume.notified().await;
    }
    self.inner.generate(prompt, max_tokens, timeout).await
  }
}

#[tokio::test]
async fn late_hint_is_not_attached_to_newer_practice() {
  let generator = Arc::new(PausingGenerator {
    inner: ScriptedGenerator::new(vec![
      quiz_payload(5),
      practice_payload(),
      GenerationOutcome::Text("stale hint".into()),
      quiz_payload(5),
      practice_payload(),
    ]),
    pause_on_call: 2,
    calls: AtomicUsize::new(0),
    paused: Notify::new(),
    resume: Notify::new(),
  });
  let state = AppState::new(
    TutorConfig::default(),
    generator.clone(),
    Arc::new(StaticVideoSource::titled(&["Линейные неравенства"])),
    Arc::new(MemoryProgressStore::new()),
  );
  let server = TestServer::new(build_router(Arc::new(state))).expect("test server");
  let id = create_session(&server).await;
  server.post(&format!("/api/v1/sessions/{id}/theory")).await.assert_status_ok();
  server.post(&format!("/api/v1/sessions/{id}/practice")).await.assert_status_ok();

  let answer = async {
    server
      .post(&format!("/api/v1/sessions/{id}/practice/answer"))
      .json(&json!({"answer": "x > 2"}))
      .await
  };
  let restart = async {
    generator.paused.notified().await;
    server.post(&format!("/api/v1/sessions/{id}/video")).await.assert_status_ok();
    server.post(&format!("/api/v1/sessions/{id}/theory")).await.assert_status_ok();
    server.post(&format!("/api/v1/sessions/{id}/practice")).await.assert_status_ok();
    generator.resume.notify_one();
  };
  let (response, ()) = tokio::join!(answer, restart);

  response.assert_status_ok();
  let body: Value = response.json();
  assert_eq!(body["status"], json!("incorrect"));
  assert_eq!(body["hint"], json!("stale hint"));
  assert!(body.get("practice").is_none());

  let fresh: Value = server.get(&format!("/api/v1/sessions/{id}/practice/task")).await.json();
  assert_eq!(fresh["task"]["key"], json!("easy_0"));
  assert_eq!(fresh["task"]["hints"], json!([]));
  assert_eq!(fresh["task"]["attempts"], json!(0));
}
