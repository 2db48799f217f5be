//! Tutor backend library: answer matching, generated-content validation, and the
//! course flow (video → theory quiz → practice) served over HTTP.

pub mod arith;
pub mod config;
pub mod domain;
pub mod error;
pub mod generation;
pub mod llm;
pub mod logic;
pub mod matcher;
pub mod mock;
pub mod progress;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod util;
pub mod validator;
pub mod youtube;

pub use matcher::{compare_answers, AnswerMatcher};
pub use validator::{ensure_question_count, ensure_task_shape};
