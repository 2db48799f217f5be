//! Domain models: difficulty tiers, validated quiz questions and practice tasks, lesson videos.

use serde::{Deserialize, Serialize};

/// Practice difficulty tier. Tiers are consumed in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

  pub fn as_str(self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
    }
  }

  /// The tier that follows this one, if any.
  pub fn next(self) -> Option<Difficulty> {
    match self {
      Difficulty::Easy => Some(Difficulty::Medium),
      Difficulty::Medium => Some(Difficulty::Hard),
      Difficulty::Hard => None,
    }
  }
}

impl std::fmt::Display for Difficulty {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One of the four multiple-choice letters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChoiceLetter {
  A,
  B,
  C,
  D,
}

impl ChoiceLetter {
  pub const ALL: [ChoiceLetter; 4] = [ChoiceLetter::A, ChoiceLetter::B, ChoiceLetter::C, ChoiceLetter::D];

  pub fn from_char(c: char) -> Option<Self> {
    match c.to_ascii_uppercase() {
      'A' => Some(ChoiceLetter::A),
      'B' => Some(ChoiceLetter::B),
      'C' => Some(ChoiceLetter::C),
      'D' => Some(ChoiceLetter::D),
      _ => None,
    }
  }

  pub fn as_char(self) -> char {
    match self {
      ChoiceLetter::A => 'A',
      ChoiceLetter::B => 'B',
      ChoiceLetter::C => 'C',
      ChoiceLetter::D => 'D',
    }
  }
}

/// Validated theory question: exactly four lettered options and one correct letter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
  pub question: String,
  pub options: [String; 4],
  pub correct_answer: ChoiceLetter,
  pub explanation: String,
}

/// Validated practice task. `solution` and `hint` may be empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTask {
  pub question: String,
  pub answer: String,
  #[serde(default)] pub solution: String,
  #[serde(default)] pub hint: String,
  pub difficulty: Difficulty,
}

/// Practice tasks grouped by tier. A tier may be empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PracticeTiers {
  #[serde(default)] pub easy: Vec<GeneratedTask>,
  #[serde(default)] pub medium: Vec<GeneratedTask>,
  #[serde(default)] pub hard: Vec<GeneratedTask>,
}

impl PracticeTiers {
  pub fn tier(&self, difficulty: Difficulty) -> &[GeneratedTask] {
    match difficulty {
      Difficulty::Easy => &self.easy,
      Difficulty::Medium => &self.medium,
      Difficulty::Hard => &self.hard,
    }
  }

  pub fn tier_mut(&mut self, difficulty: Difficulty) -> &mut Vec<GeneratedTask> {
    match difficulty {
      Difficulty::Easy => &mut self.easy,
      Difficulty::Medium => &mut self.medium,
      Difficulty::Hard => &mut self.hard,
    }
  }

  pub fn total(&self) -> usize {
    self.easy.len() + self.medium.len() + self.hard.len()
  }

  pub fn is_empty(&self) -> bool {
    self.total() == 0
  }
}

/// Requested number of practice tasks per tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
  pub easy: usize,
  pub medium: usize,
  pub hard: usize,
}

impl Default for TierCounts {
  fn default() -> Self {
    Self { easy: 3, medium: 3, hard: 2 }
  }
}

/// Lesson video taken from a playlist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Video {
  pub title: String,
  pub video_id: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub thumbnail: String,
  #[serde(default)] pub published_at: String,
}
