//! Built-in content: the default course catalog and the last-resort items served
//! when generation comes back short.

use std::collections::BTreeMap;

use crate::domain::{ChoiceLetter, GeneratedQuestion};

/// Sentinel used for option bodies and explanations of synthetic questions.
pub const PLACEHOLDER_MARK: &str = "—";

/// Hint shown when the model is unavailable or replies with nothing useful.
pub const FALLBACK_HINT: &str =
  "Think about the properties of the expression and check the answer format (>=, <=, intervals like [2, inf)).";

/// Synthetic question used to backfill a short quiz. Option A is marked correct.
pub fn placeholder_question(topic: &str) -> GeneratedQuestion {
  GeneratedQuestion {
    question: format!("Question unavailable for topic \"{}\". Option A is marked correct.", topic),
    options: ChoiceLetter::ALL.map(|l| format!("{}) {}", l.as_char(), PLACEHOLDER_MARK)),
    correct_answer: ChoiceLetter::A,
    explanation: PLACEHOLDER_MARK.to_string(),
  }
}

/// Default subject → grade → YouTube playlist id catalog.
/// Overridable per subject via `[playlists.<subject>]` in the TOML config.
pub fn default_playlists() -> BTreeMap<String, BTreeMap<String, String>> {
  let mut catalog: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
  for (subject, grade, id) in DEFAULT_CATALOG {
    catalog
      .entry(subject.to_string())
      .or_default()
      .insert(grade.to_string(), id.to_string());
  }
  catalog
}

const DEFAULT_CATALOG: &[(&str, &str, &str)] = &[
  ("Алгебра", "7", "PLCRqj4jDCIYmUtgQCGy3l5GGYbiDBR3p-"),
  ("Алгебра", "8", "PLCRqj4jDCIYkk9CMV6wBQR16eHz_SRU1j"),
  ("Алгебра", "9", "PLCRqj4jDCIYl7ZP0JefXdLcXcEIh8LY5m"),
  ("Алгебра", "10", "PLCRqj4jDCIYlaZBTUCrK2xq65quwfPEXE"),
  ("Алгебра", "11", "PLCRqj4jDCIYkL1lREiEg-APcjYbvfqCdn"),
  ("Геометрия", "7", "PLeRoaPcjXF1ffHLNvtX66hXxtHLNvf9aw"),
  ("Геометрия", "8", "PLeRoaPcjXF1ecF21g27Q7ZDfF8Gktvwf0"),
  ("Геометрия", "9", "PLeRoaPcjXF1dNqOv9ghksZF4GG1cVkg74"),
  ("Геометрия", "10", "PLeRoaPcjXF1eelu2Ou-iy5A0ntPOwjIjq"),
  ("Геометрия", "11", "PLeRoaPcjXF1eg1bQxQX_KkM4EpEdBedIu"),
  ("Физика", "7", "PLdjp7wVqN3WtJGEEvLOcgTG3J8cv5sdew"),
  ("Физика", "8", "PLdjp7wVqN3Wssi0MhFBZTuiz6Ev5YHVBa"),
  ("Физика", "9", "PLdjp7wVqN3Wv_OjT7TdWbY91v0rk4VA53"),
  ("Физика", "10", "PLdjp7wVqN3Wu8hFD-nzI6vQe3tqLXzIA-"),
  ("Физика", "11", "PLdjp7wVqN3WtM6h-DpIRXBe5iYdySPzF9"),
  ("Химия", "7", "PLoe4L7cYJo_WFiJs6BqpJ6zuYMjnB_vLe"),
  ("Химия", "8", "PLoe4L7cYJo_U-02hkvjDHAa0e8hQAb_Dx"),
  ("Химия", "9", "PLoe4L7cYJo_VgSiVkh-I1bNdFMc1U5jqO"),
  ("Химия", "10", "PLoe4L7cYJo_Udsk8PI85OJggGpz7nj5J7"),
  ("Химия", "11", "PLoe4L7cYJo_V_QrkuRbYaJuVyR3dYKlDa"),
  ("Английский язык", "7", "PLD6SPjEPomatk5Pp2z7j-9kOxmgTUiRSr"),
  ("Английский язык", "8", "PL7j3OJlBURb7jc_Romw7Sw0bKRLK2X9GY"),
  ("Английский язык", "9", "PLD6SPjEPomasUQxxBEBNyZGbzZY6pEfPQ"),
  ("Английский язык", "10", "PLYB0SmefqEskabgi9CfLoYtXTA3U8VNKS"),
];
