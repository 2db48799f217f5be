//! Small utility helpers used across modules.

use serde_json::Value;

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings (char-boundary aware).
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

/// Share of `correct` in `total`, as a percentage. Zero when `total` is zero.
pub fn percent(correct: usize, total: usize) -> f64 {
  if total == 0 { 0.0 } else { correct as f64 / total as f64 * 100.0 }
}

/// Best-effort recovery of a JSON document from model text.
///
/// Models often wrap JSON in ```json fences or add a sentence before it.
/// Tries the whole text first, then the outermost `{...}` and `[...]` spans.
pub fn extract_json(text: &str) -> Option<Value> {
  let trimmed = strip_code_fence(text.trim());
  if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
    return Some(v);
  }
  for (open, close) in [('{', '}'), ('[', ']')] {
    let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) else { continue };
    if end <= start { continue; }
    if let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
      return Some(v);
    }
  }
  None
}

fn strip_code_fence(s: &str) -> &str {
  let Some(rest) = s.strip_prefix("```") else { return s };
  // drop the info string ("json") up to the first newline
  let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
  body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Read a text-ish JSON field: strings are trimmed, numbers/bools stringified.
pub fn text_field(v: &Value, key: &str) -> Option<String> {
  match v.get(key)? {
    Value::String(s) => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}
