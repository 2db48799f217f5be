//! Restricted arithmetic evaluation for numeric answers ("1/2", "2^-1", "-3/4").
//!
//! Grammar (recursive descent, no identifiers, no calls):
//!   expr  := term (('+' | '-') term)*
//!   term  := unary (('*' | '/') unary)*
//!   unary := ('-' | '+') unary | power
//!   power := atom (('^' | '**') unary)?
//!   atom  := number | '(' expr ')'

/// Longer inputs are not treated as arithmetic.
const MAX_INPUT_LEN: usize = 256;
/// Nesting bound for signs, exponents and parentheses.
const MAX_DEPTH: usize = 64;

/// Evaluate `input` as a plain arithmetic expression.
/// Returns `None` on any syntax error, trailing input, excessive length or nesting,
/// or non-finite result.
pub fn evaluate(input: &str) -> Option<f64> {
  let chars: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
  if chars.is_empty() || chars.len() > MAX_INPUT_LEN {
    return None;
  }
  let mut p = Parser { chars, pos: 0, depth: 0 };
  let value = p.expr()?;
  if p.pos != p.chars.len() {
    return None;
  }
  if value.is_finite() {
    Some(value)
  } else {
    None
  }
}

struct Parser {
  chars: Vec<char>,
  pos: usize,
  depth: usize,
}

impl Parser {
  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn peek_at(&self, offset: usize) -> Option<char> {
    self.chars.get(self.pos + offset).copied()
  }

  fn descend(&mut self) -> Option<()> {
    self.depth += 1;
    if self.depth > MAX_DEPTH {
      None
    } else {
      Some(())
    }
  }

  fn ascend<T>(&mut self, value: Option<T>) -> Option<T> {
    self.depth -= 1;
    value
  }

  fn expr(&mut self) -> Option<f64> {
    let mut acc = self.term()?;
    while let Some(c) = self.peek() {
      match c {
        '+' => {
          self.pos += 1;
          acc += self.term()?;
        }
        '-' => {
          self.pos += 1;
          acc -= self.term()?;
        }
        _ => break,
      }
    }
    Some(acc)
  }

  fn term(&mut self) -> Option<f64> {
    let mut acc = self.unary()?;
    while let Some(c) = self.peek() {
      match c {
        // `**` belongs to `power`, never to multiplication
        '*' if self.peek_at(1) == Some('*') => break,
        '*' => {
          self.pos += 1;
          acc *= self.unary()?;
        }
        '/' => {
          self.pos += 1;
          let rhs = self.unary()?;
          if rhs == 0.0 {
            return None;
          }
          acc /= rhs;
        }
        _ => break,
      }
    }
    Some(acc)
  }

  fn unary(&mut self) -> Option<f64> {
    self.descend()?;
    let value = match self.peek() {
      Some('-') => {
        self.pos += 1;
        self.unary().map(|v| -v)
      }
      Some('+') => {
        self.pos += 1;
        self.unary()
      }
      Some(_) => self.power(),
      None => None,
    };
    self.ascend(value)
  }

  fn power(&mut self) -> Option<f64> {
    let base = self.atom()?;
    match (self.peek(), self.peek_at(1)) {
      (Some('^'), _) => {
        self.pos += 1;
        Some(base.powf(self.unary()?))
      }
      (Some('*'), Some('*')) => {
        self.pos += 2;
        Some(base.powf(self.unary()?))
      }
      _ => Some(base),
    }
  }

  fn atom(&mut self) -> Option<f64> {
    if self.peek()? != '(' {
      return self.number();
    }
    self.descend()?;
    self.pos += 1;
    let inner = self.expr().filter(|_| self.peek() == Some(')'));
    if inner.is_some() {
      self.pos += 1;
    }
    self.ascend(inner)
  }

  fn number(&mut self) -> Option<f64> {
    let start = self.pos;
    let mut seen_dot = false;
    while let Some(c) = self.peek() {
      if c.is_ascii_digit() {
        self.pos += 1;
      } else if c == '.' && !seen_dot {
        seen_dot = true;
        self.pos += 1;
      } else {
        break;
      }
    }
    let literal: String = self.chars[start..self.pos].iter().collect();
    if literal.is_empty() || literal == "." {
      return None;
    }
    literal.parse::<f64>().ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn approx(a: Option<f64>, b: f64) -> bool {
    a.map(|v| (v - b).abs() < 1e-9).unwrap_or(false)
  }

  #[test]
  fn evaluates_fractions_and_decimals() {
    assert!(approx(evaluate("1/2"), 0.5));
    assert!(approx(evaluate("0.5"), 0.5));
    assert!(approx(evaluate("-3/4"), -0.75));
    assert!(approx(evaluate(".25"), 0.25));
  }

  #[test]
  fn respects_precedence_and_parentheses() {
    assert!(approx(evaluate("1+2*3"), 7.0));
    assert!(approx(evaluate("(1+2)*3"), 9.0));
    assert!(approx(evaluate("6/2/3"), 1.0));
  }

  #[test]
  fn supports_both_exponent_spellings() {
    assert!(approx(evaluate("2^3"), 8.0));
    assert!(approx(evaluate("2**3"), 8.0));
    assert!(approx(evaluate("2^-1"), 0.5));
    // power binds tighter than unary minus on the left
    assert!(approx(evaluate("-2^2"), -4.0));
    assert!(approx(evaluate("2^3^2"), 512.0));
  }

  #[test]
  fn rejects_anything_that_is_not_arithmetic() {
    assert_eq!(evaluate(""), None);
    assert_eq!(evaluate("x/2"), None);
    assert_eq!(evaluate("1/0"), None);
    assert_eq!(evaluate("1/2)"), None);
    assert_eq!(evaluate("(1/2"), None);
    assert_eq!(evaluate("1..2"), None);
    assert_eq!(evaluate("__import__('os')"), None);
  }

  #[test]
  fn modest_nesting_still_evaluates() {
    assert!(approx(evaluate("--1/2"), 0.5));
    assert!(approx(evaluate("((((1))))/((2))"), 0.5));
    let nested = format!("{}1{}/2", "(".repeat(30), ")".repeat(30));
    assert!(approx(evaluate(&nested), 0.5));
  }

  #[test]
  fn deep_or_huge_input_is_rejected_without_recursing() {
    assert_eq!(evaluate(&format!("1/{}1", "-".repeat(200_000))), None);
    assert_eq!(evaluate(&format!("2{}", "^2".repeat(100_000))), None);
    assert_eq!(evaluate(&format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000))), None);
    // nesting past the bound inside the length limit
    assert_eq!(evaluate(&format!("1/{}1", "-".repeat(100))), None);
    assert_eq!(evaluate(&format!("{}1{}", "(".repeat(80), ")".repeat(80))), None);
  }
}
