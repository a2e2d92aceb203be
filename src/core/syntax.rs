//! Translation of configurable action delimiters into Tera's native tags.
//!
//! Templates are written with one pair of delimiters for every action
//! (`<% name %>`, `<% if admin %>`, `<% endif %>`). Tera distinguishes
//! expressions (`{{ }}`) from statements (`{% %}`), so each action is
//! rewritten according to its leading keyword before compilation.

use std::fmt;

/// Leading words that make an action a Tera statement rather than an expression.
const STATEMENT_KEYWORDS: &[&str] = &[
  "if", "elif", "else", "endif", "for", "endfor", "set", "set_global", "block", "endblock", "extends", "include",
  "import", "macro", "endmacro", "filter", "endfilter", "raw", "endraw", "break", "continue",
];

/// Tera's own openers; literal text containing them must not be interpreted.
const NATIVE_OPENERS: &[&str] = &["{{", "{%", "{#"];

/// The pair of strings that open and close a template action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
  pub left: String,
  pub right: String,
}

impl Default for Delimiters {
  fn default() -> Self {
    Self::new("<%", "%>")
  }
}

/// A template whose actions could not be delimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnterminatedAction {
  pub line: usize,
}

impl fmt::Display for UnterminatedAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "unterminated action starting on line {}", self.line)
  }
}

impl std::error::Error for UnterminatedAction {}

impl Delimiters {
  pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
    Self {
      left: left.into(),
      right: right.into(),
    }
  }

  /// Tera's own `{{ }}` pair: sources are handed over untouched.
  pub fn is_native(&self) -> bool {
    self.left == "{{" && self.right == "}}"
  }

  /// Rewrites `source` into Tera syntax.
  pub fn translate(&self, source: &str) -> Result<String, UnterminatedAction> {
    if self.is_native() || self.left.is_empty() || self.right.is_empty() {
      return Ok(source.to_string());
    }

    let mut out = String::with_capacity(source.len() + source.len() / 8);
    let mut rest = source;
    while let Some(start) = rest.find(&self.left) {
      push_text(&mut out, &rest[..start]);
      let action = &rest[start + self.left.len()..];
      let Some(end) = action.find(&self.right) else {
        let offset = source.len() - rest.len() + start;
        return Err(UnterminatedAction {
          line: source[..offset].matches('\n').count() + 1,
        });
      };
      push_action(&mut out, &action[..end]);
      rest = &action[end + self.right.len()..];
    }
    push_text(&mut out, rest);
    Ok(out)
  }
}

fn push_text(out: &mut String, text: &str) {
  if NATIVE_OPENERS.iter().any(|opener| text.contains(opener)) {
    out.push_str("{% raw %}");
    out.push_str(text);
    out.push_str("{% endraw %}");
  } else {
    out.push_str(text);
  }
}

fn push_action(out: &mut String, action: &str) {
  let (trim_left, action) = match action.strip_prefix('-') {
    Some(stripped) => ("-", stripped),
    None => ("", action),
  };
  let (trim_right, action) = match action.strip_suffix('-') {
    Some(stripped) => ("-", stripped),
    None => ("", action),
  };
  let body = action.trim();

  // comments render to nothing
  if body.starts_with("/*") && body.ends_with("*/") {
    return;
  }

  let keyword = body.split(|c: char| c.is_whitespace() || c == '(').next().unwrap_or_default();
  let (open, close) = if STATEMENT_KEYWORDS.contains(&keyword) {
    ("{%", "%}")
  } else {
    ("{{", "}}")
  };
  out.push_str(open);
  out.push_str(trim_left);
  out.push(' ');
  out.push_str(body);
  out.push(' ');
  out.push_str(trim_right);
  out.push_str(close);
}
