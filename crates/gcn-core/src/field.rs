//! [`Field`]: the explicit "unknown" marker carried by every optional value.

use serde::{Deserialize, Serialize};

/// A record value that is either known or explicitly not yet known.
///
/// Extractors emit `Unknown` instead of leaving a key out, so the merge policy
/// can tell "no source has reported this yet" apart from a reported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Field<T> {
  Unknown,
  Known(T),
}

impl<T> Default for Field<T> {
  fn default() -> Self { Field::Unknown }
}

impl<T> Field<T> {
  pub fn is_known(&self) -> bool { matches!(self, Field::Known(_)) }

  pub fn known(&self) -> Option<&T> {
    match self {
      Field::Known(v) => Some(v),
      Field::Unknown => None,
    }
  }

  pub fn into_known(self) -> Option<T> {
    match self {
      Field::Known(v) => Some(v),
      Field::Unknown => None,
    }
  }

  pub fn as_ref(&self) -> Field<&T> {
    match self {
      Field::Known(v) => Field::Known(v),
      Field::Unknown => Field::Unknown,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
    match self {
      Field::Known(v) => Field::Known(f(v)),
      Field::Unknown => Field::Unknown,
    }
  }
}

impl<T> From<Option<T>> for Field<T> {
  fn from(value: Option<T>) -> Self {
    match value {
      Some(v) => Field::Known(v),
      None => Field::Unknown,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_and_known_empty_are_distinct() {
    let unknown: Field<String> = Field::Unknown;
    let empty = Field::Known(String::new());
    assert_ne!(unknown, empty);
    assert!(!unknown.is_known());
    assert_eq!(empty.known().map(String::as_str), Some(""));
  }

  #[test]
  fn serializes_with_explicit_state() {
    let json = serde_json::to_string(&Field::Known(1.5_f64)).unwrap();
    assert_eq!(json, r#"{"state":"known","value":1.5}"#);
    let json = serde_json::to_string(&Field::<f64>::Unknown).unwrap();
    assert_eq!(json, r#"{"state":"unknown"}"#);
  }
}
