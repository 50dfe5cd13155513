use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::LabelError;

/// Name of a repository.
///
/// The main repository has an empty name and prints as `@`. External repositories
/// print as `@name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepositoryName(String);

impl RepositoryName {
  /// The main repository.
  pub fn main() -> Self {
    Self(String::new())
  }

  /// Create a repository name from `name` or `@name`.
  ///
  /// `""` and `"@"` both denote the main repository.
  pub fn new(name: &str) -> Result<Self, LabelError> {
    let bare = name.strip_prefix('@').unwrap_or(name);
    if let Some(bad) = bare
      .chars()
      .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
      return Err(LabelError::InvalidRepositoryName {
        name: name.to_string(),
        reason: format!("character '{}' is not allowed", bad),
      });
    }
    if !bare.is_empty() && bare.chars().all(|c| c == '.') {
      return Err(LabelError::InvalidRepositoryName {
        name: name.to_string(),
        reason: "name may not consist only of dots".to_string(),
      });
    }
    Ok(Self(bare.to_string()))
  }

  pub fn is_main(&self) -> bool {
    self.0.is_empty()
  }

  /// The name without the leading `@`.
  pub fn name(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RepositoryName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "@{}", self.0)
  }
}

impl FromStr for RepositoryName {
  type Err = LabelError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::new(s)
  }
}

impl Serialize for RepositoryName {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}
