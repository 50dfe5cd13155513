/// Check that `name` is a syntactically valid package name.
///
/// Returns `None` when the name is valid, otherwise a message describing the
/// first problem found. The empty name denotes the root package and is valid.
pub fn validate_package_name(name: &str) -> Option<&'static str> {
  if name.is_empty() {
    return None;
  }

  if name.starts_with('/') {
    return Some("package names may not start with '/'");
  }

  if !name
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '.' | '_'))
  {
    return Some("package names may contain only A-Z, a-z, 0-9, '/', '-', '.' and '_'");
  }

  if name.ends_with('/') {
    return Some("package names may not end with '/'");
  }

  if name.contains("//") {
    return Some("package names may not contain '//' path separators");
  }

  if name.split('/').any(|segment| segment.chars().all(|c| c == '.')) {
    return Some("package name component contains only '.' characters");
  }

  None
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_ordinary_names() {
    for name in ["", "foo", "foo/bar", "a-b/c_d/e.f", "x/.hidden", "Caps/123"] {
      assert_eq!(validate_package_name(name), None, "{name} should be valid");
    }
  }

  #[test]
  fn rejects_leading_slash() {
    assert_eq!(validate_package_name("/foo"), Some("package names may not start with '/'"));
  }

  #[test]
  fn rejects_trailing_slash() {
    assert_eq!(validate_package_name("foo/"), Some("package names may not end with '/'"));
  }

  #[test]
  fn rejects_forbidden_characters() {
    for name in ["foo bar", "foo:bar", "foo*", "ünicode"] {
      assert!(
        validate_package_name(name).unwrap().contains("may contain only"),
        "{name} should be rejected"
      );
    }
  }

  #[test]
  fn rejects_double_slash() {
    assert_eq!(
      validate_package_name("foo//bar"),
      Some("package names may not contain '//' path separators")
    );
  }

  #[test]
  fn rejects_dot_segments() {
    for name in [".", "..", "foo/../bar", "foo/."] {
      assert_eq!(
        validate_package_name(name),
        Some("package name component contains only '.' characters"),
        "{name} should be rejected"
      );
    }
  }
}
