use bramble_lib::label::PackageIdentifier;
use bramble_lib::package::PackageLookupValue;
use bramble_lib::skyframe::ErrorKind;

use super::common::{TestWorkspace, found, lookup};

const TWO_ROOTS: &str = r#"package_path = ["%workspace%/r1", "%workspace%/r2"]"#;

#[tokio::test]
async fn earlier_root_wins() {
  let ws = TestWorkspace::new();
  ws.write_file("r1/a/BUILD", "");
  ws.write_file("r2/a/BUILD", "");
  ws.write_file("r2/b/BUILD", "");
  let session = ws.session(TWO_ROOTS);

  assert_eq!(lookup(&session, "//a").await.unwrap(), found(&ws.path("r1")));
  assert_eq!(lookup(&session, "b").await.unwrap(), found(&ws.path("r2")));
}

#[tokio::test]
async fn package_without_build_file_is_not_found() {
  let ws = TestWorkspace::new();
  ws.mkdir("r1/a");
  ws.mkdir("r2");
  let session = ws.session(TWO_ROOTS);

  let value = lookup(&session, "//a").await.unwrap();
  assert_eq!(value, PackageLookupValue::NotFound);
  assert!(value.error_reason().unwrap().contains("BUILD file not found"));
}

#[tokio::test]
async fn many_packages_in_one_build() {
  let ws = TestWorkspace::new();
  let names: Vec<String> = (0..20).map(|i| format!("pkg{i}")).collect();
  for name in &names {
    ws.write_file(&format!("r2/{name}/BUILD"), "");
  }
  let session = ws.session(TWO_ROOTS);

  let ids: Vec<PackageIdentifier> = names.iter().map(|n| PackageIdentifier::main(n.as_str())).collect();
  let lookups = session.lookup(&ids).await.unwrap();
  assert_eq!(lookups.len(), 20);
  for lookup in lookups {
    assert_eq!(lookup.result.unwrap(), found(&ws.path("r2")), "{}", lookup.package);
  }
}

#[tokio::test]
async fn invalid_name_is_a_value() {
  let ws = TestWorkspace::new();
  let session = ws.session("");

  let value = lookup(&session, "//foo/").await.unwrap();
  assert_eq!(
    value,
    PackageLookupValue::InvalidName {
      reason: "Invalid package name 'foo/': package names may not end with '/'".to_string()
    }
  );
}

#[tokio::test]
async fn deleted_packages_from_config() {
  let ws = TestWorkspace::new();
  ws.write_file("gone/BUILD", "");
  let session = ws.session(r#"deleted_packages = ["gone"]"#);

  assert_eq!(lookup(&session, "//gone").await.unwrap(), PackageLookupValue::Deleted);
}

#[tokio::test]
async fn workspace_marker_selects_root() {
  let ws = TestWorkspace::new();
  ws.mkdir("r1");
  ws.write_file("r2/WORKSPACE", "");
  let session = ws.session(TWO_ROOTS);

  assert_eq!(session.workspace().await.unwrap(), ws.path("r2"));
}

#[tokio::test]
async fn workspace_without_marker_is_last_root() {
  let ws = TestWorkspace::new();
  ws.mkdir("r1");
  ws.mkdir("r2");
  let session = ws.session(TWO_ROOTS);

  assert_eq!(session.workspace().await.unwrap(), ws.path("r2"));
}

#[tokio::test]
async fn external_repository_with_overlay() {
  let ws = TestWorkspace::new();
  ws.write_file("third_party/foo/BUILD", "");
  ws.write_file("third_party/foo.BUILD", "");
  let session = ws.session(
    r#"
      [repositories.foo]
      path = "third_party/foo"
      build_file = "third_party/foo.BUILD"
    "#,
  );

  let value = lookup(&session, "@foo//").await.unwrap();
  let PackageLookupValue::OverlaidBuildFile { root, overlay } = value else {
    panic!("expected overlay, got {:?}", value);
  };
  assert_eq!(root, ws.path("third_party/foo"));
  assert_eq!(overlay.path.as_path(), ws.path("third_party/foo.BUILD"));
}

#[tokio::test]
async fn external_repository_without_overlay() {
  let ws = TestWorkspace::new();
  ws.write_file("vendor/bar/lib/BUILD", "");
  let session = ws.session(
    r#"
      [repositories.bar]
      path = "vendor/bar"
    "#,
  );

  assert_eq!(lookup(&session, "@bar//lib").await.unwrap(), found(&ws.path("vendor/bar")));
  assert_eq!(lookup(&session, "@bar//nope").await.unwrap(), PackageLookupValue::NotFound);
}

#[tokio::test]
async fn undeclared_repository_fails_the_lookup() {
  let ws = TestWorkspace::new();
  let session = ws.session("");

  let err = lookup(&session, "@missing//lib").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NoSuchPackage);
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_cycle_fails_the_lookup() {
  let ws = TestWorkspace::new();
  ws.mkdir("loop");
  std::os::unix::fs::symlink("BUILD", ws.path("loop/BUILD")).unwrap();
  let session = ws.session("");

  let err = lookup(&session, "//loop").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::BuildFileNotFound);
  assert!(err.to_string().contains("Symlink cycle detected"));
}
