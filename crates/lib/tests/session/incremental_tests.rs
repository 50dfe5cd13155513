use bramble_lib::label::PackageIdentifier;
use bramble_lib::package::PackageLookupValue;
use bramble_lib::skyframe::SkyKey;

use super::common::{TestWorkspace, found, lookup};

#[tokio::test]
async fn new_build_file_is_seen_after_invalidation() {
  let ws = TestWorkspace::new();
  ws.mkdir("a");
  let session = ws.session("");

  assert_eq!(lookup(&session, "//a").await.unwrap(), PackageLookupValue::NotFound);

  ws.write_file("a/BUILD", "");
  // still cached until the change is reported
  assert_eq!(lookup(&session, "//a").await.unwrap(), PackageLookupValue::NotFound);

  assert_eq!(session.invalidate_paths(&[ws.path("a")]), 1);
  assert_eq!(lookup(&session, "//a").await.unwrap(), found(&ws.root()));
}

#[tokio::test]
async fn unrelated_change_keeps_other_lookups() {
  let ws = TestWorkspace::new();
  ws.write_file("a/BUILD", "");
  ws.write_file("b/BUILD", "");
  let session = ws.session("");

  let ids = [PackageIdentifier::main("a"), PackageIdentifier::main("b")];
  session.lookup(&ids).await.unwrap();
  let key_a = SkyKey::package_lookup(ids[0].clone());
  let before = session.evaluator().entry(&key_a).unwrap();

  std::fs::remove_file(ws.path("b/BUILD")).unwrap();
  assert_eq!(session.invalidate_paths(&[ws.path("b")]), 1);
  let lookups = session.lookup(&ids).await.unwrap();

  assert_eq!(lookups[0].result, Ok(found(&ws.root())));
  assert_eq!(lookups[1].result, Ok(PackageLookupValue::NotFound));
  let after = session.evaluator().entry(&key_a).unwrap();
  assert_eq!(after.changed_at(), before.changed_at());
  assert!(after.verified_at() > before.verified_at());
}

#[tokio::test]
async fn deleting_a_package_invalidates_only_its_lookup() {
  let ws = TestWorkspace::new();
  ws.write_file("a/BUILD", "");
  ws.write_file("b/BUILD", "");
  let mut session = ws.session("");

  let ids = [PackageIdentifier::main("a"), PackageIdentifier::main("b")];
  session.lookup(&ids).await.unwrap();

  assert_eq!(session.set_deleted_packages(vec!["a".to_string()]).unwrap(), 1);
  let lookups = session.lookup(&ids).await.unwrap();
  assert_eq!(lookups[0].result, Ok(PackageLookupValue::Deleted));
  assert_eq!(lookups[1].result, Ok(found(&ws.root())));

  assert_eq!(session.set_deleted_packages(Vec::new()).unwrap(), 1);
  assert_eq!(lookup(&session, "//a").await.unwrap(), found(&ws.root()));
}

#[tokio::test]
async fn package_path_change_moves_lookups() {
  let ws = TestWorkspace::new();
  ws.write_file("r1/a/BUILD", "");
  ws.write_file("r2/a/BUILD", "");
  let mut session = ws.session(r#"package_path = ["%workspace%/r1", "%workspace%/r2"]"#);

  assert_eq!(lookup(&session, "//a").await.unwrap(), found(&ws.path("r1")));

  session.set_package_path(&["%workspace%/r2".to_string()]).unwrap();
  assert_eq!(lookup(&session, "//a").await.unwrap(), found(&ws.path("r2")));
  assert_eq!(session.config().package_path, vec![ws.path("r2")]);
}

#[tokio::test]
async fn unchanged_build_reuses_values() {
  let ws = TestWorkspace::new();
  ws.write_file("a/BUILD", "");
  let session = ws.session("");

  let id = PackageIdentifier::main("a");
  let first = session.lookup(std::slice::from_ref(&id)).await.unwrap();
  let files_before = session.evaluator().keys().len();
  let second = session.lookup(std::slice::from_ref(&id)).await.unwrap();

  assert_eq!(first, second);
  assert_eq!(session.evaluator().keys().len(), files_before);
  let deps = session.evaluator().dependencies(&SkyKey::package_lookup(id)).unwrap();
  assert_eq!(deps.len(), 2);
}
