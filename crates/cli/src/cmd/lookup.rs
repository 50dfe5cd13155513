//! Implementation of the `bramble lookup` command.
//!
//! Every package is looked up in a single build. Results are printed in the
//! order given; the command fails if any package could not be found.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use bramble_lib::label::PackageIdentifier;
use bramble_lib::package::PackageLookupValue;
use bramble_lib::session::PackageLookup;
use bramble_lib::skyframe::ErrorKind;

use super::open_session;
use crate::GlobalArgs;
use crate::output::{print_error, print_json, print_success, symbols};

#[derive(Debug, Serialize)]
struct LookupReport<'a> {
  package: &'a PackageIdentifier,
  #[serde(flatten)]
  outcome: ReportOutcome<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ReportOutcome<'a> {
  Value {
    #[serde(flatten)]
    value: &'a PackageLookupValue,
    exists: bool,
  },
  Error {
    status: &'static str,
    kind: ErrorKind,
    error: String,
  },
}

impl<'a> From<&'a PackageLookup> for LookupReport<'a> {
  fn from(lookup: &'a PackageLookup) -> Self {
    let outcome = match &lookup.result {
      Ok(value) => ReportOutcome::Value {
        value,
        exists: value.package_exists(),
      },
      Err(err) => ReportOutcome::Error {
        status: "error",
        kind: err.kind(),
        error: err.to_string(),
      },
    };
    LookupReport {
      package: &lookup.package,
      outcome,
    }
  }
}

pub fn cmd_lookup(args: &GlobalArgs, packages: &[String]) -> Result<()> {
  let ids = packages
    .iter()
    .map(|p| p.parse::<PackageIdentifier>().with_context(|| format!("Invalid package: {}", p)))
    .collect::<Result<Vec<_>>>()?;

  let session = open_session(args)?;
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let lookups = rt.block_on(session.lookup(&ids)).context("Package lookup failed")?;

  let failed = lookups
    .iter()
    .filter(|lookup| !lookup.result.as_ref().is_ok_and(PackageLookupValue::package_exists))
    .count();
  info!(packages = lookups.len(), failed, "lookup finished");

  if args.format.is_json() {
    let reports: Vec<LookupReport> = lookups.iter().map(LookupReport::from).collect();
    print_json(&reports)?;
  } else {
    for lookup in &lookups {
      print_lookup(lookup);
    }
  }

  if failed > 0 {
    bail!("{} of {} package(s) could not be found", failed, lookups.len());
  }
  Ok(())
}

fn print_lookup(lookup: &PackageLookup) {
  match &lookup.result {
    Ok(PackageLookupValue::OverlaidBuildFile { root, overlay }) => print_success(&format!(
      "{} {} {} (build file {})",
      lookup.package,
      symbols::ARROW,
      root.display(),
      overlay.path
    )),
    Ok(value) => match (value.root(), value.error_reason()) {
      (Some(root), _) => print_success(&format!("{} {} {}", lookup.package, symbols::ARROW, root.display())),
      (None, Some(reason)) => print_error(&format!("{}: {}", lookup.package, reason)),
      (None, None) => print_error(&format!("{}: no package root", lookup.package)),
    },
    Err(err) => print_error(&format!("{}: {}", lookup.package, err)),
  }
}
