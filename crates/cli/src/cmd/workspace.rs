use anyhow::{Context, Result};

use super::open_session;
use crate::GlobalArgs;
use crate::output::print_json;

pub fn cmd_workspace(args: &GlobalArgs) -> Result<()> {
  let session = open_session(args)?;
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let root = rt
    .block_on(session.workspace())
    .context("Failed to resolve the workspace root")?;

  if args.format.is_json() {
    print_json(&serde_json::json!({ "workspace": root }))?;
  } else {
    println!("{}", root.display());
  }
  Ok(())
}
