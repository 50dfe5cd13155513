mod info;
mod lookup;
mod workspace;

pub use info::cmd_info;
pub use lookup::cmd_lookup;
pub use workspace::cmd_workspace;

use anyhow::{Context, Result};
use tracing::debug;

use bramble_lib::config::BrambleConfig;
use bramble_lib::session::LookupSession;

use crate::GlobalArgs;

/// Effective configuration: the config file, then the environment, then flags.
pub fn load_config(args: &GlobalArgs) -> Result<BrambleConfig> {
  let mut config = match &args.config {
    Some(path) => {
      BrambleConfig::load(path).with_context(|| format!("Failed to load config: {}", path.display()))?
    }
    None => {
      let cwd = std::env::current_dir().context("Failed to read current directory")?;
      BrambleConfig::discover(&cwd).context("Failed to load config")?
    }
  };
  config.apply_env().context("Invalid environment override")?;

  if let Some(entries) = &args.package_path {
    config.set_package_path(entries);
  }
  if let Some(packages) = &args.deleted_packages {
    config.deleted_packages = packages.clone();
  }
  if let Some(jobs) = args.jobs {
    config.jobs = jobs;
  }
  config.validate().context("Invalid configuration")?;
  debug!(workspace = %config.workspace.display(), "configuration loaded");
  Ok(config)
}

pub fn open_session(args: &GlobalArgs) -> Result<LookupSession> {
  let config = load_config(args)?;
  LookupSession::new(config).context("Failed to start lookup session")
}
