mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

/// bramble - incremental package lookup
#[derive(Parser)]
#[command(name = "bramble")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(flatten)]
  global: GlobalArgs,

  #[command(subcommand)]
  command: Commands,
}

/// Settings shared by every command. Flags override `bramble.toml` and the
/// `BRAMBLE_*` environment variables.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
  /// Path to bramble.toml (default: search upward from the current directory)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  /// Package roots, highest priority first, separated by ':'
  #[arg(long, global = true, value_delimiter = ':')]
  pub package_path: Option<Vec<String>>,

  /// Packages to treat as deleted, separated by ','
  #[arg(long, global = true, value_delimiter = ',')]
  pub deleted_packages: Option<Vec<String>>,

  /// Maximum number of functions computing at once
  #[arg(short, long, global = true)]
  pub jobs: Option<usize>,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  pub verbose: bool,

  /// Output format
  #[arg(long, global = true, value_enum, default_value = "text")]
  pub format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
  /// Find the package root of each package
  Lookup {
    /// Packages to look up, e.g. `foo/bar` or `@repo//foo`
    #[arg(required = true)]
    packages: Vec<String>,
  },

  /// Print the root holding the workspace file
  Workspace,

  /// Show the effective configuration
  Info,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.global.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Lookup { packages } => cmd::cmd_lookup(&cli.global, &packages),
    Commands::Workspace => cmd::cmd_workspace(&cli.global),
    Commands::Info => cmd::cmd_info(&cli.global),
  }
}
