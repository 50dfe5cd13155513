//! Prints the configuration a command would run with.

use anyhow::Result;

use super::load_config;
use crate::GlobalArgs;
use crate::output::{print_info, print_json, print_stat};

pub fn cmd_info(args: &GlobalArgs) -> Result<()> {
  let config = load_config(args)?;
  if args.format.is_json() {
    return print_json(&config);
  }

  print_info(&format!("bramble v{}", env!("CARGO_PKG_VERSION")));
  print_stat("Workspace", &config.workspace.display().to_string());
  print_stat("Jobs", &config.jobs.to_string());
  println!();
  println!("Package path:");
  for root in &config.package_path {
    println!("  {}", root.display());
  }

  if !config.deleted_packages.is_empty() {
    println!();
    println!("Deleted packages:");
    for package in &config.deleted_packages {
      println!("  {}", package);
    }
  }

  if !config.repositories.is_empty() {
    println!();
    println!("Repositories:");
    for (name, rule) in config.repositories.iter() {
      match &rule.build_file {
        Some(build_file) => println!("  {} {} (build file {})", name, rule.path.display(), build_file.display()),
        None => println!("  {} {}", name, rule.path.display()),
      }
    }
  }
  Ok(())
}
