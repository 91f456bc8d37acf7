mod cmd;
mod logging;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use tpb_lib::config::{HostConfig, Toolchain};
use tpb_lib::consts::{DEFAULT_CONTENT_DIR, DEFAULT_STATE_DIR, ENV_CONTENT_DIR, ENV_STATE_DIR};

use crate::output::OutputFormat;

/// tpb - third-party bundle manager
#[derive(Parser)]
#[command(name = "tpb")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Increase log verbosity (-v info, -vv debug)
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  /// State directory (must be absolute)
  #[arg(short = 's', long, global = true, env = ENV_STATE_DIR, default_value = DEFAULT_STATE_DIR)]
  statedir: PathBuf,

  /// Content directory (must be absolute)
  #[arg(short = 'c', long, global = true, env = ENV_CONTENT_DIR, default_value = DEFAULT_CONTENT_DIR)]
  contentdir: PathBuf,

  /// Do not regenerate launchers after add, update or remove
  #[arg(long, global = true)]
  skip_post: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Install the bundle published at a URI
  Add {
    /// Origin URI of the bundle
    uri: String,
  },

  /// Update every installed bundle
  Update,

  /// Remove an installed bundle
  Remove {
    /// Origin URI the bundle was installed from
    uri: String,

    /// Bundle name
    name: String,
  },

  /// List installed bundles
  List {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Regenerate launchers for all installed bundles
  PostProcess,
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  logging::init_tracing(cli.verbose);

  let config = HostConfig::new(cli.statedir, cli.contentdir, Toolchain::from_env());

  match cli.command {
    Commands::Add { uri } => cmd::cmd_add(config, &uri, cli.skip_post),
    Commands::Update => cmd::cmd_update(config, cli.skip_post),
    Commands::Remove { uri, name } => cmd::cmd_remove(config, &uri, &name, cli.skip_post),
    Commands::List { output } => cmd::cmd_list(config, output),
    Commands::PostProcess => cmd::cmd_post_process(config),
  }
}
