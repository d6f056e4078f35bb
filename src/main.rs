mod bench;
mod config;
mod error;
mod ext;
mod format;
mod run;
mod stats;

use std::{
  io::{self, IsTerminal},
  path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use self::{bench::Bench, config::Config, run::Helper};

#[derive(Parser)]
struct Args {
  /// Only log warnings and errors to stderr.
  #[arg(short, long, global = true)]
  quiet: bool,
  #[command(subcommand)]
  command: Command,
}

#[derive(ClapArgs, Debug)]
struct ConfigArgs {
  /// YAML file with the allocators and commands to benchmark. The built-in set
  /// is used when omitted.
  #[arg(short, long)]
  config: Option<PathBuf>,
  /// Measurement helper executable, overrides the config. Required without
  /// `--config`.
  #[arg(long, required_unless_present = "config")]
  helper: Option<String>,
}

impl ConfigArgs {
  fn load(&self) -> Result<Config> {
    let mut config = match &self.config {
      Some(path) => Config::load(path).context("load config")?,
      None => Config::builtin(),
    };

    if let Some(helper) = &self.helper {
      config.helper = helper.clone();
      config.helper_args.clear();
    }

    Ok(config)
  }
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run every allocator × command pair and print a CSV report to stdout.
  Bench {
    #[command(flatten)]
    config: ConfigArgs,
    /// Directory holding the allocator shared objects.
    #[arg(long)]
    preload_dir: Option<PathBuf>,
    /// Repetitions the helper runs per pair.
    #[arg(short, long)]
    iters: Option<u32>,
    /// Seconds to wait for a single helper run.
    #[arg(short, long)]
    timeout: Option<u64>,
  },
  /// Validate the config and list the pairs `bench` would run.
  Check {
    #[command(flatten)]
    config: ConfigArgs,
  },
}

fn init_tracing(quiet: bool) {
  let default = if quiet { "warn" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  let _ = tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_ansi(io::stderr().is_terminal())
    .with_env_filter(filter)
    .with_target(false)
    .try_init();
}

fn main() -> Result<()> {
  let args = Args::parse();
  init_tracing(args.quiet);

  match args.command {
    Command::Bench {
      config,
      preload_dir,
      iters,
      timeout,
    } => {
      let mut config = config.load()?;
      if let Some(preload_dir) = preload_dir {
        config.preload_dir = Some(preload_dir);
      }
      if let Some(iters) = iters {
        config.iters = iters;
      }
      if let Some(timeout) = timeout {
        config.timeout = timeout;
      }

      config.validate().context("validate")?;
      config.check_libraries().context("check libraries")?;

      let helper = Helper::new(&config).context("Helper::new")?;
      let mut bench = Bench::new(&config.allocators, &config.commands, helper);
      bench.bench().context("bench")?;

      print!(
        "{}",
        format::csv(&config.allocators, &config.commands, &bench.table).context("format")?
      );
    }
    Command::Check { config } => {
      let config = config.load()?;

      config.validate().context("validate")?;
      config.check_libraries().context("check libraries")?;

      for allocator in &config.allocators {
        for command in &config.commands {
          println!("{}\t{command}", allocator.label);
        }
      }
    }
  }

  Ok(())
}
