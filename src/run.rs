use std::{
  env,
  ffi::OsString,
  fmt,
  path::PathBuf,
  process::{Command, Stdio},
  time::Duration,
};

use tracing::trace;

use crate::{
  bench::Measure,
  config::{AllocatorConfig, Config},
  error::BenchError,
  ext::CommandExt,
  stats::Timing,
};

const EXPECTED_LINES: usize = 3;
const EXPECTED_TOKENS: usize = 3;

/// A fully resolved helper command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      write!(f, " {arg:?}")?;
    }

    Ok(())
  }
}

/// The external measurement helper, run once per (allocator, command).
pub struct Helper {
  program: String,
  leading_args: Vec<String>,
  preload_dir: Option<PathBuf>,
  iters: u32,
  timeout: Duration,
  env: Vec<(&'static str, OsString)>,
}

impl Helper {
  pub fn new(config: &Config) -> Result<Self, BenchError> {
    let mut env = Vec::new();
    for (var, entries) in [("LD_LIBRARY_PATH", &config.library_path), ("PATH", &config.path)] {
      if let Some(value) = prepend_paths(var, entries)? {
        env.push((var, value));
      }
    }

    Ok(Self {
      program: config.helper.clone(),
      leading_args: config.helper_args.clone(),
      preload_dir: config.preload_dir.clone(),
      iters: config.iters,
      timeout: config.timeout(),
      env,
    })
  }

  /// `[leading..] --command <cmd> time --iters <n> [--ldpreload <dir> --allocator-replacement <lib>]`
  pub fn invocation(&self, allocator: &AllocatorConfig, command: &str) -> Invocation {
    let mut args = self.leading_args.clone();
    args.extend(["--command".to_string(), command.to_string()]);
    args.extend(["time".to_string(), "--iters".to_string(), self.iters.to_string()]);

    if let (Some(library), Some(dir)) = (&allocator.library, &self.preload_dir) {
      args.extend([
        "--ldpreload".to_string(),
        dir.to_string_lossy().into_owned(),
        "--allocator-replacement".to_string(),
        library.clone(),
      ]);
    }

    Invocation {
      program: self.program.clone(),
      args,
    }
  }
}

impl Measure for Helper {
  fn measure(&mut self, allocator: &AllocatorConfig, command: &str) -> Result<String, BenchError> {
    let invocation = self.invocation(allocator, command);

    let stdout = Command::new(&invocation.program)
      .args(&invocation.args)
      .envs(self.env.iter().cloned())
      .stdin(Stdio::null())
      .status_stdout_timeout(self.timeout)
      .map_err(|e| BenchError::SubprocessFailure {
        invocation: invocation.to_string(),
        reason: format!("{e:#}"),
      })?;

    let Some(stdout) = stdout else {
      return Err(BenchError::Timeout {
        invocation: invocation.to_string(),
        timeout: self.timeout,
      });
    };

    trace!("{invocation} printed {stdout:?}");

    Ok(stdout)
  }
}

/// Prefixes `entries` to the inherited value of `var`. `None` when there is
/// nothing to add.
fn prepend_paths(var: &str, entries: &[PathBuf]) -> Result<Option<OsString>, BenchError> {
  if entries.is_empty() {
    return Ok(None);
  }

  let inherited = env::var_os(var);
  let paths = entries
    .iter()
    .cloned()
    .chain(inherited.iter().flat_map(env::split_paths));

  env::join_paths(paths)
    .map(Some)
    .map_err(|e| BenchError::Config(format!("{var}: {e}")))
}

/// Parses the helper's 3 × 3 output: total, user and system rows, each with
/// mean, min and max. Values are checked to be numeric but kept verbatim.
pub fn parse_stdout(allocator: &str, command: &str, stdout: &str) -> Result<Timing, BenchError> {
  let violation = |reason: String| BenchError::ContractViolation {
    allocator: allocator.to_string(),
    command: command.to_string(),
    reason,
    output: stdout.to_string(),
  };

  let lines = stdout.lines().collect::<Vec<_>>();
  if lines.len() != EXPECTED_LINES {
    return Err(violation(format!(
      "expected {EXPECTED_LINES} lines, got {}",
      lines.len()
    )));
  }

  let mut values = Vec::with_capacity(EXPECTED_LINES * EXPECTED_TOKENS);
  for (i, line) in lines.iter().enumerate() {
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    if tokens.len() != EXPECTED_TOKENS {
      return Err(violation(format!(
        "line {i}: expected {EXPECTED_TOKENS} values, got {}",
        tokens.len()
      )));
    }

    for token in tokens {
      if token.parse::<f64>().is_err() {
        return Err(violation(format!("line {i}: {token:?} is not a number")));
      }
      values.push(token.to_string());
    }
  }

  let values = <[String; EXPECTED_LINES * EXPECTED_TOKENS]>::try_from(values)
    .map_err(|values| violation(format!("expected 9 values, got {}", values.len())))?;

  Ok(Timing::new(values))
}
