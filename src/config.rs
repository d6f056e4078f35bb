use std::{
  collections::BTreeSet,
  fs,
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;

use crate::error::BenchError;

const DEFAULT_ITERS: u32 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// An allocator to benchmark against. `library` is a shared object name inside
/// the preload directory; `None` runs with the system allocator.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AllocatorConfig {
  pub label: String,
  #[serde(default)]
  pub library: Option<String>,
}

impl AllocatorConfig {
  pub fn system(label: &str) -> Self {
    Self {
      label: label.to_string(),
      library: None,
    }
  }

  pub fn preloaded(label: &str, library: &str) -> Self {
    Self {
      label: label.to_string(),
      library: Some(library.to_string()),
    }
  }
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
  /// Measurement helper executable. Must print three lines (total, user,
  /// system) of `mean min max` and exit zero.
  pub helper: String,
  /// Leading arguments to `helper`, e.g. the script when `helper` is an
  /// interpreter.
  #[serde(default)]
  pub helper_args: Vec<String>,
  #[serde(default)]
  pub preload_dir: Option<PathBuf>,
  #[serde(default = "default_iters")]
  pub iters: u32,
  /// Seconds.
  #[serde(default = "default_timeout")]
  pub timeout: u64,
  /// Prepended to `LD_LIBRARY_PATH` for the helper.
  #[serde(default)]
  pub library_path: Vec<PathBuf>,
  /// Prepended to `PATH` for the helper.
  #[serde(default)]
  pub path: Vec<PathBuf>,
  pub allocators: Vec<AllocatorConfig>,
  pub commands: Vec<String>,
}

fn default_iters() -> u32 {
  DEFAULT_ITERS
}

fn default_timeout() -> u64 {
  DEFAULT_TIMEOUT_SECS
}

impl Config {
  /// The compiled-in allocator and command set. It names no helper: the caller
  /// supplies one that prints the 3 × 3 mean/min/max report on stdout.
  pub fn builtin() -> Self {
    Self {
      helper: String::new(),
      helper_args: Vec::new(),
      preload_dir: Some(PathBuf::from("./allocators/lib")),
      iters: DEFAULT_ITERS,
      timeout: DEFAULT_TIMEOUT_SECS,
      library_path: vec![PathBuf::from("./allocators/lib")],
      path: Vec::new(),
      allocators: vec![
        AllocatorConfig::system("gnu"),
        AllocatorConfig::preloaded("mimalloc", "libmimalloc.so"),
        AllocatorConfig::preloaded("jemalloc", "libjemalloc.so"),
        AllocatorConfig::preloaded("tcmalloc", "libtcmalloc.so"),
      ],
      commands: vec![
        "blockMesh".to_string(),
        "checkMesh".to_string(),
        "decomposePar -force".to_string(),
        "mpirun -np 4 simpleFoam -parallel".to_string(),
      ],
    }
  }

  pub fn load(path: &Path) -> Result<Self, BenchError> {
    let text = fs::read_to_string(path).map_err(|e| BenchError::Config(format!("read {path:?}: {e}")))?;

    Self::parse(&text).map_err(|e| match e {
      BenchError::Config(reason) => BenchError::Config(format!("{path:?}: {reason}")),
      other => other,
    })
  }

  pub fn parse(text: &str) -> Result<Self, BenchError> {
    serde_yaml::from_str(text).map_err(|e| BenchError::Config(e.to_string()))
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout)
  }

  /// Checks invariants that don't touch the filesystem.
  pub fn validate(&self) -> Result<(), BenchError> {
    if self.helper.is_empty() {
      return Err(BenchError::Config("no helper set".to_string()));
    }
    if self.allocators.is_empty() {
      return Err(BenchError::Config("no allocators".to_string()));
    }
    if self.commands.is_empty() {
      return Err(BenchError::Config("no commands".to_string()));
    }
    if self.iters == 0 {
      return Err(BenchError::Config("iters must be at least 1".to_string()));
    }
    if self.timeout == 0 {
      return Err(BenchError::Config("timeout must be at least 1 second".to_string()));
    }

    let mut labels = BTreeSet::new();
    for allocator in &self.allocators {
      if !labels.insert(allocator.label.as_str()) {
        return Err(BenchError::Config(format!("duplicate allocator label {:?}", allocator.label)));
      }
    }

    if self.preload_dir.is_none() {
      if let Some(allocator) = self.allocators.iter().find(|a| a.library.is_some()) {
        return Err(BenchError::Config(format!(
          "allocator {:?} has a library but preload_dir is not set",
          allocator.label
        )));
      }
    }

    Ok(())
  }

  /// Checks that every preloaded library exists under `preload_dir`.
  pub fn check_libraries(&self) -> Result<(), BenchError> {
    for allocator in &self.allocators {
      let (Some(library), Some(dir)) = (&allocator.library, &self.preload_dir) else {
        continue;
      };

      let so_path = dir.join(library);
      if !so_path.is_file() {
        return Err(BenchError::Config(format!(
          "allocator {:?}: {so_path:?} is not a file",
          allocator.label
        )));
      }
    }

    Ok(())
  }
}
