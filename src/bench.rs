use tracing::info;

use crate::{
  config::AllocatorConfig,
  error::BenchError,
  run,
  stats::ResultsTable,
};

/// Something that can time `command` under `allocator` and return the raw
/// 3-line report.
pub trait Measure {
  fn measure(&mut self, allocator: &AllocatorConfig, command: &str) -> Result<String, BenchError>;
}

impl<F> Measure for F
where
  F: FnMut(&AllocatorConfig, &str) -> Result<String, BenchError>,
{
  fn measure(&mut self, allocator: &AllocatorConfig, command: &str) -> Result<String, BenchError> {
    (*self)(allocator, command)
  }
}

pub struct Bench<'a, M> {
  allocators: &'a [AllocatorConfig],
  commands: &'a [String],
  measure: M,
  /// Results for every (allocator, command) pair benchmarked so far.
  pub table: ResultsTable,
}

impl<'a, M: Measure> Bench<'a, M> {
  pub fn new(allocators: &'a [AllocatorConfig], commands: &'a [String], measure: M) -> Self {
    Self {
      allocators,
      commands,
      measure,
      table: ResultsTable::default(),
    }
  }

  /// Runs every allocator × command pair in order. The first failure aborts the
  /// rest of the batch.
  pub fn bench(&mut self) -> Result<(), BenchError> {
    for allocator in self.allocators {
      self.bench_allocator(allocator)?;
    }

    Ok(())
  }

  fn bench_allocator(&mut self, allocator: &AllocatorConfig) -> Result<(), BenchError> {
    info!("running allocator={}", allocator.label);

    for command in self.commands {
      info!("command={command}");

      let stdout = self.measure.measure(allocator, command)?;
      let timing = run::parse_stdout(&allocator.label, command, &stdout)?;

      self.table.insert(&allocator.label, command, &timing);
    }

    Ok(())
  }
}
