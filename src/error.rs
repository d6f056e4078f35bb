use std::time::Duration;

use thiserror::Error;

use crate::stats::MetricKey;

/// Every way a benchmark run can fail. None of these are recovered from: the
/// first one aborts the whole batch.
#[derive(Error, Debug)]
pub enum BenchError {
  /// The helper's stdout did not have the 3 × 3 numeric shape.
  #[error("allocator={allocator} command={command:?}: {reason}\nhelper output was:\n{output}")]
  ContractViolation {
    allocator: String,
    command: String,
    reason: String,
    output: String,
  },

  #[error("{invocation}: {reason}")]
  SubprocessFailure { invocation: String, reason: String },

  #[error("{invocation}: timed out after {timeout:?}")]
  Timeout { invocation: String, timeout: Duration },

  #[error("no value recorded for {0}")]
  LookupFailure(MetricKey),

  #[error("invalid config: {0}")]
  Config(String),
}
