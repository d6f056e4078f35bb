use std::{collections::BTreeMap, fmt};

use crate::error::BenchError;

/// One of the nine statistics reported by the measurement helper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
  TotalMean,
  TotalMin,
  TotalMax,
  UserMean,
  UserMin,
  UserMax,
  SystemMean,
  SystemMin,
  SystemMax,
}

impl Metric {
  /// Report column order, which is also the order the helper prints them in
  /// (row-major over total/user/system × mean/min/max).
  pub const ALL: [Metric; 9] = [
    Metric::TotalMean,
    Metric::TotalMin,
    Metric::TotalMax,
    Metric::UserMean,
    Metric::UserMin,
    Metric::UserMax,
    Metric::SystemMean,
    Metric::SystemMin,
    Metric::SystemMax,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Metric::TotalMean => "total_mean",
      Metric::TotalMin => "total_min",
      Metric::TotalMax => "total_max",
      Metric::UserMean => "user_mean",
      Metric::UserMin => "user_min",
      Metric::UserMax => "user_max",
      Metric::SystemMean => "system_mean",
      Metric::SystemMin => "system_min",
      Metric::SystemMax => "system_max",
    }
  }

  fn index(self) -> usize {
    self as usize
  }
}

impl fmt::Display for Metric {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Identity of a single stored value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricKey {
  pub allocator: String,
  pub command: String,
  pub metric: Metric,
}

impl MetricKey {
  pub fn new(allocator: &str, command: &str, metric: Metric) -> Self {
    Self {
      allocator: allocator.to_string(),
      command: command.to_string(),
      metric,
    }
  }
}

impl fmt::Display for MetricKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "allocator={} command={:?} metric={}",
      self.allocator, self.command, self.metric
    )
  }
}

/// The helper's output for one run, unparsed beyond splitting. Values keep the
/// exact text the helper printed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timing {
  values: [String; 9],
}

impl Timing {
  pub fn new(values: [String; 9]) -> Self {
    Self { values }
  }

  pub fn get(&self, metric: Metric) -> &str {
    &self.values[metric.index()]
  }
}

/// All values collected during a run.
#[derive(Default, Debug, PartialEq, Eq)]
pub struct ResultsTable {
  values: BTreeMap<MetricKey, String>,
}

impl ResultsTable {
  /// Records all nine metrics of `timing` for the pair.
  pub fn insert(&mut self, allocator: &str, command: &str, timing: &Timing) {
    for metric in Metric::ALL {
      self
        .values
        .insert(MetricKey::new(allocator, command, metric), timing.get(metric).to_string());
    }
  }

  pub fn get(&self, key: &MetricKey) -> Result<&str, BenchError> {
    self
      .values
      .get(key)
      .map(String::as_str)
      .ok_or_else(|| BenchError::LookupFailure(key.clone()))
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.values.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}
