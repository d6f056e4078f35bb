use crate::{
  config::AllocatorConfig,
  error::BenchError,
  stats::{Metric, MetricKey, ResultsTable},
};

fn format_header() -> String {
  ["allocator", "command"]
    .into_iter()
    .chain(Metric::ALL.map(Metric::name))
    .collect::<Vec<_>>()
    .join(",")
}

/// Wraps `field` in double quotes, doubling any quotes inside it.
fn quote(field: &str) -> String {
  format!("\"{}\"", field.replace('"', "\"\""))
}

fn format_row(table: &ResultsTable, allocator: &str, command: &str) -> Result<String, BenchError> {
  let mut row = vec![allocator.to_string(), quote(command)];
  for metric in Metric::ALL {
    row.push(table.get(&MetricKey::new(allocator, command, metric))?.to_string());
  }

  Ok(row.join(","))
}

/// Renders the CSV report: a header, then one row per allocator × command in
/// run order.
pub fn csv(allocators: &[AllocatorConfig], commands: &[String], table: &ResultsTable) -> Result<String, BenchError> {
  let mut csv = format_header();
  csv.push('\n');

  for allocator in allocators {
    for command in commands {
      csv.push_str(&format_row(table, &allocator.label, command)?);
      csv.push('\n');
    }
  }

  Ok(csv)
}
