use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const HEADER: &str =
  "allocator,command,total_mean,total_min,total_max,user_mean,user_min,user_max,system_mean,system_min,system_max";

/// Lays out a stub helper that logs its arguments to `calls.log` and prints
/// `output`, plus a preload dir holding `libmimalloc.so`, and a config pointing
/// at both.
fn setup(output: &str, commands: &[&str]) -> TempDir {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();

  fs::write(
    root.join("stub.sh"),
    format!("echo \"$@\" >> \"$(dirname \"$0\")/calls.log\"\nprintf '{output}'\n"),
  )
  .unwrap();

  fs::create_dir(root.join("lib")).unwrap();
  fs::write(root.join("lib/libmimalloc.so"), b"").unwrap();

  let commands = commands
    .iter()
    .map(|c| format!("  - {c:?}\n"))
    .collect::<String>();
  fs::write(
    root.join("bench.yaml"),
    format!(
      "helper: sh\nhelper_args: [{stub:?}]\npreload_dir: {lib:?}\ntimeout: 10\n\
       allocators:\n  - label: gnu\n  - label: mimalloc\n    library: libmimalloc.so\n\
       commands:\n{commands}",
      stub = root.join("stub.sh"),
      lib = root.join("lib"),
    ),
  )
  .unwrap();

  dir
}

fn alloc_bench(dir: &Path, subcommand: &str) -> Command {
  let mut cmd = Command::cargo_bin("alloc-bench").unwrap();
  cmd
    .current_dir(dir)
    .env_remove("RUST_LOG")
    .args([subcommand, "--config"])
    .arg(dir.join("bench.yaml"));

  cmd
}

#[test]
fn bench_prints_one_row_per_pair() {
  let dir = setup("1 1 1\\n2 2 2\\n3 3 3\\n", &["echo test"]);

  alloc_bench(dir.path(), "bench")
    .assert()
    .success()
    .stdout(format!(
      "{HEADER}\n\
       gnu,\"echo test\",1,1,1,2,2,2,3,3,3\n\
       mimalloc,\"echo test\",1,1,1,2,2,2,3,3,3\n"
    ))
    .stderr(predicate::str::contains("running allocator=gnu"))
    .stderr(predicate::str::contains("command=echo test"));
}

#[test]
fn bench_passes_preload_args_only_with_a_library() {
  let dir = setup("1 1 1\\n2 2 2\\n3 3 3\\n", &["echo test"]);

  alloc_bench(dir.path(), "bench").assert().success();

  let calls = fs::read_to_string(dir.path().join("calls.log")).unwrap();
  let calls = calls.lines().collect::<Vec<_>>();
  let lib = dir.path().join("lib");

  assert_eq!(
    calls,
    [
      "--command echo test time --iters 1".to_string(),
      format!(
        "--command echo test time --iters 1 --ldpreload {} --allocator-replacement libmimalloc.so",
        lib.display()
      ),
    ]
  );
}

#[test]
fn bench_aborts_on_short_output() {
  let dir = setup("1 1 1\\n2 2 2\\n", &["echo test"]);

  alloc_bench(dir.path(), "bench")
    .assert()
    .failure()
    .stdout(predicate::str::is_empty())
    .stderr(predicate::str::contains("expected 3 lines, got 2"));

  // the first pair already failed, nothing else ran
  let calls = fs::read_to_string(dir.path().join("calls.log")).unwrap();
  assert_eq!(calls.lines().count(), 1);
}

#[test]
fn bench_quotes_commands_with_commas() {
  let dir = setup("1 1 1\\n2 2 2\\n3 3 3\\n", &["run --a,b"]);

  alloc_bench(dir.path(), "bench")
    .assert()
    .success()
    .stdout(predicate::str::contains("gnu,\"run --a,b\",1,1,1,2,2,2,3,3,3\n"));
}

#[test]
fn bench_output_is_repeatable() {
  let dir = setup("0.5 0.4 0.6\\n0.3 0.2 0.4\\n0.1 0.1 0.1\\n", &["echo test", "ls"]);

  let first = alloc_bench(dir.path(), "bench").assert().success().get_output().stdout.clone();
  let second = alloc_bench(dir.path(), "bench").assert().success().get_output().stdout.clone();

  assert_eq!(first, second);
}

#[test]
fn bench_rejects_missing_library() {
  let dir = setup("1 1 1\\n2 2 2\\n3 3 3\\n", &["echo test"]);
  fs::remove_file(dir.path().join("lib/libmimalloc.so")).unwrap();

  alloc_bench(dir.path(), "bench")
    .assert()
    .failure()
    .stdout(predicate::str::is_empty())
    .stderr(predicate::str::contains("libmimalloc.so"));

  assert!(!dir.path().join("calls.log").exists());
}

#[test]
fn check_lists_pairs() {
  let dir = setup("", &["echo test", "ls"]);

  alloc_bench(dir.path(), "check")
    .assert()
    .success()
    .stdout("gnu\techo test\ngnu\tls\nmimalloc\techo test\nmimalloc\tls\n");

  assert!(!dir.path().join("calls.log").exists());
}

#[test]
fn builtin_set_requires_a_helper() {
  let dir = tempfile::tempdir().unwrap();

  Command::cargo_bin("alloc-bench")
    .unwrap()
    .current_dir(dir.path())
    .arg("bench")
    .assert()
    .failure()
    .stdout(predicate::str::is_empty())
    .stderr(predicate::str::contains("--helper"));
}
