use std::{
  io::Read,
  process::{Child, Command, ExitStatus, Stdio},
  sync::mpsc::{self, RecvTimeoutError},
  thread,
  time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use wait_timeout::ChildExt as WaitExt;

#[extend::ext]
pub impl ExitStatus {
  fn check_success(&self) -> Result<()> {
    if !self.success() {
      anyhow::bail!("exited with non-zero status {self}");
    }

    Ok(())
  }
}

#[extend::ext]
pub impl Child {
  /// Returns an error if the exit status was non-zero. On timeout, kills the
  /// child and returns `Ok(None)`.
  fn check_success_timeout(&mut self, timeout: Duration) -> Result<Option<()>> {
    let Some(status) = self.wait_timeout(timeout).context("wait")? else {
      self.kill().context("kill after timeout")?;
      self.wait().context("wait after kill")?;

      return Ok(None);
    };

    status.check_success()?;

    Ok(Some(()))
  }
}

#[extend::ext]
pub impl Command {
  /// Runs the command, capturing only stdout, returning an error on non-zero
  /// exit, or `Ok(None)` on timeout. stderr is inherited.
  ///
  /// The timeout covers both the child's exit and stdout reaching EOF, so a
  /// background process left holding the pipe counts as a timeout.
  fn status_stdout_timeout(&mut self, timeout: Duration) -> Result<Option<String>> {
    let start = Instant::now();
    let mut child = self.stdout(Stdio::piped()).spawn().context("spawn")?;
    let mut stdout = child.stdout.take().context("stdout")?;

    // drained on its own thread so a chatty child can't fill the pipe and stall
    // past the timeout
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
      let mut bytes = Vec::new();
      let _ = tx.send(stdout.read_to_end(&mut bytes).map(|_| bytes));
    });

    if child.check_success_timeout(timeout)?.is_none() {
      return Ok(None);
    }

    let remaining = timeout.saturating_sub(start.elapsed());
    let bytes = match rx.recv_timeout(remaining) {
      Ok(read) => read.context("read")?,
      // the reader stays blocked until the last writer exits; it is detached
      Err(RecvTimeoutError::Timeout) => return Ok(None),
      Err(RecvTimeoutError::Disconnected) => return Err(anyhow!("stdout reader panicked")),
    };

    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
  }
}
