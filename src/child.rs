use std::{
  io,
  process::{Child, ChildStderr, ChildStdout, ExitStatus},
};

use anyhow::Context;
use log::debug;

use crate::iter::{spawn_stderr_thread, DiagnosticStream};

/// A wrapper around [`std::process::Child`] containing a spawned FFmpeg command.
pub struct FfmpegChild {
  inner: Child,
}

impl FfmpegChild {
  /// Start reading stderr on a dedicated thread, returning the line stream.
  /// Can only be called once, since it takes ownership of the pipe.
  pub fn diagnostic_stream(&mut self) -> anyhow::Result<DiagnosticStream> {
    let stderr = self.take_stderr().context("No stderr channel\n - Did you call `take_stderr` elsewhere?\n - Did you forget to call `.stderr(Stdio::piped)` on the `ChildProcess`?")?;
    Ok(spawn_stderr_thread(stderr))
  }

  /// Escape hatch to manually control the process' stdout channel.
  pub fn take_stdout(&mut self) -> Option<ChildStdout> {
    self.inner.stdout.take()
  }

  /// Escape hatch to manually control the process' stderr channel.
  /// The diagnostic stream is unavailable afterwards.
  pub fn take_stderr(&mut self) -> Option<ChildStderr> {
    self.inner.stderr.take()
  }

  /// Forcibly terminate the process. A process that already exited is not
  /// an error.
  pub fn kill(&mut self) -> io::Result<()> {
    debug!("Killing ffmpeg process {}", self.inner.id());
    match self.inner.kill() {
      Err(e) if e.kind() != io::ErrorKind::InvalidInput => Err(e),
      _ => Ok(()),
    }
  }

  /// Wait for the process to exit, returning its status.
  ///
  /// Identical to `wait` in [`std::process::Child`].
  pub fn wait(&mut self) -> io::Result<ExitStatus> {
    let status = self.inner.wait()?;
    debug!("ffmpeg exited with {status}");
    Ok(status)
  }

  /// Escape hatch to access the inner `Child`.
  pub fn as_inner(&self) -> &Child {
    &self.inner
  }

  /// Escape hatch to mutably access the inner `Child`.
  pub fn as_inner_mut(&mut self) -> &mut Child {
    &mut self.inner
  }

  pub(crate) fn from_inner(inner: Child) -> Self {
    Self { inner }
  }
}
