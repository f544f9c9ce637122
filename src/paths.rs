use std::{
  env::{self, current_exe},
  ffi::OsString,
  path::{Path, PathBuf},
};

use anyhow::Context;

/// Environment variable naming the ffmpeg executable to run.
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";

/// Returns the default path of the FFmpeg executable, to be used as the
/// argument to `Command::new`.
///
/// In order of preference: the `FFMPEG_PATH` environment variable, a binary
/// adjacent to the Rust executable, and finally plain `ffmpeg`, expected to
/// be in the system path. A missing binary is only reported when the command
/// is actually run.
pub fn ffmpeg_path() -> PathBuf {
  resolve_ffmpeg_path(env::var_os(FFMPEG_PATH_ENV))
}

fn resolve_ffmpeg_path(from_env: Option<OsString>) -> PathBuf {
  if let Some(path) = from_env.filter(|path| !path.is_empty()) {
    return PathBuf::from(path);
  }
  match sidecar_path() {
    Ok(sidecar_path) if sidecar_path.exists() => sidecar_path,
    _ => Path::new("ffmpeg").to_path_buf(),
  }
}

/// The (expected) path to an FFmpeg binary adjacent to the Rust binary.
///
/// The extension varies between platforms, with Windows using `.exe`, while
/// Mac and Linux have no extension.
pub fn sidecar_path() -> anyhow::Result<PathBuf> {
  let mut path = current_exe()?
    .parent()
    .context("Can't get parent of current_exe")?
    .join("ffmpeg");
  if cfg!(windows) {
    path.set_extension("exe");
  }
  Ok(path)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_env_override_wins() {
    let path = resolve_ffmpeg_path(Some(OsString::from("/opt/ffmpeg/bin/ffmpeg")));
    assert_eq!(path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
  }

  #[test]
  fn test_empty_env_is_ignored() {
    let path = resolve_ffmpeg_path(Some(OsString::new()));
    assert_ne!(path, PathBuf::new());
  }

  #[test]
  fn test_sidecar_next_to_executable() {
    let sidecar = sidecar_path().unwrap();
    assert_eq!(sidecar.parent(), current_exe().unwrap().parent());
  }
}
