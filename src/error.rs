use std::io;

use thiserror::Error;

/// Shorthand alias for `Result<T, EncoderError>`.
pub type Result<T> = std::result::Result<T, EncoderError>;

/// Everything that can go wrong while driving ffmpeg and reading its
/// diagnostic output.
///
/// The first three variants classify the diagnostic stream itself and carry
/// the offending line whenever one is available. None of them are retried.
#[derive(Debug, Error)]
pub enum EncoderError {
  /// ffmpeg never printed an `Input #0` header, or reported the source path
  /// itself as unreadable (`<path>: <reason>`).
  #[error("unrecognized input format{}", detail(.0))]
  InputFormat(Option<String>),

  /// A banner line (`Output #0`, `Stream mapping:`) was required but a
  /// different, non-warning line showed up instead.
  #[error("unexpected ffmpeg output: {0}")]
  UnexpectedOutput(String),

  /// The stream closed on an unclassified line that is not the muxing summary.
  #[error("encoding failed: {0}")]
  Encoding(String),

  /// Misuse of the line reader. Indicates a bug in this crate, never bad input.
  #[error("programming error: {0}")]
  Programming(String),

  #[error("invalid encoding attributes: {0}")]
  InvalidAttributes(String),

  #[error(transparent)]
  Io(#[from] io::Error),

  /// Failure to spawn or talk to the ffmpeg child process.
  #[error(transparent)]
  Process(#[from] anyhow::Error),
}

impl EncoderError {
  /// The diagnostic line that triggered the failure, if there was one.
  pub fn offending_line(&self) -> Option<&str> {
    match self {
      EncoderError::InputFormat(line) => line.as_deref(),
      EncoderError::UnexpectedOutput(line) | EncoderError::Encoding(line) => Some(line),
      _ => None,
    }
  }
}

fn detail(message: &Option<String>) -> String {
  match message {
    Some(message) => format!(": {message}"),
    None => String::new(),
  }
}
