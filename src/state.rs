//! Position of the diagnostic reader within one ffmpeg run.

/// The reader only ever moves forward through these states. A pushed back
/// line is re-read without changing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ParseState {
  /// Waiting for `Input #0, <format>, ...`.
  #[default]
  AwaitContainerHeader,
  /// Waiting for `Duration: ...`.
  AwaitDuration,
  /// Collecting stream lines and creation times until the handoff rule fires.
  AwaitTracks,
  /// Waiting for `Output #0`. Warnings are forwarded.
  AwaitOutputBanner,
  /// Skipping the indented output description.
  OutputSection,
  /// Got `Stream mapping:`, skipping the indented mapping lines.
  StreamMapping,
  /// Every line is either a progress update or a message.
  Progress,
}

impl ParseState {
  /// Stage number used in logs: 0 to 5, with both halves of the output
  /// banner sharing stage 3.
  ///
  /// ```rust
  /// use ffmpeg_encoder::state::ParseState;
  /// assert_eq!(ParseState::AwaitContainerHeader.stage(), 0);
  /// assert_eq!(ParseState::OutputSection.stage(), 3);
  /// assert_eq!(ParseState::Progress.stage(), 5);
  /// ```
  pub fn stage(self) -> u8 {
    match self {
      ParseState::AwaitContainerHeader => 0,
      ParseState::AwaitDuration => 1,
      ParseState::AwaitTracks => 2,
      ParseState::AwaitOutputBanner | ParseState::OutputSection => 3,
      ParseState::StreamMapping => 4,
      ParseState::Progress => 5,
    }
  }

  /// Whether the media info phase is over.
  pub fn is_handed_off(self) -> bool {
    self >= ParseState::AwaitOutputBanner
  }
}
