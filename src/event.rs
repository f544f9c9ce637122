use crate::media_info::MediaInfo;

/// Everything the progress tracker reports to its caller, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderEvent {
  /// Always the first event of an encode: what ffmpeg reported about the source.
  SourceInfo(MediaInfo),
  Progress(ProgressEvent),
  /// Free text: `WARNING:` lines and any steady-state line that is not a
  /// progress update.
  Message(String),
}

/// One parsed progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
  /// Encoded media time so far, from the `time=` field.
  pub elapsed_ms: u64,
  /// Completion in parts per thousand, clamped to 1000. `None` when the
  /// target duration is unknown.
  pub permille: Option<u16>,
  pub frame: Option<u64>,
  pub fps: Option<f32>,
  /// Encoding speed relative to realtime, e.g. `1.5` for `speed=1.5x`.
  pub speed: Option<f32>,
  pub bitrate_kbps: Option<f32>,
  /// The stderr line that this event was parsed from
  pub raw_log_message: String,
}

impl ProgressEvent {
  /// Completion as a fraction in `0.0..=1.0`.
  pub fn fraction(&self) -> Option<f32> {
    self.permille.map(|p| f32::from(p) / 1000.0)
  }
}
