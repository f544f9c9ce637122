use std::fmt;

use chrono::NaiveDateTime;

use crate::volume::VolumeDetect;

/// What ffmpeg reported about one source file before it started encoding.
///
/// Built incrementally by [`MediaInfoParser`](crate::info_parser::MediaInfoParser)
/// and handed to the caller read-only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaInfo {
  /// Container name, the first entry of the `Input #0, <format>, ...` list.
  pub format: String,
  /// `None` when no duration line was seen or ffmpeg printed `Duration: N/A`.
  pub duration_ms: Option<u64>,
  pub creation_time: Option<NaiveDateTime>,
  pub video: Option<VideoTrack>,
  pub audio: Option<AudioTrack>,
}

impl MediaInfo {
  pub fn new(format: impl Into<String>) -> Self {
    Self {
      format: format.into(),
      ..Default::default()
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoSize {
  pub width: u32,
  pub height: u32,
}

impl VideoSize {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }
}

/// Formats as `WIDTHxHEIGHT`, the form ffmpeg's `-s` flag expects.
impl fmt::Display for VideoSize {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}", self.width, self.height)
  }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoTrack {
  /// The full first token of the stream line, e.g. `h264 (High) (avc1 / 0x31637661)`.
  pub decoder: String,
  pub size: Option<VideoSize>,
  pub bit_rate_kbps: Option<u32>,
  /// Frames per second, from either `fps` or the legacy `tb(r)` notation.
  pub frame_rate: Option<f32>,
  pub creation_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioTrack {
  pub decoder: String,
  pub sampling_rate: Option<u32>,
  /// 1 for `mono`, 2 for `stereo`. Other layouts (`5.1`, ...) are not reported.
  pub channels: Option<u8>,
  pub bit_rate_kbps: Option<u32>,
  pub creation_time: Option<NaiveDateTime>,
  /// Only filled in by [`Encoder::volume_detect`](crate::encoder::Encoder::volume_detect).
  pub volume: Option<VolumeDetect>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_video_size_display() {
    assert_eq!(VideoSize::new(640, 480).to_string(), "640x480");
  }

  #[test]
  fn test_new_media_info_is_empty() {
    let info = MediaInfo::new("mov");
    assert_eq!(info.format, "mov");
    assert!(info.duration_ms.is_none());
    assert!(info.video.is_none() && info.audio.is_none());
  }
}
