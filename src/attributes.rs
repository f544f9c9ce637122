//! Plain-data descriptions of an encode, mapped onto ffmpeg flags by
//! [`FfmpegCommand`](crate::command::FfmpegCommand).

use std::path::Path;

use crate::{
  error::{EncoderError, Result},
  media_info::VideoSize,
  time::seconds_to_millis,
};

/// Codec name that copies a stream without re-encoding it.
pub const DIRECT_STREAM_COPY: &str = "copy";

/// Top-level options of one encode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncodingAttributes {
  /// Output container (`-f`), e.g. `mp4`, `mp3`, `image2`.
  pub format: Option<String>,
  /// Seconds skipped at the start of the input (`-ss`, before `-i`).
  pub offset: Option<f32>,
  /// Seconds of output to produce (`-t`).
  pub duration: Option<f32>,
  /// Input format flags (`-fflags`), e.g. `+genpts`.
  pub fflags: Option<String>,
  /// Video stream metadata (`-metadata:s:v`), e.g. `rotate=90`.
  pub metadata_sv: Option<String>,
  /// `None` drops the audio stream (`-an`).
  pub audio: Option<AudioAttributes>,
  /// `None` drops the video stream (`-vn`).
  pub video: Option<VideoAttributes>,
}

impl EncodingAttributes {
  /// At least one of audio and video must be configured.
  pub fn validate(&self) -> Result<()> {
    match (&self.audio, &self.video) {
      (None, None) => Err(EncoderError::InvalidAttributes(
        "both audio and video attributes are missing".to_string(),
      )),
      _ => Ok(()),
    }
  }

  /// The explicit output length in milliseconds, if any.
  pub fn duration_ms(&self) -> Option<u64> {
    self.duration.map(seconds_to_millis)
  }

  pub fn offset_ms(&self) -> u64 {
    self.offset.map(seconds_to_millis).unwrap_or(0)
  }

  /// Whether both streams change speed, which needs a combined filter graph.
  pub(crate) fn changes_both_speeds(&self) -> bool {
    self.video_setpts().is_some() && self.audio_tempo().is_some()
  }

  pub(crate) fn video_setpts(&self) -> Option<&str> {
    self.video.as_ref().and_then(|v| non_empty(&v.setpts))
  }

  pub(crate) fn audio_tempo(&self) -> Option<&str> {
    self.audio.as_ref().and_then(|a| non_empty(&a.tempo))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMergeType {
  /// Play the inputs one after another (`concat` filter).
  Concat,
  /// Play the inputs on top of each other (`amix` filter).
  Mix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMergeType {
  /// Add the second input's audio to a video without sound.
  Insert,
  /// Replace the video's own audio with the second input's.
  Replace,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioAttributes {
  /// `-acodec`. Use [`DIRECT_STREAM_COPY`] to keep the stream as is.
  pub codec: Option<String>,
  /// `-ab`, bits per second.
  pub bit_rate: Option<u32>,
  /// `-ac`.
  pub channels: Option<u8>,
  /// `-ar`, Hz.
  pub sampling_rate: Option<u32>,
  /// `-vol`, 256 is unchanged.
  pub volume: Option<u32>,
  /// `-ss` as an output option, ffmpeg time syntax.
  pub start_time: Option<String>,
  /// `-t` as an output option, ffmpeg time syntax.
  pub duration: Option<String>,
  pub merge_type: Option<AudioMergeType>,
  /// `-af`, a raw audio filter graph.
  pub filter: Option<String>,
  /// Speed factor, emitted as `atempo=<tempo>`.
  pub tempo: Option<String>,
  /// Emitted as `-af volume=<value>`, e.g. `0.5` or `-3dB`.
  pub volume_filter: Option<String>,
  /// `-ab` for merged audio, as a string such as `128k`.
  pub merge_bit_rate: Option<String>,
  /// `-filter_complex`, e.g. `volumedetect` or `showwavespic=s=640x120`.
  pub filter_complex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoAttributes {
  /// `-vcodec`. Use [`DIRECT_STREAM_COPY`] to keep the stream as is.
  pub codec: Option<String>,
  /// `-vtag`, e.g. `DIVX`.
  pub tag: Option<String>,
  /// `-b`, bits per second.
  pub bit_rate: Option<u32>,
  /// `-r`.
  pub frame_rate: Option<u32>,
  /// `-s`.
  pub size: Option<VideoSize>,
  pub start_time: Option<String>,
  pub duration: Option<String>,
  /// Presentation timestamp factor, emitted as `setpts=<setpts>*PTS`.
  /// `0.5` plays twice as fast.
  pub setpts: Option<String>,
  /// `-vf`, a raw video filter graph.
  pub filter: Option<String>,
  /// `-q:v`.
  pub quality: Option<String>,
  /// `-b:v`, e.g. `2M`.
  pub target_bit_rate: Option<String>,
  /// `-bufsize`.
  pub buffer_size: Option<String>,
  /// `-maxrate`.
  pub max_rate: Option<String>,
  pub merge_type: Option<VideoMergeType>,
}

/// Treats `Some("")` like `None`, the way every string option is emitted.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().filter(|s| !s.is_empty())
}

/// A lossless concat list must be an ffmpeg concat script (`*.txt`).
pub(crate) fn validate_concat_list(list: &Path) -> Result<()> {
  match list.extension().and_then(|ext| ext.to_str()) {
    Some(ext) if ext.eq_ignore_ascii_case("txt") => Ok(()),
    _ => Err(EncoderError::InvalidAttributes(format!(
      "concat list must be a .txt file: {}",
      list.display()
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_validate_requires_a_stream() {
    let err = EncodingAttributes::default().validate().unwrap_err();
    assert!(matches!(err, EncoderError::InvalidAttributes(_)));

    let attrs = EncodingAttributes {
      audio: Some(AudioAttributes::default()),
      ..Default::default()
    };
    assert!(attrs.validate().is_ok());
  }

  #[test]
  fn test_millisecond_conversions() {
    let attrs = EncodingAttributes {
      offset: Some(2.5),
      duration: Some(10.0),
      ..Default::default()
    };
    assert_eq!(attrs.offset_ms(), 2_500);
    assert_eq!(attrs.duration_ms(), Some(10_000));
    assert_eq!(EncodingAttributes::default().offset_ms(), 0);
  }

  #[test]
  fn test_speed_changes_ignore_empty_strings() {
    let attrs = EncodingAttributes {
      audio: Some(AudioAttributes {
        tempo: Some("2.0".to_string()),
        ..Default::default()
      }),
      video: Some(VideoAttributes {
        setpts: Some(String::new()),
        ..Default::default()
      }),
      ..Default::default()
    };
    assert!(!attrs.changes_both_speeds());
    assert_eq!(attrs.audio_tempo(), Some("2.0"));
  }

  #[test]
  fn test_concat_list_extension() {
    assert!(validate_concat_list(Path::new("/tmp/list.txt")).is_ok());
    assert!(validate_concat_list(Path::new("/tmp/list.TXT")).is_ok());
    assert!(validate_concat_list(Path::new("/tmp/list.m3u")).is_err());
    assert!(validate_concat_list(Path::new("/tmp/list")).is_err());
  }
}
