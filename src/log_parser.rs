//! Stateless classifiers for individual lines of ffmpeg's stderr.
//!
//! Each `try_parse_*` function maps one line to a typed value, or `None` when
//! the line has a different shape. The stateful readers in
//! [`info_parser`](crate::info_parser) and [`progress`](crate::progress)
//! decide which classifier applies at which point of the stream.

use std::{collections::HashMap, sync::LazyLock};

use log::warn;
use regex::Regex;

use crate::{
  comma_iter::CommaIter,
  media_info::{AudioTrack, VideoSize, VideoTrack},
  time::{duration_millis, parse_progress_time},
};

static CONTAINER_HEADER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)^\s*Input #0, (\w+).+$").expect("valid regex"));
static DURATION: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)^\s*Duration: (?:(\d+):(\d\d):(\d\d)\.(\d)|(N/A)).*$").expect("valid regex")
});
static STREAM: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)^\s*Stream #\S+: (Audio|Video|Data): (.*)$").expect("valid regex")
});
static SIZE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)(\d+)x(\d+)").expect("valid regex"));
static FRAME_RATE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)([\d.]+)\s+(?:fps|tb\(r\))").expect("valid regex"));
static BIT_RATE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+kb/s").expect("valid regex"));
static SAMPLING_RATE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+Hz").expect("valid regex"));
static CHANNELS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)(mono|stereo)").expect("valid regex"));
static PROGRESS_PAIR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(\w+)\s*=\s*(\S+)").expect("valid regex"));
static SUCCESS_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?i)^\s*(?:\[[^\]]*\]\s*)?video:\S+\s+audio:\S+\s+(?:subtitle:\S+\s+)?(?:other streams:\S+\s+)?global headers:\S+.*$",
  )
  .expect("valid regex")
});

/// Parse the first input header, extracting the container format.
///
/// ```rust
/// use ffmpeg_encoder::log_parser::try_parse_container_header;
/// let line = "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':";
/// assert_eq!(try_parse_container_header(line).as_deref(), Some("mov"));
/// assert_eq!(try_parse_container_header("Input #1, wav, from 'b.wav':"), None);
/// ```
pub fn try_parse_container_header(string: &str) -> Option<String> {
  CONTAINER_HEADER
    .captures(string)
    .map(|caps| caps[1].to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationLine {
  Millis(u64),
  /// `Duration: N/A`, printed for live sources and some raw streams.
  NotAvailable,
}

/// Parse the duration line of the input section.
///
/// The sub-second part only carries tenths: `00:00:10.04` is 10000 ms.
/// A duration too large to represent counts as `N/A`.
///
/// ```rust
/// use ffmpeg_encoder::log_parser::{try_parse_duration, DurationLine};
/// let line = "  Duration: 01:02:03.40, start: 0.000000, bitrate: 1205 kb/s";
/// assert_eq!(try_parse_duration(line), Some(DurationLine::Millis(3_723_400)));
///
/// let line = "  Duration: N/A, start: 0.000000, bitrate: N/A";
/// assert_eq!(try_parse_duration(line), Some(DurationLine::NotAvailable));
/// ```
pub fn try_parse_duration(string: &str) -> Option<DurationLine> {
  let caps = DURATION.captures(string)?;
  if caps.get(5).is_some() {
    return Some(DurationLine::NotAvailable);
  }
  let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
  let millis = match (field(1), field(2), field(3), field(4)) {
    (Some(hours), Some(minutes), Some(seconds), Some(tenths)) => {
      duration_millis(hours, minutes, seconds, tenths)
    }
    _ => None,
  };
  match millis {
    Some(millis) => Some(DurationLine::Millis(millis)),
    None => {
      warn!("Duration out of range, treating it as unknown: {string}");
      Some(DurationLine::NotAvailable)
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
  Video,
  Audio,
  Data,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLine {
  pub kind: StreamKind,
  /// Everything after `<Kind>: `, e.g. `aac (LC), 44100 Hz, stereo, fltp, 128 kb/s`.
  pub specification: String,
}

/// Parse an input stream line. Subtitle and attachment streams are not
/// matched.
///
/// ```rust
/// use ffmpeg_encoder::log_parser::{try_parse_stream, StreamKind};
/// let line = "    Stream #0:1(und): Audio: aac (LC) (mp4a / 0x6134706D), 44100 Hz, stereo, fltp, 128 kb/s (default)";
/// let stream = try_parse_stream(line).unwrap();
/// assert_eq!(stream.kind, StreamKind::Audio);
/// assert!(stream.specification.starts_with("aac (LC)"));
///
/// assert!(try_parse_stream("    Stream #0:2(eng): Subtitle: mov_text (tx3g / 0x67337874)").is_none());
/// ```
pub fn try_parse_stream(string: &str) -> Option<StreamLine> {
  let caps = STREAM.captures(string)?;
  let kind = match caps[1].to_ascii_lowercase().as_str() {
    "video" => StreamKind::Video,
    "audio" => StreamKind::Audio,
    _ => StreamKind::Data,
  };
  Some(StreamLine {
    kind,
    specification: caps[2].trim_end().to_string(),
  })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VideoToken {
  Size(VideoSize),
  FrameRate(f32),
  BitRate(u32),
}

/// Classify one comma-separated token of a video specification. Patterns
/// are tried in the order size, frame rate, bit rate; the first match wins.
///
/// ```rust
/// use ffmpeg_encoder::log_parser::{classify_video_token, VideoToken};
/// use ffmpeg_encoder::media_info::VideoSize;
/// assert_eq!(classify_video_token("640x480 [SAR 1:1 DAR 4:3]"), Some(VideoToken::Size(VideoSize::new(640, 480))));
/// assert_eq!(classify_video_token("29.97 fps"), Some(VideoToken::FrameRate(29.97)));
/// assert_eq!(classify_video_token("512 kb/s"), Some(VideoToken::BitRate(512)));
/// assert_eq!(classify_video_token("yuv420p"), None);
/// ```
pub fn classify_video_token(token: &str) -> Option<VideoToken> {
  if let Some(caps) = SIZE.captures(token) {
    if let (Ok(width), Ok(height)) = (caps[1].parse(), caps[2].parse()) {
      return Some(VideoToken::Size(VideoSize::new(width, height)));
    }
  }
  if let Some(caps) = FRAME_RATE.captures(token) {
    if let Ok(fps) = caps[1].parse() {
      return Some(VideoToken::FrameRate(fps));
    }
  }
  BIT_RATE
    .captures(token)
    .and_then(|caps| caps[1].parse().ok())
    .map(VideoToken::BitRate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioToken {
  SamplingRate(u32),
  Channels(u8),
  BitRate(u32),
}

/// Classify one comma-separated token of an audio specification. Patterns
/// are tried in the order sampling rate, channels, bit rate.
///
/// ```rust
/// use ffmpeg_encoder::log_parser::{classify_audio_token, AudioToken};
/// assert_eq!(classify_audio_token("44100 Hz"), Some(AudioToken::SamplingRate(44100)));
/// assert_eq!(classify_audio_token("Stereo"), Some(AudioToken::Channels(2)));
/// assert_eq!(classify_audio_token("128 kb/s (default)"), Some(AudioToken::BitRate(128)));
/// assert_eq!(classify_audio_token("5.1(side)"), None);
/// ```
pub fn classify_audio_token(token: &str) -> Option<AudioToken> {
  if let Some(rate) = SAMPLING_RATE
    .captures(token)
    .and_then(|caps| caps[1].parse().ok())
  {
    return Some(AudioToken::SamplingRate(rate));
  }
  if let Some(caps) = CHANNELS.captures(token) {
    let channels = if caps[1].eq_ignore_ascii_case("mono") {
      1
    } else {
      2
    };
    return Some(AudioToken::Channels(channels));
  }
  BIT_RATE
    .captures(token)
    .and_then(|caps| caps[1].parse().ok())
    .map(AudioToken::BitRate)
}

/// Non-empty, trimmed tokens of a specification tail.
fn spec_tokens(specification: &str) -> impl Iterator<Item = &str> {
  CommaIter::new(specification)
    .map(str::trim)
    .filter(|token| !token.is_empty())
}

/// Build a [`VideoTrack`] from the tail of a `Video:` stream line. The first
/// token is the decoder; a later token of the same category overrides an
/// earlier one.
pub fn parse_video_specification(specification: &str) -> VideoTrack {
  let mut tokens = spec_tokens(specification);
  let mut track = VideoTrack {
    decoder: tokens.next().unwrap_or_default().to_string(),
    ..Default::default()
  };
  for token in tokens {
    match classify_video_token(token) {
      Some(VideoToken::Size(size)) => track.size = Some(size),
      Some(VideoToken::FrameRate(fps)) => track.frame_rate = Some(fps),
      Some(VideoToken::BitRate(kbps)) => track.bit_rate_kbps = Some(kbps),
      None => {}
    }
  }
  track
}

/// Build an [`AudioTrack`] from the tail of an `Audio:` stream line.
pub fn parse_audio_specification(specification: &str) -> AudioTrack {
  let mut tokens = spec_tokens(specification);
  let mut track = AudioTrack {
    decoder: tokens.next().unwrap_or_default().to_string(),
    ..Default::default()
  };
  for token in tokens {
    match classify_audio_token(token) {
      Some(AudioToken::SamplingRate(hz)) => track.sampling_rate = Some(hz),
      Some(AudioToken::Channels(n)) => track.channels = Some(n),
      Some(AudioToken::BitRate(kbps)) => track.bit_rate_kbps = Some(kbps),
      None => {}
    }
  }
  track
}

/// Extract the value of a `creation_time : <value>` metadata line.
///
/// ```rust
/// use ffmpeg_encoder::log_parser::try_parse_creation_time;
/// let line = "    creation_time   : 2023-05-01T10:00:00.000000Z";
/// assert_eq!(try_parse_creation_time(line), Some("2023-05-01T10:00:00.000000Z"));
/// assert_eq!(try_parse_creation_time("    handler_name    : SoundHandler"), None);
/// ```
pub fn try_parse_creation_time(string: &str) -> Option<&str> {
  if !string.contains("creation_time") {
    return None;
  }
  let mut parts = string.split(" :");
  let (_key, value) = (parts.next()?, parts.next()?);
  if parts.next().is_some() {
    return None;
  }
  let value = value.trim();
  (!value.is_empty()).then_some(value)
}

/// The `key=value` pairs of a progress line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressLine {
  pub values: HashMap<String, String>,
}

impl ProgressLine {
  pub fn get(&self, key: &str) -> Option<&str> {
    self.values.get(key).map(String::as_str)
  }

  /// Elapsed encoded time in milliseconds, from the `time` key.
  pub fn time_ms(&self) -> Option<u64> {
    self.get("time").and_then(parse_progress_time)
  }

  pub fn frame(&self) -> Option<u64> {
    self.get("frame").and_then(|s| s.parse().ok())
  }

  pub fn fps(&self) -> Option<f32> {
    self.get("fps").and_then(|s| s.parse().ok())
  }

  /// Parsed from e.g. `speed=79.2x`. `N/A` yields `None`.
  pub fn speed(&self) -> Option<f32> {
    self
      .get("speed")
      .and_then(|s| s.strip_suffix('x'))
      .and_then(|s| s.parse().ok())
  }

  /// Parsed from e.g. `bitrate=38.2kbits/s`.
  pub fn bitrate_kbps(&self) -> Option<f32> {
    self
      .get("bitrate")
      .and_then(|s| s.strip_suffix("kbits/s"))
      .and_then(|s| s.parse().ok())
  }
}

/// Parse a line made of `key=value` pairs. Any single pair is enough for the
/// line to count as a progress line; repeated keys keep the last value.
///
/// ```rust
/// use ffmpeg_encoder::log_parser::try_parse_progress;
/// let line = "frame=  120 fps= 30 q=28.0 size=     256kB time=00:00:04.00 bitrate= 524.3kbits/s speed=1.99x";
/// let progress = try_parse_progress(line).unwrap();
/// assert_eq!(progress.get("frame"), Some("120"));
/// assert_eq!(progress.time_ms(), Some(4_000));
/// assert_eq!(progress.speed(), Some(1.99));
///
/// assert!(try_parse_progress("Press [q] to stop, [?] for help").is_none());
/// ```
pub fn try_parse_progress(string: &str) -> Option<ProgressLine> {
  let values: HashMap<String, String> = PROGRESS_PAIR
    .captures_iter(string)
    .map(|caps| (caps[1].to_string(), caps[2].to_string()))
    .collect();
  match values.is_empty() {
    true => None,
    false => Some(ProgressLine { values }),
  }
}

/// Whether `string` is ffmpeg's closing muxing summary, the benign last line
/// of a successful run.
///
/// ```rust
/// use ffmpeg_encoder::log_parser::is_success_summary;
/// assert!(is_success_summary("video:120kB audio:45kB global headers:0kB muxing overhead: 0.1%"));
/// assert!(is_success_summary("[out#0/mp4 @ 0x600] video:120KiB audio:45KiB subtitle:0KiB other streams:0KiB global headers:0KiB muxing overhead: 0.1%"));
/// assert!(!is_success_summary("Conversion failed!"));
/// ```
pub fn is_success_summary(string: &str) -> bool {
  SUCCESS_SUMMARY.is_match(string)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_container_header_variants() {
    assert_eq!(
      try_parse_container_header("Input #0, wav, from '/tmp/a.wav':").as_deref(),
      Some("wav")
    );
    assert_eq!(
      try_parse_container_header("input #0, MATROSKA,webm, from 'x.mkv':").as_deref(),
      Some("MATROSKA")
    );
    assert_eq!(try_parse_container_header("Output #0, mp4, to 'x.mp4':"), None);
  }

  #[test]
  fn test_duration_tenths_only() {
    assert_eq!(
      try_parse_duration("  Duration: 00:00:10.04, start: 0.000000, bitrate: 1205 kb/s"),
      Some(DurationLine::Millis(10_000))
    );
    assert_eq!(
      try_parse_duration("  Duration: 100:00:00.90"),
      Some(DurationLine::Millis(360_000_900))
    );
    assert_eq!(try_parse_duration("  Duration: soon"), None);
  }

  #[test]
  fn test_oversized_duration_is_unknown() {
    assert_eq!(
      try_parse_duration("  Duration: 99999999999999:00:00.0, start: 0"),
      Some(DurationLine::NotAvailable)
    );
    assert_eq!(
      try_parse_duration("  Duration: 99999999999999999999:00:00.0, start: 0"),
      Some(DurationLine::NotAvailable)
    );
  }

  #[test]
  fn test_oversized_progress_time_has_no_millis() {
    let line = try_parse_progress("frame=1 time=9999999999999999:00:00.00 bitrate=N/A").unwrap();
    assert_eq!(line.time_ms(), None);
    assert_eq!(line.frame(), Some(1));
  }

  #[test]
  fn test_stream_kinds() {
    let video = try_parse_stream(
      "    Stream #0:0(und): Video: h264 (High) (avc1 / 0x31637661), yuv420p, 640x480, 1073 kb/s, 29.97 fps",
    )
    .unwrap();
    assert_eq!(video.kind, StreamKind::Video);

    let data = try_parse_stream("    Stream #0:2(eng): Data: none (tmcd / 0x64636D74)").unwrap();
    assert_eq!(data.kind, StreamKind::Data);
    assert_eq!(data.specification, "none (tmcd / 0x64636D74)");
  }

  #[test]
  fn test_video_specification() {
    let track = parse_video_specification(
      "h264 (High) (avc1 / 0x31637661), yuv420p(tv, bt709), 640x480 [SAR 1:1 DAR 4:3], 1073 kb/s, 29.97 fps, 29.97 tbr, 30k tbn, 59.94 tbc (default)",
    );
    assert_eq!(track.decoder, "h264 (High) (avc1 / 0x31637661)");
    assert_eq!(track.size, Some(VideoSize::new(640, 480)));
    assert_eq!(track.bit_rate_kbps, Some(1073));
    assert_eq!(track.frame_rate, Some(29.97));
  }

  #[test]
  fn test_legacy_frame_rate_notation() {
    let track = parse_video_specification("mpeg4, yuv420p, 320x240, 25.00 tb(r)");
    assert_eq!(track.frame_rate, Some(25.0));
  }

  #[test]
  fn test_size_wins_over_other_patterns() {
    // a token that could match several categories resolves to the first
    assert_eq!(
      classify_video_token("640x480 30 fps 512 kb/s"),
      Some(VideoToken::Size(VideoSize::new(640, 480)))
    );
    assert_eq!(
      classify_video_token("30 fps 512 kb/s"),
      Some(VideoToken::FrameRate(30.0))
    );
  }

  #[test]
  fn test_audio_specification() {
    let track =
      parse_audio_specification("aac (LC) (mp4a / 0x6134706D), 44100 Hz, stereo, fltp, 128 kb/s (default)");
    assert_eq!(track.decoder, "aac (LC) (mp4a / 0x6134706D)");
    assert_eq!(track.sampling_rate, Some(44100));
    assert_eq!(track.channels, Some(2));
    assert_eq!(track.bit_rate_kbps, Some(128));

    let mono = parse_audio_specification("pcm_s16le ([1][0][0][0] / 0x0001), 8000 Hz, mono, s16, 128 kb/s");
    assert_eq!(mono.channels, Some(1));
  }

  #[test]
  fn test_creation_time_needs_single_separator() {
    assert_eq!(try_parse_creation_time("    creation_time   :"), None);
    assert_eq!(
      try_parse_creation_time("creation_time : a : b"),
      None,
      "ambiguous value"
    );
    assert_eq!(
      try_parse_creation_time("      creation_time   : 2015-03-12 09:50:11"),
      Some("2015-03-12 09:50:11")
    );
  }

  #[test]
  fn test_progress_last_key_wins() {
    let progress = try_parse_progress("time=00:00:01.00 time=00:00:02.00").unwrap();
    assert_eq!(progress.time_ms(), Some(2_000));
  }

  #[test]
  fn test_progress_na_fields() {
    let progress =
      try_parse_progress("frame=    0 fps=0.0 q=0.0 size=       0kB time=00:00:00.00 bitrate=N/A speed=N/A")
        .unwrap();
    assert_eq!(progress.frame(), Some(0));
    assert_eq!(progress.fps(), Some(0.0));
    assert_eq!(progress.bitrate_kbps(), None);
    assert_eq!(progress.speed(), None);
  }

  #[test]
  fn test_success_summary() {
    assert!(is_success_summary(
      "video:120kB audio:45kB global headers:0kB muxing overhead: 0.1%"
    ));
    assert!(is_success_summary(
      "VIDEO:0kB AUDIO:172kB global headers:0kB muxing overhead: 0.066866%"
    ));
    assert!(!is_success_summary("video:120kB audio:45kB"));
    assert!(!is_success_summary("Error while opening encoder for output stream #0:0"));
  }
}
