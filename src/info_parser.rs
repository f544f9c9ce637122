//! The first phase of every ffmpeg run: reading what ffmpeg says about its
//! input before any output is produced.

use std::{io, path::Path};

use log::{debug, trace, warn};

use crate::{
  error::{EncoderError, Result},
  line_reader::PushbackReader,
  log_parser::{
    parse_audio_specification, parse_video_specification, try_parse_container_header,
    try_parse_creation_time, try_parse_duration, try_parse_stream, DurationLine, StreamKind,
  },
  media_info::{AudioTrack, MediaInfo, VideoTrack},
  state::ParseState,
  time::creation_time_to_local,
};

/// When the info phase ends and the remaining lines belong to the encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandoffRule {
  /// Hand off once a video track and an audio track were seen and exactly
  /// three `creation_time` values were captured (container, video, audio).
  ///
  /// Sources without all three timestamps, or without both track kinds,
  /// never hand off under this rule and are read to end of stream.
  #[default]
  CreationTimes,
  /// Like [`CreationTimes`](Self::CreationTimes), but also hand off at the
  /// first non-blank, non-indented, non-stream line once at least one audio
  /// or video track was seen.
  TracksComplete,
}

/// Which entity a `creation_time` line belongs to: the one opened last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreationTarget {
  Container,
  Video,
  Audio,
  /// Data streams and any track after the first of its kind.
  Other,
}

/// Reads stages 0 to 2 of a diagnostic stream into a [`MediaInfo`].
///
/// ```rust
/// use ffmpeg_encoder::info_parser::MediaInfoParser;
/// use ffmpeg_encoder::line_reader::{DiagnosticLines, PushbackReader};
///
/// let stderr = "Input #0, wav, from 'tone.wav':\n  Duration: 00:00:02.00, bitrate: 1411 kb/s\n    Stream #0:0: Audio: pcm_s16le ([1][0][0][0] / 0x0001), 44100 Hz, stereo, s16, 1411 kb/s\n";
/// let mut reader = PushbackReader::new(DiagnosticLines::new(stderr.as_bytes()));
/// let info = MediaInfoParser::new().parse(&mut reader).unwrap();
///
/// assert_eq!(info.format, "wav");
/// assert_eq!(info.duration_ms, Some(2_000));
/// assert_eq!(info.audio.unwrap().sampling_rate, Some(44_100));
/// ```
#[derive(Debug, Default)]
pub struct MediaInfoParser {
  source_prefix: Option<String>,
  handoff_rule: HandoffRule,
  state: ParseState,
  info: Option<MediaInfo>,
  video: Option<VideoTrack>,
  audio: Option<AudioTrack>,
  creation_count: usize,
  creations: Vec<(CreationTarget, Option<String>)>,
}

impl MediaInfoParser {
  pub fn new() -> Self {
    Self::default()
  }

  /// Path the source was passed to ffmpeg as. A line `<path>: <reason>` seen
  /// before the input header then fails with [`EncoderError::InputFormat`].
  pub fn with_source<P: AsRef<Path>>(mut self, path: P) -> Self {
    self.source_prefix = Some(format!("{}: ", path.as_ref().display()));
    self
  }

  pub fn handoff_rule(mut self, rule: HandoffRule) -> Self {
    self.handoff_rule = rule;
    self
  }

  pub fn state(&self) -> ParseState {
    self.state
  }

  /// Whether parsing stopped at the handoff line rather than at end of stream.
  pub fn handed_off(&self) -> bool {
    self.state.is_handed_off()
  }

  /// Consume lines until the handoff rule fires or the stream ends.
  ///
  /// On handoff the triggering line is pushed back onto `reader`, so the
  /// next read returns it.
  pub fn parse<I>(&mut self, reader: &mut PushbackReader<I>) -> Result<MediaInfo>
  where
    I: Iterator<Item = io::Result<String>>,
  {
    while let Some(line) = reader.read_line()? {
      trace!("[stage {}] {line}", self.state.stage());
      self.handle_line(&line)?;
      if self.handed_off() {
        debug!("Media info complete, handing off at: {line}");
        reader.push_back(line)?;
        break;
      }
      self.observe_creation_time(&line);
    }
    self.finish()
  }

  /// Runs every handler whose state is current. A line that completes one
  /// stage is also offered to the next.
  fn handle_line(&mut self, line: &str) -> Result<()> {
    if self.state == ParseState::AwaitContainerHeader {
      self.await_container_header(line)?;
    }
    if self.state == ParseState::AwaitDuration {
      self.await_duration(line);
    }
    if self.state == ParseState::AwaitTracks {
      self.await_tracks(line);
    }
    Ok(())
  }

  fn await_container_header(&mut self, line: &str) -> Result<()> {
    if let Some(message) = self
      .source_prefix
      .as_deref()
      .and_then(|prefix| line.strip_prefix(prefix))
    {
      return Err(EncoderError::InputFormat(Some(message.to_string())));
    }
    if let Some(format) = try_parse_container_header(line) {
      debug!("Input container: {format}");
      self.info = Some(MediaInfo::new(format));
      self.creations.push((CreationTarget::Container, None));
      self.advance(ParseState::AwaitDuration);
    }
    Ok(())
  }

  fn await_duration(&mut self, line: &str) {
    let Some(duration) = try_parse_duration(line) else {
      return;
    };
    if let (Some(info), DurationLine::Millis(ms)) = (self.info.as_mut(), duration) {
      info.duration_ms = Some(ms);
    }
    self.advance(ParseState::AwaitTracks);
  }

  fn await_tracks(&mut self, line: &str) {
    let stream = try_parse_stream(line);
    if let Some(stream) = &stream {
      let target = match stream.kind {
        StreamKind::Video if self.video.is_none() => {
          self.video = Some(parse_video_specification(&stream.specification));
          CreationTarget::Video
        }
        StreamKind::Audio if self.audio.is_none() => {
          self.audio = Some(parse_audio_specification(&stream.specification));
          CreationTarget::Audio
        }
        _ => CreationTarget::Other,
      };
      self.creations.push((target, None));
    }

    if self.creation_gate_open() || (stream.is_none() && self.input_section_closed(line)) {
      self.assign_creation_times();
      self.advance(ParseState::AwaitOutputBanner);
    }
  }

  fn creation_gate_open(&self) -> bool {
    self.video.is_some() && self.audio.is_some() && self.creation_count == 3
  }

  fn input_section_closed(&self, line: &str) -> bool {
    self.handoff_rule == HandoffRule::TracksComplete
      && (self.video.is_some() || self.audio.is_some())
      && !line.trim().is_empty()
      && !line.starts_with(char::is_whitespace)
  }

  fn observe_creation_time(&mut self, line: &str) {
    let Some(value) = try_parse_creation_time(line) else {
      return;
    };
    // metadata printed before the input header has nobody to belong to
    let Some((_, pending)) = self.creations.last_mut() else {
      return;
    };
    *pending = Some(value.to_string());
    self.creation_count += 1;
  }

  fn assign_creation_times(&mut self) {
    for (target, value) in self.creations.drain(..) {
      let Some(value) = value else { continue };
      let Some(local) = creation_time_to_local(&value) else {
        warn!("Unparsable creation_time: {value}");
        continue;
      };
      match target {
        CreationTarget::Container => {
          if let Some(info) = self.info.as_mut() {
            info.creation_time = Some(local);
          }
        }
        CreationTarget::Video => {
          if let Some(video) = self.video.as_mut() {
            video.creation_time = Some(local);
          }
        }
        CreationTarget::Audio => {
          if let Some(audio) = self.audio.as_mut() {
            audio.creation_time = Some(local);
          }
        }
        CreationTarget::Other => {}
      }
    }
  }

  fn advance(&mut self, next: ParseState) {
    debug!(
      "Parse state {:?} -> {:?} (stage {} -> {})",
      self.state,
      next,
      self.state.stage(),
      next.stage()
    );
    self.state = next;
  }

  fn finish(&mut self) -> Result<MediaInfo> {
    self.assign_creation_times();
    let mut info = self.info.take().ok_or(EncoderError::InputFormat(None))?;
    info.video = self.video.take();
    info.audio = self.audio.take();
    Ok(info)
  }
}
