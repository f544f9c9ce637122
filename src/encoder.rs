use std::{
  ffi::OsString,
  io::{self, BufReader},
  path::Path,
  process::Stdio,
};

use anyhow::Context;
use log::{debug, warn};

use crate::{
  attributes::{AudioAttributes, EncodingAttributes},
  capabilities::{codec_names, format_names, parse_codecs, parse_formats, CodecKind},
  child::FfmpegChild,
  command::FfmpegCommand,
  error::Result,
  event::EncoderEvent,
  info_parser::{HandoffRule, MediaInfoParser},
  line_reader::{DiagnosticLines, PushbackReader},
  media_info::MediaInfo,
  paths::ffmpeg_path,
  progress::{ErrorPolicy, ProgressTracker, TrackerOutcome},
};

/// Runs ffmpeg jobs and follows them through their diagnostic output.
///
/// Every operation spawns one ffmpeg process, reads its stderr on a
/// dedicated thread and blocks until the process is reaped. A failure kills
/// the process before returning.
///
/// ```no_run
/// use std::path::Path;
/// use ffmpeg_encoder::{encoder::Encoder, event::EncoderEvent, presets};
///
/// let attrs = presets::audio_conversion("mp3");
/// Encoder::new()
///   .encode(Path::new("in.wav"), Path::new("out.mp3"), &attrs, |event| {
///     if let EncoderEvent::Progress(progress) = event {
///       println!("{:?}", progress.permille);
///     }
///   })
///   .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Encoder {
  exe: OsString,
  handoff_rule: HandoffRule,
  policy: ErrorPolicy,
}

impl Encoder {
  /// Uses the executable found by [`ffmpeg_path`] with strict checking.
  pub fn new() -> Self {
    Self::with_exe(ffmpeg_path())
  }

  /// An encoder that copes with newer ffmpeg builds: hands off after the
  /// input tracks and tolerates banner deviations and failing last lines.
  pub fn lenient() -> Self {
    Self::new()
      .handoff_rule(HandoffRule::TracksComplete)
      .error_policy(ErrorPolicy::Tolerant)
  }

  pub fn with_exe<S: Into<OsString>>(exe: S) -> Self {
    Self {
      exe: exe.into(),
      handoff_rule: HandoffRule::default(),
      policy: ErrorPolicy::default(),
    }
  }

  pub fn handoff_rule(mut self, rule: HandoffRule) -> Self {
    self.handoff_rule = rule;
    self
  }

  pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
    self.policy = policy;
    self
  }

  fn command(&self) -> FfmpegCommand {
    FfmpegCommand::new_with_exe(&self.exe)
  }

  fn tracker(&self) -> ProgressTracker {
    ProgressTracker::new()
      .handoff_rule(self.handoff_rule)
      .error_policy(self.policy)
  }

  //// Media info

  /// Describe `source` without producing any output.
  pub fn info(&self, source: &Path) -> Result<MediaInfo> {
    let mut command = self.command();
    command.input(source);
    let mut child = command.spawn()?;
    let mut reader = PushbackReader::new(child.diagnostic_stream()?);

    let result = MediaInfoParser::new()
      .with_source(source)
      .handoff_rule(self.handoff_rule)
      .parse(&mut reader);
    // ffmpeg exits by itself without an output file; the rest is not needed
    kill(&mut child);
    reader.into_inner().join();
    reap(&mut child, result)
  }

  /// Run `volumedetect` over the audio of `source`. The returned audio track
  /// carries the measurement.
  pub fn volume_detect(&self, source: &Path) -> Result<MediaInfo> {
    let attrs = EncodingAttributes {
      format: Some("null".to_string()),
      audio: Some(AudioAttributes {
        filter_complex: Some("volumedetect".to_string()),
        ..Default::default()
      }),
      ..Default::default()
    };
    let mut command = self.command();
    command.encode_args(source, Path::new("-"), &attrs)?;
    let tracker = self.tracker().with_source(source).detect_volume(true);
    let TrackerOutcome { mut info, volume } = self.run(command, tracker, |_| {})?;
    match info.audio.as_mut() {
      Some(audio) => audio.volume = volume,
      None => warn!("No audio track in {}, volume not reported", source.display()),
    }
    Ok(info)
  }

  //// Encoding

  /// Transcode `source` into `target`, returning the source's media info.
  ///
  /// `on_event` receives the source info first, then progress and messages
  /// as ffmpeg reports them.
  pub fn encode<F>(
    &self,
    source: &Path,
    target: &Path,
    attrs: &EncodingAttributes,
    on_event: F,
  ) -> Result<MediaInfo>
  where
    F: FnMut(EncoderEvent),
  {
    let mut command = self.command();
    command.encode_args(source, target, attrs)?;
    let tracker = self
      .tracker()
      .with_source(source)
      .target_duration_ms(attrs.duration_ms())
      .start_offset_ms(attrs.offset_ms());
    Ok(self.run(command, tracker, on_event)?.info)
  }

  /// Join or mix audio files; see [`FfmpegCommand::merge_audio_args`].
  pub fn merge_audio<P, F>(
    &self,
    sources: &[P],
    target: &Path,
    attrs: &EncodingAttributes,
    on_event: F,
  ) -> Result<MediaInfo>
  where
    P: AsRef<Path>,
    F: FnMut(EncoderEvent),
  {
    let mut command = self.command();
    command.merge_audio_args(sources, target, attrs)?;
    Ok(self.run(command, self.merge_tracker(attrs), on_event)?.info)
  }

  /// See [`FfmpegCommand::merge_video_and_audio_args`].
  pub fn merge_video_and_audio<P, F>(
    &self,
    sources: &[P],
    target: &Path,
    attrs: &EncodingAttributes,
    on_event: F,
  ) -> Result<MediaInfo>
  where
    P: AsRef<Path>,
    F: FnMut(EncoderEvent),
  {
    let mut command = self.command();
    command.merge_video_and_audio_args(sources, target, attrs)?;
    Ok(self.run(command, self.merge_tracker(attrs), on_event)?.info)
  }

  /// See [`FfmpegCommand::merge_video_reencode_args`].
  pub fn merge_video_reencode<P, F>(
    &self,
    sources: &[P],
    target: &Path,
    attrs: &EncodingAttributes,
    on_event: F,
  ) -> Result<MediaInfo>
  where
    P: AsRef<Path>,
    F: FnMut(EncoderEvent),
  {
    let mut command = self.command();
    command.merge_video_reencode_args(sources, target, attrs)?;
    Ok(self.run(command, self.merge_tracker(attrs), on_event)?.info)
  }

  /// See [`FfmpegCommand::merge_video_lossless_args`].
  pub fn merge_video_lossless<F>(
    &self,
    list: &Path,
    target: &Path,
    attrs: &EncodingAttributes,
    on_event: F,
  ) -> Result<MediaInfo>
  where
    F: FnMut(EncoderEvent),
  {
    let mut command = self.command();
    command.merge_video_lossless_args(list, target, attrs)?;
    Ok(self.run(command, self.merge_tracker(attrs), on_event)?.info)
  }

  /// Merges print an `Input #N` section per source, which the single-input
  /// banner sequence does not allow for, so they always run tolerant.
  /// Sources are not checked for path errors.
  fn merge_tracker(&self, attrs: &EncodingAttributes) -> ProgressTracker {
    self
      .tracker()
      .error_policy(ErrorPolicy::Tolerant)
      .target_duration_ms(attrs.duration_ms())
      .start_offset_ms(attrs.offset_ms())
  }

  fn run<F>(
    &self,
    mut command: FfmpegCommand,
    tracker: ProgressTracker,
    on_event: F,
  ) -> Result<TrackerOutcome>
  where
    F: FnMut(EncoderEvent),
  {
    let mut child = command.spawn()?;
    let stream = match child.diagnostic_stream() {
      Ok(stream) => stream,
      Err(e) => {
        kill(&mut child);
        return reap(&mut child, Err(e.into()));
      }
    };
    let mut reader = PushbackReader::new(stream);
    let result = tracker.run(&mut reader, on_event);
    if result.is_err() {
      kill(&mut child);
    }
    reader.into_inner().join();
    reap(&mut child, result)
  }

  //// Capabilities

  /// Formats ffmpeg can read.
  pub fn supported_decoding_formats(&self) -> Result<Vec<String>> {
    let formats = parse_formats(self.listing(FfmpegCommand::list_formats)?);
    Ok(format_names(&formats, |format| format.demux))
  }

  /// Formats ffmpeg can write.
  pub fn supported_encoding_formats(&self) -> Result<Vec<String>> {
    let formats = parse_formats(self.listing(FfmpegCommand::list_formats)?);
    Ok(format_names(&formats, |format| format.mux))
  }

  pub fn audio_decoders(&self) -> Result<Vec<String>> {
    self.codecs(CodecKind::Audio, false)
  }

  pub fn audio_encoders(&self) -> Result<Vec<String>> {
    self.codecs(CodecKind::Audio, true)
  }

  pub fn video_decoders(&self) -> Result<Vec<String>> {
    self.codecs(CodecKind::Video, false)
  }

  pub fn video_encoders(&self) -> Result<Vec<String>> {
    self.codecs(CodecKind::Video, true)
  }

  fn codecs(&self, kind: CodecKind, encoders: bool) -> Result<Vec<String>> {
    let codecs = parse_codecs(self.listing(FfmpegCommand::list_codecs)?);
    Ok(codec_names(&codecs, kind, |codec| {
      if encoders {
        codec.encode
      } else {
        codec.decode
      }
    }))
  }

  /// Run a listing command and collect its stdout.
  fn listing(&self, list: fn(&mut FfmpegCommand) -> &mut FfmpegCommand) -> Result<Vec<String>> {
    let mut command = self.command();
    list(command.hide_banner());
    command
      .as_inner_mut()
      .stdout(Stdio::piped())
      .stderr(Stdio::null());
    let mut child = command.spawn()?;
    let stdout = child
      .take_stdout()
      .context("No stdout channel for the ffmpeg listing")?;
    let lines = DiagnosticLines::new(BufReader::new(stdout)).collect::<io::Result<Vec<_>>>();
    reap(&mut child, lines.map_err(Into::into))
  }
}

impl Default for Encoder {
  fn default() -> Self {
    Self::new()
  }
}

fn kill(child: &mut FfmpegChild) {
  if let Err(e) = child.kill() {
    warn!("Failed to kill ffmpeg: {e}");
  }
}

/// Wait for `child`, preferring the run's own error over a failed wait.
fn reap<T>(child: &mut FfmpegChild, result: Result<T>) -> Result<T> {
  let status = child.wait();
  let value = result?;
  let status = status?;
  if !status.success() {
    debug!("ffmpeg exit status ignored: {status}");
  }
  Ok(value)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::EncoderError;

  const MISSING_EXE: &str = "/nonexistent/bin/ffmpeg";

  #[test]
  fn test_lenient_configuration() {
    let encoder = Encoder::lenient();
    assert_eq!(encoder.handoff_rule, HandoffRule::TracksComplete);
    assert_eq!(encoder.policy, ErrorPolicy::Tolerant);

    let strict = Encoder::with_exe("ffmpeg");
    assert_eq!(strict.handoff_rule, HandoffRule::CreationTimes);
    assert_eq!(strict.policy, ErrorPolicy::FailFast);
  }

  #[test]
  fn test_invalid_attributes_fail_before_spawning() {
    // would be an io error if ffmpeg were spawned
    let err = Encoder::with_exe(MISSING_EXE)
      .encode(
        Path::new("in.mp4"),
        Path::new("out.mp4"),
        &EncodingAttributes::default(),
        |_| {},
      )
      .unwrap_err();
    assert!(matches!(err, EncoderError::InvalidAttributes(_)));

    let err = Encoder::with_exe(MISSING_EXE)
      .merge_video_lossless(
        Path::new("list.csv"),
        Path::new("out.mp4"),
        &EncodingAttributes {
          video: Some(Default::default()),
          ..Default::default()
        },
        |_| {},
      )
      .unwrap_err();
    assert!(matches!(err, EncoderError::InvalidAttributes(_)));
  }

  #[test]
  fn test_missing_executable_is_io_error() {
    let encoder = Encoder::with_exe(MISSING_EXE);
    let err = encoder.info(Path::new("in.mp4")).unwrap_err();
    assert!(matches!(err, EncoderError::Io(_)));
    assert!(matches!(
      encoder.supported_decoding_formats(),
      Err(EncoderError::Io(_))
    ));
  }
}
