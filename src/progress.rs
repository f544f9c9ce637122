//! The second phase of an encode: interpreting ffmpeg's output banners and
//! progress lines until the process closes its stderr.

use std::{
  io,
  path::{Path, PathBuf},
};

use log::{debug, trace, warn};

use crate::{
  error::{EncoderError, Result},
  event::{EncoderEvent, ProgressEvent},
  info_parser::{HandoffRule, MediaInfoParser},
  line_reader::PushbackReader,
  log_parser::{is_success_summary, try_parse_progress, ProgressLine},
  media_info::MediaInfo,
  state::ParseState,
  time::permille,
  volume::VolumeDetect,
};

/// How strictly the output banners and the final line are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
  /// Any deviation from the expected banner sequence, and any unexplained
  /// last line, fails the run.
  #[default]
  FailFast,
  /// Deviations are forwarded as messages and logged. Suits ffmpeg builds
  /// that print `Stream mapping:` before `Output #0`.
  ///
  /// Input format and programming errors still fail.
  Tolerant,
}

/// What a successful run produced besides the events.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerOutcome {
  pub info: MediaInfo,
  /// Present when volume detection was requested and ffmpeg reported it.
  pub volume: Option<VolumeDetect>,
}

/// Follows one encode from the source info through to the final line.
///
/// ```rust
/// use ffmpeg_encoder::event::EncoderEvent;
/// use ffmpeg_encoder::info_parser::HandoffRule;
/// use ffmpeg_encoder::line_reader::{DiagnosticLines, PushbackReader};
/// use ffmpeg_encoder::progress::ProgressTracker;
///
/// let stderr = "Input #0, wav, from 'a.wav':
///   Duration: 00:00:02.00, bitrate: 1411 kb/s
///     Stream #0:0: Audio: pcm_s16le, 44100 Hz, stereo, s16, 1411 kb/s
/// Output #0, mp3, to 'a.mp3':
///     Stream #0:0: Audio: mp3 (libmp3lame), 44100 Hz, stereo, fltp
/// Stream mapping:
///   Stream #0:0 -> #0:0 (pcm_s16le (native) -> mp3 (libmp3lame))
/// size=      16kB time=00:00:01.00 bitrate= 128.0kbits/s\rsize=      32kB time=00:00:02.00 bitrate= 128.0kbits/s
/// video:0kB audio:32kB global headers:0kB muxing overhead: 0.2%
/// ";
/// let mut reader = PushbackReader::new(DiagnosticLines::new(stderr.as_bytes()));
/// let mut permille = Vec::new();
/// ProgressTracker::new()
///   .handoff_rule(HandoffRule::TracksComplete) // no creation times in a wav
///   .run(&mut reader, |event| {
///     if let EncoderEvent::Progress(p) = event {
///       permille.push(p.permille);
///     }
///   })
///   .unwrap();
/// assert_eq!(permille, [Some(500), Some(1000)]);
/// ```
#[derive(Debug, Default)]
pub struct ProgressTracker {
  source: Option<PathBuf>,
  handoff_rule: HandoffRule,
  policy: ErrorPolicy,
  target_duration_ms: Option<u64>,
  start_offset_ms: u64,
  detect_volume: bool,

  state: ParseState,
  target_ms: Option<u64>,
  last_line: Option<String>,
  last_unclassified: Option<String>,
  volume: Option<VolumeDetect>,
}

impl ProgressTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// See [`MediaInfoParser::with_source`].
  pub fn with_source<P: AsRef<Path>>(mut self, path: P) -> Self {
    self.source = Some(path.as_ref().to_path_buf());
    self
  }

  pub fn handoff_rule(mut self, rule: HandoffRule) -> Self {
    self.handoff_rule = rule;
    self
  }

  pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Length of the output, when it differs from the source (e.g. `-t`).
  pub fn target_duration_ms(mut self, target: Option<u64>) -> Self {
    self.target_duration_ms = target;
    self
  }

  /// Amount skipped at the start of the source (`-ss`). Subtracted from the
  /// source duration when no explicit target is set.
  pub fn start_offset_ms(mut self, offset: u64) -> Self {
    self.start_offset_ms = offset;
    self
  }

  /// Collect `volumedetect` filter output instead of treating it as
  /// unclassified text.
  pub fn detect_volume(mut self, enabled: bool) -> Self {
    self.detect_volume = enabled;
    self
  }

  /// Read the whole diagnostic stream, delivering events as they happen.
  ///
  /// The first event is always [`EncoderEvent::SourceInfo`]. If the input
  /// section never hands off, it is followed by an [`UNTRACKED_RUN`] message
  /// and the run ends without progress.
  pub fn run<I, F>(mut self, reader: &mut PushbackReader<I>, mut on_event: F) -> Result<TrackerOutcome>
  where
    I: Iterator<Item = io::Result<String>>,
    F: FnMut(EncoderEvent),
  {
    let mut parser = MediaInfoParser::new().handoff_rule(self.handoff_rule);
    if let Some(source) = &self.source {
      parser = parser.with_source(source);
    }
    let info = parser.parse(reader)?;
    on_event(EncoderEvent::SourceInfo(info.clone()));

    self.target_ms = self.target_duration_ms.or_else(|| {
      info
        .duration_ms
        .map(|duration| duration.saturating_sub(self.start_offset_ms))
    });
    if self.detect_volume {
      self.volume = Some(VolumeDetect::default());
    }

    if !parser.handed_off() {
      warn!("{UNTRACKED_RUN}");
      on_event(EncoderEvent::Message(UNTRACKED_RUN.to_string()));
      return Ok(self.outcome(info));
    }
    self.advance(ParseState::AwaitOutputBanner);

    while let Some(line) = reader.read_line()? {
      trace!("[stage {}] {line}", self.state.stage());
      self.handle_line(&line, &mut on_event)?;
      self.last_line = Some(line);
    }

    self.finish()?;
    Ok(self.outcome(info))
  }

  fn handle_line<F: FnMut(EncoderEvent)>(&mut self, line: &str, on_event: &mut F) -> Result<()> {
    match self.state {
      ParseState::AwaitOutputBanner => return self.await_output_banner(line, on_event),
      ParseState::OutputSection => {
        if is_indented(line) {
          return Ok(());
        }
        if line.starts_with("Stream mapping:") {
          self.advance(ParseState::StreamMapping);
          return Ok(());
        }
        if self.policy == ErrorPolicy::FailFast {
          return Err(EncoderError::UnexpectedOutput(line.to_string()));
        }
        warn!("Expected `Stream mapping:`, continuing with: {line}");
        self.advance(ParseState::Progress);
      }
      ParseState::StreamMapping => {
        if is_indented(line) {
          return Ok(());
        }
        self.advance(ParseState::Progress);
      }
      _ => {}
    }
    self.steady_state_line(line, on_event);
    Ok(())
  }

  fn await_output_banner<F: FnMut(EncoderEvent)>(&mut self, line: &str, on_event: &mut F) -> Result<()> {
    if line.starts_with("WARNING: ") {
      warn!("{line}");
      on_event(EncoderEvent::Message(line.to_string()));
    } else if line.starts_with("Output #0") {
      self.advance(ParseState::OutputSection);
    } else if self.policy == ErrorPolicy::Tolerant {
      debug!("Expected `Output #0`, forwarding: {line}");
      on_event(EncoderEvent::Message(line.to_string()));
    } else {
      return Err(EncoderError::UnexpectedOutput(line.to_string()));
    }
    Ok(())
  }

  fn steady_state_line<F: FnMut(EncoderEvent)>(&mut self, line: &str, on_event: &mut F) {
    let line = line.trim();
    if line.is_empty() {
      return;
    }
    if let Some(volume) = self.volume.as_mut() {
      if volume.observe(line) {
        on_event(EncoderEvent::Message(line.to_string()));
        return;
      }
    }

    match try_parse_progress(line) {
      Some(progress) => {
        self.last_unclassified = None;
        if let Some(event) = self.progress_event(&progress, line) {
          on_event(EncoderEvent::Progress(event));
        }
      }
      None => {
        on_event(EncoderEvent::Message(line.to_string()));
        self.last_unclassified = Some(line.to_string());
      }
    }
  }

  fn progress_event(&self, progress: &ProgressLine, line: &str) -> Option<ProgressEvent> {
    let Some(elapsed_ms) = progress.time_ms() else {
      trace!("Progress line without a usable time: {line}");
      return None;
    };
    Some(ProgressEvent {
      elapsed_ms,
      permille: self.target_ms.and_then(|target| permille(elapsed_ms, target)),
      frame: progress.frame(),
      fps: progress.fps(),
      speed: progress.speed(),
      bitrate_kbps: progress.bitrate_kbps(),
      raw_log_message: line.to_string(),
    })
  }

  fn finish(&mut self) -> Result<()> {
    if self.state != ParseState::Progress {
      let line = self
        .last_line
        .take()
        .unwrap_or_else(|| "ffmpeg output ended before encoding started".to_string());
      return self.fail(EncoderError::Encoding(line));
    }
    match self.last_unclassified.take() {
      Some(line) if !is_success_summary(&line) => self.fail(EncoderError::Encoding(line)),
      _ => {
        debug!("ffmpeg output complete");
        Ok(())
      }
    }
  }

  fn fail(&self, err: EncoderError) -> Result<()> {
    match self.policy {
      ErrorPolicy::FailFast => Err(err),
      ErrorPolicy::Tolerant => {
        warn!("Ignoring failure at end of ffmpeg output: {err}");
        Ok(())
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

  fn outcome(&mut self, info: MediaInfo) -> TrackerOutcome {
    TrackerOutcome {
      info,
      volume: self.volume.take().filter(|volume| !volume.is_empty()),
    }
  }
}

/// Reported when ffmpeg's output ends before the input section handed off.
pub const UNTRACKED_RUN: &str =
  "ffmpeg output ended during the input section, no progress was reported";

/// Continuation lines of the output and mapping sections.
fn is_indented(line: &str) -> bool {
  line.starts_with("  ")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    line_reader::DiagnosticLines,
    test::{LEGACY_SUMMARY, LEGACY_TRANSCODE, MODERN_TRANSCODE},
  };

  fn run(tracker: ProgressTracker, stderr: &str) -> (Result<TrackerOutcome>, Vec<EncoderEvent>) {
    let mut reader = PushbackReader::new(DiagnosticLines::new(stderr.as_bytes()));
    let mut events = Vec::new();
    let result = tracker.run(&mut reader, |event| events.push(event));
    (result, events)
  }

  fn progress(events: &[EncoderEvent]) -> Vec<&ProgressEvent> {
    events
      .iter()
      .filter_map(|event| match event {
        EncoderEvent::Progress(p) => Some(p),
        _ => None,
      })
      .collect()
  }

  fn messages(events: &[EncoderEvent]) -> Vec<&str> {
    events
      .iter()
      .filter_map(|event| match event {
        EncoderEvent::Message(m) => Some(m.as_str()),
        _ => None,
      })
      .collect()
  }

  #[test]
  fn test_legacy_transcode() {
    let (result, events) = run(ProgressTracker::new().with_source("/data/in.mp4"), LEGACY_TRANSCODE);
    let outcome = result.unwrap();
    assert_eq!(outcome.info.format, "mov");
    assert!(outcome.volume.is_none());

    assert!(matches!(&events[0], EncoderEvent::SourceInfo(info) if info.duration_ms == Some(10_000)));

    let progress = progress(&events);
    let elapsed: Vec<_> = progress.iter().map(|p| p.elapsed_ms).collect();
    let permille: Vec<_> = progress.iter().map(|p| p.permille).collect();
    assert_eq!(elapsed, [4_000, 10_040]);
    assert_eq!(permille, [Some(400), Some(1000)]);
    assert_eq!(progress[0].frame, Some(120));
    assert_eq!(progress[1].speed, Some(5.01));

    assert_eq!(
      messages(&events),
      ["Press [q] to stop, [?] for help", LEGACY_SUMMARY]
    );
  }

  #[test]
  fn test_trailing_failure_line() {
    let stderr = LEGACY_TRANSCODE.replace(LEGACY_SUMMARY, "Conversion failed!");
    let (result, events) = run(ProgressTracker::new(), &stderr);
    let err = result.unwrap_err();
    assert!(matches!(&err, EncoderError::Encoding(line) if line == "Conversion failed!"));
    // progress was still delivered before the failure
    assert_eq!(progress(&events).len(), 2);
  }

  #[test]
  fn test_trailing_failure_tolerated() {
    let stderr = LEGACY_TRANSCODE.replace(LEGACY_SUMMARY, "Conversion failed!");
    let (result, events) = run(
      ProgressTracker::new().error_policy(ErrorPolicy::Tolerant),
      &stderr,
    );
    assert!(result.is_ok());
    assert_eq!(messages(&events).last(), Some(&"Conversion failed!"));
  }

  #[test]
  fn test_progress_line_clears_failure() {
    let stderr = LEGACY_TRANSCODE.replace(
      LEGACY_SUMMARY,
      "Past duration 0.999992 too large\nframe=  302 time=00:00:10.04",
    );
    let (result, _) = run(ProgressTracker::new(), &stderr);
    assert!(result.is_ok());
  }

  #[test]
  fn test_unexpected_line_before_output_banner() {
    let stderr = LEGACY_TRANSCODE.replace(
      "Output #0, mp4",
      "[mp4 @ 0x7f] Could not find tag for codec\nOutput #0, mp4",
    );
    let (result, _) = run(ProgressTracker::new(), &stderr);
    let err = result.unwrap_err();
    assert_eq!(
      err.offending_line(),
      Some("[mp4 @ 0x7f] Could not find tag for codec")
    );

    let (result, events) = run(
      ProgressTracker::new().error_policy(ErrorPolicy::Tolerant),
      &stderr,
    );
    assert!(result.is_ok());
    assert_eq!(
      messages(&events)[0],
      "[mp4 @ 0x7f] Could not find tag for codec"
    );
  }

  #[test]
  fn test_warning_before_output_banner() {
    let stderr = LEGACY_TRANSCODE.replace(
      "Output #0, mp4",
      "WARNING: library configuration mismatch\nOutput #0, mp4",
    );
    let (result, events) = run(ProgressTracker::new(), &stderr);
    assert!(result.is_ok());
    assert_eq!(messages(&events)[0], "WARNING: library configuration mismatch");
  }

  #[test]
  fn test_missing_stream_mapping() {
    let stderr = LEGACY_TRANSCODE.replace("Stream mapping:", "Mapping streams:");
    let (result, _) = run(ProgressTracker::new(), &stderr);
    assert!(matches!(result, Err(EncoderError::UnexpectedOutput(line)) if line == "Mapping streams:"));

    // tolerated, the line becomes the first steady-state line
    let (result, events) = run(
      ProgressTracker::new().error_policy(ErrorPolicy::Tolerant),
      &stderr,
    );
    assert!(result.is_ok());
    assert_eq!(messages(&events)[0], "Mapping streams:");
    assert_eq!(progress(&events).len(), 2);
  }

  #[test]
  fn test_explicit_target_and_offset() {
    let (_, events) = run(
      ProgressTracker::new().start_offset_ms(2_000),
      LEGACY_TRANSCODE,
    );
    assert_eq!(progress(&events)[0].permille, Some(500));

    let (_, events) = run(
      ProgressTracker::new()
        .start_offset_ms(2_000)
        .target_duration_ms(Some(16_000)),
      LEGACY_TRANSCODE,
    );
    assert_eq!(progress(&events)[0].permille, Some(250));
  }

  #[test]
  fn test_unknown_target_still_reports_elapsed() {
    let (_, events) = run(
      ProgressTracker::new().target_duration_ms(Some(0)),
      LEGACY_TRANSCODE,
    );
    let progress = progress(&events);
    assert_eq!(progress[0].elapsed_ms, 4_000);
    assert_eq!(progress[0].permille, None);
  }

  #[test]
  fn test_end_of_stream_during_preamble() {
    let stderr = LEGACY_TRANSCODE
      .split("Stream mapping:")
      .next()
      .unwrap()
      .to_string();
    let (result, _) = run(ProgressTracker::new(), &stderr);
    assert!(matches!(result, Err(EncoderError::Encoding(_))));

    let (result, _) = run(
      ProgressTracker::new().error_policy(ErrorPolicy::Tolerant),
      &stderr,
    );
    assert!(result.is_ok());
  }

  #[test]
  fn test_modern_ffmpeg_needs_lenient_settings() {
    // no creation times: the literal rule never hands off
    let (result, events) = run(ProgressTracker::new(), MODERN_TRANSCODE);
    assert!(result.is_ok());
    assert!(progress(&events).is_empty());
    assert_eq!(messages(&events), [UNTRACKED_RUN]);
    assert!(matches!(events.last(), Some(EncoderEvent::Message(_))));

    // `Stream mapping:` comes before `Output #0`
    let (result, _) = run(
      ProgressTracker::new().handoff_rule(HandoffRule::TracksComplete),
      MODERN_TRANSCODE,
    );
    assert!(matches!(result, Err(EncoderError::UnexpectedOutput(line)) if line == "Stream mapping:"));

    let (result, events) = run(
      ProgressTracker::new()
        .handoff_rule(HandoffRule::TracksComplete)
        .error_policy(ErrorPolicy::Tolerant),
      MODERN_TRANSCODE,
    );
    let outcome = result.unwrap();
    assert_eq!(outcome.info.format, "mov");
    assert_eq!(outcome.info.duration_ms, Some(8_000));
    let permille: Vec<_> = progress(&events).iter().map(|p| p.permille).collect();
    assert_eq!(permille, [Some(0), Some(500), Some(1000)]);
  }

  #[test]
  fn test_negative_time_emits_nothing() {
    let stderr = LEGACY_TRANSCODE.replace(
      "Press [q] to stop, [?] for help",
      "frame=    0 fps=0.0 q=0.0 size=       0kB time=-577014:32:22.77 bitrate=  -0.0kbits/s speed=N/A",
    );
    let (result, events) = run(ProgressTracker::new(), &stderr);
    assert!(result.is_ok());
    assert_eq!(progress(&events).len(), 2);
    assert_eq!(messages(&events), [LEGACY_SUMMARY]);
  }

  #[test]
  fn test_oversized_time_emits_nothing() {
    let stderr = LEGACY_TRANSCODE.replace("time=00:00:04.00", "time=9999999999999999:00:00.00");
    let (result, events) = run(ProgressTracker::new(), &stderr);
    assert!(result.is_ok());
    let elapsed: Vec<_> = progress(&events).iter().map(|p| p.elapsed_ms).collect();
    assert_eq!(elapsed, [10_040]);
    assert_eq!(messages(&events), [LEGACY_SUMMARY]);
  }

  #[test]
  fn test_oversized_duration_is_unknown() {
    let stderr = LEGACY_TRANSCODE.replace("Duration: 00:00:10.04", "Duration: 99999999999999:00:00.0");
    let (result, events) = run(ProgressTracker::new(), &stderr);
    assert_eq!(result.unwrap().info.duration_ms, None);
    let permille: Vec<_> = progress(&events).iter().map(|p| p.permille).collect();
    assert_eq!(permille, [None, None]);
  }

  #[test]
  fn test_volume_detect_lines() {
    let stderr = LEGACY_TRANSCODE.replace(
      LEGACY_SUMMARY,
      &format!(
        "{LEGACY_SUMMARY}\n[Parsed_volumedetect_0 @ 0x6000] mean_volume: -20.5 dB\n[Parsed_volumedetect_0 @ 0x6000] max_volume: -3.1 dB"
      ),
    );
    let (result, _) = run(ProgressTracker::new().detect_volume(true), &stderr);
    let volume = result.unwrap().volume.unwrap();
    assert_eq!(volume.mean_volume_db, Some(-20.5));
    assert_eq!(volume.max_volume_db, Some(-3.1));

    // without detection the last filter line is an unexplained ending
    let (result, _) = run(ProgressTracker::new(), &stderr);
    assert!(matches!(result, Err(EncoderError::Encoding(_))));
  }

  #[test]
  fn test_input_format_error_is_never_tolerated() {
    let (result, events) = run(
      ProgressTracker::new()
        .with_source("in.mp4")
        .error_policy(ErrorPolicy::Tolerant),
      "in.mp4: Invalid data found when processing input\n",
    );
    assert!(matches!(result, Err(EncoderError::InputFormat(Some(_)))));
    assert!(events.is_empty());
  }
}
