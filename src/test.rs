//! Captured ffmpeg transcripts shared by the unit tests, and end-to-end runs
//! of them through the stderr reader thread.

use std::io::{self, Cursor, Read};

use crate::{
  event::EncoderEvent,
  info_parser::HandoffRule,
  iter::spawn_stderr_thread,
  line_reader::PushbackReader,
  progress::{ErrorPolicy, ProgressTracker, TrackerOutcome},
};

/// The closing muxing summary of [`LEGACY_TRANSCODE`].
pub(crate) const LEGACY_SUMMARY: &str =
  "video:120kB audio:45kB global headers:0kB muxing overhead: 0.1%";

/// An mp4 to mp4 transcode as printed by ffmpeg 2.8, with container, video
/// and audio creation times.
pub(crate) const LEGACY_TRANSCODE: &str = "\
ffmpeg version 2.8.15 Copyright (c) 2000-2018 the FFmpeg developers
  built with gcc 4.8.5 (GCC) 20150623 (Red Hat 4.8.5-36)
  configuration: --prefix=/usr --enable-gpl --enable-libx264 --enable-libmp3lame
  libavutil      54. 31.100 / 54. 31.100
  libavcodec     56. 60.100 / 56. 60.100
  libavformat    56. 40.101 / 56. 40.101
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from '/data/in.mp4':
  Metadata:
    major_brand     : isom
    minor_version   : 512
    compatible_brands: isomiso2avc1mp41
    creation_time   : 2023-05-01T10:00:00.000000Z
  Duration: 00:00:10.04, start: 0.000000, bitrate: 1205 kb/s
    Stream #0:0(und): Video: h264 (High) (avc1 / 0x31637661), yuv420p, 640x480, 1073 kb/s, 29.97 fps, 29.97 tbr, 30k tbn, 59.94 tbc (default)
    Metadata:
      creation_time   : 2023-05-01T10:00:00.000000Z
      handler_name    : VideoHandler
    Stream #0:1(und): Audio: aac (LC) (mp4a / 0x6134706D), 44100 Hz, stereo, fltp, 128 kb/s (default)
    Metadata:
      creation_time   : 2023-05-01T10:00:01.000000Z
Output #0, mp4, to '/data/out.mp4':
  Metadata:
    encoder         : Lavf56.40.101
    Stream #0:0(und): Video: h264 (libx264) ([33][0][0][0] / 0x0021), yuv420p, 640x480, q=-1--1, 29.97 fps, 30k tbn, 29.97 tbc (default)
    Stream #0:1(und): Audio: aac ([64][0][0][0] / 0x0040), 44100 Hz, stereo, fltp, 128 kb/s (default)
Stream mapping:
  Stream #0:0 -> #0:0 (h264 (native) -> h264 (libx264))
  Stream #0:1 -> #0:1 (aac (native) -> aac (native))
Press [q] to stop, [?] for help
frame=  120 fps=0.0 q=28.0 size=     256kB time=00:00:04.00 bitrate= 524.3kbits/s\r\
frame=  301 fps=150 q=-1.0 Lsize=     620kB time=00:00:10.04 bitrate= 505.8kbits/s speed=5.01x
video:120kB audio:45kB global headers:0kB muxing overhead: 0.1%
";

/// The same kind of job on ffmpeg 6: no creation times, `Stream mapping:`
/// and encoder chatter before `Output #0`, and a tagged summary.
pub(crate) const MODERN_TRANSCODE: &str = "\
ffmpeg version 6.1.1 Copyright (c) 2000-2023 the FFmpeg developers
  built with Apple clang version 15.0.0 (clang-1500.1.0.2.5)
  libavutil      58. 29.100 / 58. 29.100
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'in.mp4':
  Metadata:
    major_brand     : isom
    minor_version   : 512
    compatible_brands: isomiso2avc1mp41
    encoder         : Lavf60.16.100
  Duration: 00:00:08.00, start: 0.000000, bitrate: 1017 kb/s
  Stream #0:0[0x1](und): Video: h264 (High) (avc1 / 0x31637661), yuv420p(progressive), 1280x720 [SAR 1:1 DAR 16:9], 880 kb/s, 25 fps, 25 tbr, 12800 tbn (default)
    Metadata:
      handler_name    : VideoHandler
      vendor_id       : [0][0][0][0]
  Stream #0:1[0x2](und): Audio: aac (LC) (mp4a / 0x6134706D), 48000 Hz, stereo, fltp, 128 kb/s (default)
    Metadata:
      handler_name    : SoundHandler
      vendor_id       : [0][0][0][0]
Stream mapping:
  Stream #0:0 -> #0:0 (h264 (native) -> h264 (libx264))
  Stream #0:1 -> #0:1 (aac (native) -> aac (native))
Press [q] to stop, [?] for help
[libx264 @ 0x12f605bb0] using SAR=1/1
[libx264 @ 0x12f605bb0] using cpu capabilities: ARMv8 NEON
Output #0, mp4, to 'out.mp4':
  Metadata:
    encoder         : Lavf60.16.100
  Stream #0:0(und): Video: h264 (avc1 / 0x31637661), yuv420p(progressive), 1280x720 [SAR 1:1 DAR 16:9], q=2-31, 25 fps, 12800 tbn (default)
  Stream #0:1(und): Audio: aac (LC) (mp4a / 0x6134706D), 48000 Hz, stereo, fltp, 128 kb/s (default)
frame=    0 fps=0.0 q=0.0 size=       0kB time=00:00:00.00 bitrate=N/A speed=   0x\r\
frame=  100 fps= 99 q=28.0 size=     256kB time=00:00:04.00 bitrate= 524.3kbits/s speed=7.9x\r\
frame=  200 fps= 98 q=-1.0 Lsize=     910kB time=00:00:08.00 bitrate= 931.9kbits/s speed=7.2x
[out#0/mp4 @ 0x600003c5c000] video:778kB audio:126kB subtitle:0kB other streams:0kB global headers:0kB muxing overhead: 0.5%
";

/// Runs `stderr` through the reader thread, the way a spawned ffmpeg is read.
fn run_piped<R: Read + Send + 'static>(
  tracker: ProgressTracker,
  stderr: R,
) -> (crate::error::Result<TrackerOutcome>, Vec<EncoderEvent>) {
  let mut reader = PushbackReader::new(spawn_stderr_thread(stderr));
  let mut events = Vec::new();
  let result = tracker.run(&mut reader, |event| events.push(event));
  reader.into_inner().join();
  (result, events)
}

fn elapsed(events: &[EncoderEvent]) -> Vec<u64> {
  events
    .iter()
    .filter_map(|event| match event {
      EncoderEvent::Progress(progress) => Some(progress.elapsed_ms),
      _ => None,
    })
    .collect()
}

/// Hands out a few bytes per read, splitting lines and `\r\n` pairs.
struct Trickle {
  inner: Cursor<Vec<u8>>,
}

impl Read for Trickle {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    let len = buf.len().min(3);
    self.inner.read(&mut buf[..len])
  }
}

#[test]
fn test_legacy_transcode_through_reader_thread() {
  let stderr = Cursor::new(LEGACY_TRANSCODE.as_bytes().to_vec());
  let (result, events) = run_piped(ProgressTracker::new().with_source("/data/in.mp4"), stderr);
  let outcome = result.unwrap();
  assert_eq!(outcome.info.video.unwrap().frame_rate, Some(29.97));
  assert!(matches!(events[0], EncoderEvent::SourceInfo(_)));
  assert_eq!(elapsed(&events), [4_000, 10_040]);
}

#[test]
fn test_windows_line_endings_in_small_reads() {
  let stderr = Trickle {
    inner: Cursor::new(LEGACY_TRANSCODE.replace('\n', "\r\n").into_bytes()),
  };
  let (result, events) = run_piped(ProgressTracker::new(), stderr);
  assert!(result.is_ok());
  assert_eq!(elapsed(&events), [4_000, 10_040]);
  // no empty message from a split `\r\n`
  assert!(!events
    .iter()
    .any(|event| matches!(event, EncoderEvent::Message(m) if m.is_empty())));
}

#[test]
fn test_modern_transcode_through_reader_thread() {
  let stderr = Cursor::new(MODERN_TRANSCODE.as_bytes().to_vec());
  let tracker = ProgressTracker::new()
    .handoff_rule(HandoffRule::TracksComplete)
    .error_policy(ErrorPolicy::Tolerant);
  let (result, events) = run_piped(tracker, stderr);
  let info = result.unwrap().info;
  assert_eq!(info.video.unwrap().size.map(|s| s.to_string()).as_deref(), Some("1280x720"));
  assert_eq!(info.audio.unwrap().sampling_rate, Some(48_000));
  assert_eq!(elapsed(&events), [0, 4_000, 8_000]);
}

#[test]
fn test_failed_run_still_joins_reader() {
  // a failing run stops reading early; the reader thread must still finish
  let long_tail = format!(
    "{}{}",
    LEGACY_TRANSCODE.replace("Stream mapping:", "Mapping streams:"),
    "frame=1 time=00:00:00.04\n".repeat(1_000)
  );
  let (result, _) = run_piped(ProgressTracker::new(), Cursor::new(long_tail.into_bytes()));
  assert!(result.is_err());
}
