//! Time arithmetic shared by the info parser and the progress tracker.

use chrono::{NaiveDateTime, TimeDelta};

/// Hours added to every `creation_time` value read from ffmpeg.
///
/// ffmpeg prints creation times in UTC. They are reported shifted by this
/// fixed amount, independent of the host time zone.
pub const CREATION_TIME_OFFSET_HOURS: i64 = 8;

/// Milliseconds of a `Duration: HH:MM:SS.D` line, where `D` is tenths.
/// `None` if the total does not fit in a `u64`.
///
/// ```rust
/// use ffmpeg_encoder::time::duration_millis;
/// assert_eq!(duration_millis(1, 2, 3, 4), Some(3_723_400));
/// assert_eq!(duration_millis(u64::MAX, 0, 0, 0), None);
/// ```
pub fn duration_millis(hours: u64, minutes: u64, seconds: u64, tenths: u64) -> Option<u64> {
  [(tenths, 100), (seconds, 1_000), (minutes, 60_000), (hours, 3_600_000)]
    .into_iter()
    .try_fold(0u64, |total, (value, unit)| add_scaled(total, value, unit))
}

fn add_scaled(total: u64, value: u64, unit: u64) -> Option<u64> {
  value.checked_mul(unit).and_then(|ms| total.checked_add(ms))
}

/// Parse the `time=` value of a progress line into milliseconds.
///
/// Accepts `[[HH:]MM:]SS[.fraction]`. The fraction is scaled by its digit
/// count, so `.4` is 400ms and `.04` is 40ms. Negative times (printed by
/// ffmpeg before the first packet), `N/A` and values too large for a `u64`
/// yield `None`.
///
/// ```rust
/// use ffmpeg_encoder::time::parse_progress_time;
/// assert_eq!(parse_progress_time("00:01:19.72"), Some(79_720));
/// assert_eq!(parse_progress_time("4.5"), Some(4_500));
/// assert_eq!(parse_progress_time("-577014:32:22.77"), None);
/// assert_eq!(parse_progress_time("N/A"), None);
/// ```
pub fn parse_progress_time(time: &str) -> Option<u64> {
  if time.starts_with('-') {
    return None;
  }

  let mut smh = time.split(':').rev();
  let seconds = smh.next()?;
  let (whole, fraction) = match seconds.split_once('.') {
    Some((whole, fraction)) => (whole, Some(fraction)),
    None => (seconds, None),
  };

  let mut millis = add_scaled(0, parse_digits(whole)?, 1_000)?;
  if let Some(fraction) = fraction {
    millis = add_scaled(millis, fraction_millis(fraction)?, 1)?;
  }
  if let Some(minutes) = smh.next() {
    millis = add_scaled(millis, parse_digits(minutes)?, 60_000)?;
  }
  if let Some(hours) = smh.next() {
    millis = add_scaled(millis, parse_digits(hours)?, 3_600_000)?;
  }
  match smh.next() {
    Some(_) => None,
    None => Some(millis),
  }
}

fn parse_digits(digits: &str) -> Option<u64> {
  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  digits.parse().ok()
}

/// `"7"` -> 700, `"72"` -> 720, `"723456"` -> 723. Digits past the third are
/// truncated.
fn fraction_millis(fraction: &str) -> Option<u64> {
  parse_digits(fraction)?;
  let scaled = fraction
    .bytes()
    .chain(std::iter::repeat(b'0'))
    .take(3)
    .fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0'));
  Some(scaled)
}

/// Convert a `creation_time` metadata value to the reported local time, by
/// adding [`CREATION_TIME_OFFSET_HOURS`].
///
/// ```rust
/// use ffmpeg_encoder::time::creation_time_to_local;
/// let local = creation_time_to_local("2023-05-01T10:00:00.000Z").unwrap();
/// assert_eq!(local.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(), "2023-05-01T18:00:00.000");
/// ```
pub fn creation_time_to_local(value: &str) -> Option<NaiveDateTime> {
  let value = value.trim();
  let utc = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.fZ")
    .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
    .ok()?;
  utc.checked_add_signed(TimeDelta::hours(CREATION_TIME_OFFSET_HOURS))
}

/// Seconds as carried by the encoding attributes, to whole milliseconds.
pub fn seconds_to_millis(seconds: f32) -> u64 {
  (f64::from(seconds) * 1_000.0).round().max(0.0) as u64
}

/// Completion in parts per thousand, clamped to 1000. `None` when the
/// target is unknown or zero.
///
/// ```rust
/// use ffmpeg_encoder::time::permille;
/// assert_eq!(permille(4_000, 10_000), Some(400));
/// assert_eq!(permille(20_000, 10_000), Some(1000));
/// assert_eq!(permille(1, 0), None);
/// ```
pub fn permille(elapsed_ms: u64, target_ms: u64) -> Option<u16> {
  if target_ms == 0 {
    return None;
  }
  let ratio = (elapsed_ms as f64 * 1_000.0 / target_ms as f64).round();
  Some(ratio.min(1_000.0) as u16)
}
