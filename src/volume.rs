//! Results of ffmpeg's `volumedetect` audio filter.

use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;

static VOLUMEDETECT: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\[Parsed_volumedetect_\d+ @ [^\]]*\]\s*(\w+):\s*(\S+)").expect("valid regex")
});

/// Loudness statistics printed by `-af volumedetect` when the filter closes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VolumeDetect {
  pub n_samples: Option<u64>,
  pub mean_volume_db: Option<f32>,
  pub max_volume_db: Option<f32>,
  /// Sample count per attenuation bucket: key `3` is `histogram_3db`.
  pub histogram: BTreeMap<u32, u64>,
}

impl VolumeDetect {
  /// Fold one stderr line into the statistics. Returns `false` if the line
  /// does not come from the volumedetect filter.
  ///
  /// ```rust
  /// use ffmpeg_encoder::volume::VolumeDetect;
  ///
  /// let mut volume = VolumeDetect::default();
  /// assert!(volume.observe("[Parsed_volumedetect_0 @ 0x7f9c] mean_volume: -20.5 dB"));
  /// assert!(volume.observe("[Parsed_volumedetect_0 @ 0x7f9c] histogram_4db: 17"));
  /// assert!(!volume.observe("size=N/A time=00:00:03.00 bitrate=N/A"));
  /// assert_eq!(volume.mean_volume_db, Some(-20.5));
  /// assert_eq!(volume.histogram.get(&4), Some(&17));
  /// ```
  pub fn observe(&mut self, line: &str) -> bool {
    let Some(caps) = VOLUMEDETECT.captures(line) else {
      return false;
    };
    let (key, value) = (&caps[1], &caps[2]);
    match key {
      "n_samples" => self.n_samples = value.parse().ok(),
      "mean_volume" => self.mean_volume_db = value.parse().ok(),
      "max_volume" => self.max_volume_db = value.parse().ok(),
      _ => {
        let bucket = key
          .strip_prefix("histogram_")
          .and_then(|k| k.strip_suffix("db"))
          .and_then(|k| k.parse::<u32>().ok());
        match (bucket, value.parse::<u64>()) {
          (Some(bucket), Ok(count)) => {
            self.histogram.insert(bucket, count);
          }
          _ => log::debug!("Ignoring volumedetect field {key}: {value}"),
        }
      }
    }
    true
  }

  /// Whether the filter reported anything at all.
  pub fn is_empty(&self) -> bool {
    self.n_samples.is_none()
      && self.mean_volume_db.is_none()
      && self.max_volume_db.is_none()
      && self.histogram.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_full_report() {
    let report = "[Parsed_volumedetect_0 @ 0x600000b5c000] n_samples: 882000\n\
      [Parsed_volumedetect_0 @ 0x600000b5c000] mean_volume: -20.5 dB\n\
      [Parsed_volumedetect_0 @ 0x600000b5c000] max_volume: -3.1 dB\n\
      [Parsed_volumedetect_0 @ 0x600000b5c000] histogram_3db: 12\n\
      [Parsed_volumedetect_0 @ 0x600000b5c000] histogram_4db: 180";
    let mut volume = VolumeDetect::default();
    assert!(report.lines().all(|line| volume.observe(line)));
    assert_eq!(volume.n_samples, Some(882_000));
    assert_eq!(volume.mean_volume_db, Some(-20.5));
    assert_eq!(volume.max_volume_db, Some(-3.1));
    assert_eq!(volume.histogram, BTreeMap::from([(3, 12), (4, 180)]));
  }

  #[test]
  fn test_unrelated_filter_line() {
    let mut volume = VolumeDetect::default();
    assert!(!volume.observe("[Parsed_atempo_0 @ 0x6000] n_samples: 12"));
    assert!(volume.is_empty());
  }
}
