//! Ready-made [`EncodingAttributes`] for common jobs.
//!
//! These only describe the job; run them with [`Encoder`](crate::encoder::Encoder),
//! usually [`Encoder::lenient`](crate::encoder::Encoder::lenient) since most
//! of them are meant for whatever ffmpeg build is installed.

use crate::attributes::{
  AudioAttributes, AudioMergeType, EncodingAttributes, VideoAttributes, VideoMergeType,
  DIRECT_STREAM_COPY,
};

pub const MP3_CODEC: &str = "libmp3lame";
pub const WAV_CODEC: &str = "pcm_s16le";

/// Quality (`-q:v`) of the per-second thumbnails. Lower is better, 2 is
/// close to lossless for JPEG.
pub const DEFAULT_THUMBNAIL_QUALITY: &str = "2";

fn audio_codec_for(format: &str) -> &'static str {
  if format.eq_ignore_ascii_case("wav") {
    WAV_CODEC
  } else {
    MP3_CODEC
  }
}

fn with_format(format: &str) -> EncodingAttributes {
  EncodingAttributes {
    format: Some(format.to_string()),
    ..Default::default()
  }
}

fn optional_format(format: Option<&str>) -> EncodingAttributes {
  EncodingAttributes {
    format: format.map(str::to_string),
    ..Default::default()
  }
}

fn codec(name: &str) -> Option<String> {
  Some(name.to_string())
}

/// Convert the audio of any input (e.g. AMR voice notes) to `format`.
/// WAV is written as 16-bit PCM, everything else as MP3.
pub fn audio_conversion(format: &str) -> EncodingAttributes {
  EncodingAttributes {
    audio: Some(AudioAttributes {
      codec: codec(audio_codec_for(format)),
      ..Default::default()
    }),
    ..with_format(format)
  }
}

/// Like [`audio_conversion`], keeping only `duration` from `start_time` on.
/// Both use ffmpeg time syntax (`75`, `00:01:15.5`).
pub fn cut_and_convert_audio(format: &str, start_time: &str, duration: &str) -> EncodingAttributes {
  let mut attrs = audio_conversion(format);
  if let Some(audio) = attrs.audio.as_mut() {
    audio.start_time = Some(start_time.to_string());
    audio.duration = Some(duration.to_string());
  }
  attrs
}

/// Play audio `tempo` times as fast without changing its pitch.
/// ffmpeg accepts 0.5 to 100.
pub fn audio_tempo(tempo: f32) -> EncodingAttributes {
  EncodingAttributes {
    audio: Some(AudioAttributes {
      tempo: Some(tempo.to_string()),
      ..Default::default()
    }),
    ..Default::default()
  }
}

/// Play a video with its audio `factor` times as fast.
pub fn speed_change(factor: f32) -> EncodingAttributes {
  EncodingAttributes {
    video: Some(VideoAttributes {
      setpts: Some((1.0 / factor).to_string()),
      ..Default::default()
    }),
    ..audio_tempo(factor)
  }
}

/// Drop the video and keep the audio as 16-bit PCM WAV.
pub fn extract_audio_to_wav() -> EncodingAttributes {
  EncodingAttributes {
    audio: Some(AudioAttributes {
      codec: codec(WAV_CODEC),
      ..Default::default()
    }),
    video: None,
    ..with_format("wav")
  }
}

/// Options for [`thumbnails`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThumbnailOptions {
  /// Frames taken per interval.
  pub frame_rate: u32,
  /// Seconds per interval. `None` takes `frame_rate` frames every second.
  pub interval_secs: Option<f32>,
  pub start_time: Option<String>,
  pub duration: Option<String>,
  pub quality: Option<String>,
}

/// Extract still images; the target should be a pattern such as
/// `thumb_%03d.jpg`.
pub fn thumbnails(options: &ThumbnailOptions) -> EncodingAttributes {
  let mut video = VideoAttributes {
    start_time: options.start_time.clone(),
    duration: options.duration.clone(),
    quality: options.quality.clone(),
    ..Default::default()
  };
  match options.interval_secs {
    Some(interval) => video.filter = Some(format!("fps={}/{interval}", options.frame_rate)),
    None => video.frame_rate = Some(options.frame_rate),
  }
  EncodingAttributes {
    video: Some(video),
    ..with_format("image2")
  }
}

/// One high quality image per second of video.
pub fn thumbnails_per_second() -> EncodingAttributes {
  thumbnails(&ThumbnailOptions {
    frame_rate: 1,
    quality: Some(DEFAULT_THUMBNAIL_QUALITY.to_string()),
    ..Default::default()
  })
}

/// One image every `seconds` seconds.
pub fn thumbnails_every(seconds: f32) -> EncodingAttributes {
  thumbnails(&ThumbnailOptions {
    frame_rate: 1,
    interval_secs: Some(seconds),
    ..Default::default()
  })
}

/// Re-encode the video through `filter`, keeping the audio.
pub fn video_filter(filter: &str) -> EncodingAttributes {
  EncodingAttributes {
    video: Some(VideoAttributes {
      filter: Some(filter.to_string()),
      ..Default::default()
    }),
    audio: Some(AudioAttributes::default()),
    ..Default::default()
  }
}

/// Rotate the picture 90 degrees; counterclockwise when `clockwise` is false.
pub fn rotate_quarter_turn(clockwise: bool) -> EncodingAttributes {
  video_filter(if clockwise { "transpose=1" } else { "transpose=2" })
}

/// Audio attributes for [`Encoder::merge_audio`](crate::encoder::Encoder::merge_audio):
/// play the inputs back to back into a WAV file.
pub fn audio_concat() -> EncodingAttributes {
  EncodingAttributes {
    audio: Some(AudioAttributes {
      merge_type: Some(AudioMergeType::Concat),
      ..Default::default()
    }),
    ..with_format("wav")
  }
}

/// Stream copy for
/// [`Encoder::merge_video_lossless`](crate::encoder::Encoder::merge_video_lossless).
/// Every input must share codecs, size and frame rate, and the audio of the
/// first input decides whether the result has sound.
pub fn lossless_video_concat(format: Option<&str>) -> EncodingAttributes {
  EncodingAttributes {
    video: Some(VideoAttributes {
      codec: codec(DIRECT_STREAM_COPY),
      ..Default::default()
    }),
    audio: Some(AudioAttributes {
      codec: codec(DIRECT_STREAM_COPY),
      ..Default::default()
    }),
    ..optional_format(format)
  }
}

/// H.264 with MP3 audio for
/// [`Encoder::merge_video_reencode`](crate::encoder::Encoder::merge_video_reencode);
/// suits a Matroska target.
pub fn reencoding_video_concat(format: Option<&str>) -> EncodingAttributes {
  EncodingAttributes {
    video: Some(VideoAttributes {
      codec: codec("h264"),
      ..Default::default()
    }),
    audio: Some(AudioAttributes {
      codec: codec(MP3_CODEC),
      ..Default::default()
    }),
    ..optional_format(format)
  }
}

fn audio_into_video(merge_type: VideoMergeType, format: Option<&str>) -> EncodingAttributes {
  EncodingAttributes {
    video: Some(VideoAttributes {
      codec: codec(DIRECT_STREAM_COPY),
      merge_type: Some(merge_type),
      ..Default::default()
    }),
    audio: Some(AudioAttributes {
      codec: codec("aac"),
      ..Default::default()
    }),
    ..optional_format(format)
  }
}

/// Give a silent video (first source) the audio of the second source.
pub fn insert_audio(format: Option<&str>) -> EncodingAttributes {
  audio_into_video(VideoMergeType::Insert, format)
}

/// Swap the audio of a video (first source) for the second source.
pub fn replace_audio(format: Option<&str>) -> EncodingAttributes {
  audio_into_video(VideoMergeType::Replace, format)
}
