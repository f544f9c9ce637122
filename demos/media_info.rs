use std::{env, path::Path};

use ffmpeg_encoder::{encoder::Encoder, error::Result};

/// Prints what ffmpeg reports about a media file, and its loudness.
///
/// ```console
/// cargo run --example media_info -- input.mp4
/// ```
fn main() -> Result<()> {
  let Some(source) = env::args().nth(1) else {
    eprintln!("usage: media_info <source>");
    return Ok(());
  };
  let source = Path::new(&source);
  let encoder = Encoder::lenient();

  let info = encoder.info(source)?;
  println!("format: {}", info.format);
  println!("duration: {:?} ms", info.duration_ms);
  println!("created: {:?}", info.creation_time);
  if let Some(video) = &info.video {
    println!("video: {} {:?} @ {:?} fps", video.decoder, video.size.map(|s| s.to_string()), video.frame_rate);
  }
  if let Some(audio) = &info.audio {
    println!("audio: {} {:?} Hz, {:?} channels", audio.decoder, audio.sampling_rate, audio.channels);
  }

  if info.audio.is_some() {
    let volume = encoder.volume_detect(source)?.audio.and_then(|audio| audio.volume);
    if let Some(volume) = volume {
      println!("mean volume: {:?} dB, max volume: {:?} dB", volume.mean_volume_db, volume.max_volume_db);
    }
  }
  Ok(())
}
