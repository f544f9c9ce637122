use std::{env, path::Path};

use ffmpeg_encoder::{encoder::Encoder, error::Result, event::EncoderEvent, presets};

/// Converts the audio of any input to MP3, printing progress as it goes.
///
/// ```console
/// cargo run --example transcode -- input.amr output.mp3
/// ```
fn main() -> Result<()> {
  let mut args = env::args().skip(1);
  let (Some(source), Some(target)) = (args.next(), args.next()) else {
    eprintln!("usage: transcode <source> <target.mp3>");
    return Ok(());
  };

  Encoder::lenient().encode(
    Path::new(&source),
    Path::new(&target),
    &presets::audio_conversion("mp3"),
    |event| match event {
      EncoderEvent::SourceInfo(info) => println!("Input: {} {:?} ms", info.format, info.duration_ms),
      EncoderEvent::Progress(progress) => match progress.permille {
        Some(permille) => println!("{:.1}%", f32::from(permille) / 10.0),
        None => println!("{} ms", progress.elapsed_ms),
      },
      EncoderEvent::Message(msg) => eprintln!("[ffmpeg] {msg}"),
    },
  )?;
  Ok(())
}
