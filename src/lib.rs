//! Drive a standalone FFmpeg binary and follow its progress by reading the
//! diagnostic text it writes to stderr.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use ffmpeg_encoder::{encoder::Encoder, error::Result, event::EncoderEvent, presets};
//!
//! fn main() -> Result<()> {
//!   let info = Encoder::lenient() // <- copes with any ffmpeg build
//!     .encode(
//!       Path::new("voice.amr"),
//!       Path::new("voice.mp3"),
//!       &presets::audio_conversion("mp3"), // <- plain data, see `attributes`
//!       |event| match event {
//!         EncoderEvent::SourceInfo(info) => {
//!           eprintln!("input: {} ({:?} ms)", info.format, info.duration_ms);
//!         }
//!         EncoderEvent::Progress(progress) => {
//!           eprintln!("{:?}‰", progress.permille); // <- parsed progress updates
//!         }
//!         EncoderEvent::Message(msg) => {
//!           eprintln!("[ffmpeg] {msg}"); // <- anything else ffmpeg said
//!         }
//!       },
//!     )?;
//!   println!("{:?}", info.audio);
//!   Ok(())
//! }
//! ```
//!
//! The parsing layers work on any line source, so a captured transcript can
//! be replayed without ffmpeg:
//!
//! ```rust
//! use ffmpeg_encoder::{
//!   info_parser::MediaInfoParser,
//!   line_reader::{DiagnosticLines, PushbackReader},
//! };
//!
//! let stderr = "Input #0, mp3, from 'a.mp3':\n  Duration: 00:03:25.7, start: 0.025057, bitrate: 128 kb/s\n    Stream #0:0: Audio: mp3, 44100 Hz, stereo, fltp, 128 kb/s\n";
//! let mut lines = PushbackReader::new(DiagnosticLines::new(stderr.as_bytes()));
//! let info = MediaInfoParser::new().parse(&mut lines).unwrap();
//! assert_eq!(info.duration_ms, Some(205_700));
//! ```
//!

#[cfg(test)]
mod test;

pub mod attributes;
pub mod capabilities;
pub mod child;
pub mod comma_iter;
pub mod command;
pub mod encoder;
pub mod error;
pub mod event;
pub mod info_parser;
pub mod iter;
pub mod line_reader;
pub mod log_parser;
pub mod media_info;
pub mod paths;
pub mod presets;
pub mod progress;
pub mod state;
pub mod time;
pub mod volume;
