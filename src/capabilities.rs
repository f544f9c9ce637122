//! Parsers for the `ffmpeg -formats` and `ffmpeg -codecs` listings.
//!
//! Both listings print a header, a legend explaining the flag columns, a line
//! of dashes, and then one entry per line.

use std::sync::LazyLock;

use log::trace;
use regex::Regex;

static FORMAT_ENTRY: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^ ?([D ])([E ])d?\s+([\w,-]+)\s*(.*)$").expect("valid regex"));

static CODEC_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^ ?([D.])([E.])([VASDT])[I.][L.][S.]\s+(\S+)\s*(.*)$").expect("valid regex")
});

/// One row of `ffmpeg -formats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSupport {
  /// As listed, possibly several comma-separated aliases (`mov,mp4,m4a`).
  pub name: String,
  pub description: String,
  /// Can be read (`D` flag).
  pub demux: bool,
  /// Can be written (`E` flag).
  pub mux: bool,
}

impl FormatSupport {
  /// The individual format names of this row.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.name.split(',').filter(|name| !name.is_empty())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
  Video,
  Audio,
  Subtitle,
  Data,
  Attachment,
}

impl CodecKind {
  fn from_flag(flag: &str) -> Option<Self> {
    match flag {
      "V" => Some(Self::Video),
      "A" => Some(Self::Audio),
      "S" => Some(Self::Subtitle),
      "D" => Some(Self::Data),
      "T" => Some(Self::Attachment),
      _ => None,
    }
  }
}

/// One row of `ffmpeg -codecs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
  pub name: String,
  pub kind: CodecKind,
  pub decode: bool,
  pub encode: bool,
  pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableState {
  AwaitHeader,
  Legend,
  Entries,
}

/// Walks a listing and hands every line of the entry table to `parse_entry`,
/// stopping at the first line it rejects.
fn parse_table<I, S, T>(lines: I, header: &str, mut parse_entry: impl FnMut(&str) -> Option<T>) -> Vec<T>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut state = TableState::AwaitHeader;
  let mut entries = Vec::new();
  for line in lines {
    let line = line.as_ref();
    match state {
      TableState::AwaitHeader => {
        if line.trim() == header {
          state = TableState::Legend;
        }
      }
      TableState::Legend => {
        if line.trim_start().starts_with("--") {
          state = TableState::Entries;
        }
      }
      TableState::Entries => match parse_entry(line) {
        Some(entry) => entries.push(entry),
        None => {
          trace!("End of table at {line:?}");
          break;
        }
      },
    }
  }
  entries
}

/// Parse the `File formats:` table printed by `ffmpeg -formats`.
///
/// ```rust
/// use ffmpeg_encoder::capabilities::parse_formats;
///
/// let listing = "File formats:\n D. = Demuxing supported\n .E = Muxing supported\n --\n DE mov,mp4,m4a  QuickTime / MOV\n  E mp3             MP3 (MPEG audio layer 3)";
/// let formats = parse_formats(listing.lines());
/// assert_eq!(formats.len(), 2);
/// assert!(formats[0].demux && formats[0].mux);
/// assert!(!formats[1].demux);
/// ```
pub fn parse_formats<I, S>(lines: I) -> Vec<FormatSupport>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  parse_table(lines, "File formats:", |line| {
    let caps = FORMAT_ENTRY.captures(line)?;
    Some(FormatSupport {
      demux: &caps[1] == "D",
      mux: &caps[2] == "E",
      name: caps[3].to_string(),
      description: caps[4].trim().to_string(),
    })
  })
}

/// Parse the `Codecs:` table printed by `ffmpeg -codecs`.
pub fn parse_codecs<I, S>(lines: I) -> Vec<CodecInfo>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  parse_table(lines, "Codecs:", |line| {
    let caps = CODEC_ENTRY.captures(line)?;
    Some(CodecInfo {
      decode: &caps[1] == "D",
      encode: &caps[2] == "E",
      kind: CodecKind::from_flag(&caps[3])?,
      name: caps[4].to_string(),
      description: caps[5].trim().to_string(),
    })
  })
}

/// Names of the formats with the given capability, one per alias.
pub fn format_names(formats: &[FormatSupport], wanted: impl Fn(&FormatSupport) -> bool) -> Vec<String> {
  formats
    .iter()
    .filter(|&format| wanted(format))
    .flat_map(|format| format.names())
    .map(str::to_string)
    .collect()
}

/// Names of the codecs of `kind` with the given capability.
pub fn codec_names(
  codecs: &[CodecInfo],
  kind: CodecKind,
  wanted: impl Fn(&CodecInfo) -> bool,
) -> Vec<String> {
  codecs
    .iter()
    .filter(|&codec| codec.kind == kind && wanted(codec))
    .map(|codec| codec.name.clone())
    .collect()
}
