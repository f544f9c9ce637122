//! Line delivery for ffmpeg's diagnostic channel.
//!
//! [`DiagnosticLines`] splits raw stderr bytes into lines, and
//! [`PushbackReader`] layers a single-slot rewind on top of any line source so
//! that one parsing phase can hand the line it over-read to the next phase.

use std::io::{self, BufRead, ErrorKind};

use crate::error::{EncoderError, Result};

/// An iterator over the lines of an ffmpeg stderr stream.
///
/// Lines may end in `\n`, `\r\n`, or a bare `\r` (used by ffmpeg when it
/// redraws the progress line in place). Delimiters are stripped, leading
/// whitespace is kept, and invalid UTF-8 is replaced rather than rejected.
///
/// ```rust
/// use ffmpeg_encoder::line_reader::DiagnosticLines;
///
/// let stderr = "Input #0, wav, from 'a.wav':\r\n  Duration: 00:00:01.00\nframe=1\rframe=2\r";
/// let lines = DiagnosticLines::new(stderr.as_bytes())
///   .collect::<Result<Vec<_>, _>>()
///   .unwrap();
/// assert_eq!(lines, ["Input #0, wav, from 'a.wav':", "  Duration: 00:00:01.00", "frame=1", "frame=2"]);
/// ```
pub struct DiagnosticLines<R> {
  reader: R,
  buf: Vec<u8>,
}

impl<R: BufRead> DiagnosticLines<R> {
  pub fn new(reader: R) -> Self {
    Self {
      reader,
      buf: Vec::new(),
    }
  }
}

impl<R: BufRead> Iterator for DiagnosticLines<R> {
  type Item = io::Result<String>;

  fn next(&mut self) -> Option<Self::Item> {
    self.buf.clear();
    match read_line_any(&mut self.reader, &mut self.buf) {
      Ok(0) => None,
      Ok(_) => Some(Ok(String::from_utf8_lossy(&self.buf).into_owned())),
      Err(e) => Some(Err(e)),
    }
  }
}

/// Reads one line into `buf`, without its terminator. Returns the number of
/// bytes consumed from `r` (terminator included); zero means end of stream.
fn read_line_any<R: BufRead + ?Sized>(r: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
  let mut consumed = 0;
  loop {
    let (delim, used) = {
      let available = match r.fill_buf() {
        Ok(available) => available,
        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
        Err(e) => return Err(e),
      };
      if available.is_empty() {
        return Ok(consumed);
      }
      match available.iter().position(|&b| b == b'\n' || b == b'\r') {
        Some(i) => {
          buf.extend_from_slice(&available[..i]);
          (Some(available[i]), i + 1)
        }
        None => {
          buf.extend_from_slice(available);
          (None, available.len())
        }
      }
    };
    r.consume(used);
    consumed += used;

    match delim {
      Some(b'\r') => {
        // `\r\n` is one terminator, not two
        let crlf = matches!(r.fill_buf(), Ok(next) if next.first() == Some(&b'\n'));
        if crlf {
          r.consume(1);
          consumed += 1;
        }
        return Ok(consumed);
      }
      Some(_) => return Ok(consumed),
      None => {}
    }
  }
}

/// A line reader that can give back the most recently read line, once.
///
/// The rewind buffer holds at most one line. Calling [`push_back`] twice
/// without a [`read_line`] in between, or before anything was read, is a
/// [`EncoderError::Programming`] error and never silently drops data.
///
/// ```rust
/// use ffmpeg_encoder::line_reader::{DiagnosticLines, PushbackReader};
///
/// let mut reader = PushbackReader::new(DiagnosticLines::new("a\nb\n".as_bytes()));
/// let a = reader.read_line().unwrap().unwrap();
/// reader.push_back(a).unwrap();
/// assert_eq!(reader.read_line().unwrap().as_deref(), Some("a"));
/// assert_eq!(reader.read_line().unwrap().as_deref(), Some("b"));
/// assert_eq!(reader.read_line().unwrap(), None);
/// ```
///
/// [`push_back`]: PushbackReader::push_back
/// [`read_line`]: PushbackReader::read_line
pub struct PushbackReader<I> {
  lines: I,
  pending: Option<String>,
  can_push_back: bool,
}

impl<I> PushbackReader<I>
where
  I: Iterator<Item = io::Result<String>>,
{
  pub fn new(lines: I) -> Self {
    Self {
      lines,
      pending: None,
      can_push_back: false,
    }
  }

  /// Blocks until the next line is available. `Ok(None)` marks the end of
  /// the stream.
  pub fn read_line(&mut self) -> Result<Option<String>> {
    if let Some(line) = self.pending.take() {
      self.can_push_back = true;
      return Ok(Some(line));
    }
    match self.lines.next() {
      Some(Ok(line)) => {
        self.can_push_back = true;
        Ok(Some(line))
      }
      Some(Err(e)) => {
        self.can_push_back = false;
        Err(e.into())
      }
      None => {
        self.can_push_back = false;
        Ok(None)
      }
    }
  }

  /// Return `line`, which must be the line just obtained from
  /// [`read_line`](Self::read_line), so that the next read yields it again.
  pub fn push_back(&mut self, line: String) -> Result<()> {
    if !self.can_push_back {
      return Err(EncoderError::Programming(match self.pending {
        Some(_) => "a line is already pushed back".to_string(),
        None => "nothing was read since the last push back".to_string(),
      }));
    }
    self.pending = Some(line);
    self.can_push_back = false;
    Ok(())
  }

  pub fn into_inner(self) -> I {
    self.lines
  }
}
