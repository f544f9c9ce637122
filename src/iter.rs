use std::{
  io::{self, BufReader, Read},
  sync::mpsc::{sync_channel, Receiver, SyncSender},
  thread::JoinHandle,
};

use log::error;

use crate::line_reader::DiagnosticLines;

/// Lines buffered between the stderr thread and the parser. Once full, the
/// thread waits for the parser rather than growing without bound.
pub const LINE_CHANNEL_CAPACITY: usize = 64;

/// The receiving end of [`spawn_stderr_thread`]: an iterator over ffmpeg's
/// stderr lines that blocks until the next line arrives and ends when ffmpeg
/// closes the pipe.
pub struct DiagnosticStream {
  rx: Receiver<io::Result<String>>,
  handle: Option<JoinHandle<()>>,
}

impl DiagnosticStream {
  /// Wait for the reader thread to exit. Only returns once the pipe is closed;
  /// lines not read yet are discarded.
  pub fn join(self) {
    let DiagnosticStream { rx, handle } = self;
    drop(rx);
    if let Some(handle) = handle {
      if handle.join().is_err() {
        error!("ffmpeg stderr reader thread panicked");
      }
    }
  }
}

impl Iterator for DiagnosticStream {
  type Item = io::Result<String>;

  fn next(&mut self) -> Option<Self::Item> {
    self.rx.recv().ok()
  }
}

/// Spawn a thread which reads lines from ffmpeg's stderr channel.
///
/// The thread always reads to end of stream: when the receiving side is
/// dropped it keeps discarding lines, so ffmpeg never blocks writing into a
/// full pipe.
pub fn spawn_stderr_thread<R: Read + Send + 'static>(stderr: R) -> DiagnosticStream {
  let (tx, rx) = sync_channel::<io::Result<String>>(LINE_CHANNEL_CAPACITY);
  let handle = std::thread::spawn(move || pump_lines(stderr, tx));
  DiagnosticStream {
    rx,
    handle: Some(handle),
  }
}

fn pump_lines<R: Read>(stderr: R, tx: SyncSender<io::Result<String>>) {
  let mut tx = Some(tx);
  for line in DiagnosticLines::new(BufReader::new(stderr)) {
    match line {
      Ok(line) => {
        if let Some(sender) = &tx {
          if sender.send(Ok(line)).is_err() {
            // receiver gone, keep draining
            tx = None;
          }
        }
      }
      Err(e) => {
        error!("Error reading ffmpeg stderr: {e}");
        if let Some(sender) = tx.take() {
          sender.send(Err(e)).ok();
        }
        break;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn test_lines_arrive_in_order() {
    let stderr = Cursor::new(b"one\r\ntwo\rthree\n".to_vec());
    let lines = spawn_stderr_thread(stderr)
      .collect::<io::Result<Vec<_>>>()
      .unwrap();
    assert_eq!(lines, ["one", "two", "three"]);
  }

  #[test]
  fn test_drains_after_receiver_dropped() {
    // far more lines than the channel holds
    let text = "frame=1 time=00:00:00.04\n".repeat(LINE_CHANNEL_CAPACITY * 10);
    let mut stream = spawn_stderr_thread(Cursor::new(text.into_bytes()));
    assert!(stream.next().is_some());
    let handle = stream.handle.take().unwrap();
    drop(stream);
    handle.join().unwrap();
  }

  #[test]
  fn test_join_after_end_of_stream() {
    let mut stream = spawn_stderr_thread(Cursor::new(b"only\n".to_vec()));
    assert_eq!(stream.next().unwrap().unwrap(), "only");
    assert!(stream.next().is_none());
    stream.join();
  }
}
