//! Splitting of stream specification tails such as
//! `h264 (High) (avc1 / 0x31637661), yuv420p(tv, bt709), 640x480, 25 fps`.

/// An iterator over comma-separated sections, **ignoring commas inside
/// parentheses** at any nesting depth. Sections are returned untrimmed.
///
/// ## Examples
///
/// ```rust
/// use ffmpeg_encoder::comma_iter::CommaIter;
///
/// let mut iter = CommaIter::new("yuv420p(tv, bt709 (full)), 640x480,");
///
/// assert_eq!(iter.next(), Some("yuv420p(tv, bt709 (full))"));
/// assert_eq!(iter.next(), Some(" 640x480"));
/// assert_eq!(iter.next(), Some(""));
/// assert_eq!(iter.next(), None);
/// ```
pub struct CommaIter<'a> {
  rest: Option<&'a str>,
}

impl<'a> CommaIter<'a> {
  pub fn new(string: &'a str) -> Self {
    Self { rest: Some(string) }
  }
}

impl<'a> Iterator for CommaIter<'a> {
  type Item = &'a str;

  /// Return the next comma-separated section, not including the comma.
  fn next(&mut self) -> Option<Self::Item> {
    let rest = self.rest?;
    let mut depth = 0usize;
    for (i, c) in rest.char_indices() {
      match c {
        '(' => depth += 1,
        ')' => depth = depth.saturating_sub(1),
        ',' if depth == 0 => {
          self.rest = Some(&rest[i + 1..]);
          return Some(&rest[..i]);
        }
        _ => {}
      }
    }
    self.rest = None;
    Some(rest)
  }
}
