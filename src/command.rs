use std::{
  ffi::OsStr,
  fmt, io,
  path::Path,
  process::{Command, CommandArgs, Stdio},
};

use log::debug;

use crate::{
  attributes::{
    non_empty, validate_concat_list, AudioAttributes, AudioMergeType, EncodingAttributes,
    VideoAttributes, VideoMergeType,
  },
  child::FfmpegChild,
  error::{EncoderError, Result},
  paths::ffmpeg_path,
};

/// A wrapper around [`std::process::Command`] with argument sets for the
/// encoder's operations and aliases for the ffmpeg flags they use.
///
/// The `rustdoc` on each alias includes relevant information from the FFmpeg
/// documentation: <https://ffmpeg.org/ffmpeg.html>. Refer there for the
/// exhaustive list of possible arguments.
pub struct FfmpegCommand {
  inner: Command,
}

/// How much of a stream's attributes a command emits. Merges only use the
/// codec, rate and trimming options; a plain encode emits everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamArgs {
  Basic,
  /// `combined_speed` is set when the speed change of both streams goes into
  /// one `-filter_complex` instead of per-stream filters.
  Full { combined_speed: bool },
}

impl FfmpegCommand {
  //// Generic option aliases
  //// https://ffmpeg.org/ffmpeg.html#Generic-options

  /// alias for `-hide_banner` argument.
  ///
  /// Suppress printing banner.
  ///
  /// All FFmpeg tools will normally show a copyright notice, build options and
  /// library versions. This option can be used to suppress printing this
  /// information.
  pub fn hide_banner(&mut self) -> &mut Self {
    self.arg("-hide_banner");
    self
  }

  /// Alias for `-formats` argument: show available formats, including devices.
  pub fn list_formats(&mut self) -> &mut Self {
    self.arg("-formats");
    self
  }

  /// Alias for `-codecs` argument: show all codecs known to libavcodec.
  pub fn list_codecs(&mut self) -> &mut Self {
    self.arg("-codecs");
    self
  }

  //// Main option aliases
  //// https://ffmpeg.org/ffmpeg.html#Main-options

  /// Alias for `-i` argument, the input file path or URL.
  ///
  /// To take input from stdin, use the value `-` or `pipe`.
  pub fn input<S: AsRef<OsStr>>(&mut self, path_or_url: S) -> &mut Self {
    self.arg("-i");
    self.arg(path_or_url);
    self
  }

  /// Alias for `-y` argument: overwrite output files without asking.
  pub fn overwrite(&mut self) -> &mut Self {
    self.arg("-y");
    self
  }

  /// The output path, `-` for stdout. Must come after every output option.
  pub fn output<S: AsRef<OsStr>>(&mut self, path_or_url: S) -> &mut Self {
    self.arg(path_or_url);
    self
  }

  /// Alias for `-f` argument.
  ///
  /// Force input or output file format. The format is normally auto detected
  /// for input files and guessed from the file extension for output files, so
  /// this option is not needed in most cases.
  pub fn format<S: AsRef<str>>(&mut self, format: S) -> &mut Self {
    self.arg("-f");
    self.arg(format.as_ref());
    self
  }

  /// Alias for `-vcodec` argument (same as `-c:v`).
  ///
  /// Select an encoder (when used before an output file) or a decoder (when
  /// used before an input file) for the video streams. `codec` is the name of a
  /// decoder/encoder or a special value `copy` (output only) to indicate that the
  /// stream is not to be re-encoded.
  pub fn codec_video<S: AsRef<str>>(&mut self, codec: S) -> &mut Self {
    self.arg("-vcodec");
    self.arg(codec.as_ref());
    self
  }

  /// Alias for `-acodec` argument (same as `-c:a`).
  ///
  /// Select an encoder (when used before an output file) or a decoder (when
  /// used before an input file) for the audio streams. `codec` is the name of a
  /// decoder/encoder or a special value `copy` (output only) to indicate that the
  /// stream is not to be re-encoded.
  pub fn codec_audio<S: AsRef<str>>(&mut self, codec: S) -> &mut Self {
    self.arg("-acodec");
    self.arg(codec.as_ref());
    self
  }

  /// Alias for `-vn` argument: disable video recording.
  pub fn no_video(&mut self) -> &mut Self {
    self.arg("-vn");
    self
  }

  /// Alias for `-an` argument: disable audio recording.
  pub fn no_audio(&mut self) -> &mut Self {
    self.arg("-an");
    self
  }

  /// Alias for `-t` argument.
  ///
  /// When used as an input option (before `-i`), limit the duration of data read from the input file.
  ///
  /// When used as an output option (before an output url), stop writing the output after its duration reaches duration.
  ///
  /// `duration` must be a time duration specification, see [(ffmpeg-utils)the Time duration section in the ffmpeg-utils(1) manual](https://ffmpeg.org/ffmpeg-utils.html#time-duration-syntax).
  pub fn duration<S: AsRef<str>>(&mut self, duration: S) -> &mut Self {
    self.arg("-t");
    self.arg(duration.as_ref());
    self
  }

  /// Alias for `-ss` argument.
  ///
  /// When used as an input option (before `-i`), seeks in this input file to
  /// position. Note that in most formats it is not possible to seek exactly, so
  /// `ffmpeg` will seek to the closest seek point before `position`.
  ///
  /// When used as an output option (before an output url), decodes but discards
  /// input until the timestamps reach `position`.
  ///
  /// `position` must be a time duration specification, see [(ffmpeg-utils)the
  /// Time duration section in the ffmpeg-utils(1)
  /// manual](https://ffmpeg.org/ffmpeg-utils.html#time-duration-syntax).
  pub fn seek<S: AsRef<str>>(&mut self, position: S) -> &mut Self {
    self.arg("-ss");
    self.arg(position.as_ref());
    self
  }

  /// Alias for `-filter_complex` argument.
  ///
  /// Define a complex filtergraph, i.e. one with arbitrary number of inputs
  /// and/or outputs. Input link labels must refer to input streams using the
  /// `[file_index:stream_specifier]` syntax.
  pub fn filter_complex<S: AsRef<str>>(&mut self, filtergraph: S) -> &mut Self {
    self.arg("-filter_complex");
    self.arg(filtergraph.as_ref());
    self
  }

  /// Alias for `-map` argument.
  ///
  /// Create one or more streams in the output file. `specifier` is either an
  /// input stream (`0:v:0`) or a labelled filtergraph output (`[out]`).
  pub fn map<S: AsRef<str>>(&mut self, specifier: S) -> &mut Self {
    self.arg("-map");
    self.arg(specifier.as_ref());
    self
  }

  //// Attribute mapping

  /// The video options of `video`, or `-vn` when there is no video.
  fn video_args(&mut self, video: Option<&VideoAttributes>, detail: StreamArgs) -> &mut Self {
    let Some(video) = video else {
      return self.no_video();
    };
    if let Some(codec) = non_empty(&video.codec) {
      self.codec_video(codec);
    }
    if let Some(tag) = non_empty(&video.tag) {
      self.args(["-vtag", tag]);
    }
    if let Some(bit_rate) = video.bit_rate {
      self.arg("-b").arg(bit_rate.to_string());
    }
    if let Some(frame_rate) = video.frame_rate {
      self.arg("-r").arg(frame_rate.to_string());
    }
    if let StreamArgs::Full {
      combined_speed: false,
    } = detail
    {
      if let Some(setpts) = non_empty(&video.setpts) {
        self.arg("-filter:v").arg(format!("setpts={setpts}*PTS"));
      }
    }
    if let Some(size) = video.size {
      self.arg("-s").arg(size.to_string());
    }
    if let Some(start_time) = non_empty(&video.start_time) {
      self.seek(start_time);
    }
    if let Some(duration) = non_empty(&video.duration) {
      self.duration(duration);
    }
    if detail == StreamArgs::Basic {
      return self;
    }
    if let Some(quality) = non_empty(&video.quality) {
      self.args(["-q:v", quality]);
    }
    if let Some(filter) = non_empty(&video.filter) {
      self.args(["-vf", filter]);
    }
    if let Some(target_bit_rate) = non_empty(&video.target_bit_rate) {
      self.args(["-b:v", target_bit_rate]);
    }
    if let Some(buffer_size) = non_empty(&video.buffer_size) {
      self.args(["-bufsize", buffer_size]);
    }
    if let Some(max_rate) = non_empty(&video.max_rate) {
      self.args(["-maxrate", max_rate]);
    }
    self
  }

  /// The audio options of `audio`, or `-an` when there is no audio.
  fn audio_args(&mut self, audio: Option<&AudioAttributes>, detail: StreamArgs) -> &mut Self {
    let Some(audio) = audio else {
      return self.no_audio();
    };
    if let Some(codec) = non_empty(&audio.codec) {
      self.codec_audio(codec);
    }
    if let Some(bit_rate) = audio.bit_rate {
      self.arg("-ab").arg(bit_rate.to_string());
    }
    if let Some(channels) = audio.channels {
      self.arg("-ac").arg(channels.to_string());
    }
    if let Some(sampling_rate) = audio.sampling_rate {
      self.arg("-ar").arg(sampling_rate.to_string());
    }
    if let Some(volume) = audio.volume {
      self.arg("-vol").arg(volume.to_string());
    }
    if let Some(start_time) = non_empty(&audio.start_time) {
      self.seek(start_time);
    }
    if let Some(duration) = non_empty(&audio.duration) {
      self.duration(duration);
    }
    let StreamArgs::Full { combined_speed } = detail else {
      return self;
    };
    if let Some(filter) = non_empty(&audio.filter) {
      self.args(["-af", filter]);
    }
    if !combined_speed {
      if let Some(tempo) = non_empty(&audio.tempo) {
        self.arg("-af").arg(format!("atempo={tempo}"));
      }
    }
    if let Some(volume_filter) = non_empty(&audio.volume_filter) {
      self.arg("-af").arg(format!("volume={volume_filter}"));
    }
    self
  }

  fn offset_arg(&mut self, attrs: &EncodingAttributes) -> &mut Self {
    if let Some(offset) = attrs.offset {
      self.seek(offset.to_string());
    }
    self
  }

  fn duration_arg(&mut self, attrs: &EncodingAttributes) -> &mut Self {
    if let Some(duration) = attrs.duration {
      self.duration(duration.to_string());
    }
    self
  }

  /// `-f format -y target`, which ends every operation.
  fn target_args(&mut self, attrs: &EncodingAttributes, target: &Path) -> &mut Self {
    if let Some(format) = non_empty(&attrs.format) {
      self.format(format);
    }
    self.overwrite().output(target)
  }

  //// Operation argument sets

  /// Transcode `source` into `target` according to `attrs`.
  pub fn encode_args(
    &mut self,
    source: &Path,
    target: &Path,
    attrs: &EncodingAttributes,
  ) -> Result<&mut Self> {
    attrs.validate()?;
    self.offset_arg(attrs);
    if let Some(fflags) = non_empty(&attrs.fflags) {
      self.args(["-fflags", fflags]);
    }
    self.input(source);
    if let Some(metadata) = non_empty(&attrs.metadata_sv) {
      self.args(["-metadata:s:v", metadata]);
    }
    self.duration_arg(attrs);

    let combined_speed = attrs.changes_both_speeds();
    let detail = StreamArgs::Full { combined_speed };
    self.video_args(attrs.video.as_ref(), detail);
    self.audio_args(attrs.audio.as_ref(), detail);
    if let (true, Some(setpts), Some(tempo)) =
      (combined_speed, attrs.video_setpts(), attrs.audio_tempo())
    {
      self
        .filter_complex(format!("[0:v]setpts={setpts}*PTS[v];[0:a]atempo={tempo}[a]"))
        .map("[v]")
        .map("[a]");
    }
    if let Some(filter_complex) = attrs
      .audio
      .as_ref()
      .and_then(|audio| non_empty(&audio.filter_complex))
    {
      self.filter_complex(filter_complex);
    }
    Ok(self.target_args(attrs, target))
  }

  /// Join several audio files one after another, or mix them together,
  /// depending on the audio merge type (concatenation by default).
  pub fn merge_audio_args<P: AsRef<Path>>(
    &mut self,
    sources: &[P],
    target: &Path,
    attrs: &EncodingAttributes,
  ) -> Result<&mut Self> {
    let audio = attrs.audio.as_ref().ok_or_else(|| {
      EncoderError::InvalidAttributes("merging audio requires audio attributes".to_string())
    })?;
    require_sources(sources)?;
    self.offset_arg(attrs);
    for source in sources {
      self.input(source.as_ref());
    }
    self.duration_arg(attrs);
    match audio.merge_type.unwrap_or(AudioMergeType::Concat) {
      AudioMergeType::Concat => {
        let pads: String = (0..sources.len()).map(|i| format!("[{i}:0]")).collect();
        self
          .filter_complex(format!("{pads}concat=n={}:v=0:a=1[out]", sources.len()))
          .map("[out]");
      }
      AudioMergeType::Mix => {
        self.filter_complex(format!("amix=inputs={}", sources.len()));
      }
    }
    if let Some(bit_rate) = non_empty(&audio.merge_bit_rate) {
      self.args(["-ab", bit_rate]);
    }
    Ok(self.target_args(attrs, target))
  }

  /// Put the audio of the second source under the video of the first. With
  /// [`VideoMergeType::Replace`] the first source's own audio is dropped.
  pub fn merge_video_and_audio_args<P: AsRef<Path>>(
    &mut self,
    sources: &[P],
    target: &Path,
    attrs: &EncodingAttributes,
  ) -> Result<&mut Self> {
    attrs.validate()?;
    require_sources(sources)?;
    self.offset_arg(attrs);
    for source in sources {
      self.input(source.as_ref());
    }
    self.duration_arg(attrs);
    self.video_args(attrs.video.as_ref(), StreamArgs::Basic);
    self.audio_args(attrs.audio.as_ref(), StreamArgs::Basic);
    self.args(["-strict", "experimental"]);
    let merge_type = attrs.video.as_ref().and_then(|video| video.merge_type);
    if merge_type == Some(VideoMergeType::Replace) {
      self.map("0:v:0").map("1:a:0");
    }
    Ok(self.target_args(attrs, target))
  }

  /// Concatenate videos by decoding and re-encoding every input. Works
  /// across differing codecs and sizes, at the cost of quality and time.
  pub fn merge_video_reencode_args<P: AsRef<Path>>(
    &mut self,
    sources: &[P],
    target: &Path,
    attrs: &EncodingAttributes,
  ) -> Result<&mut Self> {
    attrs.validate()?;
    require_sources(sources)?;
    self.offset_arg(attrs);
    for source in sources {
      self.input(source.as_ref());
    }
    let pads = (0..sources.len())
      .map(|i| format!("[{i}:0] [{i}:1]"))
      .collect::<Vec<_>>()
      .join(" ");
    self
      .filter_complex(format!(
        "{pads} concat=n={}:v=1:a=1 [v] [a]",
        sources.len()
      ))
      .map("[v]")
      .map("[a]");
    self.duration_arg(attrs);
    self.video_args(attrs.video.as_ref(), StreamArgs::Basic);
    self.audio_args(attrs.audio.as_ref(), StreamArgs::Basic);
    Ok(self.target_args(attrs, target))
  }

  /// Concatenate the files named in an ffmpeg concat script without
  /// re-encoding. The inputs must share codecs and parameters.
  pub fn merge_video_lossless_args(
    &mut self,
    list: &Path,
    target: &Path,
    attrs: &EncodingAttributes,
  ) -> Result<&mut Self> {
    attrs.validate()?;
    validate_concat_list(list)?;
    self.offset_arg(attrs);
    self.format("concat").args(["-safe", "0"]).input(list);
    self.duration_arg(attrs);
    self.video_args(attrs.video.as_ref(), StreamArgs::Basic);
    self.audio_args(attrs.audio.as_ref(), StreamArgs::Basic);
    Ok(self.target_args(attrs, target))
  }

  //// `std::process::Command` passthrough methods
  ///
  /// Adds an argument to pass to the program.
  ///
  /// Identical to `arg` in [`std::process::Command`].
  pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
    self.inner.arg(arg.as_ref());
    self
  }

  /// Adds multiple arguments to pass to the program.
  ///
  /// Identical to `args` in [`std::process::Command`].
  pub fn args<I, S>(&mut self, args: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    for arg in args {
      self.arg(arg.as_ref());
    }
    self
  }

  /// Returns an iterator of the arguments that will be passed to the program.
  ///
  /// Identical to `get_args` in [`std::process::Command`].
  pub fn get_args(&self) -> CommandArgs<'_> {
    self.inner.get_args()
  }

  /// Spawn the ffmpeg command as a child process, wrapping it in a
  /// `FfmpegChild` interface.
  ///
  /// Identical to `spawn` in [`std::process::Command`].
  pub fn spawn(&mut self) -> io::Result<FfmpegChild> {
    self.log_command();
    self.inner.spawn().map(FfmpegChild::from_inner)
  }

  /// Log a command that can be copy-pasted to run in the terminal.
  /// Requires `&mut self` so that it chains seamlessly with other methods in the interface.
  pub fn log_command(&mut self) -> &mut Self {
    debug!("Command: {:?}", self.inner);
    self
  }

  //// Constructors

  /// Runs the executable found by [`ffmpeg_path`].
  pub fn new() -> Self {
    Self::new_with_exe(ffmpeg_path())
  }

  pub fn new_with_exe<S: AsRef<OsStr>>(exe: S) -> Self {
    // Only stderr is read; stdin stays closed so ffmpeg never waits on a
    // prompt.
    let mut inner = Command::new(&exe);
    inner.stdin(Stdio::null());
    inner.stderr(Stdio::piped());
    inner.stdout(Stdio::null());
    Self { inner }
  }

  //// Escape hatches
  /// Escape hatch to access the inner `Command`.
  pub fn as_inner(&self) -> &Command {
    &self.inner
  }

  /// Escape hatch to mutably access the inner `Command`.
  pub fn as_inner_mut(&mut self) -> &mut Command {
    &mut self.inner
  }
}

fn require_sources<P>(sources: &[P]) -> Result<()> {
  if sources.is_empty() {
    return Err(EncoderError::InvalidAttributes(
      "no source files to merge".to_string(),
    ));
  }
  Ok(())
}

impl Default for FfmpegCommand {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for FfmpegCommand {
  /// Format the program and arguments of a Command for display. Any
  /// non-utf8 data is lossily converted using the utf8 replacement
  /// character.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.inner.fmt(f)
  }
}

impl From<Command> for FfmpegCommand {
  /// Convert a `Command` into a `FfmpegCommand`, making no guarantees about the
  /// validity of its configured arguments and stdio. Without a piped stderr
  /// the encoder cannot follow the process.
  fn from(inner: Command) -> Self {
    Self { inner }
  }
}

impl From<FfmpegCommand> for Command {
  fn from(command: FfmpegCommand) -> Self {
    command.inner
  }
}
