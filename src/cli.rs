// SPDX-License-Identifier: MPL-2.0
//! Command-line flags.
//!
//! Short flags take their value either inline (`-z2`) or as the next
//! argument (`-z 2`). The last free argument is the media file.

use crate::config::{DEFAULT_ZOOM, MAX_MAGNIFY, MIN_ZOOM};
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

pub const USAGE: &str = "usage: fbplay [options] file

options:
  -z n     zoom the video
  -m n     magnify the video by duplicating pixels
  -j n     jump every n video frames; for slow machines
  -f       start full screen
  -v n     select video stream; '-' disables video
  -a n     select audio stream; '-' disables audio
  -s       always synchronize (-sx for every x frames)
  -u       record A/V delay after the first few frames
  -t path  subtitles file
  -x n     horizontal video position
  -y n     vertical video position
  -r       adjust the video to the right of the screen
  -b       adjust the video to the bottom of the screen
  -h       show this help
";

/// Which stream of a kind to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamChoice {
    /// Do not open this kind of stream.
    Disabled,
    /// Let the demuxer pick the best stream.
    #[default]
    Auto,
    /// The n-th stream of this kind, 0-based.
    Index(usize),
}

impl StreamChoice {
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self != StreamChoice::Disabled
    }

    /// Index hint for opening the stream.
    #[must_use]
    pub fn index_hint(self) -> Option<usize> {
        match self {
            StreamChoice::Index(n) => Some(n),
            _ => None,
        }
    }
}

impl FromStr for StreamChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.starts_with('-') {
            return Ok(StreamChoice::Disabled);
        }
        s.parse::<usize>()
            .map(StreamChoice::Index)
            .map_err(|e| format!("invalid stream index '{s}': {e}"))
    }
}

/// Parsed player flags.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOptions {
    pub zoom: f32,
    pub magnify: usize,
    /// Convert only every `frame_skip + 1`-th frame.
    pub frame_skip: u32,
    pub fullscreen: bool,
    pub video: StreamChoice,
    pub audio: StreamChoice,
    /// Ticks between automatic correction windows; 0 disables them.
    pub sync_period: u32,
    /// Adopt the drift observed after warm-up as the target.
    pub capture_drift: bool,
    pub subtitles: Option<PathBuf>,
    pub offset_x: i64,
    pub offset_y: i64,
    pub right: bool,
    pub bottom: bool,
    pub path: PathBuf,
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Help,
    Play(PlayerOptions),
}

/// Parses the process arguments.
///
/// # Errors
///
/// Returns [`Error::Usage`] for malformed flags or a missing file.
pub fn parse_env() -> Result<Invocation> {
    parse_args(std::env::args_os().skip(1).collect())
}

/// Parses `args` (without the program name).
///
/// # Errors
///
/// Returns [`Error::Usage`] for malformed flags or a missing file.
pub fn parse_args(args: Vec<OsString>) -> Result<Invocation> {
    // A bare `-s` means "every frame"; rewrite it so the value form applies
    let args = args
        .into_iter()
        .map(|arg| if arg == "-s" { OsString::from("-s1") } else { arg })
        .collect();
    let mut args = pico_args::Arguments::from_vec(args);

    if args.contains("-h") {
        return Ok(Invocation::Help);
    }

    let zoom: f32 = args.opt_value_from_str("-z")?.unwrap_or(DEFAULT_ZOOM);
    let magnify: usize = args.opt_value_from_str("-m")?.unwrap_or(1);
    let frame_skip = args.opt_value_from_str("-j")?.unwrap_or(0);
    let fullscreen = args.contains("-f");
    let video = args.opt_value_from_str("-v")?.unwrap_or_default();
    let audio = args.opt_value_from_str("-a")?.unwrap_or_default();
    let sync_period = args.opt_value_from_str("-s")?.unwrap_or(0);
    let capture_drift = args.contains("-u");
    let subtitles = args.opt_value_from_os_str("-t", |s| {
        Ok::<_, std::convert::Infallible>(PathBuf::from(s))
    })?;
    let offset_x = args.opt_value_from_str("-x")?.unwrap_or(0);
    let offset_y = args.opt_value_from_str("-y")?.unwrap_or(0);
    let right = args.contains("-r");
    let bottom = args.contains("-b");

    if !(zoom.is_finite() && zoom >= MIN_ZOOM) {
        return Err(Error::Usage(format!("zoom must be at least {MIN_ZOOM}")));
    }
    if magnify == 0 || magnify > MAX_MAGNIFY as usize {
        return Err(Error::Usage(format!(
            "magnify must be between 1 and {MAX_MAGNIFY}"
        )));
    }

    let free = args.finish();
    if let Some(flag) = free
        .iter()
        .filter_map(|arg| arg.to_str())
        .find(|arg| arg.len() > 1 && arg.starts_with('-'))
    {
        return Err(Error::Usage(format!("unknown option '{flag}'")));
    }
    let path = free
        .into_iter()
        .last()
        .map(PathBuf::from)
        .ok_or_else(|| Error::Usage("missing media file".to_string()))?;

    Ok(Invocation::Play(PlayerOptions {
        zoom,
        magnify,
        frame_skip,
        fullscreen,
        video,
        audio,
        sync_period,
        capture_drift,
        subtitles,
        offset_x,
        offset_y,
        right,
        bottom,
        path,
    }))
}
