// SPDX-License-Identifier: MPL-2.0
//! Terminal status line and subtitle output.

use crate::player::time_units::{permille, split_position};
use std::io::Write;
use std::path::Path;

/// Carriage return plus "erase to end of line".
pub const CLEAR_LINE: &str = "\r\x1b[K";

/// Longest file name shown in the status line, in bytes.
const NAME_LIMIT: usize = 31;

/// Playback state shown in the first column of the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    /// Paused with the audio device parked.
    PausedWithAudio,
    Paused,
}

impl PlayState {
    fn symbol(self) -> char {
        match self {
            PlayState::Playing => '>',
            PlayState::PausedWithAudio => '*',
            PlayState::Paused => ' ',
        }
    }
}

/// Name shown in the status line: the path as given, cut to 31 bytes.
#[must_use]
pub fn display_name(path: &Path) -> String {
    let name = path.to_string_lossy();
    let mut end = name.len().min(NAME_LIMIT);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Formats the status line printed by the `i` command.
#[must_use]
pub fn status_line(
    state: PlayState,
    position_ms: i64,
    duration_ms: i64,
    drift_ms: i64,
    name: &str,
) -> String {
    let pm = permille(position_ms, duration_ms);
    let (minutes, seconds, tenths) = split_position(position_ms);
    format!(
        "{CLEAR_LINE}{} {:3}.{}%  {:3}:{:02}.{}  (AV:{:4})     [{}] \r",
        state.symbol(),
        pm / 10,
        pm % 10,
        minutes,
        seconds,
        tenths,
        drift_ms,
        name
    )
}

/// Line that shows a subtitle cue.
#[must_use]
pub fn subtitle_line(text: &str) -> String {
    format!("{CLEAR_LINE}{text}")
}

/// Writes `line` to stdout and flushes it; failures are only logged.
pub fn print(line: &str) {
    let mut stdout = std::io::stdout().lock();
    if let Err(err) = stdout
        .write_all(line.as_bytes())
        .and_then(|()| stdout.flush())
    {
        tracing::debug!(%err, "failed to write to terminal");
    }
}
