// SPDX-License-Identifier: MPL-2.0
//! Single-key playback commands.
//!
//! Input bytes are decoded into [`Command`]s by [`CommandReader`], a small
//! state machine with a numeric prefix (as in `3l`) and two-key commands for
//! marks (`ma`, `'a`).
//!
//! | Key        | Command                                 |
//! |------------|-----------------------------------------|
//! | `l` / `h`  | seek +-10 s (times prefix)              |
//! | `j` / `k`  | seek +-60 s                             |
//! | `J` / `K`  | seek +-600 s                            |
//! | `G`        | go to minute (prefix)                   |
//! | `%`        | go to percent (prefix)                  |
//! | `m`x / `'`x| set / jump to mark x                    |
//! | `i`        | status line                             |
//! | `p`, space | pause toggle                            |
//! | `+` / `-`  | drift target +-prefix ms                |
//! | `a`        | capture current drift as target         |
//! | `c`        | set correction window (prefix)          |
//! | `s`        | start correction window                 |
//! | `q`        | quit                                    |

use std::collections::HashMap;

const ESC: u8 = 27;

/// Mark key recording the position before the last absolute jump.
pub const PREVIOUS_POSITION_MARK: u8 = b'\'';

/// A decoded transport command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    /// Relative seek in seconds.
    SeekBy(i64),
    /// Absolute seek in seconds.
    SeekTo(i64),
    /// Absolute seek in percent of the duration.
    SeekPercent(i64),
    SetMark(u8),
    JumpToMark(u8),
    ShowInfo,
    TogglePause,
    /// Set the drift target in milliseconds.
    SetDrift(i64),
    CaptureDrift,
    SetCorrectionWindow(u32),
    /// Start a correction window of the given length, or of the configured one.
    StartCorrection(Option<u32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Mark,
    Jump,
}

/// Decodes input bytes into commands.
#[derive(Debug, Clone, Default)]
pub struct CommandReader {
    prefix: i64,
    pending: Option<Pending>,
}

impl CommandReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the prefix, substituting `default` when none was typed.
    fn take_prefix(&mut self, default: i64) -> i64 {
        let value = std::mem::take(&mut self.prefix);
        if value == 0 {
            default
        } else {
            value
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn take_count(&mut self) -> Option<u32> {
        let value = std::mem::take(&mut self.prefix);
        (value != 0).then(|| value.clamp(0, i64::from(u32::MAX)) as u32)
    }

    /// Feeds one input byte; returns a command once one is complete.
    pub fn feed(&mut self, byte: u8) -> Option<Command> {
        if let Some(pending) = self.pending.take() {
            return Some(match pending {
                Pending::Mark => Command::SetMark(byte),
                Pending::Jump => Command::JumpToMark(byte),
            });
        }

        let command = match byte {
            b'q' => Command::Quit,
            b'l' => Command::SeekBy(self.take_prefix(1).saturating_mul(10)),
            b'h' => Command::SeekBy(self.take_prefix(1).saturating_mul(-10)),
            b'j' => Command::SeekBy(self.take_prefix(1).saturating_mul(60)),
            b'k' => Command::SeekBy(self.take_prefix(1).saturating_mul(-60)),
            b'J' => Command::SeekBy(self.take_prefix(1).saturating_mul(600)),
            b'K' => Command::SeekBy(self.take_prefix(1).saturating_mul(-600)),
            b'G' => Command::SeekTo(self.take_prefix(0).saturating_mul(60)),
            b'%' => Command::SeekPercent(self.take_prefix(0)),
            b'm' => {
                self.pending = Some(Pending::Mark);
                return None;
            }
            b'\'' => {
                self.pending = Some(Pending::Jump);
                return None;
            }
            b'i' => Command::ShowInfo,
            b' ' | b'p' => Command::TogglePause,
            b'-' => Command::SetDrift(-self.take_prefix(0)),
            b'+' => Command::SetDrift(self.take_prefix(0)),
            b'a' => Command::CaptureDrift,
            b'c' => Command::SetCorrectionWindow(self.take_count().unwrap_or(0)),
            b's' => Command::StartCorrection(self.take_count()),
            ESC => {
                self.prefix = 0;
                return None;
            }
            b'0'..=b'9' => {
                self.prefix = self
                    .prefix
                    .saturating_mul(10)
                    .saturating_add(i64::from(byte - b'0'));
                return None;
            }
            _ => return None,
        };
        Some(command)
    }
}

/// Positions saved under single-byte keys.
#[derive(Debug, Clone, Default)]
pub struct MarkTable {
    marks: HashMap<u8, i64>,
}

impl MarkTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: u8, position_ms: i64) {
        self.marks.insert(key, position_ms);
    }

    #[must_use]
    pub fn get(&self, key: u8) -> Option<i64> {
        self.marks.get(&key).copied()
    }
}

/// Seek destination: `(relative ? position : 0) + delta`, clamped to the stream.
///
/// An unknown duration (0) leaves the upper end open.
#[must_use]
pub fn seek_target(position_ms: i64, duration_ms: i64, delta_ms: i64, relative: bool) -> i64 {
    let base = if relative { position_ms } else { 0 };
    let target = base.saturating_add(delta_ms).max(0);
    if duration_ms > 0 {
        target.min(duration_ms)
    } else {
        target
    }
}
