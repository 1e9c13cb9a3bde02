// SPDX-License-Identifier: MPL-2.0
//! Subtitle timeline with interval lookup.
//!
//! Subtitles are decoded once up front into an immutable list of
//! `(begin, end, text)` intervals sorted by start time. During playback the
//! current position is looked up with a binary search and a
//! [`SubtitleCursor`] turns lookups into show/clear transitions so a cue is
//! printed exactly once.

use crate::config::{
    ASS_EVENT_SKIPPED_FIELDS, ASS_SKIPPED_FIELDS, SUBTITLE_CAPACITY, SUBTITLE_TEXT_LIMIT,
};
use crate::error::{Error, Result};
use crate::player::decode::SubtitleStream;
use std::path::Path;

/// One subtitle cue; `begin_ms..=end_ms` in stream position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    pub begin_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

impl SubtitleEntry {
    #[must_use]
    pub fn new(begin_ms: i64, end_ms: i64, text: impl Into<String>) -> Self {
        Self {
            begin_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Returns true if `position_ms` falls inside the cue, ends included.
    #[must_use]
    pub fn contains(&self, position_ms: i64) -> bool {
        self.begin_ms <= position_ms && position_ms <= self.end_ms
    }
}

/// Extracts the printable line of a decoded cue.
///
/// Plain text wins over ASS. For ASS the leading fields are skipped: nine
/// for a full `Dialogue:` line, eight for the event form decoders emit. The
/// result is cut at the first line break (`\n` or ASS `\N`) and at the byte
/// limit, never inside a UTF-8 sequence. Returns an empty string when
/// neither form carries text.
#[must_use]
pub fn cue_text(text: Option<&str>, ass: Option<&str>) -> String {
    let line = match (text, ass) {
        (Some(text), _) => text,
        (None, Some(ass)) => skip_ass_fields(ass).unwrap_or(""),
        (None, None) => "",
    };
    let line = line
        .split('\n')
        .next()
        .and_then(|line| line.split("\\N").next())
        .unwrap_or("");
    truncate_to_boundary(line, SUBTITLE_TEXT_LIMIT).to_string()
}

fn skip_ass_fields(ass: &str) -> Option<&str> {
    let fields = if ass.starts_with("Dialogue:") {
        ASS_SKIPPED_FIELDS
    } else {
        ASS_EVENT_SKIPPED_FIELDS
    };
    let mut rest = ass;
    for _ in 0..fields {
        let comma = rest.find(',')?;
        rest = &rest[comma + 1..];
    }
    Some(rest)
}

fn truncate_to_boundary(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        return s;
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Immutable, start-sorted list of cues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleTimeline {
    entries: Vec<SubtitleEntry>,
}

impl SubtitleTimeline {
    /// Builds a timeline from cues in file order.
    ///
    /// At most [`SUBTITLE_CAPACITY`] cues are kept. Overlapping cues are
    /// accepted as-is; lookup then returns one of them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Subtitle`] if the cues are not sorted by start time.
    pub fn build(entries: impl IntoIterator<Item = SubtitleEntry>) -> Result<Self> {
        let entries: Vec<_> = entries.into_iter().take(SUBTITLE_CAPACITY).collect();
        if let Some(pair) = entries
            .windows(2)
            .find(|pair| pair[1].begin_ms < pair[0].begin_ms)
        {
            return Err(Error::Subtitle(format!(
                "cue at {} ms follows cue at {} ms",
                pair[1].begin_ms, pair[0].begin_ms
            )));
        }
        Ok(Self { entries })
    }

    /// Decodes every cue of the subtitle stream in `path`.
    ///
    /// Units that fail to decode are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file has no usable subtitle stream or the cues
    /// are out of order.
    pub fn load(path: &Path) -> Result<Self> {
        let mut stream = SubtitleStream::open(path, None)?;
        let mut entries = Vec::new();
        while entries.len() < SUBTITLE_CAPACITY {
            match stream.decode_next() {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(Error::EndOfStream) => break,
                Err(err) => tracing::debug!(%err, "skipping undecodable subtitle"),
            }
        }
        tracing::info!(count = entries.len(), path = %path.display(), "subtitles loaded");
        Self::build(entries)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[SubtitleEntry] {
        &self.entries
    }

    /// Index of the cue covering `position_ms`.
    #[must_use]
    pub fn lookup_index(&self, position_ms: i64) -> Option<usize> {
        let after = self
            .entries
            .partition_point(|entry| entry.begin_ms <= position_ms);
        let candidate = after.checked_sub(1)?;
        self.entries[candidate]
            .contains(position_ms)
            .then_some(candidate)
    }

    /// Cue covering `position_ms`, if any.
    #[must_use]
    pub fn lookup(&self, position_ms: i64) -> Option<&SubtitleEntry> {
        self.lookup_index(position_ms).map(|i| &self.entries[i])
    }
}

/// Result of advancing a [`SubtitleCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleUpdate<'a> {
    /// Entered a new cue.
    Show(&'a SubtitleEntry),
    /// Still inside the cue shown last.
    Unchanged,
    /// Left the last shown cue and no other covers the position.
    Clear,
    /// Nothing shown and nothing to show.
    Idle,
}

/// Tracks the cue currently on screen.
#[derive(Debug, Clone, Default)]
pub struct SubtitleCursor {
    shown: Option<usize>,
}

impl SubtitleCursor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance<'a>(
        &mut self,
        timeline: &'a SubtitleTimeline,
        position_ms: i64,
    ) -> SubtitleUpdate<'a> {
        match (timeline.lookup_index(position_ms), self.shown) {
            (Some(index), Some(shown)) if index == shown => SubtitleUpdate::Unchanged,
            (Some(index), _) => {
                self.shown = Some(index);
                SubtitleUpdate::Show(&timeline.entries[index])
            }
            (None, Some(_)) => {
                self.shown = None;
                SubtitleUpdate::Clear
            }
            (None, None) => SubtitleUpdate::Idle,
        }
    }
}
