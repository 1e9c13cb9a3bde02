// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for all configuration constants.
//!
//! This module serves as the single source of truth for default values
//! used across the player. Constants are organized by category.
//!
//! # Categories
//!
//! - **Timing**: Timestamp normalization and pacing limits
//! - **Sync**: A/V drift correction windows
//! - **Audio**: Ring buffer geometry and device buffering
//! - **Subtitles**: Timeline capacity and cue length
//! - **Video**: Zoom and magnification bounds

// ==========================================================================
// Timing Defaults
// ==========================================================================

/// Largest inter-unit gap (ms) accepted as a frame duration.
/// Larger jumps (seeks, discontinuities) snap the position without pacing.
pub const MAX_UNIT_DURATION_MS: i64 = 1000;

/// Backward timestamp jitter (ms) tolerated without moving the position back.
pub const JITTER_TOLERANCE_MS: i64 = 200;

/// Shortest delay (ms) the pacer will wait between frames.
pub const MIN_PACE_MS: i64 = 20;

/// Sleep interval for idle polls (ring full, ring empty, paused).
pub const IDLE_POLL_MS: u64 = 10;

/// Input wait while playback is paused.
pub const PAUSED_INPUT_WAIT_MS: u64 = 100;

// ==========================================================================
// Sync Defaults
// ==========================================================================

/// Number of video ticks in a drift correction window.
pub const DEFAULT_SYNC_WINDOW: u32 = 32;

/// Frames decoded before the startup drift is captured (with `-u`).
pub const DEFAULT_WARMUP_FRAMES: u32 = 32;

// ==========================================================================
// Audio Defaults
// ==========================================================================

/// Number of slots in the audio ring (must be a power of two).
pub const AUDIO_SLOT_COUNT: usize = 1 << 3;

/// Capacity of one audio slot in interleaved S16 samples (256 KiB).
pub const AUDIO_SLOT_SAMPLES: usize = 1 << 17;

/// Audio buffered inside the output device, in milliseconds.
pub const AUDIO_DEVICE_BUFFER_MS: u32 = 500;

/// Upper bound on a single blocking device write.
pub const AUDIO_WRITE_TIMEOUT_MS: u64 = 2000;

// ==========================================================================
// Subtitle Defaults
// ==========================================================================

/// Maximum number of subtitle cues kept in the timeline.
pub const SUBTITLE_CAPACITY: usize = 2048;

/// Maximum subtitle text length in bytes.
pub const SUBTITLE_TEXT_LIMIT: usize = 79;

/// Comma-separated fields preceding the text of a `Dialogue:` line.
pub const ASS_SKIPPED_FIELDS: usize = 9;

/// Comma-separated fields preceding the text of a decoded ASS event
/// (`ReadOrder,Layer,Style,Name,MarginL,MarginR,MarginV,Effect`).
pub const ASS_EVENT_SKIPPED_FIELDS: usize = 8;

// ==========================================================================
// Video Defaults
// ==========================================================================

/// Default decode-time zoom factor.
pub const DEFAULT_ZOOM: f32 = 1.0;

/// Smallest zoom factor accepted from the command line.
pub const MIN_ZOOM: f32 = 0.01;

/// Largest pixel magnification accepted from the command line.
pub const MAX_MAGNIFY: u32 = 16;

/// Framebuffer device used when neither `FBDEV` nor the settings file name one.
pub const DEFAULT_FRAMEBUFFER: &str = "/dev/fb0";

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "fbplay=warn";
