// SPDX-License-Identifier: MPL-2.0
//! Playback engine for fbplay.
//!
//! Streams are demuxed and decoded with FFmpeg on the main thread; decoded
//! audio travels through a lock-free slot ring to a dedicated output thread,
//! and video frames are copied straight into framebuffer memory.

pub mod audio_output;
pub mod blit;
pub mod clock;
pub mod decode;
mod playback;
pub mod ring;
mod session;
pub mod status;
pub mod stream;
pub mod subtitle;
pub mod sync;
pub mod time_units;
pub mod transport;

pub use audio_output::{AudioFormat, AudioOutput, AudioSink, CpalSink};
pub use blit::{present, FrameSink, MemorySink, Placement};
pub use clock::{StreamClock, SystemClock, WallClock};
pub use decode::{AudioSource, VideoSource};
pub use playback::Playback;
pub use ring::{audio_ring, ResetKind, RingConsumer, RingProducer};
pub use session::{Session, SessionSettings};
pub use stream::{MediaStream, SeekReference};
pub use subtitle::{SubtitleCursor, SubtitleEntry, SubtitleTimeline, SubtitleUpdate};
pub use sync::{SyncAction, SyncController, SyncState};
pub use transport::{Command, CommandReader, MarkTable};
