// SPDX-License-Identifier: MPL-2.0
//! Demuxed elementary stream with normalized timing.
//!
//! Each [`TimedStream`] opens its own demuxer on the media file and reads
//! only the packets of one stream, so audio and video can be pulled at
//! independent rates without queueing packets for each other.

use crate::error::{Error, OpenError, Result};
use crate::player::clock::StreamClock;
use crate::player::time_units::TimeBase;
use ffmpeg_next::{codec, ffi, format, media, Packet};
use std::path::Path;
use std::sync::Once;

static FFMPEG_INIT: Once = Once::new();

/// Initializes FFmpeg once per process and silences its console logging.
///
/// # Errors
///
/// Returns an error if FFmpeg fails to initialize.
pub fn init_ffmpeg() -> Result<()> {
    let mut init_result: Result<()> = Ok(());

    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg_next::init() {
            init_result = Err(Error::Io(format!("FFmpeg initialization failed: {e}")));
            return;
        }

        // Messages would land on the console the video is drawn over
        // SAFETY: av_log_set_level is thread-safe and only affects logging
        unsafe {
            ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_QUIET);
        }
    });

    init_result
}

/// Kind of elementary stream to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Video,
    Subtitle,
}

impl StreamKind {
    fn medium(self) -> media::Type {
        match self {
            StreamKind::Audio => media::Type::Audio,
            StreamKind::Video => media::Type::Video,
            StreamKind::Subtitle => media::Type::Subtitle,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Audio => "audio",
            StreamKind::Video => "video",
            StreamKind::Subtitle => "subtitle",
        }
    }
}

/// Stream used to express seek targets.
///
/// Every [`TimedStream`] has its own demuxer on the same file, so a target in
/// one stream's time base can be applied to any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekReference {
    pub index: usize,
    pub time_base: TimeBase,
}

/// Timing and seeking of a decoded stream, as seen by the main loop.
pub trait MediaStream {
    fn clock(&self) -> &StreamClock;

    fn clock_mut(&mut self) -> &mut StreamClock;

    /// Total duration in milliseconds, or 0 when unknown.
    fn duration(&self) -> i64;

    fn seek_reference(&self) -> SeekReference;

    /// Seeks to the keyframe at or before `target_ms` of `reference` and
    /// flushes the decoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the demuxer rejects the seek.
    fn seek(&mut self, target_ms: i64, reference: SeekReference) -> Result<()>;

    /// Current position in milliseconds.
    fn position(&self) -> i64 {
        self.clock().position_ms()
    }
}

/// One demuxed stream of a media file.
pub struct TimedStream {
    input: format::context::Input,
    kind: StreamKind,
    index: usize,
    time_base: TimeBase,
    clock: StreamClock,
    duration_ms: i64,
}

impl TimedStream {
    /// Opens `path` and selects a stream of `kind`.
    ///
    /// Without a hint the demuxer's best stream is used; `Some(n)` selects the
    /// n-th stream of that kind (0-based). Returns the stream together with a
    /// codec context ready to be turned into a decoder.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] if the file cannot be opened, has no matching
    /// stream, or the codec parameters are unusable.
    pub fn open(
        path: &Path,
        kind: StreamKind,
        index_hint: Option<usize>,
    ) -> Result<(Self, codec::context::Context)> {
        init_ffmpeg()?;

        let input = format::input(path).map_err(|e| OpenError::Input(e.to_string()))?;

        let (index, time_base, stream_duration, context) = {
            let medium = kind.medium();
            let stream = match index_hint {
                None => input.streams().best(medium),
                Some(n) => input
                    .streams()
                    .filter(|stream| stream.parameters().medium() == medium)
                    .nth(n),
            }
            .ok_or(OpenError::NoStream(kind.name()))?;

            let context = codec::context::Context::from_parameters(stream.parameters())
                .map_err(|e| OpenError::from_codec_message(&e.to_string()))?;
            (
                stream.index(),
                TimeBase::from(stream.time_base()),
                stream.duration(),
                context,
            )
        };

        let duration_ms = if stream_duration != ffi::AV_NOPTS_VALUE {
            time_base.to_ms(stream_duration)
        } else if input.duration() > 0 {
            input.duration() / (i64::from(ffi::AV_TIME_BASE) / 1000)
        } else {
            0
        };

        tracing::debug!(
            kind = kind.name(),
            index,
            duration_ms,
            path = %path.display(),
            "stream opened"
        );

        Ok((
            Self {
                input,
                kind,
                index,
                time_base,
                clock: StreamClock::new(),
                duration_ms,
            },
            context,
        ))
    }

    /// Converts a duration in this stream's ticks to milliseconds.
    #[must_use]
    pub fn ticks_to_ms(&self, ticks: i64) -> i64 {
        self.time_base.to_ms(ticks)
    }

    /// Current position in milliseconds.
    #[must_use]
    pub fn position(&self) -> i64 {
        self.clock.position_ms()
    }

    /// Total duration in milliseconds, or 0 when unknown.
    #[must_use]
    pub fn duration(&self) -> i64 {
        self.duration_ms
    }

    #[must_use]
    pub fn clock(&self) -> &StreamClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut StreamClock {
        &mut self.clock
    }

    #[must_use]
    pub fn seek_reference(&self) -> SeekReference {
        SeekReference {
            index: self.index,
            time_base: self.time_base,
        }
    }

    /// Reads the next packet of this stream and updates the clock from it.
    ///
    /// Packets of other streams are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfStream`] when the demuxer has no more packets.
    pub fn next_packet(&mut self) -> Result<Packet> {
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => return Err(Error::EndOfStream),
                Err(err) => {
                    tracing::debug!(%err, kind = self.kind.name(), "demuxer read failed");
                    return Err(Error::EndOfStream);
                }
            }
            if packet.stream() != self.index {
                continue;
            }
            self.clock.observe(packet.dts(), self.time_base);
            return Ok(packet);
        }
    }

    /// Seeks to the keyframe at or before `target_ms` of `reference`.
    ///
    /// The pacing baseline is dropped so the first unit after the seek is
    /// presented without waiting. The caller flushes its decoder.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the demuxer rejects the seek.
    pub fn seek(&mut self, target_ms: i64, reference: SeekReference) -> Result<()> {
        let timestamp = reference.time_base.from_ms(target_ms.max(0));
        let stream_index = i32::try_from(reference.index)
            .map_err(|_| Error::Decode(format!("invalid stream index {}", reference.index)))?;
        // SAFETY: the context pointer is valid for the lifetime of `self.input`
        // and no other reference into the demuxer is alive here.
        let ret = unsafe {
            ffi::av_seek_frame(
                self.input.as_mut_ptr(),
                stream_index,
                timestamp,
                ffi::AVSEEK_FLAG_BACKWARD as i32,
            )
        };
        self.clock.invalidate();
        if ret < 0 {
            return Err(ffmpeg_next::Error::from(ret).into());
        }
        tracing::debug!(kind = self.kind.name(), target_ms, "seeked");
        Ok(())
    }
}
