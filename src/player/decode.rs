// SPDX-License-Identifier: MPL-2.0
//! Typed decoders on top of [`TimedStream`].
//!
//! - [`VideoStream`] decodes one frame per call and converts it to the
//!   framebuffer pixel layout at the configured zoom.
//! - [`AudioStream`] decodes one packet per call and resamples it to packed
//!   S16 at the device rate.
//! - [`SubtitleStream`] decodes one cue per call.

use crate::error::{Error, OpenError, Result};
use crate::player::audio_output::AudioFormat;
use crate::player::clock::StreamClock;
use crate::player::stream::{MediaStream, SeekReference, StreamKind, TimedStream};
use crate::player::subtitle::{cue_text, SubtitleEntry};
use ffmpeg_next::codec::subtitle::{Rect, Subtitle};
use ffmpeg_next::format::{sample, Pixel, Sample};
use ffmpeg_next::software::{resampling, scaling};
use ffmpeg_next::{decoder, frame, ChannelLayout};
use std::path::Path;

/// Framebuffer pixel layouts the scaler can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 32 bpp, bytes B G R A.
    Bgra32,
    /// 16 bpp, 5-6-5 little endian.
    Rgb565,
    /// 8 bpp, 3-3-2.
    Rgb332,
}

impl PixelLayout {
    /// Layout matching a framebuffer depth.
    #[must_use]
    pub fn from_bits_per_pixel(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(PixelLayout::Bgra32),
            16 => Some(PixelLayout::Rgb565),
            8 => Some(PixelLayout::Rgb332),
            _ => None,
        }
    }

    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Bgra32 => 4,
            PixelLayout::Rgb565 => 2,
            PixelLayout::Rgb332 => 1,
        }
    }

    fn pixel(self) -> Pixel {
        match self {
            PixelLayout::Bgra32 => Pixel::BGRA,
            PixelLayout::Rgb565 => Pixel::RGB565LE,
            PixelLayout::Rgb332 => Pixel::RGB8,
        }
    }
}

/// A converted frame borrowed from the decoder.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub pixels: &'a [u8],
    /// Bytes between the starts of two rows.
    pub stride: usize,
    pub width: usize,
    pub height: usize,
    pub bytes_per_pixel: usize,
}

impl FrameView<'_> {
    /// Bytes of row `r`, without stride padding.
    #[must_use]
    pub fn row(&self, r: usize) -> &[u8] {
        let start = r * self.stride;
        let len = self.width * self.bytes_per_pixel;
        self.pixels.get(start..start + len).unwrap_or(&[])
    }
}

/// Scaled output size for a zoom factor, never below one pixel.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn zoomed_size(width: u32, height: u32, zoom: f32) -> (u32, u32) {
    let scale = |v: u32| ((v as f32 * zoom) as u32).max(1);
    (scale(width), scale(height))
}

struct VideoOutput {
    scaler: scaling::Context,
    frame: frame::Video,
    layout: PixelLayout,
}

/// A stream the main loop can draw frames from.
pub trait VideoSource: MediaStream {
    /// Decodes the next unit; `convert` asks for a converted frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfStream`] at the end of the stream.
    fn decode_next(&mut self, convert: bool) -> Result<Option<FrameView<'_>>>;
}

/// A stream the main loop can fill the audio ring from.
pub trait AudioSource: MediaStream {
    /// Decodes the next unit into `out`, returning the samples written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfStream`] at the end of the stream.
    fn decode_into(&mut self, out: &mut [i16]) -> Result<usize>;
}

/// Video stream decoding to framebuffer pixels.
pub struct VideoStream {
    stream: TimedStream,
    decoder: decoder::Video,
    decoded: frame::Video,
    output: Option<VideoOutput>,
}

impl VideoStream {
    /// Opens the best (or `index_hint`-th) video stream of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] if there is no video stream or its codec fails to open.
    pub fn open(path: &Path, index_hint: Option<usize>) -> Result<Self> {
        let (stream, context) = TimedStream::open(path, StreamKind::Video, index_hint)?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| OpenError::from_codec_message(&e.to_string()))?;
        Ok(Self {
            stream,
            decoder,
            decoded: frame::Video::empty(),
            output: None,
        })
    }

    /// Source frame size in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }

    /// Sets up conversion to `layout` at `zoom` times the source size.
    ///
    /// # Errors
    ///
    /// Returns an error if the scaler cannot be created.
    pub fn configure_output(&mut self, zoom: f32, layout: PixelLayout) -> Result<()> {
        let (width, height) = self.dimensions();
        let (out_width, out_height) = zoomed_size(width, height, zoom);
        let scaler = scaling::Context::get(
            self.decoder.format(),
            width,
            height,
            layout.pixel(),
            out_width,
            out_height,
            scaling::Flags::FAST_BILINEAR,
        )
        .map_err(|e| Error::Decode(format!("Failed to create scaler: {e}")))?;
        tracing::debug!(out_width, out_height, ?layout, "video output configured");
        self.output = Some(VideoOutput {
            scaler,
            frame: frame::Video::empty(),
            layout,
        });
        Ok(())
    }

    /// Decodes the next packet of the stream.
    ///
    /// Returns the converted frame when a picture came out and `convert` is
    /// set; `None` when the decoder needs more input or conversion is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfStream`] at the end of the file, or a decode
    /// error when conversion fails.
    pub fn decode_next(&mut self, convert: bool) -> Result<Option<FrameView<'_>>> {
        let packet = self.stream.next_packet()?;
        if let Err(err) = self.decoder.send_packet(&packet) {
            tracing::debug!(%err, "video packet rejected");
            return Ok(None);
        }
        if self.decoder.receive_frame(&mut self.decoded).is_err() {
            return Ok(None);
        }
        if !convert {
            return Ok(None);
        }
        let Some(output) = self.output.as_mut() else {
            return Ok(None);
        };
        output.scaler.run(&self.decoded, &mut output.frame)?;
        Ok(Some(FrameView {
            pixels: output.frame.data(0),
            stride: output.frame.stride(0),
            width: output.frame.width() as usize,
            height: output.frame.height() as usize,
            bytes_per_pixel: output.layout.bytes_per_pixel(),
        }))
    }
}

impl MediaStream for VideoStream {
    fn clock(&self) -> &StreamClock {
        self.stream.clock()
    }

    fn clock_mut(&mut self) -> &mut StreamClock {
        self.stream.clock_mut()
    }

    fn duration(&self) -> i64 {
        self.stream.duration()
    }

    fn seek_reference(&self) -> SeekReference {
        self.stream.seek_reference()
    }

    fn seek(&mut self, target_ms: i64, reference: SeekReference) -> Result<()> {
        let result = self.stream.seek(target_ms, reference);
        self.decoder.flush();
        result
    }
}

impl VideoSource for VideoStream {
    fn decode_next(&mut self, convert: bool) -> Result<Option<FrameView<'_>>> {
        VideoStream::decode_next(self, convert)
    }
}

/// Audio stream decoding to packed S16 PCM.
pub struct AudioStream {
    stream: TimedStream,
    decoder: decoder::Audio,
    decoded: frame::Audio,
    output: Option<(resampling::Context, AudioFormat)>,
}

impl AudioStream {
    /// Opens the best (or `index_hint`-th) audio stream of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] if there is no audio stream or its codec fails to open.
    pub fn open(path: &Path, index_hint: Option<usize>) -> Result<Self> {
        let (stream, context) = TimedStream::open(path, StreamKind::Audio, index_hint)?;
        let decoder = context
            .decoder()
            .audio()
            .map_err(|e| OpenError::from_codec_message(&e.to_string()))?;
        Ok(Self {
            stream,
            decoder,
            decoded: frame::Audio::empty(),
            output: None,
        })
    }

    /// Sets up resampling to the device format.
    ///
    /// # Errors
    ///
    /// Returns an error if the resampler cannot be created.
    pub fn configure_output(&mut self, format: AudioFormat) -> Result<()> {
        let layout = match format.channels {
            1 => ChannelLayout::MONO,
            _ => ChannelLayout::STEREO,
        };
        let resampler = resampling::Context::get(
            self.decoder.format(),
            self.decoder.channel_layout(),
            self.decoder.rate(),
            Sample::I16(sample::Type::Packed),
            layout,
            format.rate,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {e}")))?;
        tracing::debug!(
            source_rate = self.decoder.rate(),
            rate = format.rate,
            channels = format.channels,
            "audio output configured"
        );
        self.output = Some((resampler, format));
        Ok(())
    }

    /// Decodes the next packet into `out` and returns the sample count written.
    ///
    /// Samples that do not fit in `out` are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfStream`] at the end of the file.
    pub fn decode_into(&mut self, out: &mut [i16]) -> Result<usize> {
        let packet = self.stream.next_packet()?;
        if let Err(err) = self.decoder.send_packet(&packet) {
            tracing::debug!(%err, "audio packet rejected");
            return Ok(0);
        }
        let mut written = 0;
        while self.decoder.receive_frame(&mut self.decoded).is_ok() {
            let Some((resampler, format)) = self.output.as_mut() else {
                continue;
            };
            let mut resampled = frame::Audio::empty();
            if let Err(err) = resampler.run(&self.decoded, &mut resampled) {
                tracing::debug!(%err, "audio resampling failed");
                continue;
            }
            let count = resampled.samples() * usize::from(format.channels);
            let data = resampled.data(0);
            let bytes = data.get(..count * 2).unwrap_or(data);
            let room = &mut out[written..];
            let copied = room.len().min(bytes.len() / 2);
            for (dst, src) in room.iter_mut().zip(bytes.chunks_exact(2)) {
                *dst = i16::from_ne_bytes([src[0], src[1]]);
            }
            written += copied;
        }
        Ok(written)
    }
}

impl MediaStream for AudioStream {
    fn clock(&self) -> &StreamClock {
        self.stream.clock()
    }

    fn clock_mut(&mut self) -> &mut StreamClock {
        self.stream.clock_mut()
    }

    fn duration(&self) -> i64 {
        self.stream.duration()
    }

    fn seek_reference(&self) -> SeekReference {
        self.stream.seek_reference()
    }

    fn seek(&mut self, target_ms: i64, reference: SeekReference) -> Result<()> {
        let result = self.stream.seek(target_ms, reference);
        self.decoder.flush();
        result
    }
}

impl AudioSource for AudioStream {
    fn decode_into(&mut self, out: &mut [i16]) -> Result<usize> {
        AudioStream::decode_into(self, out)
    }
}

/// Subtitle stream decoding to timeline entries.
pub struct SubtitleStream {
    stream: TimedStream,
    decoder: decoder::Subtitle,
}

impl SubtitleStream {
    /// Opens the best (or `index_hint`-th) subtitle stream of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] if there is no subtitle stream or its codec fails to open.
    pub fn open(path: &Path, index_hint: Option<usize>) -> Result<Self> {
        let (stream, context) = TimedStream::open(path, StreamKind::Subtitle, index_hint)?;
        let decoder = context
            .decoder()
            .subtitle()
            .map_err(|e| OpenError::from_codec_message(&e.to_string()))?;
        Ok(Self { stream, decoder })
    }

    /// Decodes the next cue; `None` when the packet produced no subtitle.
    ///
    /// The display interval is relative to the packet position, with the
    /// cue's display offsets in milliseconds. Cues without an end offset
    /// last as long as their packet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfStream`] at the end of the file, or a decode
    /// error for a malformed packet.
    pub fn decode_next(&mut self) -> Result<Option<SubtitleEntry>> {
        let packet = self.stream.next_packet()?;
        let mut subtitle = Subtitle::new();
        if !self.decoder.decode(&packet, &mut subtitle)? {
            return Ok(None);
        }
        let text = match subtitle.rects().next() {
            Some(Rect::Text(text)) => cue_text(Some(text.get()), None),
            Some(Rect::Ass(ass)) => cue_text(None, Some(ass.get())),
            _ => String::new(),
        };
        let base = self.stream.position();
        let start = i64::from(subtitle.start());
        let end = if subtitle.end() > subtitle.start() {
            i64::from(subtitle.end())
        } else {
            start + self.stream.ticks_to_ms(packet.duration())
        };
        Ok(Some(SubtitleEntry::new(base + start, base + end, text)))
    }
}
