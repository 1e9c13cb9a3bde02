// SPDX-License-Identifier: MPL-2.0
//! Playback state machine behind the main loop.
//!
//! [`Playback`] owns the decoded streams, the audio ring producer, the sync
//! gate and the marks. It applies key commands and advances playback one
//! step at a time; the session only supplies input bytes and devices.

use crate::config::IDLE_POLL_MS;
use crate::error::Error;
use crate::player::audio_output::AudioOutput;
use crate::player::blit::{present, FrameSink, Placement};
use crate::player::clock::{drift_ms, WallClock};
use crate::player::decode::{AudioSource, VideoSource};
use crate::player::ring::{ResetKind, RingProducer};
use crate::player::status::{self, status_line, subtitle_line, PlayState};
use crate::player::stream::{MediaStream, SeekReference};
use crate::player::subtitle::{SubtitleCursor, SubtitleTimeline, SubtitleUpdate};
use crate::player::sync::{SyncAction, SyncController};
use crate::player::time_units::MILLIS_PER_SECOND;
use crate::player::transport::{seek_target, Command, MarkTable, PREVIOUS_POSITION_MARK};
use crate::terminal::interrupted;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Whether frame number `frames_decoded` is converted and drawn.
fn should_convert(frames_decoded: u64, frame_skip: u32) -> bool {
    frame_skip == 0 || frames_decoded % (u64::from(frame_skip) + 1) == 0
}

struct VideoPath<V, F> {
    stream: V,
    screen: F,
    placement: Placement,
    frame_skip: u32,
    frames_decoded: u64,
    done: bool,
}

struct AudioPath<A> {
    stream: A,
    producer: RingProducer,
    output: AudioOutput,
    done: bool,
}

/// Streams, outputs and transport state of one playback.
///
/// `exit` is shared with the audio output thread; dropping the playback
/// raises it.
pub struct Playback<V, A, F, W> {
    video: Option<VideoPath<V, F>>,
    audio: Option<AudioPath<A>>,
    subtitles: Option<SubtitleTimeline>,
    cursor: SubtitleCursor,
    sync: SyncController,
    marks: MarkTable,
    exit: Arc<AtomicBool>,
    paused: bool,
    quit: bool,
    name: String,
    wall: W,
}

impl<V, A, F, W> Playback<V, A, F, W>
where
    V: VideoSource,
    A: AudioSource,
    F: FrameSink,
    W: WallClock,
{
    /// Playback with no streams attached yet.
    #[must_use]
    pub fn new(sync: SyncController, wall: W, exit: Arc<AtomicBool>) -> Self {
        Self {
            video: None,
            audio: None,
            subtitles: None,
            cursor: SubtitleCursor::new(),
            sync,
            marks: MarkTable::new(),
            exit,
            paused: false,
            quit: false,
            name: String::new(),
            wall,
        }
    }

    /// Attaches the video stream and the screen it is drawn on.
    #[must_use]
    pub fn with_video(mut self, stream: V, screen: F, placement: Placement, frame_skip: u32) -> Self {
        self.video = Some(VideoPath {
            stream,
            screen,
            placement,
            frame_skip,
            frames_decoded: 0,
            done: false,
        });
        self
    }

    /// Attaches the audio stream, the ring producer and the output thread
    /// draining it. The thread must watch this playback's `exit` flag.
    #[must_use]
    pub fn with_audio(mut self, stream: A, producer: RingProducer, output: AudioOutput) -> Self {
        self.audio = Some(AudioPath {
            stream,
            producer,
            output,
            done: false,
        });
        self
    }

    #[must_use]
    pub fn with_subtitles(mut self, subtitles: Option<SubtitleTimeline>) -> Self {
        self.subtitles = subtitles;
        self
    }

    /// Name shown in the status line.
    #[must_use]
    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    fn reference(&self) -> Option<&dyn MediaStream> {
        match (&self.video, &self.audio) {
            (Some(video), _) => Some(&video.stream),
            (None, Some(audio)) => Some(&audio.stream),
            (None, None) => None,
        }
    }

    /// Position of the reference stream (video if open, else audio).
    #[must_use]
    pub fn position(&self) -> i64 {
        self.reference().map_or(0, |stream| stream.position())
    }

    #[must_use]
    pub fn duration(&self) -> i64 {
        self.reference().map_or(0, |stream| stream.duration())
    }

    fn seek_reference(&self) -> Option<SeekReference> {
        self.reference().map(|stream| stream.seek_reference())
    }

    /// Audio minus video position, or 0 unless both play.
    #[must_use]
    pub fn drift(&self) -> i64 {
        match (&self.video, &self.audio) {
            (Some(video), Some(audio)) => drift_ms(audio.stream.clock(), video.stream.clock()),
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Every open stream reached its end.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.video.as_ref().map_or(true, |video| video.done)
            && self.audio.as_ref().map_or(true, |audio| audio.done)
    }

    /// `q` was pressed, a signal arrived, or the output side gave up.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.quit || interrupted() || self.exit.load(Ordering::Acquire)
    }

    /// Applies one key command.
    pub fn execute(&mut self, command: Command) {
        tracing::debug!(?command, "command");
        match command {
            Command::Quit => self.quit = true,
            Command::SeekBy(secs) => self.seek(secs.saturating_mul(MILLIS_PER_SECOND), true),
            Command::SeekTo(secs) => self.seek(secs.saturating_mul(MILLIS_PER_SECOND), false),
            Command::SeekPercent(percent) => {
                let target = percent.saturating_mul(self.duration()) / 100;
                self.seek(target, false);
            }
            Command::SetMark(key) => self.marks.set(key, self.position()),
            Command::JumpToMark(key) => {
                if let Some(position) = self.marks.get(key) {
                    self.seek(position, false);
                }
            }
            Command::ShowInfo => self.show_info(),
            Command::TogglePause => self.toggle_pause(),
            Command::SetDrift(ms) => self.sync.set_target(ms),
            Command::CaptureDrift => self.sync.capture(self.drift()),
            Command::SetCorrectionWindow(window) => self.sync.set_window(window),
            Command::StartCorrection(ticks) => self.sync.start_correction(ticks),
        }
    }

    /// Moves both streams to a new position.
    ///
    /// Queued audio is flushed before the demuxers move. Absolute seeks save
    /// the old position under the `'` mark.
    fn seek(&mut self, delta_ms: i64, relative: bool) {
        let Some(reference) = self.seek_reference() else {
            return;
        };
        let position = self.position();
        let target = seek_target(position, self.duration(), delta_ms, relative);
        tracing::debug!(from = position, to = target, relative, "seek");

        if let Some(audio) = self.audio.as_mut() {
            audio.producer.request_reset(ResetKind::Flush, &self.exit);
        }
        self.sync.restart();
        if !relative {
            self.marks.set(PREVIOUS_POSITION_MARK, position);
        }

        if let Some(audio) = self.audio.as_mut() {
            if let Err(err) = audio.stream.seek(target, reference) {
                tracing::warn!(%err, "audio seek failed");
            }
            audio.done = false;
        }
        if let Some(video) = self.video.as_mut() {
            if let Err(err) = video.stream.seek(target, reference) {
                tracing::warn!(%err, "video seek failed");
            }
            video.done = false;
        }
    }

    fn toggle_pause(&mut self) {
        if let Some(audio) = self.audio.as_mut() {
            if self.paused {
                audio.producer.set_paused(false);
            } else {
                audio.producer.set_paused(true);
                audio
                    .producer
                    .request_reset(ResetKind::FlushAndPause, &self.exit);
            }
        }
        self.paused = !self.paused;
        self.sync.restart();
        tracing::debug!(paused = self.paused, "pause toggled");
    }

    fn show_info(&self) {
        let state = match (self.paused, self.audio.is_some()) {
            (false, _) => PlayState::Playing,
            (true, true) => PlayState::PausedWithAudio,
            (true, false) => PlayState::Paused,
        };
        status::print(&status_line(
            state,
            self.position(),
            self.duration(),
            self.drift(),
            &self.name,
        ));
    }

    /// One main-loop step: refill the audio ring, then decode at most one
    /// video frame. Sleeps briefly when no frame was decoded. Returns
    /// whether a frame was decoded.
    pub fn step(&mut self) -> bool {
        self.fill_audio();
        if self.video_tick() {
            self.show_subtitles();
            true
        } else {
            self.wall.sleep_ms(IDLE_POLL_MS as i64);
            false
        }
    }

    /// Decodes audio into the ring until it is full or the stream ends.
    fn fill_audio(&mut self) {
        let Some(audio) = self.audio.as_mut() else {
            return;
        };
        if audio.done {
            return;
        }
        if !audio.producer.is_consumer_alive() {
            tracing::warn!("audio output stopped");
            audio.done = true;
            return;
        }
        while let Some(result) = audio
            .producer
            .produce(|slot| audio.stream.decode_into(slot))
        {
            match result {
                Ok(_) => {}
                Err(Error::EndOfStream) => {
                    tracing::debug!("audio stream ended");
                    audio.done = true;
                    break;
                }
                Err(err) => tracing::debug!(%err, "audio packet skipped"),
            }
        }
    }

    /// Runs the sync gate and decodes one frame when it allows. Returns
    /// whether a frame was decoded.
    fn video_tick(&mut self) -> bool {
        let audio_playing = self.audio.as_ref().is_some_and(|audio| !audio.done);
        let drift = self.drift();
        let Some(video) = self.video.as_mut() else {
            return false;
        };
        if video.done {
            return false;
        }

        let action = if audio_playing {
            self.sync.decide(drift, video.frames_decoded)
        } else {
            SyncAction::Pace
        };
        match action {
            SyncAction::Skip => return false,
            SyncAction::Pace => {
                video.stream.clock_mut().pace(&self.wall);
            }
            SyncAction::Present => {}
        }

        let convert = should_convert(video.frames_decoded, video.frame_skip);
        video.frames_decoded += 1;
        match video.stream.decode_next(convert) {
            Ok(Some(frame)) => present(&frame, &mut video.screen, &video.placement),
            Ok(None) => {}
            Err(Error::EndOfStream) => {
                tracing::debug!("video stream ended");
                video.done = true;
            }
            Err(err) => tracing::debug!(%err, "video frame skipped"),
        }
        true
    }

    fn show_subtitles(&mut self) {
        let position = self.position();
        let Some(timeline) = self.subtitles.as_ref() else {
            return;
        };
        match self.cursor.advance(timeline, position) {
            SubtitleUpdate::Show(entry) => status::print(&subtitle_line(&entry.text)),
            SubtitleUpdate::Clear => status::print(status::CLEAR_LINE),
            SubtitleUpdate::Unchanged | SubtitleUpdate::Idle => {}
        }
    }

    /// Lets the output thread play what is still queued.
    pub fn wait_for_audio(&self) {
        let Some(audio) = self.audio.as_ref() else {
            return;
        };
        while !audio.producer.is_empty() && audio.producer.is_consumer_alive() {
            if interrupted() {
                return;
            }
            self.wall.sleep_ms(IDLE_POLL_MS as i64);
        }
    }

    /// Stops the output thread.
    pub fn shutdown(&mut self) {
        self.exit.store(true, Ordering::Release);
        if let Some(audio) = self.audio.as_mut() {
            audio.output.join();
        }
        tracing::info!(position_ms = self.position(), "playback stopped");
    }
}

impl<V, A, F, W> Drop for Playback<V, A, F, W> {
    fn drop(&mut self) {
        // AudioOutput joins its thread on drop, which needs the flag raised.
        self.exit.store(true, Ordering::Release);
    }
}
