// SPDX-License-Identifier: MPL-2.0
//! The playback session: opens streams and devices, then runs the main loop.
//!
//! One loop iteration handles pending keys, then lets [`Playback`] refill
//! the audio ring and decode at most one video frame when the sync gate
//! allows it. Audio is written by the output thread.

use crate::cli::{PlayerOptions, StreamChoice};
use crate::config::{Config, AUDIO_SLOT_COUNT, AUDIO_SLOT_SAMPLES, PAUSED_INPUT_WAIT_MS};
use crate::error::{OpenError, Result};
use crate::framebuffer::Framebuffer;
use crate::player::audio_output::{AudioOutput, CpalSink};
use crate::player::blit::{fullscreen_zoom, FrameSink, Placement};
use crate::player::clock::SystemClock;
use crate::player::decode::{AudioStream, VideoStream};
use crate::player::playback::Playback;
use crate::player::ring::{audio_ring, RingProducer};
use crate::player::status::display_name;
use crate::player::subtitle::SubtitleTimeline;
use crate::player::sync::SyncController;
use crate::player::transport::CommandReader;
use crate::terminal::InputSource;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to start a session, merged from flags and settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub path: PathBuf,
    pub zoom: f32,
    pub fullscreen: bool,
    pub frame_skip: u32,
    pub video: StreamChoice,
    pub audio: StreamChoice,
    pub placement: Placement,
    pub sync_window: u32,
    pub sync_period: u32,
    /// Frames decoded before the startup drift becomes the target; 0 disables.
    pub warmup_frames: u32,
    pub subtitles: Option<PathBuf>,
    pub audio_device: Option<String>,
    pub framebuffer: PathBuf,
}

impl SessionSettings {
    /// Merges command-line flags with the settings file.
    ///
    /// `framebuffer_env` is the value of `FBDEV`, which wins over the file.
    #[must_use]
    pub fn new(options: PlayerOptions, config: &Config, framebuffer_env: Option<String>) -> Self {
        Self {
            zoom: options.zoom,
            fullscreen: options.fullscreen,
            frame_skip: options.frame_skip,
            video: options.video,
            audio: options.audio,
            placement: Placement {
                magnify: options.magnify,
                offset_x: options.offset_x,
                offset_y: options.offset_y,
                right: options.right,
                bottom: options.bottom,
            },
            sync_window: config.sync_window(),
            sync_period: options.sync_period,
            warmup_frames: if options.capture_drift {
                config.warmup_frames()
            } else {
                0
            },
            subtitles: options.subtitles,
            audio_device: config.audio_device.clone(),
            framebuffer: config.framebuffer_path(framebuffer_env),
            path: options.path,
        }
    }
}

/// Framebuffer video, cpal audio and FFmpeg streams.
type ConsolePlayback = Playback<VideoStream, AudioStream, Framebuffer, SystemClock>;

/// An open media file with its output devices.
pub struct Session<I: InputSource> {
    playback: ConsolePlayback,
    commands: CommandReader,
    input: I,
}

fn open_video(settings: &SessionSettings) -> Result<(VideoStream, Framebuffer)> {
    let mut stream = VideoStream::open(&settings.path, settings.video.index_hint())?;
    let screen = Framebuffer::open(&settings.framebuffer)?;
    let (width, height) = stream.dimensions();
    let zoom = if settings.fullscreen {
        fullscreen_zoom(
            screen.rows(),
            screen.cols(),
            width,
            height,
            settings.placement.magnify,
        )
    } else {
        settings.zoom
    };
    stream.configure_output(zoom, screen.layout())?;
    Ok((stream, screen))
}

fn open_audio(
    settings: &SessionSettings,
    exit: &Arc<AtomicBool>,
) -> Result<(AudioStream, RingProducer, AudioOutput)> {
    let mut stream = AudioStream::open(&settings.path, settings.audio.index_hint())?;
    let (producer, consumer) = audio_ring(AUDIO_SLOT_COUNT, AUDIO_SLOT_SAMPLES);
    let device = settings.audio_device.clone();
    let mut output = AudioOutput::spawn(consumer, Arc::clone(exit), move || {
        CpalSink::open(device.as_deref())
    })?;
    if let Err(err) = stream.configure_output(output.format()) {
        // The output thread only stops on `exit`; nothing else runs yet.
        exit.store(true, Ordering::Release);
        output.join();
        exit.store(false, Ordering::Release);
        return Err(err);
    }
    Ok((stream, producer, output))
}

impl<I: InputSource> Session<I> {
    /// Opens the requested streams, the framebuffer and the audio device.
    ///
    /// A stream that fails to open is disabled with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError::NoStream`] when neither video nor audio could be opened.
    pub fn open(settings: &SessionSettings, input: I) -> Result<Self> {
        let exit = Arc::new(AtomicBool::new(false));

        let video = if settings.video.is_enabled() {
            open_video(settings)
                .inspect_err(|err| tracing::warn!(%err, "video disabled"))
                .ok()
        } else {
            None
        };
        let audio = if settings.audio.is_enabled() {
            open_audio(settings, &exit)
                .inspect_err(|err| tracing::warn!(%err, "audio disabled"))
                .ok()
        } else {
            None
        };
        if video.is_none() && audio.is_none() {
            return Err(OpenError::NoStream("playable").into());
        }

        let subtitles = settings.subtitles.as_deref().and_then(|path| {
            SubtitleTimeline::load(path)
                .inspect_err(|err| tracing::warn!(%err, path = %path.display(), "subtitles ignored"))
                .ok()
        });

        tracing::info!(
            path = %settings.path.display(),
            video = video.is_some(),
            audio = audio.is_some(),
            "playback started"
        );

        let sync = SyncController::new(
            settings.sync_window,
            settings.sync_period,
            settings.warmup_frames,
        );
        let mut playback = Playback::new(sync, SystemClock, exit)
            .with_name(display_name(&settings.path))
            .with_subtitles(subtitles);
        if let Some((stream, screen)) = video {
            playback = playback.with_video(stream, screen, settings.placement, settings.frame_skip);
        }
        if let Some((stream, producer, output)) = audio {
            playback = playback.with_audio(stream, producer, output);
        }

        Ok(Self {
            playback,
            commands: CommandReader::new(),
            input,
        })
    }

    /// Runs until every stream ended, `q` was pressed, or a signal arrived.
    ///
    /// Playback problems are logged and skipped.
    pub fn run(&mut self) {
        while !self.playback.is_finished() {
            self.read_commands();
            if self.playback.should_stop() {
                break;
            }
            if self.playback.is_paused() {
                self.input
                    .wait(Duration::from_millis(PAUSED_INPUT_WAIT_MS));
                continue;
            }
            self.playback.step();
        }

        if !self.playback.should_stop() {
            self.playback.wait_for_audio();
        }
        self.playback.shutdown();
    }

    fn read_commands(&mut self) {
        while let Some(byte) = self.input.read_byte() {
            if let Some(command) = self.commands.feed(byte) {
                self.playback.execute(command);
            }
        }
    }
}
