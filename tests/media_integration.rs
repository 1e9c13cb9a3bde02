// SPDX-License-Identifier: MPL-2.0
//! Integration tests for demuxing and decoding real media files.
//!
//! Every sample is written to a temporary directory by the test itself:
//! raw YUV4MPEG video, PCM WAV audio, SubRip and ASS subtitles.

use fbplay::error::{Error, OpenError};
use fbplay::player::audio_output::AudioFormat;
use fbplay::player::decode::{AudioStream, PixelLayout, SubtitleStream, VideoStream};
use fbplay::player::{MediaStream, SubtitleEntry, SubtitleTimeline, WallClock};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const FRAME_SIDE: usize = 16;
const FRAME_COUNT: usize = 50;
const FRAME_MS: i64 = 40;
const WAV_RATE: u32 = 8_000;
const WAV_SAMPLES: usize = 4_000;
const WAV_LEVEL: i16 = 1_000;

/// Wall clock that never moves and records requested sleeps.
struct StillClock {
    now: i64,
    slept: Cell<i64>,
}

impl StillClock {
    fn new(now: i64) -> Self {
        Self {
            now,
            slept: Cell::new(0),
        }
    }
}

impl WallClock for StillClock {
    fn now_ms(&self) -> i64 {
        self.now
    }

    fn sleep_ms(&self, ms: i64) {
        self.slept.set(self.slept.get() + ms);
    }
}

fn write_sample(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).expect("Should write sample file");
    path
}

/// 16x16 yuv420p at 25 fps, one gray level per frame.
fn y4m_video(frames: usize) -> Vec<u8> {
    let mut data = format!("YUV4MPEG2 W{FRAME_SIDE} H{FRAME_SIDE} F25:1 Ip A1:1 C420jpeg\n").into_bytes();
    let luma = FRAME_SIDE * FRAME_SIDE;
    let chroma = luma / 4;
    for n in 0..frames {
        data.extend_from_slice(b"FRAME\n");
        data.extend(std::iter::repeat(16 + (n % 200) as u8).take(luma));
        data.extend(std::iter::repeat(128u8).take(2 * chroma));
    }
    data
}

/// Mono S16 WAV with an explicit front-center channel mask.
fn wav_audio(samples: usize, level: i16) -> Vec<u8> {
    let data_len = (samples * 2) as u32;
    let mut data = Vec::with_capacity(68 + samples * 2);
    data.extend_from_slice(b"RIFF");
    data.extend_from_slice(&(60 + data_len).to_le_bytes());
    data.extend_from_slice(b"WAVE");
    data.extend_from_slice(b"fmt ");
    data.extend_from_slice(&40u32.to_le_bytes());
    data.extend_from_slice(&0xFFFEu16.to_le_bytes()); // WAVE_FORMAT_EXTENSIBLE
    data.extend_from_slice(&1u16.to_le_bytes()); // channels
    data.extend_from_slice(&WAV_RATE.to_le_bytes());
    data.extend_from_slice(&(WAV_RATE * 2).to_le_bytes()); // byte rate
    data.extend_from_slice(&2u16.to_le_bytes()); // block align
    data.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    data.extend_from_slice(&22u16.to_le_bytes()); // extension size
    data.extend_from_slice(&16u16.to_le_bytes()); // valid bits
    data.extend_from_slice(&4u32.to_le_bytes()); // SPEAKER_FRONT_CENTER
    // KSDATAFORMAT_SUBTYPE_PCM
    data.extend_from_slice(&[
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38,
        0x9B, 0x71,
    ]);
    data.extend_from_slice(b"data");
    data.extend_from_slice(&data_len.to_le_bytes());
    for _ in 0..samples {
        data.extend_from_slice(&level.to_le_bytes());
    }
    data
}

const SRT_CUES: &str = "1
00:00:01,000 --> 00:00:02,000
Hello

2
00:00:05,000 --> 00:00:07,500
Second line
continues

3
00:00:08,000 --> 00:00:09,000
third
";

fn ass_script(long_text: &str) -> String {
    format!(
        "[Script Info]
ScriptType: v4.00+
PlayResX: 384
PlayResY: 288

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Default,Arial,20,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,1,0,2,10,10,10,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
Dialogue: 0,0:00:01.00,0:00:02.50,Default,,0,0,0,,first, with comma
Dialogue: 0,0:00:04.00,0:00:06.00,Default,,0,0,0,,{long_text}
"
    )
}

#[test]
fn test_video_frames_are_converted_to_framebuffer_layout() {
    let dir = tempdir().expect("Should create temp dir");
    let path = write_sample(&dir, "clip.y4m", &y4m_video(FRAME_COUNT));

    let mut video = VideoStream::open(&path, None).expect("Should open video stream");
    assert_eq!(video.dimensions(), (FRAME_SIDE as u32, FRAME_SIDE as u32));

    video
        .configure_output(0.5, PixelLayout::Rgb565)
        .expect("Should configure scaler");
    let frame = video
        .decode_next(true)
        .expect("Should decode first frame")
        .expect("Should convert first frame");
    assert_eq!(
        (frame.width, frame.height, frame.bytes_per_pixel),
        (FRAME_SIDE / 2, FRAME_SIDE / 2, 2)
    );
    assert_eq!(frame.row(0).len(), FRAME_SIDE);

    // Skipped conversions still consume the frame.
    assert!(video.decode_next(false).expect("Should decode").is_none());
    assert_eq!(video.position(), FRAME_MS);
}

#[test]
fn test_video_plays_to_end_of_stream() {
    let dir = tempdir().expect("Should create temp dir");
    let path = write_sample(&dir, "short.y4m", &y4m_video(5));

    let mut video = VideoStream::open(&path, None).expect("Should open video stream");
    video
        .configure_output(1.0, PixelLayout::Bgra32)
        .expect("Should configure scaler");
    let mut frames = 0;
    loop {
        match video.decode_next(true) {
            Ok(Some(frame)) => {
                assert_eq!((frame.width, frame.height), (FRAME_SIDE, FRAME_SIDE));
                frames += 1;
            }
            Ok(None) => {}
            Err(Error::EndOfStream) => break,
            Err(err) => panic!("Unexpected decode error: {err}"),
        }
        assert!(frames <= 5, "Decoded past the last frame");
    }
    assert_eq!(frames, 5);
    assert_eq!(video.position(), 4 * FRAME_MS);
}

#[test]
fn test_seek_rewinds_and_skips_the_pacing_wait() {
    let dir = tempdir().expect("Should create temp dir");
    let path = write_sample(&dir, "clip.y4m", &y4m_video(FRAME_COUNT));
    let mut video = VideoStream::open(&path, None).expect("Should open video stream");

    for _ in 0..10 {
        video.decode_next(false).expect("Should decode frame");
    }
    assert_eq!(video.position(), 9 * FRAME_MS);

    let wall = StillClock::new(1_000);
    assert_eq!(video.clock_mut().pace(&wall), 0);
    assert_eq!(video.clock_mut().pace(&wall), FRAME_MS);

    let reference = video.seek_reference();
    video.seek(0, reference).expect("Should seek to start");
    assert_eq!(video.clock().baseline_ms(), None);
    assert_eq!(video.clock_mut().pace(&wall), 0);
    assert_eq!(wall.slept.get(), FRAME_MS);

    video.decode_next(false).expect("Should decode after seek");
    assert_eq!(video.position(), 0);
}

#[test]
fn test_audio_decodes_to_device_samples() {
    let dir = tempdir().expect("Should create temp dir");
    let path = write_sample(&dir, "tone.wav", &wav_audio(WAV_SAMPLES, WAV_LEVEL));

    let mut audio = AudioStream::open(&path, None).expect("Should open audio stream");
    assert_eq!(audio.duration(), 500);
    audio
        .configure_output(AudioFormat {
            rate: WAV_RATE,
            channels: 1,
        })
        .expect("Should create resampler");

    let mut buffer = vec![0i16; 1 << 17];
    let mut total = 0;
    loop {
        match audio.decode_into(&mut buffer) {
            Ok(n) => {
                assert!(buffer[..n].iter().all(|&sample| sample == WAV_LEVEL));
                total += n;
            }
            Err(Error::EndOfStream) => break,
            Err(err) => panic!("Unexpected decode error: {err}"),
        }
    }
    assert!(total > 0, "Should produce PCM samples");
    assert!(total <= WAV_SAMPLES);
}

#[test]
fn test_audio_seek_drops_pacing_baseline() {
    let dir = tempdir().expect("Should create temp dir");
    let path = write_sample(&dir, "tone.wav", &wav_audio(WAV_SAMPLES, WAV_LEVEL));
    let mut audio = AudioStream::open(&path, None).expect("Should open audio stream");
    audio
        .configure_output(AudioFormat {
            rate: WAV_RATE,
            channels: 1,
        })
        .expect("Should create resampler");

    let mut buffer = vec![0i16; 1 << 17];
    audio.decode_into(&mut buffer).expect("Should decode");
    let wall = StillClock::new(0);
    audio.clock_mut().pace(&wall);
    assert!(audio.clock().baseline_ms().is_some());

    let reference = audio.seek_reference();
    audio.seek(250, reference).expect("Should seek");
    assert_eq!(audio.clock_mut().pace(&wall), 0);
    assert_eq!(wall.slept.get(), 0);
    assert!(audio.decode_into(&mut buffer).is_ok());
}

#[test]
fn test_srt_cues_load_with_intervals_and_first_line() {
    let dir = tempdir().expect("Should create temp dir");
    let path = write_sample(&dir, "cues.srt", SRT_CUES.as_bytes());

    let timeline = SubtitleTimeline::load(&path).expect("Should load subtitles");
    assert_eq!(
        timeline.entries(),
        &[
            SubtitleEntry::new(1_000, 2_000, "Hello"),
            SubtitleEntry::new(5_000, 7_500, "Second line"),
            SubtitleEntry::new(8_000, 9_000, "third"),
        ]
    );
    assert_eq!(timeline.lookup(1_500).map(|e| e.text.as_str()), Some("Hello"));
    assert!(timeline.lookup(3_000).is_none());
    assert_eq!(timeline.lookup(7_500).map(|e| e.text.as_str()), Some("Second line"));
}

#[test]
fn test_ass_cues_skip_event_fields_and_cap_length() {
    let dir = tempdir().expect("Should create temp dir");
    let long_text: String = ('a'..='z').cycle().take(120).collect();
    let path = write_sample(&dir, "cues.ass", ass_script(&long_text).as_bytes());

    let mut stream = SubtitleStream::open(&path, None).expect("Should open subtitle stream");
    let mut entries = Vec::new();
    loop {
        match stream.decode_next() {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err(Error::EndOfStream) => break,
            Err(err) => panic!("Unexpected decode error: {err}"),
        }
    }

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], SubtitleEntry::new(1_000, 2_500, "first, with comma"));
    assert_eq!((entries[1].begin_ms, entries[1].end_ms), (4_000, 6_000));
    assert_eq!(entries[1].text.len(), 79);
    assert_eq!(entries[1].text, long_text[..79]);
}

#[test]
fn test_missing_stream_kind_is_reported() {
    let dir = tempdir().expect("Should create temp dir");
    let path = write_sample(&dir, "cues.srt", SRT_CUES.as_bytes());
    assert!(matches!(
        VideoStream::open(&path, None),
        Err(Error::Open(OpenError::NoStream("video")))
    ));
}

#[test]
fn test_nonexistent_file_fails_to_open() {
    assert!(matches!(
        VideoStream::open(Path::new("tests/data/does-not-exist.mkv"), None),
        Err(Error::Open(_))
    ));
}
