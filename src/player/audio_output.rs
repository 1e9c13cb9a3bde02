// SPDX-License-Identifier: MPL-2.0
//! Audio output thread and device backends.
//!
//! The output thread drains the audio ring into an [`AudioSink`]. The sink is
//! opened on that thread, so device handles that are not `Send` never cross
//! threads; only the negotiated [`AudioFormat`] is reported back.

use crate::config::{AUDIO_DEVICE_BUFFER_MS, AUDIO_WRITE_TIMEOUT_MS, IDLE_POLL_MS};
use crate::error::{Error, Result};
use crate::player::ring::{ResetKind, RingConsumer};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::channel;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// PCM layout expected by the device: packed signed 16-bit, interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    /// Number of whole frames in `samples` interleaved samples.
    #[must_use]
    pub fn frames(&self, samples: usize) -> usize {
        samples / usize::from(self.channels.max(1))
    }
}

/// A blocking PCM output device.
pub trait AudioSink {
    /// Format the device was opened with.
    fn format(&self) -> AudioFormat;

    /// Writes interleaved samples, blocking while the device buffer is full.
    ///
    /// Returns the number of frames accepted, which may be short.
    fn write(&mut self, samples: &[i16]) -> Result<usize>;

    /// Brings the device back to a playable state after a failed write.
    fn recover(&mut self) -> Result<()>;

    /// Blocks until buffered audio has been played.
    fn drain(&mut self) -> Result<()>;

    /// Stops playback and drops buffered audio.
    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;
}

/// Samples waiting for the cpal callback.
struct PendingQueue {
    samples: Mutex<VecDeque<i16>>,
    space: Condvar,
    capacity: usize,
    failed: AtomicBool,
}

impl PendingQueue {
    fn clear(&self) {
        if let Ok(mut samples) = self.samples.lock() {
            samples.clear();
        }
        self.space.notify_all();
    }
}

/// [`AudioSink`] backed by a cpal output stream.
///
/// cpal pulls samples from a callback; a bounded queue of about half a second
/// turns that into blocking writes.
pub struct CpalSink {
    format: AudioFormat,
    queue: Arc<PendingQueue>,
    stream: cpal::Stream,
}

impl CpalSink {
    /// Opens the named output device, or the host default when `name` is `None`.
    ///
    /// Output is mono on mono devices and stereo otherwise, at the device's
    /// default rate.
    ///
    /// # Errors
    ///
    /// Returns an error if no device is found, the configuration cannot be
    /// retrieved, or the stream fails to build or start.
    pub fn open(name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match name {
            Some(wanted) => host
                .output_devices()
                .map_err(|e| Error::Device(format!("Failed to list audio devices: {e}")))?
                .find(|device| device.name().is_ok_and(|n| n == wanted))
                .ok_or_else(|| Error::Device(format!("Audio device not found: {wanted}")))?,
            None => host
                .default_output_device()
                .ok_or_else(|| Error::Device("No audio output device found".to_string()))?,
        };

        let supported_config = device
            .default_output_config()
            .map_err(|e| Error::Device(format!("Failed to get audio config: {e}")))?;

        let sample_rate = supported_config.sample_rate();
        let channels = if supported_config.channels() == 1 { 1 } else { 2 };
        let format = AudioFormat {
            rate: sample_rate,
            channels,
        };
        let config = cpal::StreamConfig {
            channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = (sample_rate as usize) * usize::from(channels)
            * AUDIO_DEVICE_BUFFER_MS as usize
            / 1000;
        let queue = Arc::new(PendingQueue {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            space: Condvar::new(),
            capacity: capacity.max(1),
            failed: AtomicBool::new(false),
        });

        let stream = match supported_config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config, Arc::clone(&queue))?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config, Arc::clone(&queue))?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config, Arc::clone(&queue))?
            }
            other => {
                return Err(Error::Device(format!(
                    "Unsupported audio sample format: {other:?}"
                )))
            }
        };

        stream
            .play()
            .map_err(|e| Error::Device(format!("Failed to start audio stream: {e}")))?;

        tracing::info!(
            rate = format.rate,
            channels = format.channels,
            "audio device opened"
        );

        Ok(Self {
            format,
            queue,
            stream,
        })
    }

    /// Builds an output stream for a specific device sample format.
    fn build_stream<T: cpal::SizedSample + cpal::FromSample<i16>>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        queue: Arc<PendingQueue>,
    ) -> Result<cpal::Stream> {
        let error_queue = Arc::clone(&queue);
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut pending) = queue.samples.lock() else {
                        // Mutex poisoned, output silence
                        data.fill(T::from_sample(0i16));
                        return;
                    };
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(pending.pop_front().unwrap_or(0));
                    }
                    drop(pending);
                    queue.space.notify_one();
                },
                move |err| {
                    tracing::error!(%err, "audio stream error");
                    error_queue.failed.store(true, Ordering::Release);
                },
                None,
            )
            .map_err(|e| Error::Device(format!("Failed to build audio stream: {e}")))
    }
}

impl AudioSink for CpalSink {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize> {
        if self.queue.failed.load(Ordering::Acquire) {
            return Err(Error::Device("audio stream failed".to_string()));
        }
        let deadline = Instant::now() + Duration::from_millis(AUDIO_WRITE_TIMEOUT_MS);
        let mut pending = self
            .queue
            .samples
            .lock()
            .map_err(|_| Error::Device("audio queue poisoned".to_string()))?;
        let mut written = 0;
        while written < samples.len() {
            let room = self.queue.capacity.saturating_sub(pending.len());
            if room == 0 {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let (guard, _) = self
                    .queue
                    .space
                    .wait_timeout(pending, deadline - now)
                    .map_err(|_| Error::Device("audio queue poisoned".to_string()))?;
                pending = guard;
                continue;
            }
            let end = written + room.min(samples.len() - written);
            pending.extend(&samples[written..end]);
            written = end;
        }
        Ok(self.format.frames(written))
    }

    fn recover(&mut self) -> Result<()> {
        self.queue.failed.store(false, Ordering::Release);
        self.stream
            .play()
            .map_err(|e| Error::Device(format!("Failed to restart audio stream: {e}")))
    }

    fn drain(&mut self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(AUDIO_WRITE_TIMEOUT_MS);
        loop {
            let empty = self
                .queue
                .samples
                .lock()
                .map(|pending| pending.is_empty())
                .unwrap_or(true);
            if empty || self.queue.failed.load(Ordering::Acquire) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Device("timed out draining audio".to_string()));
            }
            std::thread::sleep(Duration::from_millis(IDLE_POLL_MS));
        }
    }

    fn pause(&mut self) -> Result<()> {
        self.queue.clear();
        self.stream
            .pause()
            .map_err(|e| Error::Device(format!("Failed to pause audio stream: {e}")))
    }

    fn resume(&mut self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| Error::Device(format!("Failed to resume audio stream: {e}")))
    }
}

/// Handle to the running output thread.
pub struct AudioOutput {
    handle: Option<JoinHandle<()>>,
    format: AudioFormat,
}

impl AudioOutput {
    /// Starts the output thread and opens the device on it with `open`.
    ///
    /// The thread runs until `exit` is raised. Returns once the device is open.
    ///
    /// # Errors
    ///
    /// Returns the device error if `open` fails; the thread has exited by then.
    pub fn spawn<S, F>(consumer: RingConsumer, exit: Arc<AtomicBool>, open: F) -> Result<Self>
    where
        S: AudioSink + 'static,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let (format_tx, format_rx) = channel::bounded(1);
        let handle = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let sink = match open() {
                    Ok(sink) => sink,
                    Err(err) => {
                        let _ = format_tx.send(Err(err));
                        return;
                    }
                };
                if format_tx.send(Ok(sink.format())).is_err() {
                    return;
                }
                run_output(sink, consumer, &exit);
            })?;

        let opened = format_rx
            .recv()
            .map_err(|_| Error::Device("audio output thread exited".to_string()))
            .and_then(|result| result);
        match opened {
            Ok(format) => Ok(Self {
                handle: Some(handle),
                format,
            }),
            Err(err) => {
                let _ = handle.join();
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Waits for the thread to finish. The caller raises `exit` first.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("audio output thread panicked");
            }
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.join();
    }
}

/// Output thread body: drains the ring into `sink` until `exit` is raised.
fn run_output<S: AudioSink>(mut sink: S, mut consumer: RingConsumer, exit: &AtomicBool) {
    let idle = Duration::from_millis(IDLE_POLL_MS);
    let mut device_paused = false;

    while !exit.load(Ordering::Acquire) {
        if let Some(kind) = consumer.pending_reset() {
            if kind == ResetKind::FlushAndPause && !device_paused {
                if let Err(err) = sink.pause() {
                    tracing::warn!(%err, "failed to pause audio device");
                }
                device_paused = true;
            }
            consumer.acknowledge_reset();
            continue;
        }
        if consumer.is_paused() || consumer.is_empty() {
            std::thread::sleep(idle);
            continue;
        }
        if device_paused {
            if let Err(err) = sink.resume() {
                // Stay paused and drop the slot; the next slot retries.
                tracing::warn!(%err, "failed to resume audio device");
                consumer.consume(|_| ());
                std::thread::sleep(idle);
                continue;
            }
            device_paused = false;
        }
        consumer.consume(|samples| write_slot(&mut sink, samples));
    }

    if !device_paused {
        if let Err(err) = sink.drain() {
            tracing::warn!(%err, "audio drain failed");
        }
    }
    tracing::debug!("audio output thread finished");
}

/// Writes one slot; failures are logged and the slot is dropped.
fn write_slot<S: AudioSink>(sink: &mut S, samples: &[i16]) {
    let expected = sink.format().frames(samples.len());
    match sink.write(samples) {
        Ok(written) if written < expected => {
            tracing::warn!(expected, written, "short audio write");
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(%err, "audio write failed");
            if let Err(err) = sink.recover() {
                tracing::warn!(%err, "audio device recovery failed");
            }
        }
    }
}
