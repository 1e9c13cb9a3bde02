// SPDX-License-Identifier: MPL-2.0
//! Test utilities for float comparisons and fake devices.
//!
//! This module re-exports the `approx` crate's assertion macros for float comparison,
//! which properly handle floating-point precision issues that `assert_eq!` cannot.

// Re-export approx macros for convenient use in tests
pub use approx::assert_abs_diff_eq;

use crate::error::{Error, Result};
use crate::player::audio_output::{AudioFormat, AudioSink};
use crate::player::clock::WallClock;
use std::cell::Cell;
use std::sync::{Arc, Mutex};

/// Manually driven [`WallClock`].
///
/// Sleeping advances the clock unless it is frozen, so pacing can be checked
/// against a fixed "now".
#[derive(Debug, Default)]
pub struct FakeClock {
    now: Cell<i64>,
    slept: Cell<i64>,
    frozen: bool,
}

impl FakeClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Cell::new(start_ms),
            ..Self::default()
        }
    }

    /// Sleeps no longer move the clock.
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get() + ms);
    }

    /// Total time passed to `sleep_ms`.
    pub fn slept_ms(&self) -> i64 {
        self.slept.get()
    }
}

impl WallClock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }

    fn sleep_ms(&self, ms: i64) {
        self.slept.set(self.slept.get() + ms);
        if !self.frozen {
            self.advance(ms);
        }
    }
}

/// Calls recorded by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Write(Vec<i16>),
    WriteFailed,
    Recover,
    Drain,
    Pause,
    Resume,
    ResumeFailed,
}

/// [`AudioSink`] that records every call.
///
/// Clones share the event log, so a test can keep one handle while the
/// output thread owns another.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    format: AudioFormat,
    events: Arc<Mutex<Vec<SinkEvent>>>,
    failures_left: Arc<Mutex<usize>>,
    resume_failures_left: Arc<Mutex<usize>>,
}

impl RecordingSink {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            events: Arc::new(Mutex::new(Vec::new())),
            failures_left: Arc::new(Mutex::new(0)),
            resume_failures_left: Arc::new(Mutex::new(0)),
        }
    }

    /// The next `count` writes fail.
    pub fn failing_writes(self, count: usize) -> Self {
        *self.failures_left.lock().expect("failure counter poisoned") = count;
        self
    }

    /// The next `count` resumes fail.
    pub fn failing_resumes(self, count: usize) -> Self {
        *self
            .resume_failures_left
            .lock()
            .expect("failure counter poisoned") = count;
        self
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().expect("event log poisoned").clone()
    }

    /// Samples written so far, in order.
    pub fn written(&self) -> Vec<i16> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Write(samples) => Some(samples),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn record(&self, event: SinkEvent) {
        self.events.lock().expect("event log poisoned").push(event);
    }
}

impl AudioSink for RecordingSink {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize> {
        {
            let mut failures = self.failures_left.lock().expect("failure counter poisoned");
            if *failures > 0 {
                *failures -= 1;
                drop(failures);
                self.record(SinkEvent::WriteFailed);
                return Err(Error::Device("simulated underrun".to_string()));
            }
        }
        self.record(SinkEvent::Write(samples.to_vec()));
        Ok(self.format.frames(samples.len()))
    }

    fn recover(&mut self) -> Result<()> {
        self.record(SinkEvent::Recover);
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        self.record(SinkEvent::Drain);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.record(SinkEvent::Pause);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        {
            let mut failures = self
                .resume_failures_left
                .lock()
                .expect("failure counter poisoned");
            if *failures > 0 {
                *failures -= 1;
                drop(failures);
                self.record(SinkEvent::ResumeFailed);
                return Err(Error::Device("simulated reopen failure".to_string()));
            }
        }
        self.record(SinkEvent::Resume);
        Ok(())
    }
}
