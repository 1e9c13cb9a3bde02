// SPDX-License-Identifier: MPL-2.0
//! Audio/Video synchronization for console playback.
//!
//! Audio is the master clock: once decoded PCM is handed to the output
//! thread it plays at the device rate no matter what the main loop does.
//! Video is kept in line by deciding, once per video tick, whether another
//! frame should be decoded right away or the loop should pace itself.
//!
//! # Correction windows
//!
//! Drift is `audio position - video position`. During a correction window
//! (`countdown > 0`) video is decoded back-to-back while drift is at or above
//! the target and skipped otherwise. Outside a window the caller paces on the
//! video stream's own frame durations.
//!
//! ```text
//!  period elapsed ──▶ countdown = window ──▶ Present / Skip ... ──▶ Pace
//! ```

use crate::config::DEFAULT_SYNC_WINDOW;

/// Determines what the main loop does on a video tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Video lags behind the target: decode and present a frame now.
    Present,

    /// Video is ahead of the target: leave the tick to audio.
    Skip,

    /// No correction in progress: pace on the video clock, then present.
    Pace,
}

/// Tunable state of the drift corrector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    /// Drift the corrector steers towards, in milliseconds.
    pub target_drift_ms: i64,
    /// Correction ticks left in the current window.
    pub countdown: u32,
    /// Ticks between automatic windows; 0 disables them.
    pub period: u32,
    pub since_last: u32,
    /// Frames to decode before capturing the startup drift; 0 once passed.
    pub warmup: u32,
    /// Length of a correction window.
    pub window: u32,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            target_drift_ms: 0,
            countdown: 0,
            period: 0,
            since_last: 0,
            warmup: 0,
            window: DEFAULT_SYNC_WINDOW,
        }
    }
}

/// Drift-correcting gate for video presentation.
#[derive(Debug, Clone, Default)]
pub struct SyncController {
    state: SyncState,
}

impl SyncController {
    /// Creates a controller with the given window and automatic period.
    ///
    /// `warmup` is the number of frames to decode before the current drift
    /// becomes the target; pass 0 to keep the target at 0.
    #[must_use]
    pub fn new(window: u32, period: u32, warmup: u32) -> Self {
        Self {
            state: SyncState {
                window,
                period,
                warmup,
                ..SyncState::default()
            },
        }
    }

    #[must_use]
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Current drift target in milliseconds.
    #[must_use]
    pub fn target(&self) -> i64 {
        self.state.target_drift_ms
    }

    /// Decides the action for one video tick.
    ///
    /// `drift_ms` is audio minus video position; `frames_decoded` counts the
    /// video frames decoded so far.
    pub fn decide(&mut self, drift_ms: i64, frames_decoded: u64) -> SyncAction {
        let state = &mut self.state;

        if state.period > 0 {
            let elapsed = state.since_last;
            state.since_last += 1;
            if elapsed >= state.period {
                state.countdown = state.window;
                state.since_last = 0;
            }
        }

        if state.warmup > 0 {
            state.countdown = 0;
            if u64::from(state.warmup) < frames_decoded {
                state.warmup = 0;
                state.target_drift_ms = drift_ms;
                tracing::debug!(target_ms = drift_ms, "captured startup drift");
            }
        }

        if state.countdown > 0 {
            state.countdown -= 1;
            if drift_ms >= state.target_drift_ms {
                return SyncAction::Present;
            }
            return SyncAction::Skip;
        }

        SyncAction::Pace
    }

    /// Overrides the drift target.
    pub fn set_target(&mut self, target_ms: i64) {
        self.state.target_drift_ms = target_ms;
    }

    /// Adopts the current drift as the target.
    pub fn capture(&mut self, drift_ms: i64) {
        self.state.target_drift_ms = drift_ms;
    }

    /// Changes the length of future correction windows.
    pub fn set_window(&mut self, window: u32) {
        self.state.window = window;
    }

    /// Starts a correction window of `ticks`, or of the configured window size.
    pub fn start_correction(&mut self, ticks: Option<u32>) {
        self.state.countdown = ticks.unwrap_or(self.state.window);
    }

    /// Re-arms a full correction window after a seek or pause toggle.
    pub fn restart(&mut self) {
        self.state.countdown = self.state.window;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_controller_paces() {
        let mut sync = SyncController::new(32, 0, 0);
        assert_eq!(sync.decide(500, 10), SyncAction::Pace);
        assert_eq!(sync.decide(-500, 11), SyncAction::Pace);
    }

    #[test]
    fn countdown_below_target_skips_then_paces() {
        let mut sync = SyncController::new(4, 0, 0);
        sync.set_target(100);
        sync.start_correction(Some(3));

        for _ in 0..3 {
            assert_eq!(sync.decide(50, 0), SyncAction::Skip);
        }
        assert_eq!(sync.decide(50, 0), SyncAction::Pace);
    }

    #[test]
    fn countdown_at_or_above_target_presents() {
        let mut sync = SyncController::new(2, 0, 0);
        sync.set_target(100);
        sync.restart();

        assert_eq!(sync.decide(100, 0), SyncAction::Present);
        assert_eq!(sync.decide(250, 0), SyncAction::Present);
        assert_eq!(sync.decide(250, 0), SyncAction::Pace);
    }

    #[test]
    fn period_opens_a_window_every_n_ticks() {
        let mut sync = SyncController::new(1, 2, 0);

        // ticks 0 and 1 only count; tick 2 reaches the period
        assert_eq!(sync.decide(10, 0), SyncAction::Pace);
        assert_eq!(sync.decide(10, 1), SyncAction::Pace);
        assert_eq!(sync.decide(10, 2), SyncAction::Present);
        assert_eq!(sync.state().since_last, 0);
        assert_eq!(sync.decide(10, 3), SyncAction::Pace);
    }

    #[test]
    fn warmup_suppresses_correction_and_captures_drift() {
        let mut sync = SyncController::new(8, 0, 3);
        sync.restart();

        for frames in 0..=3 {
            assert_eq!(sync.decide(70, frames), SyncAction::Pace);
            assert!(sync.state().warmup > 0);
        }
        assert_eq!(sync.decide(120, 4), SyncAction::Pace);
        assert_eq!(sync.state().warmup, 0);
        assert_eq!(sync.target(), 120);
    }

    #[test]
    fn start_correction_defaults_to_window() {
        let mut sync = SyncController::new(5, 0, 0);
        sync.start_correction(None);
        assert_eq!(sync.state().countdown, 5);

        sync.set_window(9);
        sync.restart();
        assert_eq!(sync.state().countdown, 9);
    }

    #[test]
    fn capture_replaces_target() {
        let mut sync = SyncController::default();
        sync.set_target(-40);
        sync.capture(15);
        assert_eq!(sync.target(), 15);
    }
}
