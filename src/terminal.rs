// SPDX-License-Identifier: MPL-2.0
//! Keyboard input and termination signals.
//!
//! [`RawTerminal`] switches stdin to non-canonical, no-echo mode with
//! immediate reads and restores the previous settings when dropped. When stdin
//! is not a terminal it is made non-blocking instead.

use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Set by SIGINT/SIGTERM.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Source of command bytes for the main loop.
pub trait InputSource {
    /// Returns the next pending byte without blocking.
    fn read_byte(&mut self) -> Option<u8>;

    /// Blocks up to `timeout` for input; returns whether some arrived.
    fn wait(&mut self, timeout: Duration) -> bool;
}

/// Stdin in raw, non-blocking mode.
pub struct RawTerminal {
    saved_termios: Option<libc::termios>,
    saved_flags: Option<libc::c_int>,
}

impl RawTerminal {
    /// Puts stdin into raw non-blocking mode.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the descriptor flags cannot be read.
    pub fn enable() -> Result<Self> {
        let fd = libc::STDIN_FILENO;

        // SAFETY: termios is plain data; tcgetattr fills it or fails.
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        let saved_termios = if unsafe { libc::tcgetattr(fd, &mut termios) } == 0 {
            let saved = termios;
            termios.c_lflag &= !(libc::ICANON | libc::ECHO);
            termios.c_cc[libc::VMIN] = 0;
            termios.c_cc[libc::VTIME] = 0;
            // SAFETY: `termios` was initialized by tcgetattr above.
            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
                tracing::debug!("failed to switch terminal to raw mode");
            }
            Some(saved)
        } else {
            tracing::debug!("stdin is not a terminal");
            None
        };

        // A tty with VMIN = VTIME = 0 already returns immediately; setting
        // O_NONBLOCK there would also affect stdout on the same terminal.
        if saved_termios.is_some() {
            return Ok(Self {
                saved_termios,
                saved_flags: None,
            });
        }

        // SAFETY: fcntl on a valid descriptor with integer arguments.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };

        Ok(Self {
            saved_termios,
            saved_flags: Some(flags),
        })
    }
}

impl InputSource for RawTerminal {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = 0u8;
        // SAFETY: reads at most one byte into a valid local buffer.
        let read = unsafe {
            libc::read(
                libc::STDIN_FILENO,
                std::ptr::addr_of_mut!(byte).cast(),
                1,
            )
        };
        (read == 1).then_some(byte)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn wait(&mut self, timeout: Duration) -> bool {
        let mut pfd = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
        // SAFETY: one valid pollfd.
        unsafe { libc::poll(&mut pfd, 1, millis) > 0 }
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        let fd = libc::STDIN_FILENO;
        if let Some(flags) = self.saved_flags.take() {
            unsafe { libc::fcntl(fd, libc::F_SETFL, flags) };
        }
        if let Some(saved) = self.saved_termios.take() {
            unsafe { libc::tcsetattr(fd, libc::TCSANOW, &saved) };
        }
    }
}

extern "C" fn on_signal(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Routes SIGINT and SIGTERM to [`interrupted`].
pub fn install_signal_handlers() {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    for signal in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler only stores to an atomic.
        if unsafe { libc::signal(signal, handler) } == libc::SIG_ERR {
            tracing::warn!(signal, "failed to install signal handler");
        }
    }
}

/// Whether a termination signal arrived.
#[must_use]
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Scripted [`InputSource`] for driving the player loop.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    bytes: std::collections::VecDeque<u8>,
}

impl ScriptedInput {
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.iter().copied().collect(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn read_byte(&mut self) -> Option<u8> {
        self.bytes.pop_front()
    }

    fn wait(&mut self, _timeout: Duration) -> bool {
        !self.bytes.is_empty()
    }
}
