// SPDX-License-Identifier: MPL-2.0
//! `fbplay` is a console media player for the Linux framebuffer.
//!
//! Video is scaled and copied into fbdev memory, audio is played through the
//! system audio host, and a small keyboard protocol drives seeking, pausing
//! and A/V drift correction.

#![doc(html_root_url = "https://docs.rs/fbplay/0.1.0")]

pub mod cli;
pub mod config;
pub mod error;
pub mod framebuffer;
pub mod logging;
pub mod player;
pub mod terminal;

#[cfg(test)]
mod test_utils;
