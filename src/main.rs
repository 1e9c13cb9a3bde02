// SPDX-License-Identifier: MPL-2.0
use fbplay::cli::{self, Invocation, USAGE};
use fbplay::config;
use fbplay::player::{Session, SessionSettings};
use fbplay::terminal::{self, RawTerminal};
use std::process::ExitCode;

fn main() -> ExitCode {
    let options = match cli::parse_env() {
        Ok(Invocation::Play(options)) => options,
        Ok(Invocation::Help) => {
            print!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{err}\n\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let config = config::load().unwrap_or_default();
    fbplay::logging::init(config.log_filter());

    let settings = SessionSettings::new(options, &config, std::env::var("FBDEV").ok());
    let input = match RawTerminal::enable() {
        Ok(input) => input,
        Err(err) => {
            tracing::error!(%err, "cannot set up keyboard input");
            return ExitCode::FAILURE;
        }
    };
    terminal::install_signal_handlers();

    let result = Session::open(&settings, input).map(|mut session| session.run());
    println!();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "playback failed");
            eprintln!("fbplay: {err}");
            ExitCode::FAILURE
        }
    }
}
