// SPDX-License-Identifier: MPL-2.0
use std::fmt;

#[derive(Debug, Clone)]
pub enum Error {
    Io(String),
    Config(String),
    Usage(String),
    Open(OpenError),
    Decode(String),
    EndOfStream,
    Device(String),
    Subtitle(String),
}

/// Reasons a media stream could not be opened.
///
/// Opening failures are fatal for the affected stream only; the session keeps
/// playing the other stream when one is available.
#[derive(Debug, Clone)]
pub enum OpenError {
    /// The container could not be opened or probed.
    Input(String),

    /// The file has no stream of the requested kind (or the index is out of range).
    NoStream(&'static str),

    /// A stream exists but its codec could not be opened.
    Codec(String),
}

impl OpenError {
    /// Categorizes a raw FFmpeg message produced while opening a codec.
    pub fn from_codec_message(msg: &str) -> Self {
        let msg_lower = msg.to_lowercase();
        if msg_lower.contains("no such file") || msg_lower.contains("permission denied") {
            return OpenError::Input(msg.to_string());
        }
        OpenError::Codec(msg.to_string())
    }
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::Input(msg) => write!(f, "cannot open input: {}", msg),
            OpenError::NoStream(kind) => write!(f, "no {} stream found", kind),
            OpenError::Codec(msg) => write!(f, "cannot open codec: {}", msg),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O Error: {}", e),
            Error::Config(e) => write!(f, "Config Error: {}", e),
            Error::Usage(e) => write!(f, "Usage Error: {}", e),
            Error::Open(e) => write!(f, "Open Error: {}", e),
            Error::Decode(e) => write!(f, "Decode Error: {}", e),
            Error::EndOfStream => write!(f, "End of stream"),
            Error::Device(e) => write!(f, "Device Error: {}", e),
            Error::Subtitle(e) => write!(f, "Subtitle Error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<OpenError> for Error {
    fn from(err: OpenError) -> Self {
        Error::Open(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<ffmpeg_next::Error> for Error {
    fn from(err: ffmpeg_next::Error) -> Self {
        match err {
            ffmpeg_next::Error::Eof => Error::EndOfStream,
            other => Error::Decode(other.to_string()),
        }
    }
}

impl From<pico_args::Error> for Error {
    fn from(err: pico_args::Error) -> Self {
        Error::Usage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
